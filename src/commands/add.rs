use docdex_core::{Engine, NewDocument};

pub async fn run(
    engine: &Engine,
    title: String,
    library: String,
    content: String,
    id: Option<String>,
    category: Option<String>,
    summary: Option<String>,
) -> anyhow::Result<()> {
    let doc = engine
        .add_document(NewDocument {
            doc_id: id,
            title,
            content,
            library,
            category,
            summary,
        })
        .await?;

    let chunks = engine.get_chunks(&doc.doc_id)?.len();
    println!("Added {} ({} chunks)", doc.doc_id, chunks);

    Ok(())
}
