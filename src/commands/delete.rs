use docdex_core::Engine;

pub async fn run(engine: &Engine, doc_id: &str) -> anyhow::Result<()> {
    if engine.delete_document(doc_id).await? {
        println!("Deleted {}", doc_id);
    } else {
        anyhow::bail!("Document not found: {}", doc_id);
    }
    Ok(())
}
