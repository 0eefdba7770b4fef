use docdex_core::{DocumentUpdate, Engine};

pub async fn run(engine: &Engine, doc_id: &str, update: DocumentUpdate) -> anyhow::Result<()> {
    if update.is_empty() {
        anyhow::bail!("Nothing to update. Pass at least one of --title, --content, --file, --library, --category, --summary or a --clear-* flag.");
    }

    if engine.update_document(doc_id, update).await? {
        println!("Updated {}", doc_id);
    } else {
        anyhow::bail!("Document not found: {}", doc_id);
    }

    Ok(())
}
