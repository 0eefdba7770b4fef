use super::truncate;
use chrono::Local;
use docdex_core::Engine;

pub fn run(engine: &Engine, library: Option<&str>, json: bool) -> anyhow::Result<()> {
    let docs = engine.list_documents(library)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("No documents indexed. Use `docdex add` first.");
        return Ok(());
    }

    for doc in &docs {
        let date = doc.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "  {} | {:40} | {:16} | {}",
            date,
            truncate(&doc.title, 40),
            truncate(&doc.library, 16),
            doc.doc_id
        );
    }
    println!("\n{} documents", docs.len());

    Ok(())
}
