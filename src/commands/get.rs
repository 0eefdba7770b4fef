use super::truncate;
use chrono::Local;
use docdex_core::Engine;

pub fn run(engine: &Engine, doc_id: &str, show_chunks: bool, json: bool) -> anyhow::Result<()> {
    let Some(doc) = engine.get_document(doc_id)? else {
        anyhow::bail!("Document not found: {}", doc_id);
    };
    let chunks = engine.get_chunks(doc_id)?;

    if json {
        let mut value = serde_json::to_value(&doc)?;
        value["chunk_count"] = chunks.len().into();
        if show_chunks {
            // Embeddings are left out; they are only useful to the engine
            value["chunks"] = chunks
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "chunk_index": c.chunk_index,
                        "chunk_tokens": c.chunk_tokens,
                        "embedding_model": c.embedding_model,
                        "chunk_text": c.chunk_text,
                    })
                })
                .collect();
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", doc.title);
    println!("{}", "=".repeat(doc.title.chars().count().max(3)));
    println!("ID:       {}", doc.doc_id);
    println!("Library:  {}", doc.library);
    if let Some(category) = &doc.category {
        println!("Category: {}", category);
    }
    if let Some(summary) = &doc.summary {
        println!("Summary:  {}", summary);
    }
    println!("Created:  {}", doc.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    println!("Updated:  {}", doc.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    println!("Chunks:   {}", chunks.len());

    if show_chunks {
        println!();
        for chunk in &chunks {
            println!(
                "  [{}] {} tokens | {}",
                chunk.chunk_index,
                chunk.chunk_tokens,
                truncate(&chunk.chunk_text, 70)
            );
        }
    } else {
        println!();
        println!("{}", doc.content);
    }

    Ok(())
}
