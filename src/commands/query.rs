use super::truncate;
use docdex_core::{Engine, SearchMode};

pub async fn run(
    engine: &Engine,
    query: &str,
    mode: SearchMode,
    top_k: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let results = engine.query(query, mode, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("Searching ({}) for: {}\n", mode, query);

    if results.is_empty() {
        println!("No results found.");
        println!("\nTip: Run `docdex add` to index documents first.");
        return Ok(());
    }

    println!("Found {} results:\n", results.len());

    for result in results {
        println!("{} (score: {:.4})", result.title, result.score);
        println!("   {}", truncate(&result.snippet, 80));
        println!("   ID: {} | library: {}", result.doc_id, result.library);
        println!();
    }

    Ok(())
}
