use docdex_core::{Engine, ProgressCallback, RebuildProgress};

pub async fn run(engine: &Engine, doc_ids: Option<Vec<String>>) -> anyhow::Result<()> {
    let progress: ProgressCallback = Box::new(|p: &RebuildProgress| {
        eprintln!(
            "[{:>5.1}%] {}/{} {}",
            p.percent, p.current, p.total, p.title
        );
    });

    let report = engine.rebuild(doc_ids, Some(&progress)).await?;

    println!("Rebuild complete");
    println!("================");
    println!("Documents: {}", report.total_docs);
    println!("Processed: {}", report.processed_docs);
    println!("Succeeded: {}", report.success_docs);
    println!("Failed:    {}", report.failed_docs);
    println!("Chunks:    {}", report.total_chunks);

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for failure in &report.errors {
            println!("  {}", failure);
        }
        anyhow::bail!("{} documents failed to rebuild", report.failed_docs);
    }

    Ok(())
}
