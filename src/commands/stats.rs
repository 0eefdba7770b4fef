use docdex_core::Engine;

pub fn run(engine: &Engine) -> anyhow::Result<()> {
    let stats = engine.stats()?;
    let config = engine.config();

    println!("Docdex Statistics");
    println!("=================");
    println!();
    println!("Documents: {}", stats.documents);
    println!("Chunks:    {}", stats.chunks);
    println!("Data dir:  {}", config.data_dir.display());

    if !stats.embedding_models.is_empty() {
        println!();
        println!("Embedding models:");
        println!("-----------------");
        for model in &stats.embedding_models {
            println!("  {}", model);
        }
    }

    Ok(())
}
