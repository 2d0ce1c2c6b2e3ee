#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_checker::run().await {
        eprintln!("exam-checker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
