#[tokio::main]
async fn main() -> anyhow::Result<()> {
    athletiqly_log::app::run().await?;
    // A pending stdin read would otherwise keep the runtime from shutting down.
    std::process::exit(0)
}
