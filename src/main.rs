#[tokio::main]
async fn main() -> anyhow::Result<()> {
    guidance::start_server().await
}
