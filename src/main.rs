#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hookline_lib::run().await
}
