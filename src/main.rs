#[tokio::main]
async fn main() -> std::io::Result<()> {
    arena_sync::frameworks::server::run_with_config().await
}
