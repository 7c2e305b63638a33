use personal_agent_orchestrator::{api::start_server, context::AssistantContext};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    if std::env::var("GEMINI_API_KEY").unwrap_or_default().is_empty() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 Chat requests will answer with configuration guidance");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Personal Assistant - API Server");
    info!("📍 Port: {}", api_port);

    let ctx = AssistantContext::from_env();
    ctx.store.initialize().await?;

    info!("✅ Assistant context initialized");
    info!("📡 Starting API server...");

    start_server(ctx, api_port).await?;

    Ok(())
}
