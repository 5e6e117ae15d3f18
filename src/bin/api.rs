use asset_agent_orchestrator::{
    agent::{Orchestrator, OrchestratorConfig, DEFAULT_DIRECTIVE},
    api::start_server,
    config::AppConfig,
    encoder::ReasoningGoalEncoder,
    library::create_default_library,
    llm::{GeminiReasoningService, Reasoner},
    oracles::{HttpMarketData, MarketData, StaticMarketData},
    service::CompletionService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_empty() {
        eprintln!("GEMINI_API_KEY not set in .env");
        std::process::exit(1);
    }

    info!("Asset Agent Orchestrator - API Server");
    info!(port = config.port, model = %config.gemini_model, "Configuration loaded");

    let reasoning = GeminiReasoningService::with_model(config.gemini_api_key.clone(), &config.gemini_model);
    let reasoner = Reasoner::new(Arc::new(reasoning)).with_timeout(config.reasoning_timeout);

    let market: Arc<dyn MarketData> = match config.market_api_base_url.as_deref() {
        Some(url) => Arc::new(HttpMarketData::new(url)?),
        None => {
            warn!("MARKET_API_BASE_URL not set, using built-in sample market data");
            Arc::new(StaticMarketData::default())
        }
    };

    // Registration happens here, before the library is shared
    let library = create_default_library(reasoner.clone(), market)?;

    let orchestrator = Orchestrator::new(Arc::new(library), DEFAULT_DIRECTIVE).with_config(
        OrchestratorConfig {
            max_planning_rounds: config.max_planning_rounds,
        },
    );
    let service = Arc::new(CompletionService::new(
        Arc::new(orchestrator),
        Arc::new(ReasoningGoalEncoder::new(reasoner)),
    ));

    info!("Orchestrator initialized, starting API server");

    start_server(service, config.port).await?;

    Ok(())
}
