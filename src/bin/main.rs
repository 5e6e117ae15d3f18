use asset_agent_orchestrator::{
    agent::{Orchestrator, OrchestratorConfig, DEFAULT_DIRECTIVE},
    config::AppConfig,
    encoder::ReasoningGoalEncoder,
    library::create_default_library,
    llm::{GeminiReasoningService, Reasoner},
    models::CompletionRequest,
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
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("usage: agent <prompt>");
        eprintln!("example: agent buy 10 shares of Safaricom");
        std::process::exit(2);
    }

    let config = AppConfig::from_env()?;

    info!("Asset agent starting");

    let reasoning = GeminiReasoningService::with_model(config.gemini_api_key.clone(), &config.gemini_model);
    let reasoner = Reasoner::new(Arc::new(reasoning)).with_timeout(config.reasoning_timeout);

    let market: Arc<dyn MarketData> = match config.market_api_base_url.as_deref() {
        Some(url) => Arc::new(HttpMarketData::new(url)?),
        None => {
            warn!("MARKET_API_BASE_URL not set, using built-in sample market data");
            Arc::new(StaticMarketData::default())
        }
    };

    let library = create_default_library(reasoner.clone(), market)?;
    let orchestrator = Orchestrator::new(Arc::new(library), DEFAULT_DIRECTIVE).with_config(
        OrchestratorConfig {
            max_planning_rounds: config.max_planning_rounds,
        },
    );
    let service = CompletionService::new(
        Arc::new(orchestrator),
        Arc::new(ReasoningGoalEncoder::new(reasoner)),
    );

    info!(prompt = %prompt, "Running completion");

    match service.get_completion(CompletionRequest { prompt }).await {
        Ok(blocks) => {
            println!("{}", serde_json::to_string_pretty(&blocks)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Completion failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
