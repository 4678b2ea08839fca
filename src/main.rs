use std::sync::Arc;

use hap_range_proxy::config::Config;
use hap_range_proxy::engine::EventSink;
use hap_range_proxy::handler::AppState;
use hap_range_proxy::logger::{self, LogSink};
use hap_range_proxy::server;

const DEFAULT_CONFIG: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Worker thread count from config, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let events: Arc<dyn EventSink> = Arc::new(LogSink::new(cfg.logging.events));
    let state = Arc::new(AppState::new(cfg, events)?);
    logger::log_server_start(&addr, &state.config);

    server::serve(listener, state, server::shutdown_signal()).await?;
    Ok(())
}
