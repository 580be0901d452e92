use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;

use axilla::cli::Args;
use axilla::config::{AppState, Config};
use axilla::{diagnostics, logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = Config::load_from(&args.config)?;

    // Dropping the guard flushes the non-blocking file writer
    let _log_guard = logger::init(&cfg.logging)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::info!("Using {workers} worker threads");
    } else {
        tracing::info!("Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg, args.diagnose))
}

async fn async_main(cfg: Config, diagnose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(cfg)?);

    if diagnose {
        let report = diagnostics::run(&state).await;
        if report.passed() {
            tracing::info!("All diagnostic checks passed");
            return Ok(());
        }
        let failed: Vec<&str> = report
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect();
        return Err(format!("diagnostic checks failed: {}", failed.join(", ")).into());
    }

    let addr = state.config.get_socket_addr()?;
    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;
    server::start_server_loop(listener, state, shutdown).await?;

    Ok(())
}
