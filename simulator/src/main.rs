//! Ticket market simulator.
//!
//! Runs one scripted market and prints per-second sales for the last minute.

use chrono::Utc;
use std::sync::Arc;
use ticket_market_core::MarketEnvironment;
use ticket_market_core::environment::SystemClock;
use ticket_market_runtime::metrics::MetricsServer;
use ticket_market_runtime::{ActorTiming, BroadcastNotifier, Orchestrator};
use ticket_market_simulator::{Config, SalesStore, Scenario, render_sales};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticket_market_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        total_tickets = config.market.total_tickets,
        release_rate = config.market.ticket_release_rate,
        retrieval_rate = config.market.customer_retrieval_rate,
        capacity = config.market.max_ticket_capacity,
        vendors = config.scenario.vendors,
        customers = config.scenario.customers,
        run_seconds = config.scenario.run_seconds,
        "Configuration loaded"
    );

    let mut metrics_server = None;
    if config.metrics.enabled {
        match config.metrics.addr() {
            Some(addr) => {
                let mut server = MetricsServer::new(addr);
                server.start()?;
                metrics_server = Some(server);
            },
            None => warn!(host = %config.metrics.host, "Invalid metrics address, exporter disabled"),
        }
    }

    let store = SalesStore::open(config.database_url.as_deref()).await?;
    info!(backend = store.backend(), "Persistence ready");

    let env = MarketEnvironment::new(
        Arc::new(SystemClock),
        store.sink(),
        Arc::new(BroadcastNotifier::new()),
    );
    let orchestrator = Orchestrator::new(env)
        .with_timing(ActorTiming::default().with_shutdown_grace(config.shutdown_grace()));
    orchestrator.configure(config.market).await?;

    let scenario = Scenario::new(config.scenario.clone(), &config.market, &mut rand::thread_rng());
    let outcome = scenario.run(&orchestrator, shutdown_signal()).await?;

    info!(
        ending = ?outcome.ending,
        sold = outcome.final_status.sold_tickets,
        finished = outcome.shutdown.finished.len(),
        timed_out = outcome.shutdown.timed_out.len(),
        "Market stopped"
    );
    for failure in &outcome.shutdown.failures {
        error!(kind = failure.kind().code(), error = %failure, "Actor failed");
    }

    let buckets = store.sales_over_time(Utc::now()).await?;
    println!("{}", render_sales(&buckets));

    if let Some(rendered) = metrics_server.as_ref().and_then(MetricsServer::render) {
        info!(bytes = rendered.len(), "Final metrics snapshot rendered");
    }
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
