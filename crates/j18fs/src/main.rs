use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use j18fs::api;
use j18fs::config::LoggingConfig;
use j18fs::notify::create_renderer;
use j18fs::Config;
use j18fs::FilamentWidget;
use j18fs::MessageRouter;
use tokio::task::JoinHandle;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Filament sensor status popups for the Julia 2018 OctoPrint plugin
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "j18fs.toml")]
    config: PathBuf,

    /// Fetch and show sensor status once, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    // Initialize tracing/logging
    init_logging(&config.logging);

    tracing::info!("j18fs starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let base_url = config.octoprint.url()?;
    let renderer = create_renderer(&config.popup).context("Failed to create popup renderer")?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("j18fs/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let widget = Arc::new(
        FilamentWidget::new(
            &config.widget,
            &base_url,
            Arc::new(config.plugins.clone()),
            renderer,
            client,
        )
        .context("Failed to create widget")?,
    );

    if args.once {
        widget.on_before_binding().await;
        return Ok(());
    }

    let router = MessageRouter::new();
    widget.register(&router);

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if config.octoprint.push_socket {
        tasks.extend(start_push_socket(&config, &router)?);
    } else {
        tracing::info!("Push socket disabled, only fetched status will be shown");
    }

    widget.on_before_binding().await;

    if let Some(period) = config.widget.poll_interval() {
        widget.start_polling(period);
    }

    // Start the local API if enabled
    let mut api_shutdown = None;
    if config.api.enabled {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let listen = config.api.listen.clone();
        let port = config.api.port;
        let api_widget = widget.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = api::serve(listen, port, api_widget, shutdown_rx).await {
                tracing::error!("HTTP API server error: {}", e);
            }
        }));
        api_shutdown = Some(shutdown_tx);
    }

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    widget.teardown();
    if let Some(tx) = api_shutdown {
        let _ = tx.send(());
    }
    for task in tasks {
        task.abort();
    }

    tracing::info!("j18fs shutdown complete");

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let mut targets = Targets::new().with_default(LevelFilter::from(logging.level));
    for (target, level) in &logging.overrides {
        targets = targets.with_target(target.clone(), LevelFilter::from(*level));
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(targets)
        .init();
}

#[cfg(feature = "push_socket")]
fn start_push_socket(config: &Config, router: &MessageRouter) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let url = j18fs::host::socket_url(&config.octoprint.url()?)?;
    let (tx, rx) = MessageRouter::channel();

    let router = router.clone();
    let router_task = tokio::spawn(async move { router.run(rx).await });

    let client = j18fs::host::WebSocketPushClient::new(url);
    let socket_task = tokio::spawn(j18fs::host::run_push_socket(
        client,
        tx,
        config.octoprint.reconnect_delay(),
    ));

    Ok(vec![router_task, socket_task])
}

#[cfg(not(feature = "push_socket"))]
fn start_push_socket(_config: &Config, _router: &MessageRouter) -> anyhow::Result<Vec<JoinHandle<()>>> {
    tracing::warn!("Built without the push_socket feature; pushed popups are unavailable");
    Ok(Vec::new())
}
