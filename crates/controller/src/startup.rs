use std::path::Path;
use std::sync::Arc;

use adapters::memory::fabric::{MemoryFabric, StaticDeviceIndex};
use application::event_dispatcher::{Event, EventDispatcher};
use application::lb_edge_service::LbEdgeService;
use application::pipeline_service::PipelineService;
use application::route_installer::RouteInstaller;
use application::routing_service::RoutingAppService;
use infrastructure::config::ControllerConfig;
use infrastructure::constants::{EVENT_CHANNEL_CAPACITY, GRACEFUL_SHUTDOWN_TIMEOUT};
use infrastructure::logging::init_logging;
use infrastructure::metrics::ControllerMetrics;
use ports::secondary::metrics_port::MetricsPort;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::shutdown;

/// Load and validate the configuration, then print what was parsed.
pub fn check_config(cli: &Cli) -> anyhow::Result<()> {
    let config = ControllerConfig::load(Path::new(&cli.config))?;
    let log_level = cli.log_level.unwrap_or(config.controller.log_level);
    let log_format = cli.log_format.unwrap_or(config.controller.log_format);
    init_logging(log_level, log_format)?;

    println!("configuration OK: {}", cli.config);
    println!("  forwarding table: {}", config.routing.table);
    println!("  load balancer table: {}", config.load_balancer.table);

    let registry = config.load_balancer.vip_registry();
    println!("  VIP instances: {}", registry.len());
    for instance in registry.iter() {
        println!(
            "    {} via {} -> {} backend(s)",
            instance.vip,
            instance.vmac,
            instance.backends().len()
        );
    }
    Ok(())
}

/// Run the controller daemon and block until shutdown.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = ControllerConfig::load(Path::new(&cli.config))?;

    // ── 2. Initialize logging ───────────────────────────────────────
    // CLI flags take precedence over the config file.
    let log_level = cli.log_level.unwrap_or(config.controller.log_level);
    let log_format = cli.log_format.unwrap_or(config.controller.log_format);
    init_logging(log_level, log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config,
        forwarding_table = config.routing.table,
        lb_table = config.load_balancer.table,
        "starting fabriclb controller"
    );

    // ── 3. Build the control plane ──────────────────────────────────
    let metrics_port: Arc<dyn MetricsPort> = Arc::new(ControllerMetrics::new());

    let registry = Arc::new(config.load_balancer.vip_registry());

    // Southbound stand-ins: the OpenFlow channel and the device service
    // are external collaborators. Until a transport adapter is linked,
    // the in-memory fabric lets the daemon run end to end.
    let fabric = Arc::new(MemoryFabric::new());
    let devices = Arc::new(StaticDeviceIndex::new());

    let routing = Arc::new(RoutingAppService::new(
        config.routing.table,
        Arc::clone(&metrics_port),
    ));
    let installer = RouteInstaller::new(
        Arc::clone(&fabric) as _,
        Arc::clone(&metrics_port),
        config.routing.table,
    );
    let pipeline = PipelineService::new(
        Arc::clone(&registry),
        Arc::clone(&fabric) as _,
        Arc::clone(&routing) as _,
        Arc::clone(&metrics_port),
        config.load_balancer.table,
    );
    let lb_edge = LbEdgeService::new(
        Arc::clone(&registry),
        Arc::clone(&devices) as _,
        Arc::clone(&fabric) as _,
        Arc::clone(&routing) as _,
        Arc::clone(&metrics_port),
        config.load_balancer.table,
    );
    let dispatcher = EventDispatcher::new(
        routing,
        installer,
        pipeline,
        lb_edge,
        Arc::clone(&metrics_port),
    );

    // ── 4. Run until shutdown ───────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let cancel = shutdown::create_shutdown_token();
    let dispatcher_task = tokio::spawn(dispatcher.run(event_rx, cancel.clone()));

    // The transport adapter owns the sending half; it stays alive for the
    // daemon's lifetime so the channel never closes underneath the loop.
    let _southbound = event_tx;

    info!("controller ready; waiting for southbound events");
    cancel.cancelled().await;
    info!("shutdown signal received, draining event queue");

    if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, dispatcher_task)
        .await
        .is_err()
    {
        warn!("event dispatcher did not stop within the shutdown timeout");
    }

    info!("controller stopped");
    Ok(())
}
