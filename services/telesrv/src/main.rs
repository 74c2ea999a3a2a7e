//! Telecontrol Gateway Service (telesrv)
//!
//! Binary entry point: loads the topology, connects the active serial ports
//! and serves upstream requests until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use common::logging::{init_logging, LoggingOptions};
use common::shutdown::wait_for_shutdown;
use errors::{GatewayError, GatewayResult};

use telesrv::core::config::load_topology;
use telesrv::core::dispatch::{CommandDispatcher, PortMap, PortSession};
use telesrv::core::interrogation::InterrogationEngine;
use telesrv::core::resolver::AddressResolver;
use telesrv::core::topology::SlaveDirectory;
use telesrv::protocols::iec104::{self, GatewayAdapter};
use telesrv::protocols::modbus::RtuLink;

/// Command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "telesrv", about = "Modbus RTU to telecontrol gateway")]
struct Args {
    /// Path to the topology configuration file
    #[arg(short = 'c', long, default_value = "config/topology.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Optional directory for daily-rotated log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Validation mode - only validate the topology without starting
    #[arg(long)]
    validate: bool,

    /// Print the parsed topology and exit
    #[arg(long)]
    print_topology: bool,
}

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let args = Args::parse();

    let _log_guard = init_logging(&LoggingOptions {
        level: args.log_level.clone(),
        no_color: args.no_color,
        log_dir: args.log_dir.clone(),
        service: "telesrv".to_string(),
    })?;

    info!("loading topology from {}", args.config.display());
    let directory = Arc::new(load_topology(&args.config).map_err(GatewayError::from)?);

    if args.validate {
        info!("topology validated successfully");
        return Ok(());
    }

    if args.print_topology {
        println!("{}", directory.summary());
        return Ok(());
    }

    let ports = Arc::new(connect_ports(&directory).await);
    if ports.connected() == 0 {
        warn!("no serial port could be opened; all requests will be answered negatively");
    }

    let dispatcher = CommandDispatcher::new(
        AddressResolver::new(Arc::clone(&directory)),
        Arc::clone(&ports),
    );
    let interrogation = InterrogationEngine::new(Arc::clone(&directory), Arc::clone(&ports));
    let adapter = Arc::new(GatewayAdapter::new(
        Arc::clone(&directory),
        dispatcher,
        interrogation,
    ));

    // The upstream session layer pushes decoded requests through this channel
    let (request_tx, request_rx) = mpsc::channel::<iec104::UpstreamEnvelope>(32);
    let bridge = tokio::spawn(iec104::serve(adapter, request_rx));

    info!(
        "gateway ready: {} stations on {} connected ports",
        directory.station_count(),
        ports.connected()
    );

    wait_for_shutdown().await;
    info!("shutdown signal received");

    drop(request_tx);
    if let Err(e) = bridge.await {
        error!("session bridge ended abnormally: {e}");
    }

    ports.close_all().await;
    info!("telesrv stopped");
    Ok(())
}

/// Open one RTU link per active port with slaves
///
/// A port that fails to open is logged and skipped; requests for its slaves
/// are answered negatively until restart.
async fn connect_ports(directory: &SlaveDirectory) -> PortMap {
    let mut ports = PortMap::new();

    for table in directory.ports() {
        if !table.active || table.slaves.is_empty() {
            continue;
        }

        match RtuLink::connect(&table.device, &table.serial).await {
            Ok(link) => {
                info!(
                    "{}: opened {} ({} baud, {} slaves)",
                    table.id,
                    table.device,
                    table.serial.baud_rate,
                    table.slaves.len()
                );
                ports.insert(PortSession::new(table.id, Box::new(link)));
            },
            Err(e) => {
                error!("{}: failed to open {}: {e}", table.id, table.device);
            },
        }
    }

    ports
}
