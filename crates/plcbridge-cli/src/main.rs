//! `plcbridge` – PLC ⇄ robot order bridge
//!
//! Starts one bridge instance:
//!
//! 1. Initialises structured logging (and OTLP export when configured).
//! 2. Loads `~/.plcbridge/config.toml` (or `PLCBRIDGE_CONFIG`), falling back
//!    to defaults plus `PLCBRIDGE_*` overrides.
//! 3. Runs the bridge service on the configured transport:
//!    - `mqtt` (default): the broker at `mqtt_broker`, disconnecting on exit.
//!    - `local`: the in-process event bus, exposed to simulators through the
//!      WebSocket gateway on `gateway_port`.
//! 4. Intercepts **Ctrl-C** to stop the service cleanly.

mod config;
mod telemetry;

use colored::Colorize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use config::TransportKind;
use plcbridge_core::{Bridge, BridgeService, BridgeSettings};
use plcbridge_middleware::{EventBus, MqttSettings, MqttTransport, WsGateway};

fn main() {
    // The OTLP exporter is built before the runtime exists.
    let telemetry_guard = telemetry::init_tracing("plcbridge");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}; using defaults.",
                config::config_path().display().to_string().dimmed()
            );
            config::from_env()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::from_env()
        }
    };
    info!(config = ?cfg, "configuration resolved");

    let transport = cfg.transport;
    let mqtt = cfg.mqtt_settings();
    let gateway_addr = SocketAddr::from(([0, 0, 0, 0], cfg.gateway_port));
    let settings = cfg.into_settings();
    println!(
        "  Robot {} {} under {}",
        settings.manufacturer.bold(),
        settings.serial_number.bold(),
        settings.interface_prefix.dimmed()
    );
    println!(
        "  PLC   {} → {}",
        settings.command_topic.cyan(),
        settings.response_topic.cyan()
    );
    match transport {
        TransportKind::Mqtt => println!("  Broker  {}\n", mqtt.broker.bold()),
        TransportKind::Local => println!("  Gateway ws://{}\n", gateway_addr.to_string().bold()),
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // The receiver stays alive so a stop sent before any task subscribes
    // is not lost. Tasks treat a dropped sender as a stop.
    let (stop_tx, _stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let handler_tx = Arc::clone(&stop_tx);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping bridge …".yellow().bold());
        let _ = handler_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Runtime ───────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(async {
        match transport {
            TransportKind::Mqtt => run_mqtt(settings, &mqtt, &stop_tx).await,
            TransportKind::Local => run_local(settings, gateway_addr, &stop_tx).await,
        }
    });

    drop(runtime);
    drop(stop_tx);
    println!("{}", "  ✓ Bridge stopped.".green());
    if exit_code != 0 {
        drop(telemetry_guard);
        std::process::exit(exit_code);
    }
}

/// Run against the broker until stopped, then disconnect.
async fn run_mqtt(settings: BridgeSettings, mqtt: &MqttSettings, stop: &watch::Sender<bool>) -> i32 {
    let (transport, connection) = match MqttTransport::new(mqtt) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, broker = %mqtt.broker, "invalid MQTT settings");
            return 1;
        }
    };
    info!(broker = %mqtt.broker, client_id = %mqtt.client_id, "connecting to MQTT broker");
    let link = tokio::spawn(connection.run(stop.subscribe()));

    let bridge = Arc::new(Bridge::new(settings, Arc::new(transport)));
    let exit_code = match BridgeService::new(bridge).run(stop.subscribe()).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "bridge service failed");
            1
        }
    };

    // The service may fail on its own; the connection still has to close.
    let _ = stop.send(true);
    if let Err(e) = link.await {
        error!(error = %e, "MQTT connection task panicked");
    }
    exit_code
}

/// Run on the in-process bus with the WebSocket gateway in front of it.
async fn run_local(
    settings: BridgeSettings,
    gateway_addr: SocketAddr,
    stop: &watch::Sender<bool>,
) -> i32 {
    let bus = Arc::new(EventBus::default());
    let bridge = Arc::new(Bridge::new(settings, bus.clone()));
    let gateway = WsGateway::new(bus);

    tokio::select! {
        result = BridgeService::new(bridge).run(stop.subscribe()) => match result {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %e, "bridge service failed");
                1
            }
        },
        result = gateway.run(gateway_addr) => {
            if let Err(e) = result {
                error!(error = %e, "gateway stopped");
            }
            1
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___  __   _______     _    __"#.bold().cyan());
    println!("{}", r#"  / _ \/ /  / ___/ /    (_)__/ /__ ____"#.bold().cyan());
    println!("{}", r#" / ___/ /__/ /__/ _ \  / / _  / _ `/ -_)"#.bold().cyan());
    println!("{}", r#"/_/  /____/\___/_.__/ /_/\_,_/\_, /\__/"#.bold().cyan());
    println!("{}", r#"                             /___/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "plcbridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  PLC ⇄ robot order lifecycle bridge");
    println!();
}
