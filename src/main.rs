// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod native_listener;
mod service;
mod vendor_stub;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use chorus_agent::VendorSession;
use chorus_broker::ChannelHub;
use chorus_rpc::{Dispatcher, MethodEntry, MethodHandler, MethodOutcome, MethodRegistry, PendingCalls};
use chorus_session::FileSessionStore;
use chorus_supervisor::{StartupArgs, Supervisor, VendorFactory};
use chorus_tools::ToolRegistry;
use chorus_transport::ws;

use cli::{Cli, Commands};
use service::ConnectionState;
use vendor_stub::UnavailableVendor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = chorus_config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve { listen: None }) {
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Serve { listen } => run_serve(config, listen).await,
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

async fn run_serve(mut config: chorus_config::Config, listen_override: Option<String>) -> anyhow::Result<()> {
    if let Some(addr) = listen_override {
        config.transport.listen_addr = Some(addr);
    }

    let data_dir = dirs::data_dir()
        .map(|d| d.join("chorus").join("sessions"))
        .unwrap_or_else(|| std::path::PathBuf::from(".chorus/sessions"));
    let sessions = Arc::new(FileSessionStore::new(data_dir));

    let hub = Arc::new(ChannelHub::new(config.broker.clone(), sessions.clone()));
    let pending = Arc::new(PendingCalls::new());
    let dispatcher = Arc::new(Dispatcher::new(
        pending.clone(),
        Duration::from_millis(config.rpc.rpc_timeout_ms),
    ));
    let tools = Arc::new(ToolRegistry::new());

    let local_methods = Arc::new(MethodRegistry::new());
    register_local_methods(&local_methods);

    let vendor_factory: VendorFactory = Arc::new(|args: &StartupArgs| {
        Arc::new(UnavailableVendor::new(args.agent_type.clone())) as Arc<dyn VendorSession>
    });

    let (supervisor, completion_rx) = Supervisor::new(
        hub.clone(),
        sessions.clone(),
        dispatcher.clone(),
        tools.clone(),
        config.tools.clone(),
        config.agent.clone(),
        config.supervisor.clone(),
        vendor_factory,
    );
    tokio::spawn(Arc::clone(&supervisor).run(completion_rx));

    let conn_state = Arc::new(ConnectionState {
        hub,
        sessions,
        pending,
        local_methods,
    });

    let max_frame_bytes = config.transport.max_frame_bytes;
    let ws_listen = config
        .transport
        .listen_addr
        .clone()
        .unwrap_or_else(|| "127.0.0.1:7420".to_string());

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state((conn_state.clone(), max_frame_bytes));

    let native_task = if let Some(addr) = config.transport.native_listen_addr.clone() {
        let state = conn_state.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = native_listener::run(&addr, max_frame_bytes, state).await {
                tracing::error!("native listener stopped: {e}");
            }
        }))
    } else {
        None
    };

    info!(%ws_listen, "chorus broker starting");
    let listener = tokio::net::TcpListener::bind(&ws_listen)
        .await
        .with_context(|| format!("binding WebSocket listener on {ws_listen}"))?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("WebSocket listener stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    if let Some(task) = native_task {
        task.abort();
    }
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State((state, max_frame_bytes)): State<(Arc<ConnectionState>, usize)>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let bridge = tokio::spawn(ws::handle_socket(socket, outbound_rx, inbound_tx, max_frame_bytes));
        service::run_connection(state, inbound_rx, outbound_tx).await;
        bridge.abort();
    })
}

fn register_local_methods(registry: &MethodRegistry) {
    registry.register(
        "list_methods",
        MethodEntry {
            description: "Lists the broker-local methods a connected client may call directly.".into(),
            parameter_schema: serde_json::json!({"type": "object", "properties": {}}),
            menu: false,
            handler: MethodHandler::Unary(Arc::new(|_call| {
                Box::pin(async { MethodOutcome::Ok(serde_json::json!({"methods": ["list_methods"]})) })
            })),
        },
    );
}
