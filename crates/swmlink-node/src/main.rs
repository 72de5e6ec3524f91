//! swmlink demo node
//!
//! - Loads a component config (first argument, default `swmlink.yaml`)
//! - Starts a world-model stub and a Component on one in-process bus
//! - Waits for a peer, asks for the root node id, shuts down

use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use swmlink_core::error::Result;
use swmlink_node::config;
use swmlink_node::stub::spawn_world_model;
use swmlink_node::transport::LocalBus;
use swmlink_node::Component;

const DEMO_ROOT_ID: &str = "e379121f-06c6-4e21-ae9d-ae78ec1986a1";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(code = e.code().as_str(), error = %e, "swmlink-node failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "swmlink.yaml".into());
    let cfg = config::load_from_file(&path)?;

    let bus = LocalBus::new();
    let stub = spawn_world_model(&bus, &cfg.group, DEMO_ROOT_ID).await?;

    let transport = bus.node(&cfg.short_name);
    let component = Component::start(cfg, transport).await?;

    if !component.wait_for_peers(1, Duration::from_secs(5)).await {
        tracing::warn!("no peer showed up");
    }

    match component.get_root_node_id().await {
        Ok(Some(root)) => tracing::info!(root_id = %root, "root node"),
        Ok(None) => tracing::warn!("world model reported no root node"),
        Err(e) => tracing::warn!(code = e.code().as_str(), error = %e, "root node query failed"),
    }

    component.shutdown().await;
    stub.stop().await;
    Ok(())
}
