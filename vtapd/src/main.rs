/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Standalone vtap controller over an emulated fabric.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vtap_controller::{
    ClusterView, DeviceEvent, InMemorySouthbound, InMemoryTopology, InMemoryVtapStore, NodeId,
    StaticClusterGate, VtapDirection, VtapManager,
};

use crate::config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "vtapd")]
#[command(about = "Reconcile vtap mirroring pipelines for a configured fabric", long_about = None)]
struct Args {
    /// JSON5 file describing the node, fabric and initial vtaps
    #[arg(long)]
    config: PathBuf,

    /// Overrides the node id from the config file
    #[arg(long, env = "VTAPD_NODE_ID")]
    node_id: Option<String>,

    /// Reconcile once, print the per-device summary and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let daemon_config = DaemonConfig::load(&args.config)?;
    let node_id = NodeId::new(args.node_id.unwrap_or(daemon_config.node_id));
    let view = daemon_config
        .cluster
        .unwrap_or_else(|| ClusterView::single(node_id.clone()));

    info!(node_id = %node_id, hosts = daemon_config.hosts.len(), "starting vtapd");

    let topology = Arc::new(InMemoryTopology::with_hosts(daemon_config.hosts));
    let southbound = Arc::new(InMemorySouthbound::new());
    let mut manager = VtapManager::new(
        daemon_config.controller,
        Arc::new(StaticClusterGate::new(node_id, view)),
        Arc::new(InMemoryVtapStore::new()),
        topology,
        southbound.clone(),
    )
    .context("unable to start the vtap manager")?;
    manager.start();

    for seed in daemon_config.vtaps {
        let vtap = manager
            .create_vtap(seed.direction, Some(seed.criterion))
            .await
            .context("unable to create configured vtap")?;
        info!(vtap_id = %vtap.id(), direction = %vtap.direction(), "created vtap");
    }

    for device_id in &daemon_config.devices {
        manager.on_device_event(DeviceEvent::added(device_id.clone()))?;
    }

    for output in daemon_config.mirror_outputs {
        manager
            .set_mirror_output(output.device_id, output.direction, output.port, output.vlan)
            .await
            .context("unable to set mirror output")?;
    }

    manager.sync().await?;

    for device_id in &daemon_config.devices {
        let stage = manager
            .pipeline_state(device_id.clone())
            .await?
            .map(|state| format!("{:?}", state.stage()))
            .unwrap_or_else(|| "NotProgrammed".to_string());
        let vtaps = manager
            .vtaps_by_device(VtapDirection::NONE, device_id)
            .await?
            .len();
        info!(
            device_id = %device_id,
            stage = %stage,
            vtaps,
            flows = southbound.flows(device_id).len(),
            groups = southbound.groups(device_id).len(),
            "device summary"
        );
    }

    if !args.once {
        info!("reconciled configured fabric, waiting for ctrl-c");
        tokio::signal::ctrl_c()
            .await
            .context("unable to listen for ctrl-c")?;
    }

    manager.shutdown();
    info!("vtapd stopped");
    Ok(())
}
