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

//! # vtap-controller
//!
//! `vtap-controller` turns declarative traffic-mirroring intents (vtaps) into programmed
//! per-device pipelines and keeps that programming consistent as hosts move and devices
//! join the fabric.
//!
//! Typical usage is API-first and centered on [`VtapManager`]. The manager is wired with
//! its external collaborators: a [`ClusterGate`], a [`VtapStore`], a [`HostDirectory`]
//! and a [`SouthboundAdapter`]. In-process implementations of all four ship with the
//! crate.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use vtap_controller::{
//!     DeviceEvent, HostLocation, HostRecord, InMemorySouthbound, InMemoryTopology,
//!     InMemoryVtapStore, IpProtocol, NodeId, StaticClusterGate, VtapConfig, VtapCriterion,
//!     VtapDirection, VtapManager,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let topology = Arc::new(InMemoryTopology::new());
//! let southbound = Arc::new(InMemorySouthbound::new());
//! let mut manager = VtapManager::new(
//!     VtapConfig::default(),
//!     Arc::new(StaticClusterGate::standalone(NodeId::new("node-a"))),
//!     Arc::new(InMemoryVtapStore::new()),
//!     topology.clone(),
//!     southbound.clone(),
//! )
//! .unwrap();
//! manager.start();
//!
//! let criterion = VtapCriterion::new(
//!     "10.0.0.0/24".parse().unwrap(),
//!     "0.0.0.0/0".parse().unwrap(),
//!     IpProtocol::Any,
//! );
//! let vtap = manager
//!     .create_vtap(VtapDirection::TX, Some(criterion))
//!     .await
//!     .unwrap();
//!
//! let host = HostRecord::new("vm-1")
//!     .with_ip("10.0.0.5".parse().unwrap())
//!     .with_location(HostLocation::new("of:1", 3));
//! if let Some(event) = topology.upsert_host(host) {
//!     manager.on_host_event(event).unwrap();
//! }
//! manager.on_device_event(DeviceEvent::added("of:1")).unwrap();
//! manager.sync().await.unwrap();
//!
//! let stored = manager.get_vtap(vtap.id()).await.unwrap().unwrap();
//! assert_eq!(stored.tx_device_ids().len(), 1);
//! manager.shutdown();
//! # });
//! ```
//!
//! ## Layers
//!
//! - `model`: definitions, criteria, directions and topology records.
//! - `control_plane`: cluster gating, the desired-state store, listeners and the
//!   reconciliation engine.
//! - `routing`: host directory, membership resolution and device-set differences.
//! - `data_plane`: southbound descriptors and per-device pipeline programming.
//! - `runtime`: the single reconciliation queue and its worker thread.
//! - `observability`: structured event names and field formatters.
//!
//! ## Observability
//!
//! The crate only emits `tracing` events. Installing a subscriber is left to the binary.

pub mod config;
pub mod control_plane;
pub mod data_plane;
pub mod error;
pub mod model;
pub mod observability;
pub mod routing;
mod runtime;
mod vtap_manager;

pub use config::{PipelineTables, RulePriorities, VtapConfig};
pub use control_plane::cluster_gate::{ClusterGate, ClusterView, NodeId, StaticClusterGate};
pub use control_plane::listeners::VtapListener;
pub use control_plane::vtap_store::{InMemoryVtapStore, VtapStore, VtapStoreDelegate};
pub use data_plane::in_memory_southbound::{InMemorySouthbound, SouthboundCall};
pub use data_plane::pipeline_state::{DevicePipelineState, MirrorPath, PipelineStage};
pub use data_plane::southbound::SouthboundAdapter;
pub use error::{VtapError, VtapResult};
pub use model::criterion::{IpPrefix, IpProtocol, VtapCriterion};
pub use model::definition::{VtapDefinition, VtapEvent, VtapEventKind, VtapId};
pub use model::direction::{Facet, VtapDirection};
pub use model::topology::{DeviceId, HostLocation, HostRecord, PortNumber, VlanId};
pub use routing::host_directory::{
    DeviceEvent, DeviceEventKind, HostDirectory, HostEvent, HostEventKind, InMemoryTopology,
};
pub use vtap_manager::VtapManager;
