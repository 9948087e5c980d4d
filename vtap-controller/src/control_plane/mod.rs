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

//! Control-plane layer.
//!
//! Owns cluster authorization, the desired-state store contract, listener fan-out and the
//! reconciliation engine. This layer decides which devices must carry which filter and
//! keeps update transitions minimal: a device whose membership did not change is never
//! reprogrammed.
//!
//! ```
//! use vtap_controller::control_plane::cluster_gate::{ClusterGate, NodeId, StaticClusterGate};
//! use vtap_controller::model::topology::DeviceId;
//!
//! let gate = StaticClusterGate::standalone(NodeId::new("node-a"));
//!
//! // Leadership is only held while running for it; mastership is unconditional.
//! assert!(!gate.is_leader());
//! gate.run_for_leadership();
//! assert!(gate.is_leader());
//! assert!(gate.is_local_master(&DeviceId::new("of:1")));
//! ```

pub mod cluster_gate;
pub mod listeners;
pub(crate) mod reconciliation;
pub mod vtap_store;
