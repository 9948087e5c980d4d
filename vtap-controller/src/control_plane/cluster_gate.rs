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

//! Cluster authorization: fleet-wide leadership and per-device mastership.
//!
//! Decisions are never cached. Every event is checked against the view current at the
//! moment it arrives.

use crate::model::topology::DeviceId;
use crate::routing::host_directory::{DeviceEvent, DeviceEventKind};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LEADERSHIP_TOPIC: &str = "vtap-membership";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait ClusterGate: Send + Sync {
    /// Leadership of host-driven membership recomputation.
    fn is_leader(&self) -> bool;

    /// Exclusive-write authorization for one device's pipeline.
    fn is_local_master(&self, device_id: &DeviceId) -> bool;

    fn run_for_leadership(&self) {}

    fn withdraw(&self) {}
}

/// Host events are only processed by the leader.
pub fn host_event_relevant(gate: &dyn ClusterGate) -> bool {
    gate.is_leader()
}

/// Device-added events are only processed by the device's master.
pub fn device_event_relevant(gate: &dyn ClusterGate, event: &DeviceEvent) -> bool {
    event.kind == DeviceEventKind::Added && gate.is_local_master(&event.device_id)
}

/// Snapshot of cluster roles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterView {
    /// Explicit leader. When absent the leader is elected among `members`.
    pub leader: Option<NodeId>,
    /// Explicit device masters. Other devices are spread over `members`.
    pub masters: HashMap<DeviceId, NodeId>,
    pub members: Vec<NodeId>,
}

impl ClusterView {
    pub fn single(node: NodeId) -> Self {
        Self {
            leader: Some(node.clone()),
            masters: HashMap::new(),
            members: vec![node],
        }
    }

    pub fn leader(&self) -> Option<&NodeId> {
        self.leader
            .as_ref()
            .or_else(|| rendezvous(&self.members, LEADERSHIP_TOPIC))
    }

    pub fn master_of(&self, device_id: &DeviceId) -> Option<&NodeId> {
        self.masters
            .get(device_id)
            .or_else(|| rendezvous(&self.members, device_id.as_str()))
    }
}

/// Highest-random-weight owner of `key` among `members`.
fn rendezvous<'a>(members: &'a [NodeId], key: &str) -> Option<&'a NodeId> {
    members.iter().max_by_key(|node| {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        node.as_str().hash(&mut hasher);
        (hasher.finish(), node.as_str())
    })
}

/// Gate over an operator-supplied view that can be swapped at runtime.
pub struct StaticClusterGate {
    local: NodeId,
    view: ArcSwap<ClusterView>,
    candidate: AtomicBool,
}

impl StaticClusterGate {
    pub fn new(local: NodeId, view: ClusterView) -> Self {
        Self {
            local,
            view: ArcSwap::from_pointee(view),
            candidate: AtomicBool::new(false),
        }
    }

    /// Single-node cluster: this node leads and masters every device.
    pub fn standalone(local: NodeId) -> Self {
        let view = ClusterView::single(local.clone());
        Self::new(local, view)
    }

    pub fn local_node(&self) -> &NodeId {
        &self.local
    }

    pub fn view(&self) -> Arc<ClusterView> {
        self.view.load_full()
    }

    pub fn update_view(&self, view: ClusterView) {
        self.view.store(Arc::new(view));
    }
}

impl ClusterGate for StaticClusterGate {
    fn is_leader(&self) -> bool {
        self.candidate.load(Ordering::Acquire) && self.view.load().leader() == Some(&self.local)
    }

    fn is_local_master(&self, device_id: &DeviceId) -> bool {
        self.view.load().master_of(device_id) == Some(&self.local)
    }

    fn run_for_leadership(&self) {
        self.candidate.store(true, Ordering::Release);
    }

    fn withdraw(&self) {
        self.candidate.store(false, Ordering::Release);
    }
}
