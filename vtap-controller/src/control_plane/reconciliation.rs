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

//! Event-driven reconciliation of vtap definitions against device programming.
//!
//! The engine is owned by the reconciliation worker and only ever runs one task at a time,
//! so definition device sets and pipeline state have a single writer.

use crate::config::VtapConfig;
use crate::control_plane::cluster_gate::ClusterGate;
use crate::control_plane::vtap_store::VtapStore;
use crate::data_plane::pipeline::PipelineProgrammer;
use crate::data_plane::pipeline_state::DevicePipelineState;
use crate::data_plane::southbound::SouthboundAdapter;
use crate::error::VtapResult;
use crate::model::criterion::VtapCriterion;
use crate::model::definition::{VtapDefinition, VtapEvent, VtapEventKind, VtapId};
use crate::model::direction::{Facet, VtapDirection};
use crate::model::topology::{DeviceId, PortNumber, VlanId};
use crate::observability::{events, fields};
use crate::routing::host_directory::{HostDirectory, HostEvent};
use crate::routing::membership::MembershipResolver;
use crate::routing::membership_diff::{apply_host_transition, DeviceDelta};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "reconciliation";

pub(crate) struct ReconciliationEngine {
    gate: Arc<dyn ClusterGate>,
    store: Arc<dyn VtapStore>,
    resolver: MembershipResolver,
    pipeline: PipelineProgrammer,
}

/// Device set a definition carries for `facet`, empty when the facet is disabled.
fn facet_members(definition: &VtapDefinition, facet: Facet) -> BTreeSet<DeviceId> {
    if definition.direction().has(facet) {
        definition.device_ids(facet).clone()
    } else {
        BTreeSet::new()
    }
}

impl ReconciliationEngine {
    pub(crate) fn new(
        config: Arc<VtapConfig>,
        gate: Arc<dyn ClusterGate>,
        store: Arc<dyn VtapStore>,
        directory: Arc<dyn HostDirectory>,
        southbound: Arc<dyn SouthboundAdapter>,
    ) -> Self {
        Self {
            gate,
            store,
            resolver: MembershipResolver::new(directory),
            pipeline: PipelineProgrammer::new(config, southbound),
        }
    }

    pub(crate) async fn create_vtap(
        &mut self,
        direction: VtapDirection,
        criterion: VtapCriterion,
    ) -> VtapResult<VtapDefinition> {
        let (tx_device_ids, rx_device_ids) = self.resolver.resolve_sets(direction, &criterion);
        let definition = VtapDefinition::new(
            VtapId::generate(),
            direction,
            criterion,
            tx_device_ids,
            rx_device_ids,
        );
        let stored = self.store.create(definition).await?;

        info!(
            event = events::VTAP_CREATE,
            component = COMPONENT,
            vtap_id = %stored.id(),
            direction = %stored.direction(),
            tx_devices = %fields::format_device_ids(stored.tx_device_ids()),
            rx_devices = %fields::format_device_ids(stored.rx_device_ids()),
            "vtap created"
        );
        Ok(stored)
    }

    /// Re-resolves both device sets from scratch and stores the replacement.
    pub(crate) async fn update_vtap(
        &mut self,
        id: VtapId,
        direction: VtapDirection,
        criterion: VtapCriterion,
    ) -> VtapResult<Option<VtapDefinition>> {
        if self.store.get(id).await?.is_none() {
            debug!(
                event = events::VTAP_NOT_FOUND,
                component = COMPONENT,
                vtap_id = %id,
                "update of unknown vtap ignored"
            );
            return Ok(None);
        }

        let (tx_device_ids, rx_device_ids) = self.resolver.resolve_sets(direction, &criterion);
        let replacement =
            VtapDefinition::new(id, direction, criterion, tx_device_ids, rx_device_ids);
        let stored = self.store.update(replacement).await?;

        if let Some(stored) = &stored {
            info!(
                event = events::VTAP_UPDATE,
                component = COMPONENT,
                vtap_id = %stored.id(),
                direction = %stored.direction(),
                tx_devices = %fields::format_device_ids(stored.tx_device_ids()),
                rx_devices = %fields::format_device_ids(stored.rx_device_ids()),
                "vtap updated"
            );
        }
        Ok(stored)
    }

    pub(crate) async fn remove_vtap(&mut self, id: VtapId) -> VtapResult<Option<VtapDefinition>> {
        let removed = self.store.remove(id).await?;
        match &removed {
            Some(_) => info!(
                event = events::VTAP_REMOVE,
                component = COMPONENT,
                vtap_id = %id,
                "vtap removed"
            ),
            None => debug!(
                event = events::VTAP_NOT_FOUND,
                component = COMPONENT,
                vtap_id = %id,
                "removal of unknown vtap ignored"
            ),
        }
        Ok(removed)
    }

    /// Folds one host transition into every definition's device sets.
    ///
    /// Each affected definition is written back once; the resulting store event carries
    /// the device-level install and uninstall work.
    pub(crate) async fn handle_host_event(&mut self, event: &HostEvent) {
        let (departing, arriving) = event.transition();
        debug!(
            event = events::HOST_EVENT_APPLY,
            component = COMPONENT,
            kind = %event.kind,
            departing = %fields::format_host(departing),
            arriving = %fields::format_host(arriving),
            "applying host event"
        );

        let definitions = match self.store.vtaps(VtapDirection::NONE).await {
            Ok(definitions) => definitions,
            Err(err) => {
                warn!(
                    event = events::STORE_READ_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "unable to read vtaps for host event"
                );
                return;
            }
        };
        let hosts = self.resolver.hosts();

        for definition in definitions {
            let mut replacement = definition.clone();
            for facet in definition.direction().facets() {
                let next = apply_host_transition(
                    definition.device_ids(facet),
                    facet,
                    definition.criterion(),
                    departing,
                    arriving,
                    &hosts,
                );
                if next != *definition.device_ids(facet) {
                    debug!(
                        event = events::MEMBERSHIP_CHANGED,
                        component = COMPONENT,
                        vtap_id = %definition.id(),
                        facet = %facet,
                        before = %fields::format_device_ids(definition.device_ids(facet)),
                        after = %fields::format_device_ids(&next),
                        "vtap membership changed"
                    );
                    replacement = replacement.with_device_ids(facet, next);
                }
            }

            if replacement == definition {
                continue;
            }
            if let Err(err) = self.store.update(replacement).await {
                warn!(
                    event = events::MEMBERSHIP_WRITE_FAILED,
                    component = COMPONENT,
                    vtap_id = %definition.id(),
                    err = %err,
                    "unable to store recomputed membership"
                );
            }
        }
    }

    /// Builds the device pipeline, then installs every filter already assigned to it.
    pub(crate) async fn handle_device_added(&mut self, device_id: &DeviceId) {
        info!(
            event = events::DEVICE_ADDED_APPLY,
            component = COMPONENT,
            device_id = %device_id,
            "device added"
        );
        self.pipeline.build_pipeline(device_id);

        for facet in Facet::ALL {
            let definitions = match self
                .store
                .vtaps_by_device(facet.as_direction(), device_id)
                .await
            {
                Ok(definitions) => definitions,
                Err(err) => {
                    warn!(
                        event = events::STORE_READ_FAILED,
                        component = COMPONENT,
                        device_id = %device_id,
                        facet = %facet,
                        err = %err,
                        "unable to read vtaps for device"
                    );
                    continue;
                }
            };
            for definition in definitions
                .iter()
                .filter(|definition| definition.references(facet, device_id))
            {
                self.program_filter(device_id, definition.id(), facet, definition.criterion(), true);
            }
        }
    }

    /// ADDED installs, REMOVED uninstalls and UPDATED touches only the set differences.
    pub(crate) fn handle_store_event(&mut self, event: &VtapEvent) {
        let subject = &event.subject;
        debug!(
            event = events::STORE_EVENT_APPLY,
            component = COMPONENT,
            vtap_id = %subject.id(),
            kind = %event.kind,
            "applying store event"
        );

        match (event.kind, event.previous.as_ref()) {
            (VtapEventKind::Added, _) | (VtapEventKind::Updated, None) => {
                for facet in Facet::ALL {
                    self.program_facet(&facet_members(subject, facet), subject, facet, true);
                }
            }
            (VtapEventKind::Updated, Some(previous)) => {
                for facet in Facet::ALL {
                    let old = facet_members(previous, facet);
                    let new = facet_members(subject, facet);
                    let delta = if previous.criterion() == subject.criterion() {
                        DeviceDelta::between(&old, &new)
                    } else {
                        // Rules already on a device still carry the old match.
                        DeviceDelta {
                            removed: old,
                            added: new,
                        }
                    };
                    self.program_facet(&delta.removed, previous, facet, false);
                    self.program_facet(&delta.added, subject, facet, true);
                }
            }
            (VtapEventKind::Removed, _) => {
                for facet in Facet::ALL {
                    self.program_facet(&facet_members(subject, facet), subject, facet, false);
                }
            }
        }
    }

    pub(crate) fn set_mirror_output(
        &mut self,
        device_id: &DeviceId,
        direction: VtapDirection,
        port: Option<PortNumber>,
        vlan: Option<VlanId>,
    ) -> VtapResult<()> {
        self.pipeline
            .set_mirror_output(device_id, direction, port, vlan)
    }

    pub(crate) fn pipeline_state(&self, device_id: &DeviceId) -> Option<DevicePipelineState> {
        self.pipeline.state(device_id).cloned()
    }

    fn program_facet(
        &mut self,
        device_ids: &BTreeSet<DeviceId>,
        definition: &VtapDefinition,
        facet: Facet,
        install: bool,
    ) {
        for device_id in device_ids {
            if !self.gate.is_local_master(device_id) {
                debug!(
                    event = events::DEVICE_SKIPPED_NOT_MASTER,
                    component = COMPONENT,
                    device_id = %device_id,
                    vtap_id = %definition.id(),
                    "not master of device; skipping filter"
                );
                continue;
            }
            self.program_filter(device_id, definition.id(), facet, definition.criterion(), install);
        }
    }

    fn program_filter(
        &mut self,
        device_id: &DeviceId,
        vtap_id: VtapId,
        facet: Facet,
        criterion: &VtapCriterion,
        install: bool,
    ) {
        if let Err(err) = self
            .pipeline
            .install_filter(device_id, vtap_id, facet, criterion, install)
        {
            warn!(
                component = COMPONENT,
                device_id = %device_id,
                vtap_id = %vtap_id,
                facet = %facet,
                err = %err,
                "vtap filter not applied"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReconciliationEngine;
    use crate::config::VtapConfig;
    use crate::control_plane::cluster_gate::{ClusterGate, ClusterView, NodeId, StaticClusterGate};
    use crate::control_plane::vtap_store::{InMemoryVtapStore, VtapStore, VtapStoreDelegate};
    use crate::data_plane::in_memory_southbound::{InMemorySouthbound, SouthboundCall};
    use crate::data_plane::southbound::{FlowRuleOperation, TableId};
    use crate::model::criterion::{IpPrefix, IpProtocol, VtapCriterion};
    use crate::model::definition::{VtapEvent, VtapEventKind, VtapId};
    use crate::model::direction::{Facet, VtapDirection};
    use crate::model::topology::{DeviceId, HostLocation, HostRecord};
    use crate::routing::host_directory::InMemoryTopology;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingDelegate {
        events: Mutex<Vec<VtapEvent>>,
    }

    impl RecordingDelegate {
        fn drain(&self) -> Vec<VtapEvent> {
            std::mem::take(&mut *self.events.lock().expect("delegate lock"))
        }
    }

    impl VtapStoreDelegate for RecordingDelegate {
        fn notify(&self, event: VtapEvent) {
            self.events.lock().expect("delegate lock").push(event);
        }
    }

    struct Harness {
        engine: ReconciliationEngine,
        store: Arc<InMemoryVtapStore>,
        topology: Arc<InMemoryTopology>,
        southbound: Arc<InMemorySouthbound>,
        delegate: Arc<RecordingDelegate>,
    }

    impl Harness {
        fn new(gate: Arc<dyn ClusterGate>) -> Self {
            let store = Arc::new(InMemoryVtapStore::new());
            let topology = Arc::new(InMemoryTopology::new());
            let southbound = Arc::new(InMemorySouthbound::new());
            let delegate = Arc::new(RecordingDelegate::default());
            store.set_delegate(delegate.clone());
            gate.run_for_leadership();
            let engine = ReconciliationEngine::new(
                Arc::new(VtapConfig::default()),
                gate,
                store.clone(),
                topology.clone(),
                southbound.clone(),
            );
            Self {
                engine,
                store,
                topology,
                southbound,
                delegate,
            }
        }

        fn standalone() -> Self {
            Self::new(Arc::new(StaticClusterGate::standalone(NodeId::new("node-a"))))
        }

        /// Feeds every pending store event back into the engine.
        fn pump(&mut self) {
            for event in self.delegate.drain() {
                self.engine.handle_store_event(&event);
            }
        }
    }

    fn criterion() -> VtapCriterion {
        VtapCriterion::new(
            "10.0.0.0/24".parse().expect("valid prefix"),
            "10.0.1.0/24".parse().expect("valid prefix"),
            IpProtocol::Tcp,
        )
    }

    fn host(id: &str, ip: &str, device: &str) -> HostRecord {
        HostRecord::new(id)
            .with_ip(ip.parse().expect("valid address"))
            .with_location(HostLocation::new(device, 1))
    }

    fn filter_ops(calls: &[SouthboundCall]) -> Vec<(bool, DeviceId, TableId)> {
        calls
            .iter()
            .filter_map(|call| match call {
                SouthboundCall::Apply(FlowRuleOperation::Add(rule)) if rule.priority == 50000 => {
                    Some((true, rule.device_id.clone(), rule.table))
                }
                SouthboundCall::Apply(FlowRuleOperation::Remove(rule))
                    if rule.priority == 50000 =>
                {
                    Some((false, rule.device_id.clone(), rule.table))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn create_resolves_membership_and_installs_on_added_event() {
        let mut harness = Harness::standalone();
        harness.topology.upsert_host(host("vm-1", "10.0.0.5", "of:1"));
        harness.topology.upsert_host(host("vm-2", "10.0.1.5", "of:2"));

        let created = harness
            .engine
            .create_vtap(VtapDirection::TX_RX, criterion())
            .await
            .expect("created");
        harness.pump();

        assert_eq!(created.tx_device_ids(), &BTreeSet::from([DeviceId::new("of:1")]));
        assert_eq!(created.rx_device_ids(), &BTreeSet::from([DeviceId::new("of:2")]));
        assert_eq!(
            filter_ops(&harness.southbound.calls()),
            vec![
                (true, DeviceId::new("of:1"), TableId(1)),
                (true, DeviceId::new("of:2"), TableId(11)),
                (true, DeviceId::new("of:2"), TableId(71)),
            ]
        );
    }

    #[tokio::test]
    async fn update_and_remove_of_unknown_id_return_none() {
        let mut harness = Harness::standalone();
        let unknown = VtapId::generate();

        assert_eq!(
            harness
                .engine
                .update_vtap(unknown, VtapDirection::TX, criterion())
                .await,
            Ok(None)
        );
        assert_eq!(harness.engine.remove_vtap(unknown).await, Ok(None));
        assert!(harness.delegate.drain().is_empty());
    }

    #[tokio::test]
    async fn host_move_uninstalls_then_installs_in_one_store_event() {
        let mut harness = Harness::standalone();
        let created = harness
            .engine
            .create_vtap(VtapDirection::TX, criterion())
            .await
            .expect("created");
        harness.pump();

        let arrival = harness
            .topology
            .upsert_host(host("vm-1", "10.0.0.5", "D1"))
            .expect("added");
        harness.engine.handle_host_event(&arrival).await;
        harness.pump();
        harness.southbound.clear_calls();

        let moved = harness
            .topology
            .upsert_host(host("vm-1", "10.0.0.5", "D2"))
            .expect("moved");
        harness.engine.handle_host_event(&moved).await;
        let pending = harness.delegate.drain();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, VtapEventKind::Updated);
        harness.engine.handle_store_event(&pending[0]);

        assert_eq!(
            filter_ops(&harness.southbound.calls()),
            vec![
                (false, DeviceId::new("D1"), TableId(1)),
                (true, DeviceId::new("D2"), TableId(1)),
            ]
        );
        let stored = harness
            .store
            .get(created.id())
            .await
            .expect("readable")
            .expect("present");
        assert_eq!(stored.tx_device_ids(), &BTreeSet::from([DeviceId::new("D2")]));
    }

    #[tokio::test]
    async fn criterion_change_reprograms_devices_that_stay() {
        let mut harness = Harness::standalone();
        harness.topology.upsert_host(host("vm-1", "10.0.0.5", "of:1"));
        let created = harness
            .engine
            .create_vtap(VtapDirection::TX, criterion())
            .await
            .expect("created");
        harness.pump();
        harness.southbound.clear_calls();

        harness
            .engine
            .update_vtap(created.id(), VtapDirection::TX, criterion().with_ports(0, 443))
            .await
            .expect("updated")
            .expect("known id");
        harness.pump();

        assert_eq!(
            filter_ops(&harness.southbound.calls()),
            vec![
                (false, DeviceId::new("of:1"), TableId(1)),
                (true, DeviceId::new("of:1"), TableId(1)),
            ]
        );
        assert_eq!(harness.southbound.flows(&DeviceId::new("of:1")).len(), 1);
    }

    #[tokio::test]
    async fn device_added_builds_pipeline_and_installs_existing_filters() {
        let mut harness = Harness::standalone();
        harness.topology.upsert_host(host("vm-1", "10.0.1.5", "of:1"));
        let created = harness
            .engine
            .create_vtap(VtapDirection::RX, criterion())
            .await
            .expect("created");
        harness.delegate.drain();

        harness.engine.handle_device_added(&DeviceId::new("of:1")).await;

        let state = harness
            .engine
            .pipeline_state(&DeviceId::new("of:1"))
            .expect("pipeline state");
        assert_eq!(state.groups().len(), 3);
        assert!(state.has_filter(created.id(), Facet::Rx));
        assert!(!state.has_filter(created.id(), Facet::Tx));
    }

    #[tokio::test]
    async fn store_events_skip_devices_mastered_elsewhere() {
        let view = ClusterView {
            leader: Some(NodeId::new("node-a")),
            masters: HashMap::from([
                (DeviceId::new("of:1"), NodeId::new("node-a")),
                (DeviceId::new("of:2"), NodeId::new("node-b")),
            ]),
            members: vec![NodeId::new("node-a"), NodeId::new("node-b")],
        };
        let mut harness = Harness::new(Arc::new(StaticClusterGate::new(NodeId::new("node-a"), view)));
        harness.topology.upsert_host(host("vm-1", "10.0.0.5", "of:1"));
        harness.topology.upsert_host(host("vm-2", "10.0.0.6", "of:2"));

        harness
            .engine
            .create_vtap(VtapDirection::TX, criterion())
            .await
            .expect("created");
        harness.pump();

        assert_eq!(filter_ops(&harness.southbound.calls_for(&DeviceId::new("of:1"))).len(), 1);
        assert!(harness.southbound.calls_for(&DeviceId::new("of:2")).is_empty());
    }

    #[tokio::test]
    async fn rx_set_of_tx_rx_vtap_with_unmatched_destination_is_empty() {
        let mut harness = Harness::standalone();
        harness.topology.upsert_host(host("vm-1", "10.0.0.5", "of:1"));

        let created = harness
            .engine
            .create_vtap(
                VtapDirection::TX_RX,
                VtapCriterion::new(
                    "10.0.0.0/24".parse().expect("valid prefix"),
                    IpPrefix::new("172.16.0.0".parse().expect("valid address"), 32)
                        .expect("valid prefix"),
                    IpProtocol::Any,
                ),
            )
            .await
            .expect("created");

        assert_eq!(created.tx_device_ids().len(), 1);
        assert!(created.rx_device_ids().is_empty());
    }
}
