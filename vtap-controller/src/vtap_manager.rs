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

//! Public facade over the reconciliation core.

use crate::config::VtapConfig;
use crate::control_plane::cluster_gate::{device_event_relevant, host_event_relevant, ClusterGate};
use crate::control_plane::listeners::{ListenerRegistry, VtapListener};
use crate::control_plane::reconciliation::ReconciliationEngine;
use crate::control_plane::vtap_store::{VtapStore, VtapStoreDelegate};
use crate::data_plane::pipeline_state::DevicePipelineState;
use crate::data_plane::southbound::SouthboundAdapter;
use crate::error::{VtapError, VtapResult};
use crate::model::criterion::VtapCriterion;
use crate::model::definition::{VtapDefinition, VtapEvent, VtapId};
use crate::model::direction::VtapDirection;
use crate::model::topology::{DeviceId, PortNumber, VlanId};
use crate::observability::events;
use crate::routing::host_directory::{DeviceEvent, DeviceEventKind, HostDirectory, HostEvent};
use crate::runtime::reconcile_queue::{ReconcileQueue, ReconcileTask};
use crate::runtime::worker_runtime::spawn_reconcile_worker;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "vtap_manager";

/// Forwards committed store changes to the reconciliation queue, then to listeners.
struct QueueingStoreDelegate {
    queue: ReconcileQueue,
    listeners: Arc<ListenerRegistry>,
}

impl VtapStoreDelegate for QueueingStoreDelegate {
    fn notify(&self, event: VtapEvent) {
        if let Err(err) = self.queue.submit(ReconcileTask::Store(event.clone())) {
            warn!(
                component = COMPONENT,
                vtap_id = %event.subject.id(),
                kind = %event.kind,
                err = %err,
                "store event not reconciled"
            );
        }
        self.listeners.post(&event);
    }
}

/// Entry point of the vtap controller.
///
/// Definition mutations, topology events and mirror-output changes all run through one
/// queue; reads of definitions go straight to the store.
pub struct VtapManager {
    gate: Arc<dyn ClusterGate>,
    store: Arc<dyn VtapStore>,
    queue: ReconcileQueue,
    listeners: Arc<ListenerRegistry>,
    worker: Option<JoinHandle<()>>,
    started: bool,
}

impl VtapManager {
    /// Wires the engine and spawns the reconciliation worker. Events are not consumed
    /// until [`VtapManager::start`].
    pub fn new(
        config: VtapConfig,
        gate: Arc<dyn ClusterGate>,
        store: Arc<dyn VtapStore>,
        directory: Arc<dyn HostDirectory>,
        southbound: Arc<dyn SouthboundAdapter>,
    ) -> VtapResult<Self> {
        let engine = ReconciliationEngine::new(
            Arc::new(config),
            gate.clone(),
            store.clone(),
            directory,
            southbound,
        );
        let (queue, receiver) = ReconcileQueue::new();
        let worker = spawn_reconcile_worker(engine, queue.clone(), receiver)?;

        Ok(Self {
            gate,
            store,
            queue,
            listeners: Arc::new(ListenerRegistry::default()),
            worker: Some(worker),
            started: false,
        })
    }

    /// Registers with the store and runs for leadership.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.store.set_delegate(Arc::new(QueueingStoreDelegate {
            queue: self.queue.clone(),
            listeners: self.listeners.clone(),
        }));
        self.gate.run_for_leadership();
        self.started = true;
        info!(component = COMPONENT, "vtap manager started");
    }

    pub async fn create_vtap(
        &self,
        direction: VtapDirection,
        criterion: Option<VtapCriterion>,
    ) -> VtapResult<VtapDefinition> {
        let criterion = criterion.ok_or_else(|| VtapError::invalid_argument("vtap criterion is required"))?;
        require_direction(direction)?;
        criterion.validate()?;

        self.queue
            .request(|reply| ReconcileTask::CreateVtap {
                direction,
                criterion,
                reply,
            })
            .await?
    }

    /// Returns `Ok(None)` when `id` is unknown.
    pub async fn update_vtap(
        &self,
        id: VtapId,
        direction: VtapDirection,
        criterion: Option<VtapCriterion>,
    ) -> VtapResult<Option<VtapDefinition>> {
        let criterion = criterion.ok_or_else(|| VtapError::invalid_argument("vtap criterion is required"))?;
        require_direction(direction)?;
        criterion.validate()?;

        self.queue
            .request(|reply| ReconcileTask::UpdateVtap {
                id,
                direction,
                criterion,
                reply,
            })
            .await?
    }

    /// Returns `Ok(None)` when `id` is unknown.
    pub async fn remove_vtap(&self, id: VtapId) -> VtapResult<Option<VtapDefinition>> {
        self.queue
            .request(|reply| ReconcileTask::RemoveVtap { id, reply })
            .await?
    }

    pub async fn get_vtap(&self, id: VtapId) -> VtapResult<Option<VtapDefinition>> {
        self.store.get(id).await
    }

    pub async fn vtaps(&self, direction: VtapDirection) -> VtapResult<Vec<VtapDefinition>> {
        self.store.vtaps(direction).await
    }

    pub async fn vtaps_by_device(
        &self,
        direction: VtapDirection,
        device_id: &DeviceId,
    ) -> VtapResult<Vec<VtapDefinition>> {
        self.store.vtaps_by_device(direction, device_id).await
    }

    pub async fn vtap_count(&self, direction: VtapDirection) -> VtapResult<usize> {
        self.store.count(direction).await
    }

    /// Sets where mirrored copies for `direction` leave the device. `None` for the port
    /// restores the default drop.
    pub async fn set_mirror_output(
        &self,
        device_id: DeviceId,
        direction: VtapDirection,
        port: Option<PortNumber>,
        vlan: Option<VlanId>,
    ) -> VtapResult<()> {
        self.queue
            .request(|reply| ReconcileTask::MirrorOutput {
                device_id,
                direction,
                port,
                vlan,
                reply,
            })
            .await?
    }

    /// Tunnel encapsulation of mirrored traffic is not supported.
    pub async fn set_mirror_output_tunnel(
        &self,
        device_id: DeviceId,
        direction: VtapDirection,
        port: PortNumber,
        tunnel_id: u32,
    ) -> VtapResult<()> {
        Err(VtapError::Unsupported(format!(
            "tunnel mirror output (device {device_id}, direction {direction}, port {port}, tunnel {tunnel_id})"
        )))
    }

    /// Accepts a host transition if this node leads membership recomputation.
    pub fn on_host_event(&self, event: HostEvent) -> VtapResult<()> {
        if !host_event_relevant(self.gate.as_ref()) {
            debug!(
                event = events::HOST_EVENT_DROPPED_NOT_LEADER,
                component = COMPONENT,
                host = %event.subject.id,
                kind = %event.kind,
                "not leader; host event dropped"
            );
            return Ok(());
        }
        self.queue.submit(ReconcileTask::Host(event))
    }

    /// Accepts a device-added event if this node masters the device.
    pub fn on_device_event(&self, event: DeviceEvent) -> VtapResult<()> {
        if event.kind == DeviceEventKind::Removed {
            debug!(
                component = COMPONENT,
                device_id = %event.device_id,
                "device removal is not handled; programmed state is kept"
            );
            return Ok(());
        }
        if !device_event_relevant(self.gate.as_ref(), &event) {
            debug!(
                event = events::DEVICE_EVENT_DROPPED_NOT_MASTER,
                component = COMPONENT,
                device_id = %event.device_id,
                "not master; device event dropped"
            );
            return Ok(());
        }
        self.queue.submit(ReconcileTask::DeviceAdded(event.device_id))
    }

    pub fn add_listener(&self, listener: Arc<dyn VtapListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn VtapListener>) {
        self.listeners.remove(listener);
    }

    /// Logical pipeline record for a device, read in queue order.
    pub async fn pipeline_state(&self, device_id: DeviceId) -> VtapResult<Option<DevicePipelineState>> {
        self.queue
            .request(|reply| ReconcileTask::PipelineState { device_id, reply })
            .await
    }

    /// Resolves once everything submitted so far, and the work it caused, has run.
    pub async fn sync(&self) -> VtapResult<()> {
        self.queue.request(ReconcileTask::Flush).await
    }

    /// Withdraws from leadership, detaches from the store and stops the worker.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.started {
            self.gate.withdraw();
            self.store.unset_delegate();
            self.started = false;
        }
        if self.queue.submit(ReconcileTask::Shutdown).is_ok() && worker.join().is_err() {
            warn!(component = COMPONENT, "reconciliation worker panicked");
        }
        info!(component = COMPONENT, "vtap manager stopped");
    }
}

impl Drop for VtapManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn require_direction(direction: VtapDirection) -> VtapResult<()> {
    if direction.is_empty() {
        return Err(VtapError::invalid_argument("vtap direction must include TX or RX"));
    }
    Ok(())
}
