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

//! Runtime helper for the reconciliation worker.

use crate::control_plane::reconciliation::ReconciliationEngine;
use crate::error::{VtapError, VtapResult};
use crate::observability::events;
use crate::runtime::reconcile_queue::{ReconcileQueue, ReconcileReceiver, ReconcileTask};
use std::thread::{self, JoinHandle};
use tokio::runtime::Builder;
use tracing::{info, trace};

const COMPONENT: &str = "worker_runtime";
const WORKER_THREAD_NAME: &str = "vtap-reconcile";

/// Runs the engine on a dedicated thread with its own current-thread runtime, so queued
/// work never competes with the caller's executor.
pub(crate) fn spawn_reconcile_worker(
    engine: ReconciliationEngine,
    queue: ReconcileQueue,
    receiver: ReconcileReceiver,
) -> VtapResult<JoinHandle<()>> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| VtapError::Runtime(err.to_string()))?;

    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            runtime.block_on(reconcile_loop(engine, queue, receiver));
        })
        .map_err(|err| VtapError::Runtime(err.to_string()))
}

async fn reconcile_loop(
    mut engine: ReconciliationEngine,
    queue: ReconcileQueue,
    mut receiver: ReconcileReceiver,
) {
    info!(
        event = events::WORKER_STARTED,
        component = COMPONENT,
        "reconciliation worker started"
    );

    while let Some(task) = receiver.recv().await {
        trace!(component = COMPONENT, task = %task, "running task");
        match task {
            ReconcileTask::Flush(reply) => {
                if queue.has_pending_work() {
                    // Work queued behind this flush (e.g. store events it caused) runs first.
                    if let Err(err) = queue.submit(ReconcileTask::Flush(reply)) {
                        trace!(component = COMPONENT, err = %err, "flush dropped");
                    }
                } else {
                    let _ = reply.send(());
                }
                continue;
            }
            ReconcileTask::Shutdown => {
                queue.work_done();
                break;
            }
            ReconcileTask::CreateVtap {
                direction,
                criterion,
                reply,
            } => {
                let _ = reply.send(engine.create_vtap(direction, criterion).await);
            }
            ReconcileTask::UpdateVtap {
                id,
                direction,
                criterion,
                reply,
            } => {
                let _ = reply.send(engine.update_vtap(id, direction, criterion).await);
            }
            ReconcileTask::RemoveVtap { id, reply } => {
                let _ = reply.send(engine.remove_vtap(id).await);
            }
            ReconcileTask::Host(event) => engine.handle_host_event(&event).await,
            ReconcileTask::DeviceAdded(device_id) => engine.handle_device_added(&device_id).await,
            ReconcileTask::Store(event) => engine.handle_store_event(&event),
            ReconcileTask::MirrorOutput {
                device_id,
                direction,
                port,
                vlan,
                reply,
            } => {
                let _ = reply.send(engine.set_mirror_output(&device_id, direction, port, vlan));
            }
            ReconcileTask::PipelineState { device_id, reply } => {
                let _ = reply.send(engine.pipeline_state(&device_id));
            }
        }
        queue.work_done();
    }

    info!(
        event = events::WORKER_STOPPED,
        component = COMPONENT,
        "reconciliation worker stopped"
    );
}
