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

//! The single per-node reconciliation queue.

use crate::data_plane::pipeline_state::DevicePipelineState;
use crate::error::{VtapError, VtapResult};
use crate::model::criterion::VtapCriterion;
use crate::model::definition::{VtapDefinition, VtapEvent, VtapId};
use crate::model::direction::VtapDirection;
use crate::model::topology::{DeviceId, PortNumber, VlanId};
use crate::observability::events;
use crate::routing::host_directory::HostEvent;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

const COMPONENT: &str = "reconcile_queue";

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum ReconcileTask {
    CreateVtap {
        direction: VtapDirection,
        criterion: VtapCriterion,
        reply: Reply<VtapResult<VtapDefinition>>,
    },
    UpdateVtap {
        id: VtapId,
        direction: VtapDirection,
        criterion: VtapCriterion,
        reply: Reply<VtapResult<Option<VtapDefinition>>>,
    },
    RemoveVtap {
        id: VtapId,
        reply: Reply<VtapResult<Option<VtapDefinition>>>,
    },
    Host(HostEvent),
    DeviceAdded(DeviceId),
    Store(VtapEvent),
    MirrorOutput {
        device_id: DeviceId,
        direction: VtapDirection,
        port: Option<PortNumber>,
        vlan: Option<VlanId>,
        reply: Reply<VtapResult<()>>,
    },
    PipelineState {
        device_id: DeviceId,
        reply: Reply<Option<DevicePipelineState>>,
    },
    /// Answered once no other work is queued or running.
    Flush(Reply<()>),
    Shutdown,
}

impl ReconcileTask {
    fn counts_as_work(&self) -> bool {
        !matches!(self, ReconcileTask::Flush(_))
    }
}

impl Display for ReconcileTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileTask::CreateVtap { .. } => write!(f, "create_vtap"),
            ReconcileTask::UpdateVtap { id, .. } => write!(f, "update_vtap:{id}"),
            ReconcileTask::RemoveVtap { id, .. } => write!(f, "remove_vtap:{id}"),
            ReconcileTask::Host(event) => write!(f, "host_{}:{}", event.kind, event.subject.id),
            ReconcileTask::DeviceAdded(device_id) => write!(f, "device_added:{device_id}"),
            ReconcileTask::Store(event) => write!(f, "store_{}:{}", event.kind, event.subject.id()),
            ReconcileTask::MirrorOutput { device_id, .. } => write!(f, "mirror_output:{device_id}"),
            ReconcileTask::PipelineState { device_id, .. } => {
                write!(f, "pipeline_state:{device_id}")
            }
            ReconcileTask::Flush(_) => write!(f, "flush"),
            ReconcileTask::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Submission handle. Clones share one queue.
#[derive(Clone)]
pub(crate) struct ReconcileQueue {
    sender: mpsc::UnboundedSender<ReconcileTask>,
    pending_work: Arc<AtomicUsize>,
}

pub(crate) type ReconcileReceiver = mpsc::UnboundedReceiver<ReconcileTask>;

impl ReconcileQueue {
    pub(crate) fn new() -> (Self, ReconcileReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                pending_work: Arc::new(AtomicUsize::new(0)),
            },
            receiver,
        )
    }

    /// Enqueues without waiting for the task to run.
    pub(crate) fn submit(&self, task: ReconcileTask) -> VtapResult<()> {
        let counts_as_work = task.counts_as_work();
        let description = task.to_string();
        if counts_as_work {
            self.pending_work.fetch_add(1, Ordering::SeqCst);
        }

        match self.sender.send(task) {
            Ok(()) => {
                trace!(
                    event = events::QUEUE_SUBMIT,
                    component = COMPONENT,
                    task = %description,
                    "task queued"
                );
                Ok(())
            }
            Err(_) => {
                if counts_as_work {
                    self.pending_work.fetch_sub(1, Ordering::SeqCst);
                }
                warn!(
                    event = events::QUEUE_SUBMIT_FAILED,
                    component = COMPONENT,
                    task = %description,
                    "reconciliation queue closed; task dropped"
                );
                Err(VtapError::QueueClosed)
            }
        }
    }

    /// Enqueues a task carrying a reply channel and waits for the answer.
    pub(crate) async fn request<T>(
        &self,
        task: impl FnOnce(Reply<T>) -> ReconcileTask,
    ) -> VtapResult<T> {
        let (reply, answer) = oneshot::channel();
        self.submit(task(reply))?;
        answer.await.map_err(|_| VtapError::QueueClosed)
    }

    pub(crate) fn work_done(&self) {
        self.pending_work.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn has_pending_work(&self) -> bool {
        self.pending_work.load(Ordering::SeqCst) > 0
    }
}
