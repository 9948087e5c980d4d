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

//! Immutable vtap definition snapshots and the events the store emits for them.

use crate::model::criterion::VtapCriterion;
use crate::model::direction::{Facet, VtapDirection};
use crate::model::topology::DeviceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Globally unique vtap identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VtapId(Uuid);

impl VtapId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for VtapId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for VtapId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(VtapId)
    }
}

/// Snapshot of one vtap: direction, criterion and the devices currently enforcing it.
///
/// Snapshots are never mutated in place; the `with_*` helpers return a replacement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtapDefinition {
    id: VtapId,
    direction: VtapDirection,
    criterion: VtapCriterion,
    tx_device_ids: BTreeSet<DeviceId>,
    rx_device_ids: BTreeSet<DeviceId>,
}

impl VtapDefinition {
    pub fn new(
        id: VtapId,
        direction: VtapDirection,
        criterion: VtapCriterion,
        tx_device_ids: BTreeSet<DeviceId>,
        rx_device_ids: BTreeSet<DeviceId>,
    ) -> Self {
        Self {
            id,
            direction,
            criterion,
            tx_device_ids,
            rx_device_ids,
        }
    }

    pub fn id(&self) -> VtapId {
        self.id
    }

    pub fn direction(&self) -> VtapDirection {
        self.direction
    }

    pub fn criterion(&self) -> &VtapCriterion {
        &self.criterion
    }

    pub fn tx_device_ids(&self) -> &BTreeSet<DeviceId> {
        &self.tx_device_ids
    }

    pub fn rx_device_ids(&self) -> &BTreeSet<DeviceId> {
        &self.rx_device_ids
    }

    pub fn device_ids(&self, facet: Facet) -> &BTreeSet<DeviceId> {
        match facet {
            Facet::Tx => &self.tx_device_ids,
            Facet::Rx => &self.rx_device_ids,
        }
    }

    /// Returns `true` when this definition enforces `facet` on `device_id`.
    pub fn references(&self, facet: Facet, device_id: &DeviceId) -> bool {
        self.direction.has(facet) && self.device_ids(facet).contains(device_id)
    }

    pub fn with_device_ids(&self, facet: Facet, device_ids: BTreeSet<DeviceId>) -> Self {
        let mut replacement = self.clone();
        match facet {
            Facet::Tx => replacement.tx_device_ids = device_ids,
            Facet::Rx => replacement.rx_device_ids = device_ids,
        }
        replacement
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VtapEventKind {
    Added,
    Updated,
    Removed,
}

impl Display for VtapEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VtapEventKind::Added => write!(f, "added"),
            VtapEventKind::Updated => write!(f, "updated"),
            VtapEventKind::Removed => write!(f, "removed"),
        }
    }
}

/// Change notification emitted by the desired-state store.
///
/// For `Removed` the subject is the definition that was removed. `previous` is only
/// populated for `Updated`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VtapEvent {
    pub kind: VtapEventKind,
    pub subject: VtapDefinition,
    pub previous: Option<VtapDefinition>,
}

impl VtapEvent {
    pub fn added(subject: VtapDefinition) -> Self {
        Self {
            kind: VtapEventKind::Added,
            subject,
            previous: None,
        }
    }

    pub fn updated(subject: VtapDefinition, previous: VtapDefinition) -> Self {
        Self {
            kind: VtapEventKind::Updated,
            subject,
            previous: Some(previous),
        }
    }

    pub fn removed(subject: VtapDefinition) -> Self {
        Self {
            kind: VtapEventKind::Removed,
            subject,
            previous: None,
        }
    }
}
