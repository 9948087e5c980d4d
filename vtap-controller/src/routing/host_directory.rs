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

//! Topology snapshot side: the host directory and the events the topology feed emits.

use crate::model::topology::{DeviceId, HostRecord};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    Added,
    Removed,
    Updated,
    Moved,
}

impl Display for HostEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HostEventKind::Added => write!(f, "added"),
            HostEventKind::Removed => write!(f, "removed"),
            HostEventKind::Updated => write!(f, "updated"),
            HostEventKind::Moved => write!(f, "moved"),
        }
    }
}

/// Host transition. For `Removed` the subject is the host that left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostEvent {
    pub kind: HostEventKind,
    pub subject: HostRecord,
    pub previous: Option<HostRecord>,
}

impl HostEvent {
    pub fn added(subject: HostRecord) -> Self {
        Self {
            kind: HostEventKind::Added,
            subject,
            previous: None,
        }
    }

    pub fn removed(subject: HostRecord) -> Self {
        Self {
            kind: HostEventKind::Removed,
            subject,
            previous: None,
        }
    }

    /// `Moved` when the attachment points changed, `Updated` otherwise.
    pub fn changed(subject: HostRecord, previous: HostRecord) -> Self {
        let kind = if subject.locations != previous.locations {
            HostEventKind::Moved
        } else {
            HostEventKind::Updated
        };
        Self {
            kind,
            subject,
            previous: Some(previous),
        }
    }

    /// Returns the (departing, arriving) host pair of this transition.
    pub fn transition(&self) -> (Option<&HostRecord>, Option<&HostRecord>) {
        match self.kind {
            HostEventKind::Added => (None, Some(&self.subject)),
            HostEventKind::Removed => (Some(&self.subject), None),
            HostEventKind::Updated | HostEventKind::Moved => {
                (self.previous.as_ref(), Some(&self.subject))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceEventKind {
    Added,
    /// Observed but not acted upon; programmed state for the device is kept.
    Removed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEvent {
    pub kind: DeviceEventKind,
    pub device_id: DeviceId,
}

impl DeviceEvent {
    pub fn added(device_id: impl Into<DeviceId>) -> Self {
        Self {
            kind: DeviceEventKind::Added,
            device_id: device_id.into(),
        }
    }

    pub fn removed(device_id: impl Into<DeviceId>) -> Self {
        Self {
            kind: DeviceEventKind::Removed,
            device_id: device_id.into(),
        }
    }
}

/// Read-only view of the hosts currently known to the topology feed.
pub trait HostDirectory: Send + Sync {
    fn hosts(&self) -> Vec<HostRecord>;
}

/// Topology kept in process. Mutators return the event the feed should publish.
#[derive(Default)]
pub struct InMemoryTopology {
    hosts: RwLock<BTreeMap<String, HostRecord>>,
}

impl InMemoryTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(hosts: impl IntoIterator<Item = HostRecord>) -> Self {
        let topology = Self::new();
        {
            let mut map = topology.write();
            for host in hosts {
                map.insert(host.id.clone(), host);
            }
        }
        topology
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, HostRecord>> {
        self.hosts.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, HostRecord>> {
        self.hosts.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces a host. Returns `None` when the stored record is unchanged.
    pub fn upsert_host(&self, host: HostRecord) -> Option<HostEvent> {
        let previous = self.write().insert(host.id.clone(), host.clone());
        match previous {
            None => Some(HostEvent::added(host)),
            Some(previous) if previous == host => None,
            Some(previous) => Some(HostEvent::changed(host, previous)),
        }
    }

    pub fn remove_host(&self, host_id: &str) -> Option<HostEvent> {
        self.write().remove(host_id).map(HostEvent::removed)
    }

    pub fn host(&self, host_id: &str) -> Option<HostRecord> {
        self.read().get(host_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl HostDirectory for InMemoryTopology {
    fn hosts(&self) -> Vec<HostRecord> {
        self.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{HostDirectory, HostEventKind, InMemoryTopology};
    use crate::model::topology::{HostLocation, HostRecord};

    fn host(location: &str) -> HostRecord {
        HostRecord::new("vm-1")
            .with_ip("10.0.0.5".parse().expect("valid address"))
            .with_location(HostLocation::new(location, 1))
    }

    #[test]
    fn upsert_classifies_added_moved_and_unchanged() {
        let topology = InMemoryTopology::new();

        let added = topology.upsert_host(host("of:1")).expect("new host");
        assert_eq!(added.kind, HostEventKind::Added);
        assert_eq!(added.transition().0, None);

        assert!(topology.upsert_host(host("of:1")).is_none());

        let moved = topology.upsert_host(host("of:2")).expect("moved host");
        assert_eq!(moved.kind, HostEventKind::Moved);
        let (departing, arriving) = moved.transition();
        assert_eq!(departing.map(|host| host.locations.len()), Some(1));
        assert!(arriving.is_some());
        assert_eq!(topology.hosts().len(), 1);
    }

    #[test]
    fn address_change_is_an_update() {
        let topology = InMemoryTopology::with_hosts([host("of:1")]);

        let updated = topology
            .upsert_host(host("of:1").with_ip("10.0.0.6".parse().expect("valid address")))
            .expect("updated host");

        assert_eq!(updated.kind, HostEventKind::Updated);
    }

    #[test]
    fn removing_unknown_host_yields_no_event() {
        let topology = InMemoryTopology::with_hosts([host("of:1")]);

        assert!(topology.remove_host("vm-9").is_none());
        let removed = topology.remove_host("vm-1").expect("removed host");
        assert_eq!(removed.transition().1, None);
        assert!(topology.is_empty());
    }
}
