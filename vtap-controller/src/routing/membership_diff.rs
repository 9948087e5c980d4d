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

//! Device-set differences between two membership snapshots.

use crate::model::criterion::VtapCriterion;
use crate::model::direction::Facet;
use crate::model::topology::{DeviceId, HostRecord};
use crate::routing::membership::covers;
use std::collections::BTreeSet;

/// Devices leaving and joining a membership set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceDelta {
    pub removed: BTreeSet<DeviceId>,
    pub added: BTreeSet<DeviceId>,
}

impl DeviceDelta {
    /// `removed = old \ new`, `added = new \ old`. Devices in both sets appear in neither.
    pub fn between(old: &BTreeSet<DeviceId>, new: &BTreeSet<DeviceId>) -> Self {
        Self {
            removed: old.difference(new).cloned().collect(),
            added: new.difference(old).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

fn matching_devices(host: Option<&HostRecord>, facet: Facet, criterion: &VtapCriterion) -> BTreeSet<DeviceId> {
    match host {
        Some(host) if host.matches(criterion.prefix_for(facet)) => host.device_ids().cloned().collect(),
        _ => BTreeSet::new(),
    }
}

/// Applies one host transition to a facet's device set.
///
/// A device the departing host matched on is dropped unless the arriving host is also
/// there or another matching host in `hosts` still covers it. Every device the arriving
/// host matches on is added.
pub fn apply_host_transition(
    current: &BTreeSet<DeviceId>,
    facet: Facet,
    criterion: &VtapCriterion,
    departing: Option<&HostRecord>,
    arriving: Option<&HostRecord>,
    hosts: &[HostRecord],
) -> BTreeSet<DeviceId> {
    let departed = matching_devices(departing, facet, criterion);
    let arrived = matching_devices(arriving, facet, criterion);

    let mut next: BTreeSet<DeviceId> = current
        .iter()
        .filter(|device_id| {
            !departed.contains(*device_id)
                || arrived.contains(*device_id)
                || covers(hosts, facet, criterion, device_id)
        })
        .cloned()
        .collect();
    next.extend(arrived);
    next
}

#[cfg(test)]
mod tests {
    use super::{apply_host_transition, DeviceDelta};
    use crate::model::criterion::{IpProtocol, VtapCriterion};
    use crate::model::direction::Facet;
    use crate::model::topology::{DeviceId, HostLocation, HostRecord};
    use std::collections::BTreeSet;

    fn devices(ids: &[&str]) -> BTreeSet<DeviceId> {
        ids.iter().map(|id| DeviceId::new(*id)).collect()
    }

    fn host(id: &str, ip: &str, device: &str) -> HostRecord {
        HostRecord::new(id)
            .with_ip(ip.parse().expect("valid address"))
            .with_location(HostLocation::new(device, 1))
    }

    fn criterion() -> VtapCriterion {
        VtapCriterion::new(
            "10.0.0.0/24".parse().expect("valid prefix"),
            "10.0.1.0/24".parse().expect("valid prefix"),
            IpProtocol::Any,
        )
    }

    #[test]
    fn delta_touches_only_changed_devices() {
        let delta = DeviceDelta::between(&devices(&["A", "B", "C"]), &devices(&["B", "C", "D"]));

        assert_eq!(delta.removed, devices(&["A"]));
        assert_eq!(delta.added, devices(&["D"]));
        assert!(DeviceDelta::between(&devices(&["A"]), &devices(&["A"])).is_empty());
    }

    #[test]
    fn move_replaces_old_device_with_new_one() {
        let before = host("vm", "10.0.0.5", "D1");
        let after = host("vm", "10.0.0.5", "D2");

        let next = apply_host_transition(
            &devices(&["D1"]),
            Facet::Tx,
            &criterion(),
            Some(&before),
            Some(&after),
            &[after.clone()],
        );

        assert_eq!(next, devices(&["D2"]));
    }

    #[test]
    fn device_still_covered_by_another_host_is_kept() {
        let leaving = host("vm-1", "10.0.0.5", "D1");
        let staying = host("vm-2", "10.0.0.6", "D1");

        let next = apply_host_transition(
            &devices(&["D1"]),
            Facet::Tx,
            &criterion(),
            Some(&leaving),
            None,
            &[staying],
        );

        assert_eq!(next, devices(&["D1"]));
    }

    #[test]
    fn non_matching_host_leaves_set_untouched() {
        let outsider = host("vm", "192.168.0.1", "D9");

        let next = apply_host_transition(
            &devices(&["D1"]),
            Facet::Rx,
            &criterion(),
            None,
            Some(&outsider),
            &[outsider.clone()],
        );

        assert_eq!(next, devices(&["D1"]));
    }
}
