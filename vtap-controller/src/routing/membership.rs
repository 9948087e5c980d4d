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

use crate::model::criterion::VtapCriterion;
use crate::model::direction::{Facet, VtapDirection};
use crate::model::topology::{DeviceId, HostRecord};
use crate::routing::host_directory::HostDirectory;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

const COMPONENT: &str = "membership";

/// Computes which devices host endpoints matching a criterion.
///
/// Resolution is a pure read of the current host snapshot.
#[derive(Clone)]
pub struct MembershipResolver {
    directory: Arc<dyn HostDirectory>,
}

impl MembershipResolver {
    pub fn new(directory: Arc<dyn HostDirectory>) -> Self {
        Self { directory }
    }

    pub fn hosts(&self) -> Vec<HostRecord> {
        self.directory.hosts()
    }

    /// Devices of every host with an address inside the facet's prefix.
    pub fn resolve(&self, facet: Facet, criterion: &VtapCriterion) -> BTreeSet<DeviceId> {
        let device_ids = resolve_in(&self.directory.hosts(), facet, criterion);
        trace!(
            component = COMPONENT,
            facet = %facet,
            prefix = %criterion.prefix_for(facet),
            devices = device_ids.len(),
            "resolved vtap membership"
        );
        device_ids
    }

    /// TX and RX device sets for a definition; a facet outside `direction` resolves empty.
    pub fn resolve_sets(
        &self,
        direction: VtapDirection,
        criterion: &VtapCriterion,
    ) -> (BTreeSet<DeviceId>, BTreeSet<DeviceId>) {
        let hosts = self.directory.hosts();
        let resolve_facet = |facet: Facet| {
            if direction.has(facet) {
                resolve_in(&hosts, facet, criterion)
            } else {
                BTreeSet::new()
            }
        };
        (resolve_facet(Facet::Tx), resolve_facet(Facet::Rx))
    }
}

/// Resolution against an explicit host snapshot.
pub fn resolve_in(hosts: &[HostRecord], facet: Facet, criterion: &VtapCriterion) -> BTreeSet<DeviceId> {
    let prefix = criterion.prefix_for(facet);
    hosts
        .iter()
        .filter(|host| host.matches(prefix))
        .flat_map(|host| host.device_ids().cloned())
        .collect()
}

/// Returns `true` when some host in `hosts` matching the facet's prefix sits on `device_id`.
pub fn covers(
    hosts: &[HostRecord],
    facet: Facet,
    criterion: &VtapCriterion,
    device_id: &DeviceId,
) -> bool {
    let prefix = criterion.prefix_for(facet);
    hosts
        .iter()
        .filter(|host| host.matches(prefix))
        .any(|host| host.device_ids().any(|candidate| candidate == device_id))
}
