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

//! Devices, ports and hosts as observed from the topology feed.

use crate::model::criterion::IpPrefix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// Opaque switch identity, e.g. `of:0000000000000001`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId::new(id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(pub u32);

impl Display for PortNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 802.1Q VLAN identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VlanId(pub u16);

impl Display for VlanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (device, port) attachment point.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostLocation {
    pub device_id: DeviceId,
    pub port: PortNumber,
}

impl HostLocation {
    pub fn new(device_id: impl Into<DeviceId>, port: u32) -> Self {
        Self {
            device_id: device_id.into(),
            port: PortNumber(port),
        }
    }
}

/// An end host with its addresses and attachment points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: String,
    #[serde(default)]
    pub ip_addresses: BTreeSet<IpAddr>,
    #[serde(default)]
    pub locations: BTreeSet<HostLocation>,
}

impl HostRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ip_addresses: BTreeSet::new(),
            locations: BTreeSet::new(),
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_addresses.insert(ip);
        self
    }

    pub fn with_location(mut self, location: HostLocation) -> Self {
        self.locations.insert(location);
        self
    }

    /// Returns `true` when any address of this host falls inside `prefix`.
    pub fn matches(&self, prefix: &IpPrefix) -> bool {
        self.ip_addresses.iter().any(|ip| prefix.contains(ip))
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.locations.iter().map(|location| &location.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{HostLocation, HostRecord};

    #[test]
    fn host_matches_when_any_address_is_in_prefix() {
        let host = HostRecord::new("vm-1")
            .with_ip("192.168.0.9".parse().expect("valid address"))
            .with_ip("10.0.0.5".parse().expect("valid address"))
            .with_location(HostLocation::new("of:1", 3));

        assert!(host.matches(&"10.0.0.0/24".parse().expect("valid prefix")));
        assert!(!host.matches(&"10.9.0.0/16".parse().expect("valid prefix")));
        assert_eq!(host.device_ids().count(), 1);
    }
}
