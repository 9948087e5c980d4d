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

//! Flow match criterion carried by a vtap definition.

use crate::error::{VtapError, VtapResult};
use crate::model::direction::Facet;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An address prefix such as `10.0.0.0/24`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, String> {
        let max_len = match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max_len {
            return Err(format!(
                "prefix length {prefix_len} exceeds {max_len} for {address}"
            ));
        }
        Ok(Self {
            address: mask(address, prefix_len),
            prefix_len,
        })
    }

    /// The prefix matching every IPv4 address.
    pub fn any_v4() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            prefix_len: 0,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// Returns `true` when `ip` falls inside this prefix. Mixed address families never match.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.address, ip) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(*ip, self.prefix_len) == self.address
            }
            _ => false,
        }
    }
}

fn mask(address: IpAddr, prefix_len: u8) -> IpAddr {
    match address {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let masked = if prefix_len == 0 {
                0
            } else {
                bits & (u32::MAX << (32 - u32::from(prefix_len)))
            };
            IpAddr::V4(Ipv4Addr::from(masked))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let masked = if prefix_len == 0 {
                0
            } else {
                bits & (u128::MAX << (128 - u32::from(prefix_len)))
            };
            IpAddr::V6(Ipv6Addr::from(masked))
        }
    }
}

impl Display for IpPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix_len) = match s.split_once('/') {
            Some((address, len)) => {
                let len = len
                    .parse::<u8>()
                    .map_err(|err| format!("invalid prefix length in {s:?}: {err}"))?;
                (address, Some(len))
            }
            None => (s, None),
        };
        let address = address
            .parse::<IpAddr>()
            .map_err(|err| format!("invalid address in {s:?}: {err}"))?;
        let prefix_len = prefix_len.unwrap_or(match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        });
        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}

/// IP protocol selector of a criterion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    Tcp,
    Udp,
    Icmp,
    #[default]
    Any,
    Other(u8),
}

impl IpProtocol {
    pub const PROTOCOL_ICMP: u8 = 1;
    pub const PROTOCOL_TCP: u8 = 6;
    pub const PROTOCOL_UDP: u8 = 17;

    pub fn number(self) -> Option<u8> {
        match self {
            IpProtocol::Tcp => Some(Self::PROTOCOL_TCP),
            IpProtocol::Udp => Some(Self::PROTOCOL_UDP),
            IpProtocol::Icmp => Some(Self::PROTOCOL_ICMP),
            IpProtocol::Any => None,
            IpProtocol::Other(number) => Some(number),
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(number: u8) -> Self {
        match number {
            Self::PROTOCOL_TCP => IpProtocol::Tcp,
            Self::PROTOCOL_UDP => IpProtocol::Udp,
            Self::PROTOCOL_ICMP => IpProtocol::Icmp,
            other => IpProtocol::Other(other),
        }
    }
}

/// Match criterion of a vtap.
///
/// Transport ports are kept as given; a value `<= 0` leaves that port unconstrained.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VtapCriterion {
    pub src_ip_prefix: IpPrefix,
    pub dst_ip_prefix: IpPrefix,
    #[serde(default)]
    pub ip_protocol: IpProtocol,
    #[serde(default)]
    pub src_tp_port: i32,
    #[serde(default)]
    pub dst_tp_port: i32,
}

impl VtapCriterion {
    pub fn new(src_ip_prefix: IpPrefix, dst_ip_prefix: IpPrefix, ip_protocol: IpProtocol) -> Self {
        Self {
            src_ip_prefix,
            dst_ip_prefix,
            ip_protocol,
            src_tp_port: 0,
            dst_tp_port: 0,
        }
    }

    pub fn with_ports(mut self, src_tp_port: i32, dst_tp_port: i32) -> Self {
        self.src_tp_port = src_tp_port;
        self.dst_tp_port = dst_tp_port;
        self
    }

    /// Prefix evaluated for the given facet: source for TX, destination for RX.
    pub fn prefix_for(&self, facet: Facet) -> &IpPrefix {
        match facet {
            Facet::Tx => &self.src_ip_prefix,
            Facet::Rx => &self.dst_ip_prefix,
        }
    }

    /// Rejects criteria the IPv4 pipeline cannot express: non-IPv4 prefixes and transport
    /// ports above 65535.
    pub fn validate(&self) -> VtapResult<()> {
        let prefixes = [
            ("source", &self.src_ip_prefix),
            ("destination", &self.dst_ip_prefix),
        ];
        for (side, prefix) in prefixes {
            if !prefix.is_ipv4() {
                return Err(VtapError::invalid_argument(format!(
                    "{side} prefix {prefix} is not an IPv4 prefix"
                )));
            }
        }
        for (side, port) in [("source", self.src_tp_port), ("destination", self.dst_tp_port)] {
            if port > i32::from(u16::MAX) {
                return Err(VtapError::invalid_argument(format!(
                    "{side} transport port {port} is out of range"
                )));
            }
        }
        Ok(())
    }

    pub fn src_port_constraint(&self) -> Option<u16> {
        port_constraint(self.src_tp_port)
    }

    pub fn dst_port_constraint(&self) -> Option<u16> {
        port_constraint(self.dst_tp_port)
    }
}

fn port_constraint(port: i32) -> Option<u16> {
    if port <= 0 {
        return None;
    }
    u16::try_from(port).ok()
}
