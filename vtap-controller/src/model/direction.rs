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

//! Mirroring direction flags.
//!
//! A vtap may mirror traffic sourced from its matched addresses (TX), destined to them
//! (RX), or both. The two facets are evaluated independently everywhere, so the direction
//! is a composable flag set rather than an exhaustive enum.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::BitOr;
use std::str::FromStr;

/// One independently testable side of a [`VtapDirection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Tx,
    Rx,
}

impl Facet {
    pub const ALL: [Facet; 2] = [Facet::Tx, Facet::Rx];

    pub fn as_direction(self) -> VtapDirection {
        match self {
            Facet::Tx => VtapDirection::TX,
            Facet::Rx => VtapDirection::RX,
        }
    }
}

impl Display for Facet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Facet::Tx => write!(f, "tx"),
            Facet::Rx => write!(f, "rx"),
        }
    }
}

/// OR-composable direction flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VtapDirection(u8);

impl VtapDirection {
    pub const NONE: VtapDirection = VtapDirection(0b00);
    pub const TX: VtapDirection = VtapDirection(0b01);
    pub const RX: VtapDirection = VtapDirection(0b10);
    pub const TX_RX: VtapDirection = VtapDirection(0b11);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when every flag of `other` is also set on `self`.
    ///
    /// `NONE` is contained in every direction.
    pub fn contains(self, other: VtapDirection) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has(self, facet: Facet) -> bool {
        self.contains(facet.as_direction())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the facets set on this direction, TX first.
    pub fn facets(self) -> impl Iterator<Item = Facet> {
        Facet::ALL.into_iter().filter(move |facet| self.has(*facet))
    }
}

impl BitOr for VtapDirection {
    type Output = VtapDirection;

    fn bitor(self, rhs: Self) -> Self::Output {
        VtapDirection(self.0 | rhs.0)
    }
}

impl From<Facet> for VtapDirection {
    fn from(facet: Facet) -> Self {
        facet.as_direction()
    }
}

impl Display for VtapDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match *self {
            VtapDirection::TX => "tx",
            VtapDirection::RX => "rx",
            VtapDirection::TX_RX => "tx_rx",
            _ => "none",
        };
        write!(f, "{label}")
    }
}

impl FromStr for VtapDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tx" => Ok(VtapDirection::TX),
            "rx" => Ok(VtapDirection::RX),
            "tx_rx" | "all" | "both" => Ok(VtapDirection::TX_RX),
            "none" => Ok(VtapDirection::NONE),
            other => Err(format!("unknown vtap direction: {other:?}")),
        }
    }
}

impl TryFrom<String> for VtapDirection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VtapDirection> for String {
    fn from(direction: VtapDirection) -> Self {
        direction.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Facet, VtapDirection};

    #[test]
    fn tx_rx_contains_both_facets() {
        let direction = VtapDirection::TX | VtapDirection::RX;

        assert_eq!(direction, VtapDirection::TX_RX);
        assert!(direction.has(Facet::Tx));
        assert!(direction.has(Facet::Rx));
        assert_eq!(direction.facets().collect::<Vec<_>>(), vec![Facet::Tx, Facet::Rx]);
    }

    #[test]
    fn single_facet_does_not_contain_combined_direction() {
        assert!(VtapDirection::TX_RX.contains(VtapDirection::TX));
        assert!(!VtapDirection::TX.contains(VtapDirection::TX_RX));
        assert!(!VtapDirection::RX.has(Facet::Tx));
        assert!(VtapDirection::RX.contains(VtapDirection::NONE));
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("TX".parse::<VtapDirection>(), Ok(VtapDirection::TX));
        assert_eq!("both".parse::<VtapDirection>(), Ok(VtapDirection::TX_RX));
        assert!("sideways".parse::<VtapDirection>().is_err());
    }
}
