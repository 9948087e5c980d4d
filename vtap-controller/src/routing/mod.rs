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

//! Routing and membership-resolution layer.
//!
//! Encapsulates the host directory, prefix matching of hosts against a criterion, and the
//! set-difference policy used when turning a host transition or a definition update into
//! per-device install and uninstall work.
//!
//! ```
//! use std::sync::Arc;
//! use vtap_controller::model::criterion::{IpProtocol, VtapCriterion};
//! use vtap_controller::model::direction::Facet;
//! use vtap_controller::model::topology::{HostLocation, HostRecord};
//! use vtap_controller::routing::host_directory::InMemoryTopology;
//! use vtap_controller::routing::membership::MembershipResolver;
//!
//! let topology = InMemoryTopology::with_hosts([HostRecord::new("vm-1")
//!     .with_ip("10.0.0.5".parse().unwrap())
//!     .with_location(HostLocation::new("of:1", 3))]);
//! let resolver = MembershipResolver::new(Arc::new(topology));
//! let criterion = VtapCriterion::new(
//!     "10.0.0.0/24".parse().unwrap(),
//!     "10.0.1.0/24".parse().unwrap(),
//!     IpProtocol::Tcp,
//! );
//!
//! // TX matches the source prefix, RX the destination prefix.
//! assert_eq!(resolver.resolve(Facet::Tx, &criterion).len(), 1);
//! assert!(resolver.resolve(Facet::Rx, &criterion).is_empty());
//! ```

pub mod host_directory;
pub mod membership;
pub mod membership_diff;
