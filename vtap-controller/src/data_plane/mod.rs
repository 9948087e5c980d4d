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

//! Data-plane layer.
//!
//! Owns the southbound seam and per-device pipeline programming. This layer turns
//! "install vtap X facet F on device D" into concrete flow-rule and group operations and
//! keeps a logical record of what it programmed on every device.
//!
//! ```
//! use std::sync::Arc;
//! use vtap_controller::data_plane::in_memory_southbound::InMemorySouthbound;
//! use vtap_controller::data_plane::pipeline::PipelineProgrammer;
//! use vtap_controller::model::topology::DeviceId;
//! use vtap_controller::VtapConfig;
//!
//! let southbound = Arc::new(InMemorySouthbound::new());
//! let mut programmer = PipelineProgrammer::new(Arc::new(VtapConfig::default()), southbound.clone());
//! let device = DeviceId::new("of:0000000000000001");
//!
//! // Building twice converges on the same three mirror tables and three groups.
//! programmer.build_pipeline(&device);
//! programmer.build_pipeline(&device);
//! assert_eq!(southbound.flows(&device).len(), 3);
//! assert_eq!(southbound.groups(&device).len(), 3);
//! ```

pub(crate) mod apply_observer;
pub mod in_memory_southbound;
pub mod pipeline;
pub mod pipeline_state;
pub mod southbound;
