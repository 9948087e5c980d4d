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

//! Domain model layer.
//!
//! Value types shared by every other layer: vtap definitions and their direction
//! flags, match criteria, and the host/device topology vocabulary.

pub mod criterion;
pub mod definition;
pub mod direction;
pub mod topology;
