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

//! Runtime orchestration layer.
//!
//! Owns the single reconciliation queue per node and the dedicated worker thread that
//! drains it. Every mutation of definition device sets and pipeline state runs as one
//! queued task, in submission order. Southbound completions are never awaited here.

pub(crate) mod reconcile_queue;
pub(crate) mod worker_runtime;
