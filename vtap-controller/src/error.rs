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

use thiserror::Error;

pub type VtapResult<T> = Result<T, VtapError>;

/// Failures surfaced by the vtap controller.
///
/// Operating on an unknown vtap id is not an error; those calls return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VtapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("southbound apply failed: {0}")]
    SouthboundFailure(String),

    #[error("desired-state store error: {0}")]
    Store(String),

    #[error("reconciliation queue is closed")]
    QueueClosed,

    #[error("reconciliation worker failed to start: {0}")]
    Runtime(String),
}

impl VtapError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        VtapError::InvalidArgument(message.into())
    }
}
