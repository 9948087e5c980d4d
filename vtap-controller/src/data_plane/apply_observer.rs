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

//! Completion observer for southbound flow batches. It only logs: a failure is terminal
//! for that batch and nothing is retried or rolled back.

use crate::data_plane::southbound::{ApplyObserver, FlowRuleOperation, FlowRuleOperations};
use crate::error::VtapError;
use crate::observability::{events, fields};
use tracing::{error, trace};

const COMPONENT: &str = "apply_observer";

pub(crate) struct LoggingApplyObserver;

fn describe(operations: &FlowRuleOperations) -> String {
    operations
        .operations
        .iter()
        .map(|operation| {
            let (verb, rule) = match operation {
                FlowRuleOperation::Add(rule) => ("add", rule),
                FlowRuleOperation::Remove(rule) => ("remove", rule),
            };
            format!(
                "{verb} {}/table:{}/prio:{} -> {}",
                rule.device_id,
                rule.table.0,
                rule.priority,
                fields::format_flow_target(rule)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApplyObserver for LoggingApplyObserver {
    fn on_success(&self, operations: &FlowRuleOperations) {
        trace!(
            event = events::SOUTHBOUND_APPLY_OK,
            component = COMPONENT,
            ops = %describe(operations),
            "provisioned vtap flow rules"
        );
    }

    fn on_error(&self, operations: &FlowRuleOperations, err: VtapError) {
        error!(
            event = events::SOUTHBOUND_APPLY_FAILED,
            component = COMPONENT,
            ops = %describe(operations),
            err = %err,
            "failed to provision vtap flow rules"
        );
    }
}
