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

//! Field formatters shared by structured log records.

use crate::data_plane::southbound::{FlowAction, FlowRule};
use crate::model::topology::{DeviceId, HostRecord};
use std::collections::BTreeSet;

pub fn format_device_ids(device_ids: &BTreeSet<DeviceId>) -> String {
    let joined = device_ids
        .iter()
        .map(DeviceId::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!("[{joined}]")
}

pub fn format_host(host: Option<&HostRecord>) -> String {
    match host {
        Some(host) => host.id.clone(),
        None => "-".to_string(),
    }
}

pub fn format_flow_target(flow: &FlowRule) -> String {
    flow.actions
        .iter()
        .map(|action| match action {
            FlowAction::Transition(table) => format!("table:{}", table.0),
            FlowAction::Group(group) => format!("group:{}", group.0),
            FlowAction::PushVlan(vlan) => format!("vlan:{}", vlan.0),
            FlowAction::Output(port) => format!("output:{}", port.0),
        })
        .collect::<Vec<_>>()
        .join(",")
}
