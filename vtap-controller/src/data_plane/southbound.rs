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

//! Protocol-agnostic southbound descriptors and the adapter seam.
//!
//! Every adapter call hands work off and returns immediately. Flow completion is reported
//! through an [`ApplyObserver`]; group and clear calls are fire-and-forget.

use crate::error::VtapError;
use crate::model::criterion::IpPrefix;
use crate::model::topology::{DeviceId, PortNumber, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const ETH_TYPE_IPV4: u16 = 0x0800;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub String);

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet match. Unset fields are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FlowSelector {
    pub eth_type: Option<u16>,
    pub ip_src: Option<IpPrefix>,
    pub ip_dst: Option<IpPrefix>,
    pub ip_proto: Option<u8>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FlowAction {
    Transition(TableId),
    Group(GroupId),
    PushVlan(VlanId),
    Output(PortNumber),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowRule {
    pub device_id: DeviceId,
    pub table: TableId,
    pub priority: u32,
    pub selector: FlowSelector,
    pub actions: Vec<FlowAction>,
    pub permanent: bool,
    pub app_id: String,
}

impl FlowRule {
    /// Two rules occupy the same flow-table slot when device, table, priority and match agree.
    pub fn same_slot(&self, other: &FlowRule) -> bool {
        self.device_id == other.device_id
            && self.table == other.table
            && self.priority == other.priority
            && self.selector == other.selector
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowRuleOperation {
    Add(FlowRule),
    Remove(FlowRule),
}

impl FlowRuleOperation {
    pub fn rule(&self) -> &FlowRule {
        match self {
            FlowRuleOperation::Add(rule) | FlowRuleOperation::Remove(rule) => rule,
        }
    }
}

/// A batch of flow operations applied as one southbound request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowRuleOperations {
    pub operations: Vec<FlowRuleOperation>,
}

impl FlowRuleOperations {
    pub fn single(install: bool, rule: FlowRule) -> Self {
        let operation = if install {
            FlowRuleOperation::Add(rule)
        } else {
            FlowRuleOperation::Remove(rule)
        };
        Self {
            operations: vec![operation],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupType {
    All,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupBucket {
    Resubmit(TableId),
    Output(PortNumber),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDescription {
    pub device_id: DeviceId,
    pub group_id: GroupId,
    pub key: GroupKey,
    pub group_type: GroupType,
    pub buckets: Vec<GroupBucket>,
    pub app_id: String,
}

/// Completion callback for a flow batch.
pub trait ApplyObserver: Send + Sync {
    fn on_success(&self, operations: &FlowRuleOperations);

    fn on_error(&self, operations: &FlowRuleOperations, error: VtapError);
}

/// Asynchronous flow-rule and group programming API.
///
/// Implementations must not block the caller; retries, if any, belong in a decorator
/// around this trait.
pub trait SouthboundAdapter: Send + Sync {
    fn apply(&self, operations: FlowRuleOperations, observer: Arc<dyn ApplyObserver>);

    fn add_group(&self, group: GroupDescription);

    fn remove_group(&self, device_id: &DeviceId, key: &GroupKey, app_id: &str);

    /// Removes every flow owned by `app_id` on one device.
    fn remove_flows_by_app(&self, device_id: &DeviceId, app_id: &str);
}
