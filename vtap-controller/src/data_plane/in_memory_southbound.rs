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

//! Emulated southbound that keeps per-device flow and group tables in memory.
//!
//! Every call is recorded in order, which makes it usable both as a dry-run adapter and as
//! a recording fake. Failures can be injected per device.

use crate::data_plane::southbound::{
    ApplyObserver, FlowRule, FlowRuleOperation, FlowRuleOperations, GroupDescription, GroupId,
    GroupKey, SouthboundAdapter,
};
use crate::error::VtapError;
use crate::model::topology::DeviceId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const COMPONENT: &str = "in_memory_southbound";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SouthboundCall {
    Apply(FlowRuleOperation),
    AddGroup(GroupDescription),
    RemoveGroup { device_id: DeviceId, key: GroupKey },
    RemoveFlowsByApp { device_id: DeviceId },
}

impl SouthboundCall {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            SouthboundCall::Apply(operation) => &operation.rule().device_id,
            SouthboundCall::AddGroup(group) => &group.device_id,
            SouthboundCall::RemoveGroup { device_id, .. }
            | SouthboundCall::RemoveFlowsByApp { device_id } => device_id,
        }
    }
}

#[derive(Default)]
struct EmulatedFabric {
    flows: HashMap<DeviceId, Vec<FlowRule>>,
    groups: HashMap<DeviceId, BTreeMap<GroupId, GroupDescription>>,
    calls: Vec<SouthboundCall>,
    failing_devices: HashSet<DeviceId>,
}

#[derive(Default)]
pub struct InMemorySouthbound {
    fabric: Mutex<EmulatedFabric>,
}

impl InMemorySouthbound {
    pub fn new() -> Self {
        Self::default()
    }

    fn fabric(&self) -> MutexGuard<'_, EmulatedFabric> {
        // A poisoned fabric only means a panicking test thread; the data is still usable.
        self.fabric.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every subsequent flow apply on `device_id` report an error.
    pub fn fail_device(&self, device_id: DeviceId) {
        self.fabric().failing_devices.insert(device_id);
    }

    pub fn recover_device(&self, device_id: &DeviceId) {
        self.fabric().failing_devices.remove(device_id);
    }

    pub fn flows(&self, device_id: &DeviceId) -> Vec<FlowRule> {
        self.fabric()
            .flows
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn groups(&self, device_id: &DeviceId) -> Vec<GroupDescription> {
        self.fabric()
            .groups
            .get(device_id)
            .map(|groups| groups.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<SouthboundCall> {
        self.fabric().calls.clone()
    }

    pub fn calls_for(&self, device_id: &DeviceId) -> Vec<SouthboundCall> {
        self.fabric()
            .calls
            .iter()
            .filter(|call| call.device_id() == device_id)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.fabric().calls.clear();
    }
}

impl SouthboundAdapter for InMemorySouthbound {
    fn apply(&self, operations: FlowRuleOperations, observer: Arc<dyn ApplyObserver>) {
        let failed_device = {
            let mut fabric = self.fabric();
            fabric.calls.extend(
                operations
                    .operations
                    .iter()
                    .cloned()
                    .map(SouthboundCall::Apply),
            );

            let failed_device = operations
                .operations
                .iter()
                .map(|operation| &operation.rule().device_id)
                .find(|device_id| fabric.failing_devices.contains(*device_id))
                .cloned();

            if failed_device.is_none() {
                for operation in &operations.operations {
                    let rule = operation.rule();
                    let table = fabric.flows.entry(rule.device_id.clone()).or_default();
                    table.retain(|existing| !existing.same_slot(rule));
                    if let FlowRuleOperation::Add(rule) = operation {
                        table.push(rule.clone());
                    }
                }
            }
            failed_device
        };

        match failed_device {
            Some(device_id) => observer.on_error(
                &operations,
                VtapError::SouthboundFailure(format!("device {device_id} rejected the batch")),
            ),
            None => observer.on_success(&operations),
        }
    }

    fn add_group(&self, group: GroupDescription) {
        debug!(
            component = COMPONENT,
            device_id = %group.device_id,
            group_id = group.group_id.0,
            "emulating group add"
        );
        let mut fabric = self.fabric();
        fabric.calls.push(SouthboundCall::AddGroup(group.clone()));
        fabric
            .groups
            .entry(group.device_id.clone())
            .or_default()
            .insert(group.group_id, group);
    }

    fn remove_group(&self, device_id: &DeviceId, key: &GroupKey, app_id: &str) {
        let mut fabric = self.fabric();
        fabric.calls.push(SouthboundCall::RemoveGroup {
            device_id: device_id.clone(),
            key: key.clone(),
        });
        if let Some(groups) = fabric.groups.get_mut(device_id) {
            groups.retain(|_, group| !(group.key == *key && group.app_id == app_id));
        }
    }

    fn remove_flows_by_app(&self, device_id: &DeviceId, app_id: &str) {
        let mut fabric = self.fabric();
        fabric.calls.push(SouthboundCall::RemoveFlowsByApp {
            device_id: device_id.clone(),
        });
        if let Some(flows) = fabric.flows.get_mut(device_id) {
            flows.retain(|flow| flow.app_id != app_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemorySouthbound, SouthboundCall};
    use crate::data_plane::southbound::{
        ApplyObserver, FlowRule, FlowRuleOperations, FlowSelector, SouthboundAdapter, TableId,
    };
    use crate::error::VtapError;
    use crate::model::topology::DeviceId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingObserver {
        successes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ApplyObserver for CountingObserver {
        fn on_success(&self, _operations: &FlowRuleOperations) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _operations: &FlowRuleOperations, _error: VtapError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn rule(device: &str, priority: u32) -> FlowRule {
        FlowRule {
            device_id: DeviceId::new(device),
            table: TableId(2),
            priority,
            selector: FlowSelector::default(),
            actions: vec![],
            permanent: true,
            app_id: "test-app".to_string(),
        }
    }

    #[test]
    fn adding_same_slot_twice_keeps_one_flow() {
        let southbound = InMemorySouthbound::new();
        let observer = Arc::new(CountingObserver::default());

        southbound.apply(FlowRuleOperations::single(true, rule("of:1", 0)), observer.clone());
        southbound.apply(FlowRuleOperations::single(true, rule("of:1", 0)), observer.clone());

        assert_eq!(southbound.flows(&DeviceId::new("of:1")).len(), 1);
        assert_eq!(observer.successes.load(Ordering::SeqCst), 2);
        assert_eq!(southbound.calls().len(), 2);
    }

    #[test]
    fn failing_device_reports_error_and_keeps_table_unchanged() {
        let southbound = InMemorySouthbound::new();
        let observer = Arc::new(CountingObserver::default());
        southbound.fail_device(DeviceId::new("of:1"));

        southbound.apply(FlowRuleOperations::single(true, rule("of:1", 0)), observer.clone());

        assert!(southbound.flows(&DeviceId::new("of:1")).is_empty());
        assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_flows_by_app_only_touches_one_device() {
        let southbound = InMemorySouthbound::new();
        let observer = Arc::new(CountingObserver::default());
        southbound.apply(FlowRuleOperations::single(true, rule("of:1", 0)), observer.clone());
        southbound.apply(FlowRuleOperations::single(true, rule("of:2", 0)), observer);

        southbound.remove_flows_by_app(&DeviceId::new("of:1"), "test-app");

        assert!(southbound.flows(&DeviceId::new("of:1")).is_empty());
        assert_eq!(southbound.flows(&DeviceId::new("of:2")).len(), 1);
        assert!(matches!(
            southbound.calls_for(&DeviceId::new("of:1")).last(),
            Some(SouthboundCall::RemoveFlowsByApp { .. })
        ));
    }
}
