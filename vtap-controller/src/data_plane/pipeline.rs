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

//! Per-device pipeline programming.
//!
//! Each device carries three chains (inbound, flat-outbound, outbound). A chain is a
//! filter table whose vtap rules redirect to an ALL group; the group resubmits the packet
//! both to the regular next table and to the chain's mirror table, whose single rule pushes
//! an optional VLAN and outputs to the monitoring port (or drops when none is set).

use crate::config::VtapConfig;
use crate::data_plane::apply_observer::LoggingApplyObserver;
use crate::data_plane::pipeline_state::{DevicePipelineState, MirrorOutput, MirrorPath};
use crate::data_plane::southbound::{
    ApplyObserver, FlowAction, FlowRule, FlowRuleOperations, FlowSelector, GroupBucket,
    GroupDescription, GroupId, GroupKey, GroupType, SouthboundAdapter, TableId, ETH_TYPE_IPV4,
};
use crate::error::{VtapError, VtapResult};
use crate::model::criterion::{IpProtocol, VtapCriterion};
use crate::model::definition::VtapId;
use crate::model::direction::{Facet, VtapDirection};
use crate::model::topology::{DeviceId, PortNumber, VlanId};
use crate::observability::events;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const COMPONENT: &str = "pipeline";

pub struct PipelineProgrammer {
    config: Arc<VtapConfig>,
    southbound: Arc<dyn SouthboundAdapter>,
    observer: Arc<dyn ApplyObserver>,
    devices: HashMap<DeviceId, DevicePipelineState>,
}

impl PipelineProgrammer {
    pub fn new(config: Arc<VtapConfig>, southbound: Arc<dyn SouthboundAdapter>) -> Self {
        Self {
            config,
            southbound,
            observer: Arc::new(LoggingApplyObserver),
            devices: HashMap::new(),
        }
    }

    pub fn state(&self, device_id: &DeviceId) -> Option<&DevicePipelineState> {
        self.devices.get(device_id)
    }

    fn group_key(&self, group: GroupId) -> GroupKey {
        GroupKey(format!("{}{}", self.config.group_key_prefix, group.0))
    }

    /// Clears this controller's flows and groups on one device. Other devices are untouched.
    fn clear_device(&self, device_id: &DeviceId) {
        let app_id = self.config.app_id.as_str();
        self.southbound.remove_flows_by_app(device_id, app_id);
        for path in MirrorPath::ALL {
            let group = path.tables(&self.config.tables).group;
            self.southbound
                .remove_group(device_id, &self.group_key(group), app_id);
        }
        info!(
            event = events::PIPELINE_CLEAR,
            component = COMPONENT,
            device_id = %device_id,
            "vtap rules cleared on device"
        );
    }

    /// Establishes the mirror tables and groups on a device, replacing whatever this
    /// controller programmed there before. Running it twice yields the same device state.
    pub fn build_pipeline(&mut self, device_id: &DeviceId) {
        self.clear_device(device_id);

        let mut state = self.devices.remove(device_id).unwrap_or_default();
        state.begin_rebuild();

        for path in MirrorPath::ALL {
            let mirror_table = path.tables(&self.config.tables).mirror_table;
            self.create_output_table(device_id, mirror_table, None, None);
            state.record_mirror_table(mirror_table);
        }

        for path in MirrorPath::ALL {
            let tables = path.tables(&self.config.tables);
            let buckets = vec![
                GroupBucket::Resubmit(tables.next_table),
                GroupBucket::Resubmit(tables.mirror_table),
            ];
            self.create_group_table(device_id, tables.group, buckets.clone());
            state.record_group(tables.group, buckets);
        }

        // Operator-set outputs outlive a rebuild.
        for (path, output) in state.mirror_outputs().clone() {
            let mirror_table = path.tables(&self.config.tables).mirror_table;
            self.create_output_table(device_id, mirror_table, output.port, output.vlan);
        }

        state.finish_rebuild();
        self.devices.insert(device_id.clone(), state);

        info!(
            event = events::PIPELINE_BUILT,
            component = COMPONENT,
            device_id = %device_id,
            "vtap pipeline built"
        );
    }

    /// Points the mirror table(s) of `direction` at a monitoring port, optionally tagging
    /// the copy with a VLAN.
    pub fn set_mirror_output(
        &mut self,
        device_id: &DeviceId,
        direction: VtapDirection,
        port: Option<PortNumber>,
        vlan: Option<VlanId>,
    ) -> VtapResult<()> {
        if direction.is_empty() {
            return Err(VtapError::invalid_argument(
                "mirror output needs a TX or RX direction",
            ));
        }

        for facet in direction.facets() {
            for path in MirrorPath::for_facet(facet) {
                let mirror_table = path.tables(&self.config.tables).mirror_table;
                if port.is_none() {
                    self.retract_output_rule(device_id, mirror_table);
                }
                self.create_output_table(device_id, mirror_table, port, vlan);
                self.devices
                    .entry(device_id.clone())
                    .or_default()
                    .record_mirror_output(*path, MirrorOutput { port, vlan });
            }
        }

        info!(
            event = events::MIRROR_OUTPUT_SET,
            component = COMPONENT,
            device_id = %device_id,
            direction = %direction,
            port = ?port.map(|port| port.0),
            vlan = ?vlan.map(|vlan| vlan.0),
            "mirror output set"
        );
        Ok(())
    }

    /// Installs or retracts the filter rule(s) of one vtap facet on one device.
    pub fn install_filter(
        &mut self,
        device_id: &DeviceId,
        vtap_id: VtapId,
        facet: Facet,
        criterion: &VtapCriterion,
        install: bool,
    ) -> VtapResult<()> {
        for path in MirrorPath::for_facet(facet) {
            let tables = path.tables(&self.config.tables);
            self.connect_tables(
                device_id,
                tables.filter_table,
                self.config.tables.filter_transition_table,
                Some(tables.group),
                criterion,
                self.config.priorities.filter,
                install,
            )?;
        }

        let changed = self
            .devices
            .entry(device_id.clone())
            .or_default()
            .record_filter(vtap_id, facet, install);
        if !changed {
            debug!(
                component = COMPONENT,
                device_id = %device_id,
                vtap_id = %vtap_id,
                facet = %facet,
                install,
                "filter state already matched request"
            );
        }

        debug!(
            event = if install {
                events::FILTER_INSTALL
            } else {
                events::FILTER_UNINSTALL
            },
            component = COMPONENT,
            device_id = %device_id,
            vtap_id = %vtap_id,
            facet = %facet,
            "vtap filter submitted"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn connect_tables(
        &self,
        device_id: &DeviceId,
        from_table: TableId,
        to_table: Option<TableId>,
        to_group: Option<GroupId>,
        criterion: &VtapCriterion,
        priority: u32,
        install: bool,
    ) -> VtapResult<()> {
        trace!(
            component = COMPONENT,
            device_id = %device_id,
            from_table = from_table.0,
            to_table = ?to_table.map(|table| table.0),
            to_group = ?to_group.map(|group| group.0),
            "table transition"
        );

        let action = match (to_table, to_group) {
            (Some(table), _) => FlowAction::Transition(table),
            (None, Some(group)) => FlowAction::Group(group),
            (None, None) => {
                warn!(
                    event = events::FILTER_REJECTED_NO_TARGET,
                    component = COMPONENT,
                    device_id = %device_id,
                    from_table = from_table.0,
                    "filter has neither a target table nor a target group"
                );
                return Err(VtapError::invalid_argument(
                    "filter rule needs a target table or group",
                ));
            }
        };

        let rule = FlowRule {
            device_id: device_id.clone(),
            table: from_table,
            priority,
            selector: build_selector(criterion),
            actions: vec![action],
            permanent: true,
            app_id: self.config.app_id.clone(),
        };
        self.southbound.apply(
            FlowRuleOperations::single(install, rule),
            self.observer.clone(),
        );
        Ok(())
    }

    fn create_output_table(
        &self,
        device_id: &DeviceId,
        table: TableId,
        port: Option<PortNumber>,
        vlan: Option<VlanId>,
    ) {
        let mut actions = Vec::new();
        let mut priority = self.config.priorities.drop;
        if let Some(vlan) = vlan {
            actions.push(FlowAction::PushVlan(vlan));
        }
        if let Some(port) = port {
            actions.push(FlowAction::Output(port));
            priority = self.config.priorities.mirror_output;
        }

        let rule = FlowRule {
            device_id: device_id.clone(),
            table,
            priority,
            selector: FlowSelector::default(),
            actions,
            permanent: true,
            app_id: self.config.app_id.clone(),
        };
        self.southbound
            .apply(FlowRuleOperations::single(true, rule), self.observer.clone());
    }

    /// Drops the elevated output rule so the mirror table falls back to its drop rule.
    fn retract_output_rule(&self, device_id: &DeviceId, table: TableId) {
        let rule = FlowRule {
            device_id: device_id.clone(),
            table,
            priority: self.config.priorities.mirror_output,
            selector: FlowSelector::default(),
            actions: Vec::new(),
            permanent: true,
            app_id: self.config.app_id.clone(),
        };
        self.southbound
            .apply(FlowRuleOperations::single(false, rule), self.observer.clone());
    }

    fn create_group_table(&self, device_id: &DeviceId, group: GroupId, buckets: Vec<GroupBucket>) {
        debug!(
            event = events::GROUP_ADD,
            component = COMPONENT,
            device_id = %device_id,
            group_id = group.0,
            buckets = buckets.len(),
            "adding vtap group"
        );
        self.southbound.add_group(GroupDescription {
            device_id: device_id.clone(),
            group_id: group,
            key: self.group_key(group),
            group_type: GroupType::All,
            buckets,
            app_id: self.config.app_id.clone(),
        });
    }
}

/// IPv4 match on both prefixes, plus protocol and any constrained transport ports. Criteria
/// reach here validated, so both prefixes are IPv4.
pub(crate) fn build_selector(criterion: &VtapCriterion) -> FlowSelector {
    let mut selector = FlowSelector {
        eth_type: Some(ETH_TYPE_IPV4),
        ip_src: Some(criterion.src_ip_prefix),
        ip_dst: Some(criterion.dst_ip_prefix),
        ..Default::default()
    };

    match criterion.ip_protocol {
        IpProtocol::Tcp | IpProtocol::Udp => {
            selector.ip_proto = criterion.ip_protocol.number();
            selector.src_port = criterion.src_port_constraint();
            selector.dst_port = criterion.dst_port_constraint();
        }
        IpProtocol::Icmp => {
            selector.ip_proto = criterion.ip_protocol.number();
        }
        IpProtocol::Any | IpProtocol::Other(_) => {}
    }
    selector
}

#[cfg(test)]
mod tests {
    use super::{build_selector, PipelineProgrammer};
    use crate::config::VtapConfig;
    use crate::data_plane::in_memory_southbound::{InMemorySouthbound, SouthboundCall};
    use crate::data_plane::pipeline_state::{MirrorPath, PipelineStage};
    use crate::data_plane::southbound::{
        FlowAction, FlowRuleOperation, GroupBucket, GroupId, TableId, ETH_TYPE_IPV4,
    };
    use crate::model::criterion::{IpPrefix, IpProtocol, VtapCriterion};
    use crate::model::definition::VtapId;
    use crate::model::direction::{Facet, VtapDirection};
    use crate::model::topology::{DeviceId, PortNumber, VlanId};
    use std::sync::Arc;

    fn programmer() -> (PipelineProgrammer, Arc<InMemorySouthbound>) {
        let southbound = Arc::new(InMemorySouthbound::new());
        (
            PipelineProgrammer::new(Arc::new(VtapConfig::default()), southbound.clone()),
            southbound,
        )
    }

    fn criterion(protocol: IpProtocol) -> VtapCriterion {
        VtapCriterion::new(
            "10.0.0.0/24".parse().expect("valid prefix"),
            "10.0.1.0/24".parse().expect("valid prefix"),
            protocol,
        )
    }

    #[test]
    fn build_creates_three_mirror_tables_and_three_groups() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");

        programmer.build_pipeline(&device);

        let flows = southbound.flows(&device);
        assert_eq!(flows.len(), 3);
        assert!(flows.iter().all(|flow| flow.priority == 0 && flow.actions.is_empty()));

        let groups = southbound.groups(&device);
        assert_eq!(groups.len(), 3);
        let inbound = groups
            .iter()
            .find(|group| group.group_id == GroupId(1))
            .expect("inbound group");
        assert_eq!(
            inbound.buckets,
            vec![
                GroupBucket::Resubmit(TableId(5)),
                GroupBucket::Resubmit(TableId(2))
            ]
        );
        assert_eq!(inbound.key.0, "VTAP_GROUP_KEY1");

        let state = programmer.state(&device).expect("device state");
        assert_eq!(state.stage(), PipelineStage::PipelineBuilt);
        assert_eq!(state.groups().len(), 3);
    }

    #[test]
    fn build_twice_leaves_identical_device_state() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");

        programmer.build_pipeline(&device);
        let flows_once = southbound.flows(&device);
        let groups_once = southbound.groups(&device);
        let state_once = programmer.state(&device).cloned();

        programmer.build_pipeline(&device);

        assert_eq!(southbound.flows(&device), flows_once);
        assert_eq!(southbound.groups(&device), groups_once);
        assert_eq!(programmer.state(&device).cloned(), state_once);
        assert!(southbound
            .groups(&device)
            .iter()
            .all(|group| group.buckets.len() == 2));
    }

    #[test]
    fn build_only_clears_the_triggering_device() {
        let (mut programmer, southbound) = programmer();
        let first = DeviceId::new("of:1");
        let second = DeviceId::new("of:2");

        programmer.build_pipeline(&first);
        programmer.build_pipeline(&second);
        southbound.clear_calls();

        programmer.build_pipeline(&second);

        assert!(southbound.calls_for(&first).is_empty());
        assert_eq!(southbound.flows(&first).len(), 3);
        assert_eq!(southbound.groups(&first).len(), 3);
    }

    #[test]
    fn tx_filter_redirects_inbound_table_to_inbound_group() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");
        let vtap_id = VtapId::generate();

        programmer
            .install_filter(&device, vtap_id, Facet::Tx, &criterion(IpProtocol::Any), true)
            .expect("filter accepted");

        let flows = southbound.flows(&device);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].table, TableId(1));
        assert_eq!(flows[0].priority, 50000);
        assert_eq!(flows[0].actions, vec![FlowAction::Group(GroupId(1))]);
        assert!(programmer
            .state(&device)
            .expect("device state")
            .has_filter(vtap_id, Facet::Tx));
    }

    #[test]
    fn rx_filter_installs_on_both_outbound_tables_and_uninstalls_cleanly() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");
        let vtap_id = VtapId::generate();
        let criterion = criterion(IpProtocol::Udp);

        programmer
            .install_filter(&device, vtap_id, Facet::Rx, &criterion, true)
            .expect("filter accepted");
        let tables: Vec<_> = southbound
            .flows(&device)
            .iter()
            .map(|flow| flow.table)
            .collect();
        assert_eq!(tables, vec![TableId(11), TableId(71)]);

        programmer
            .install_filter(&device, vtap_id, Facet::Rx, &criterion, false)
            .expect("filter accepted");
        assert!(southbound.flows(&device).is_empty());
        let removals = southbound
            .calls()
            .into_iter()
            .filter(|call| matches!(call, SouthboundCall::Apply(FlowRuleOperation::Remove(_))))
            .count();
        assert_eq!(removals, 2);
    }

    #[test]
    fn filter_without_target_is_rejected_before_submission() {
        let (programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");

        let result = programmer.connect_tables(
            &device,
            TableId(1),
            None,
            None,
            &criterion(IpProtocol::Any),
            50000,
            true,
        );

        assert!(result.is_err());
        assert!(southbound.calls().is_empty());
    }

    #[test]
    fn configured_transition_table_wins_over_group() {
        let southbound = Arc::new(InMemorySouthbound::new());
        let mut config = VtapConfig::default();
        config.tables.filter_transition_table = Some(TableId(40));
        let mut programmer = PipelineProgrammer::new(Arc::new(config), southbound.clone());
        let device = DeviceId::new("of:1");

        programmer
            .install_filter(
                &device,
                VtapId::generate(),
                Facet::Tx,
                &criterion(IpProtocol::Any),
                true,
            )
            .expect("filter accepted");

        assert_eq!(
            southbound.flows(&device)[0].actions,
            vec![FlowAction::Transition(TableId(40))]
        );
    }

    #[test]
    fn selector_matches_constrained_ports_for_tcp_only() {
        let tcp = build_selector(&criterion(IpProtocol::Tcp).with_ports(0, 443));
        assert_eq!(tcp.eth_type, Some(ETH_TYPE_IPV4));
        assert_eq!(tcp.ip_proto, Some(6));
        assert_eq!(tcp.src_port, None);
        assert_eq!(tcp.dst_port, Some(443));

        let icmp = build_selector(&criterion(IpProtocol::Icmp).with_ports(1, 2));
        assert_eq!(icmp.ip_proto, Some(1));
        assert_eq!(icmp.src_port, None);

        let any = build_selector(&VtapCriterion::new(
            IpPrefix::any_v4(),
            IpPrefix::any_v4(),
            IpProtocol::Other(47),
        ));
        assert_eq!(any.ip_proto, None);
    }

    #[test]
    fn rx_mirror_output_programs_both_outbound_mirror_tables() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");

        programmer
            .set_mirror_output(&device, VtapDirection::RX, Some(PortNumber(7)), Some(VlanId(100)))
            .expect("mirror output set");

        let flows = southbound.flows(&device);
        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|flow| flow.priority == 1000
            && flow.actions
                == vec![FlowAction::PushVlan(VlanId(100)), FlowAction::Output(PortNumber(7))]));
        assert!(flows.iter().any(|flow| flow.table == TableId(12)));
        assert!(flows.iter().any(|flow| flow.table == TableId(72)));
    }

    #[test]
    fn mirror_output_survives_rebuild() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");
        programmer.build_pipeline(&device);
        programmer
            .set_mirror_output(&device, VtapDirection::TX, Some(PortNumber(3)), None)
            .expect("mirror output set");

        programmer.build_pipeline(&device);

        assert!(southbound.flows(&device).iter().any(|flow| flow.table == TableId(2)
            && flow.priority == 1000
            && flow.actions == vec![FlowAction::Output(PortNumber(3))]));
    }

    #[test]
    fn clearing_mirror_port_falls_back_to_drop() {
        let (mut programmer, southbound) = programmer();
        let device = DeviceId::new("of:1");
        programmer.build_pipeline(&device);
        programmer
            .set_mirror_output(&device, VtapDirection::TX, Some(PortNumber(7)), None)
            .expect("mirror output set");

        programmer
            .set_mirror_output(&device, VtapDirection::TX, None, None)
            .expect("mirror output cleared");

        let mirror_rules: Vec<_> = southbound
            .flows(&device)
            .into_iter()
            .filter(|flow| flow.table == TableId(2))
            .collect();
        assert_eq!(mirror_rules.len(), 1);
        assert_eq!(mirror_rules[0].priority, 0);
        assert!(mirror_rules
            .iter()
            .all(|flow| !flow.actions.iter().any(|action| matches!(action, FlowAction::Output(_)))));
        let state = programmer.state(&device).expect("device state");
        assert_eq!(state.mirror_outputs()[&MirrorPath::Inbound].port, None);
    }

    #[test]
    fn empty_direction_is_rejected_for_mirror_output() {
        let (mut programmer, _southbound) = programmer();

        assert!(programmer
            .set_mirror_output(&DeviceId::new("of:1"), VtapDirection::NONE, None, None)
            .is_err());
    }
}
