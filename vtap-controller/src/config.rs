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

//! Controller configuration.
//!
//! Table ids and priorities default to the values the surrounding forwarding pipeline
//! expects. Every field can be overridden from a config file; missing fields keep their
//! defaults.

use crate::data_plane::southbound::{GroupId, TableId};
use serde::Deserialize;

pub const DEFAULT_APP_ID: &str = "org.vtap.controller";
pub const DEFAULT_GROUP_KEY_PREFIX: &str = "VTAP_GROUP_KEY";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VtapConfig {
    /// Owner id stamped on every flow and group this controller programs
    pub app_id: String,
    /// Prefix of the group key; the group id is appended
    pub group_key_prefix: String,
    pub priorities: RulePriorities,
    pub tables: PipelineTables,
}

impl Default for VtapConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            group_key_prefix: DEFAULT_GROUP_KEY_PREFIX.to_string(),
            priorities: RulePriorities::default(),
            tables: PipelineTables::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RulePriorities {
    /// Per-vtap filter rule
    pub filter: u32,
    /// Mirror table rule once an output port is set
    pub mirror_output: u32,
    /// Mirror table rule without an output port
    pub drop: u32,
}

impl Default for RulePriorities {
    fn default() -> Self {
        Self {
            filter: 50000,
            mirror_output: 1000,
            drop: 0,
        }
    }
}

/// Table and group ids of the three mirror paths.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineTables {
    pub inbound_table: TableId,
    pub inbound_mirror_table: TableId,
    pub inbound_group: GroupId,
    pub inbound_next_table: TableId,

    pub flat_outbound_table: TableId,
    pub flat_outbound_mirror_table: TableId,
    pub flat_outbound_group: GroupId,
    pub flat_outbound_next_table: TableId,

    pub outbound_table: TableId,
    pub outbound_mirror_table: TableId,
    pub outbound_group: GroupId,
    pub outbound_next_table: TableId,

    /// When set, filter rules transition to this table instead of redirecting to the group
    pub filter_transition_table: Option<TableId>,
}

impl Default for PipelineTables {
    fn default() -> Self {
        Self {
            inbound_table: TableId(1),
            inbound_mirror_table: TableId(2),
            inbound_group: GroupId(1),
            inbound_next_table: TableId(5),

            flat_outbound_table: TableId(11),
            flat_outbound_mirror_table: TableId(12),
            flat_outbound_group: GroupId(2),
            flat_outbound_next_table: TableId(20),

            outbound_table: TableId(71),
            outbound_mirror_table: TableId(72),
            outbound_group: GroupId(3),
            outbound_next_table: TableId(80),

            filter_transition_table: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VtapConfig;
    use crate::data_plane::southbound::{GroupId, TableId};

    #[test]
    fn partial_config_keeps_defaults() {
        let config: VtapConfig = serde_json::from_str(
            r#"{ "app_id": "org.example.vtap", "tables": { "outbound_next_table": 90 } }"#,
        )
        .expect("valid config");

        assert_eq!(config.app_id, "org.example.vtap");
        assert_eq!(config.tables.outbound_next_table, TableId(90));
        assert_eq!(config.tables.inbound_group, GroupId(1));
        assert_eq!(config.priorities.filter, 50000);
        assert_eq!(config.group_key_prefix, "VTAP_GROUP_KEY");
    }
}
