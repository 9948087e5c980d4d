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

//! Logical record of what has been programmed on one device.

use crate::config::PipelineTables;
use crate::data_plane::southbound::{GroupBucket, GroupId, TableId};
use crate::model::definition::VtapId;
use crate::model::direction::Facet;
use crate::model::topology::{PortNumber, VlanId};
use std::collections::{BTreeMap, BTreeSet};

/// One of the three filter -> group -> mirror chains of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MirrorPath {
    Inbound,
    FlatOutbound,
    Outbound,
}

impl MirrorPath {
    pub const ALL: [MirrorPath; 3] = [
        MirrorPath::Inbound,
        MirrorPath::FlatOutbound,
        MirrorPath::Outbound,
    ];

    /// TX mirroring taps the inbound chain, RX taps both outbound chains.
    pub fn for_facet(facet: Facet) -> &'static [MirrorPath] {
        match facet {
            Facet::Tx => &[MirrorPath::Inbound],
            Facet::Rx => &[MirrorPath::FlatOutbound, MirrorPath::Outbound],
        }
    }

    pub fn tables(self, tables: &PipelineTables) -> PathTables {
        match self {
            MirrorPath::Inbound => PathTables {
                filter_table: tables.inbound_table,
                mirror_table: tables.inbound_mirror_table,
                group: tables.inbound_group,
                next_table: tables.inbound_next_table,
            },
            MirrorPath::FlatOutbound => PathTables {
                filter_table: tables.flat_outbound_table,
                mirror_table: tables.flat_outbound_mirror_table,
                group: tables.flat_outbound_group,
                next_table: tables.flat_outbound_next_table,
            },
            MirrorPath::Outbound => PathTables {
                filter_table: tables.outbound_table,
                mirror_table: tables.outbound_mirror_table,
                group: tables.outbound_group,
                next_table: tables.outbound_next_table,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathTables {
    pub filter_table: TableId,
    pub mirror_table: TableId,
    pub group: GroupId,
    /// Table of the regular forwarding pipeline that the group resubmits to
    pub next_table: TableId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Unknown,
    PipelineBuilt,
    FiltersInstalled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MirrorOutput {
    pub port: Option<PortNumber>,
    pub vlan: Option<VlanId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DevicePipelineState {
    built: bool,
    mirror_tables: BTreeSet<TableId>,
    groups: BTreeMap<GroupId, Vec<GroupBucket>>,
    filters: BTreeSet<(VtapId, Facet)>,
    mirror_outputs: BTreeMap<MirrorPath, MirrorOutput>,
}

impl DevicePipelineState {
    pub fn stage(&self) -> PipelineStage {
        match (self.built, self.filters.is_empty()) {
            (false, _) => PipelineStage::Unknown,
            (true, true) => PipelineStage::PipelineBuilt,
            (true, false) => PipelineStage::FiltersInstalled,
        }
    }

    pub fn mirror_tables(&self) -> &BTreeSet<TableId> {
        &self.mirror_tables
    }

    pub fn groups(&self) -> &BTreeMap<GroupId, Vec<GroupBucket>> {
        &self.groups
    }

    pub fn filters(&self) -> &BTreeSet<(VtapId, Facet)> {
        &self.filters
    }

    pub fn mirror_outputs(&self) -> &BTreeMap<MirrorPath, MirrorOutput> {
        &self.mirror_outputs
    }

    pub fn has_filter(&self, vtap_id: VtapId, facet: Facet) -> bool {
        self.filters.contains(&(vtap_id, facet))
    }

    /// Forgets tables, groups and filters ahead of a rebuild. Mirror outputs are operator
    /// configuration and survive.
    pub(crate) fn begin_rebuild(&mut self) {
        self.built = false;
        self.mirror_tables.clear();
        self.groups.clear();
        self.filters.clear();
    }

    pub(crate) fn finish_rebuild(&mut self) {
        self.built = true;
    }

    pub(crate) fn record_mirror_table(&mut self, table: TableId) {
        self.mirror_tables.insert(table);
    }

    pub(crate) fn record_group(&mut self, group: GroupId, buckets: Vec<GroupBucket>) {
        self.groups.insert(group, buckets);
    }

    pub(crate) fn record_mirror_output(&mut self, path: MirrorPath, output: MirrorOutput) {
        self.mirror_outputs.insert(path, output);
    }

    pub(crate) fn record_filter(&mut self, vtap_id: VtapId, facet: Facet, install: bool) -> bool {
        if install {
            self.filters.insert((vtap_id, facet))
        } else {
            self.filters.remove(&(vtap_id, facet))
        }
    }
}
