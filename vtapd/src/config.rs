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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use vtap_controller::{
    ClusterView, DeviceId, HostRecord, PortNumber, VlanId, VtapConfig, VtapCriterion,
    VtapDirection,
};

/// Daemon configuration file.
#[derive(Debug, Deserialize)]
pub(crate) struct DaemonConfig {
    pub(crate) node_id: String,
    /// Cluster roles; a single-node cluster when absent.
    #[serde(default)]
    pub(crate) cluster: Option<ClusterView>,
    #[serde(default)]
    pub(crate) controller: VtapConfig,
    #[serde(default)]
    pub(crate) hosts: Vec<HostRecord>,
    #[serde(default)]
    pub(crate) devices: Vec<DeviceId>,
    #[serde(default)]
    pub(crate) vtaps: Vec<VtapSeed>,
    #[serde(default)]
    pub(crate) mirror_outputs: Vec<MirrorOutputSeed>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VtapSeed {
    pub(crate) direction: VtapDirection,
    pub(crate) criterion: VtapCriterion,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MirrorOutputSeed {
    pub(crate) device_id: DeviceId,
    pub(crate) direction: VtapDirection,
    pub(crate) port: Option<PortNumber>,
    #[serde(default)]
    pub(crate) vlan: Option<VlanId>,
}

impl DaemonConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        json5::from_str(&raw)
            .with_context(|| format!("unable to parse config file {}", path.display()))
    }
}
