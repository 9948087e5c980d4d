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

//! Stable `event = ...` values attached to structured log records.

// gating
pub const HOST_EVENT_DROPPED_NOT_LEADER: &str = "host_event_dropped_not_leader";
pub const DEVICE_EVENT_DROPPED_NOT_MASTER: &str = "device_event_dropped_not_master";
pub const DEVICE_SKIPPED_NOT_MASTER: &str = "device_skipped_not_master";

// queue
pub const QUEUE_SUBMIT: &str = "queue_submit";
pub const QUEUE_SUBMIT_FAILED: &str = "queue_submit_failed";
pub const WORKER_STARTED: &str = "worker_started";
pub const WORKER_STOPPED: &str = "worker_stopped";

// reconciliation
pub const HOST_EVENT_APPLY: &str = "host_event_apply";
pub const DEVICE_ADDED_APPLY: &str = "device_added_apply";
pub const STORE_EVENT_APPLY: &str = "store_event_apply";
pub const MEMBERSHIP_CHANGED: &str = "membership_changed";
pub const MEMBERSHIP_WRITE_FAILED: &str = "membership_write_failed";
pub const STORE_READ_FAILED: &str = "store_read_failed";

// lifecycle API
pub const VTAP_CREATE: &str = "vtap_create";
pub const VTAP_UPDATE: &str = "vtap_update";
pub const VTAP_REMOVE: &str = "vtap_remove";
pub const VTAP_NOT_FOUND: &str = "vtap_not_found";

// pipeline programming
pub const PIPELINE_CLEAR: &str = "pipeline_clear";
pub const PIPELINE_BUILT: &str = "pipeline_built";
pub const MIRROR_OUTPUT_SET: &str = "mirror_output_set";
pub const FILTER_INSTALL: &str = "filter_install";
pub const FILTER_UNINSTALL: &str = "filter_uninstall";
pub const FILTER_REJECTED_NO_TARGET: &str = "filter_rejected_no_target";
pub const GROUP_ADD: &str = "group_add";

// southbound completion
pub const SOUTHBOUND_APPLY_OK: &str = "southbound_apply_ok";
pub const SOUTHBOUND_APPLY_FAILED: &str = "southbound_apply_failed";
