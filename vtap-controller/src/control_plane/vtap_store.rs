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

//! Desired-state store contract and an in-process implementation.

use crate::error::{VtapError, VtapResult};
use crate::model::definition::{VtapDefinition, VtapEvent, VtapId};
use crate::model::direction::{Facet, VtapDirection};
use crate::model::topology::DeviceId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

const COMPONENT: &str = "vtap_store";

/// Receives every change the store commits, after the commit.
pub trait VtapStoreDelegate: Send + Sync {
    fn notify(&self, event: VtapEvent);
}

/// Source of truth for vtap definitions.
///
/// Unknown ids are not errors: `update` and `remove` return `Ok(None)`.
#[async_trait]
pub trait VtapStore: Send + Sync {
    /// Stores a new definition. Fails if the id is already taken.
    async fn create(&self, definition: VtapDefinition) -> VtapResult<VtapDefinition>;

    /// Replaces an existing definition. No event is emitted when nothing changed.
    async fn update(&self, definition: VtapDefinition) -> VtapResult<Option<VtapDefinition>>;

    async fn remove(&self, id: VtapId) -> VtapResult<Option<VtapDefinition>>;

    async fn get(&self, id: VtapId) -> VtapResult<Option<VtapDefinition>>;

    /// Definitions whose direction contains `direction`.
    async fn vtaps(&self, direction: VtapDirection) -> VtapResult<Vec<VtapDefinition>>;

    /// Definitions whose TX set (if `direction` contains TX) or RX set (if it contains RX)
    /// holds `device_id`.
    async fn vtaps_by_device(
        &self,
        direction: VtapDirection,
        device_id: &DeviceId,
    ) -> VtapResult<Vec<VtapDefinition>>;

    async fn count(&self, direction: VtapDirection) -> VtapResult<usize>;

    fn set_delegate(&self, delegate: Arc<dyn VtapStoreDelegate>);

    fn unset_delegate(&self);
}

pub(crate) fn selected_by_device(
    definition: &VtapDefinition,
    direction: VtapDirection,
    device_id: &DeviceId,
) -> bool {
    direction
        .facets()
        .any(|facet: Facet| definition.device_ids(facet).contains(device_id))
}

#[derive(Default)]
pub struct InMemoryVtapStore {
    definitions: RwLock<HashMap<VtapId, VtapDefinition>>,
    delegate: RwLock<Option<Arc<dyn VtapStoreDelegate>>>,
}

impl InMemoryVtapStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn post(&self, event: VtapEvent) {
        let delegate = self
            .delegate
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match delegate {
            Some(delegate) => delegate.notify(event),
            None => debug!(
                component = COMPONENT,
                vtap_id = %event.subject.id(),
                kind = %event.kind,
                "no delegate registered; store event not forwarded"
            ),
        }
    }

    fn select(&self, filter: impl Fn(&VtapDefinition) -> bool) -> VtapResult<Vec<VtapDefinition>> {
        let definitions = self
            .definitions
            .read()
            .map_err(|err| VtapError::Store(err.to_string()))?;
        Ok(definitions
            .values()
            .filter(|definition| filter(definition))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VtapStore for InMemoryVtapStore {
    async fn create(&self, definition: VtapDefinition) -> VtapResult<VtapDefinition> {
        {
            let mut definitions = self
                .definitions
                .write()
                .map_err(|err| VtapError::Store(err.to_string()))?;
            if definitions.contains_key(&definition.id()) {
                return Err(VtapError::Store(format!(
                    "vtap {} already exists",
                    definition.id()
                )));
            }
            definitions.insert(definition.id(), definition.clone());
        }
        self.post(VtapEvent::added(definition.clone()));
        Ok(definition)
    }

    async fn update(&self, definition: VtapDefinition) -> VtapResult<Option<VtapDefinition>> {
        let previous = {
            let mut definitions = self
                .definitions
                .write()
                .map_err(|err| VtapError::Store(err.to_string()))?;
            match definitions.get_mut(&definition.id()) {
                None => return Ok(None),
                Some(current) if *current == definition => return Ok(Some(definition)),
                Some(current) => std::mem::replace(current, definition.clone()),
            }
        };
        self.post(VtapEvent::updated(definition.clone(), previous));
        Ok(Some(definition))
    }

    async fn remove(&self, id: VtapId) -> VtapResult<Option<VtapDefinition>> {
        let removed = self
            .definitions
            .write()
            .map_err(|err| VtapError::Store(err.to_string()))?
            .remove(&id);
        if let Some(removed) = &removed {
            self.post(VtapEvent::removed(removed.clone()));
        }
        Ok(removed)
    }

    async fn get(&self, id: VtapId) -> VtapResult<Option<VtapDefinition>> {
        Ok(self
            .definitions
            .read()
            .map_err(|err| VtapError::Store(err.to_string()))?
            .get(&id)
            .cloned())
    }

    async fn vtaps(&self, direction: VtapDirection) -> VtapResult<Vec<VtapDefinition>> {
        self.select(|definition| definition.direction().contains(direction))
    }

    async fn vtaps_by_device(
        &self,
        direction: VtapDirection,
        device_id: &DeviceId,
    ) -> VtapResult<Vec<VtapDefinition>> {
        self.select(|definition| selected_by_device(definition, direction, device_id))
    }

    async fn count(&self, direction: VtapDirection) -> VtapResult<usize> {
        Ok(self.vtaps(direction).await?.len())
    }

    fn set_delegate(&self, delegate: Arc<dyn VtapStoreDelegate>) {
        *self
            .delegate
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(delegate);
    }

    fn unset_delegate(&self) {
        *self
            .delegate
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
