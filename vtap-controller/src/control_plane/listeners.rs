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

use crate::model::definition::VtapEvent;
use std::sync::{Arc, RwLock};
use tracing::trace;

const COMPONENT: &str = "listeners";

/// Observer of committed vtap changes.
pub trait VtapListener: Send + Sync {
    fn event(&self, event: &VtapEvent);
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn VtapListener>>>,
}

impl ListenerRegistry {
    /// Adding the same listener twice is a no-op.
    pub(crate) fn add(&self, listener: Arc<dyn VtapListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if listeners
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &listener))
        {
            return false;
        }
        listeners.push(listener);
        true
    }

    pub(crate) fn remove(&self, listener: &Arc<dyn VtapListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    pub(crate) fn post(&self, event: &VtapEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        trace!(
            component = COMPONENT,
            vtap_id = %event.subject.id(),
            kind = %event.kind,
            listeners = listeners.len(),
            "posting vtap event"
        );
        for listener in listeners {
            listener.event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ListenerRegistry, VtapListener};
    use crate::model::criterion::{IpPrefix, IpProtocol, VtapCriterion};
    use crate::model::definition::{VtapDefinition, VtapEvent, VtapId};
    use crate::model::direction::VtapDirection;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingListener {
        seen: AtomicUsize,
    }

    impl VtapListener for CountingListener {
        fn event(&self, _event: &VtapEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn removed_listener_stops_receiving_events() {
        let registry = ListenerRegistry::default();
        let counting = Arc::new(CountingListener::default());
        let listener: Arc<dyn VtapListener> = counting.clone();
        let event = VtapEvent::added(VtapDefinition::new(
            VtapId::generate(),
            VtapDirection::TX,
            VtapCriterion::new(IpPrefix::any_v4(), IpPrefix::any_v4(), IpProtocol::Any),
            BTreeSet::new(),
            BTreeSet::new(),
        ));

        assert!(registry.add(listener.clone()));
        assert!(!registry.add(listener.clone()));
        registry.post(&event);
        assert!(registry.remove(&listener));
        registry.post(&event);

        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }
}
