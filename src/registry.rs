//! Capability registry.
//!
//! Built once from the assembled runner list. For every [`Capability`] it
//! pre-computes the ordered list of runners declaring that capability, so
//! building a verb's command tree only visits the runners that can serve it.
//! Lookups hand out fresh `Vec`s; the registry itself is never mutated
//! after construction.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::runner::{Capability, Runner};

pub struct Registry {
    runners: Vec<Arc<dyn Runner>>,
    by_capability: BTreeMap<Capability, Vec<Arc<dyn Runner>>>,
}

impl Registry {
    pub fn new(runners: Vec<Arc<dyn Runner>>) -> Self {
        let mut by_capability: BTreeMap<Capability, Vec<Arc<dyn Runner>>> = Capability::ALL
            .iter()
            .map(|c| (*c, Vec::new()))
            .collect();

        for runner in &runners {
            for capability in runner.capabilities() {
                by_capability
                    .entry(capability)
                    .or_default()
                    .push(Arc::clone(runner));
            }
        }

        Self {
            runners,
            by_capability,
        }
    }

    /// All runners, in registration order.
    pub fn runners(&self) -> Vec<Arc<dyn Runner>> {
        self.runners.clone()
    }

    /// Runners that declare `capability`, in registration order.
    pub fn with_capability(&self, capability: Capability) -> Vec<Arc<dyn Runner>> {
        self.by_capability
            .get(&capability)
            .cloned()
            .unwrap_or_default()
    }
}
