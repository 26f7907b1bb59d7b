//! The update validation pipeline.
//!
//! Every proposed update runs through an ordered chain of transforms and then
//! an ordered chain of guards — see [`warehouse_core::guard`] for the seam
//! traits. Both chains are mutable at runtime without recreating the cache:
//! registration returns an id, removal takes it back.
//!
//! Evaluation is deterministic and side-effect-free: transforms run in
//! registration order, each output feeding the next transform's input while
//! the original pre-update value stays constant; guards then run in
//! registration order against the fully transformed value, and the first
//! denial short-circuits the rest.

use std::sync::{Arc, Mutex};

use tracing::trace;
use warehouse_core::{Change, Document, DocKey, Guard, Transform, UpdateSource, Verdict};

/// Handle to a registered transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformId(u64);

/// Handle to a registered guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardId(u64);

/// Outcome of running a proposed update through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineVerdict {
    /// The update may proceed with the transformed value.
    Allow(Document),
    /// A guard denied the update.
    Deny,
}

#[derive(Default)]
struct Chains {
    transforms: Vec<(TransformId, Arc<dyn Transform>)>,
    guards: Vec<(GuardId, Arc<dyn Guard>)>,
    next_id: u64,
}

impl Chains {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Ordered, runtime-mutable transform and guard chains.
#[derive(Default)]
pub struct Pipeline {
    chains: Mutex<Chains>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chains = self.lock();
        f.debug_struct("Pipeline")
            .field("transforms", &chains.transforms.len())
            .field("guards", &chains.guards.len())
            .finish()
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Pipeline::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Chains> {
        self.chains.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a transform to the chain; runs after all earlier transforms.
    pub fn add_transform(&self, transform: impl Transform + 'static) -> TransformId {
        let mut chains = self.lock();
        let id = TransformId(chains.next_id());
        chains.transforms.push((id, Arc::new(transform)));
        id
    }

    /// Removes a transform by id. Returns whether it was present.
    pub fn remove_transform(&self, id: TransformId) -> bool {
        let mut chains = self.lock();
        let before = chains.transforms.len();
        chains.transforms.retain(|(tid, _)| *tid != id);
        chains.transforms.len() != before
    }

    /// Appends a guard to the chain; checked after all earlier guards.
    pub fn add_guard(&self, guard: impl Guard + 'static) -> GuardId {
        let mut chains = self.lock();
        let id = GuardId(chains.next_id());
        chains.guards.push((id, Arc::new(guard)));
        id
    }

    /// Removes a guard by id. Returns whether it was present.
    pub fn remove_guard(&self, id: GuardId) -> bool {
        let mut chains = self.lock();
        let before = chains.guards.len();
        chains.guards.retain(|(gid, _)| *gid != id);
        chains.guards.len() != before
    }

    /// Runs a proposed update through both chains.
    ///
    /// The chains are snapshotted up front, so guards and transforms may
    /// safely mutate the pipeline itself.
    pub fn evaluate(
        &self,
        key: &DocKey,
        old: Option<&Document>,
        proposed: Document,
        source: &UpdateSource,
    ) -> PipelineVerdict {
        let (transforms, guards) = {
            let chains = self.lock();
            (
                chains
                    .transforms
                    .iter()
                    .map(|(_, t)| Arc::clone(t))
                    .collect::<Vec<_>>(),
                chains
                    .guards
                    .iter()
                    .map(|(_, g)| Arc::clone(g))
                    .collect::<Vec<_>>(),
            )
        };

        let mut value = proposed;
        for transform in &transforms {
            let change = Change {
                key,
                old,
                new: &value,
                source,
            };
            value = transform.apply(&change);
        }

        let change = Change {
            key,
            old,
            new: &value,
            source,
        };
        for guard in &guards {
            if guard.check(&change) == Verdict::Deny {
                trace!(%key, "update denied by guard");
                return PipelineVerdict::Deny;
            }
        }
        PipelineVerdict::Allow(value)
    }
}
