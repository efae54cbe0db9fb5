//! Incremental list reconciliation
//!
//! Given the authoritative list and what a surface currently shows, produce the ordered
//! edits that bring the surface up to date:
//!
//! 1. removals, in descending position order, so no pending removal's position shifts
//! 2. modifications, in place, at their position after the removals
//! 3. additions, appended in authoritative order
//!
//! The key to position index is rebuilt from the surface after any removal. When keys
//! cannot be trusted (missing, duplicated, or out of step with the surface) the whole
//! surface is reset instead.

use std::collections::{HashMap, HashSet};

use crate::patch::{PatchOp, Trackable};
use crate::surface::PresentationSurface;

#[derive(Debug, Clone)]
struct Tracked<T> {
    snapshot: T,
    position: usize,
}

/// Per-surface reconciliation state
#[derive(Debug, Clone)]
pub struct Reconciler<T> {
    tracked: HashMap<String, Tracked<T>>,
}

impl<T> Default for Reconciler<T> {
    fn default() -> Self {
        Self {
            tracked: HashMap::new(),
        }
    }
}

impl<T: Trackable> Reconciler<T> {
    /// Reconciler for an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded position of `key`.
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.tracked.get(key).map(|t| t.position)
    }

    /// Bring `surface` in line with `fresh`, returning the operations applied in order.
    pub fn reconcile<S>(&mut self, fresh: &[T], surface: &mut S) -> Vec<PatchOp<T>>
    where
        S: PresentationSurface<T>,
    {
        let Some(fresh_keys) = unique_keys(fresh) else {
            tracing::debug!(items = fresh.len(), "Unusable keys in fresh list, resetting surface");
            return self.reset(fresh, surface);
        };
        if !self.in_step_with(surface) {
            tracing::warn!("Surface drifted from reconciler index, resetting surface");
            return self.reset(fresh, surface);
        }

        let fresh_set: HashSet<&str> = fresh_keys.iter().map(String::as_str).collect();

        let mut removed: Vec<(String, usize)> = self
            .tracked
            .iter()
            .filter(|(key, _)| !fresh_set.contains(key.as_str()))
            .map(|(key, t)| (key.clone(), t.position))
            .collect();
        removed.sort_by(|a, b| b.1.cmp(&a.1));

        let mut modified: Vec<(usize, &T)> = Vec::new();
        let mut added: Vec<(&String, &T)> = Vec::new();
        for (key, item) in fresh_keys.iter().zip(fresh) {
            match self.tracked.get(key) {
                Some(tracked) if tracked.snapshot != *item => modified.push((tracked.position, item)),
                Some(_) => {}
                None => added.push((key, item)),
            }
        }
        modified.sort_by_key(|(position, _)| *position);

        let mut ops = Vec::with_capacity(removed.len() + modified.len() + added.len());

        for (key, position) in &removed {
            surface.remove(*position);
            self.tracked.remove(key);
            ops.push(PatchOp::Remove {
                key: key.clone(),
                position: *position,
            });
        }

        for (recorded, item) in modified {
            let shift = removed.iter().filter(|(_, p)| *p < recorded).count();
            let position = recorded - shift;
            let key = item.key().unwrap_or_default();
            surface.replace(position, item.clone());
            if let Some(tracked) = self.tracked.get_mut(&key) {
                tracked.snapshot = item.clone();
            }
            ops.push(PatchOp::Update {
                key,
                position,
                item: item.clone(),
            });
        }

        for (key, item) in added {
            surface.push(item.clone());
            let position = surface.len() - 1;
            self.tracked.insert(
                key.clone(),
                Tracked {
                    snapshot: item.clone(),
                    position,
                },
            );
            ops.push(PatchOp::Insert {
                key: key.clone(),
                position,
                item: item.clone(),
            });
        }

        if !removed.is_empty() {
            self.rebuild_index(surface);
        }

        ops
    }

    /// Re-derive every tracked position by scanning the surface top to bottom.
    fn rebuild_index<S: PresentationSurface<T>>(&mut self, surface: &S) {
        for position in 0..surface.len() {
            if let Some(key) = surface.key_at(position) {
                if let Some(tracked) = self.tracked.get_mut(&key) {
                    tracked.position = position;
                }
            }
        }
    }

    fn in_step_with<S: PresentationSurface<T>>(&self, surface: &S) -> bool {
        self.tracked.len() == surface.len()
            && self
                .tracked
                .iter()
                .all(|(key, t)| surface.key_at(t.position).as_deref() == Some(key.as_str()))
    }

    fn reset<S: PresentationSurface<T>>(&mut self, fresh: &[T], surface: &mut S) -> Vec<PatchOp<T>> {
        surface.reset(fresh.to_vec());
        self.tracked.clear();
        for (position, item) in fresh.iter().enumerate() {
            if let Some(key) = item.key() {
                self.tracked.entry(key).or_insert(Tracked {
                    snapshot: item.clone(),
                    position,
                });
            }
        }
        vec![PatchOp::Reset {
            items: fresh.to_vec(),
        }]
    }
}

/// Keys of `items` in order; `None` if any is missing or repeated.
fn unique_keys<T: Trackable>(items: &[T]) -> Option<Vec<String>> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let key = item.key()?;
        if !seen.insert(key.clone()) {
            return None;
        }
        keys.push(key);
    }
    Some(keys)
}
