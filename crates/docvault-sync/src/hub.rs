//! Registry of presentation surfaces
//!
//! Each registered surface gets its own reconciler and a server-side mirror. Every
//! non-empty refresh is published as a `PatchBatch` so subscribers can apply the same
//! operations to their own copy.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::feed::ListSource;
use crate::patch::{PatchOp, Trackable};
use crate::reconciler::Reconciler;
use crate::surface::VecSurface;

const CHANNEL_CAPACITY: usize = 512;

/// Operations produced by one refresh of one surface
#[derive(Debug, Clone, Serialize)]
pub struct PatchBatch<T> {
    /// Monotonically increasing across the hub.
    pub sequence: u64,
    pub surface: String,
    pub ops: Vec<PatchOp<T>>,
}

struct Registered<T> {
    reconciler: Reconciler<T>,
    mirror: VecSurface<T>,
}

struct HubState<T> {
    surfaces: HashMap<String, Registered<T>>,
    next_sequence: u64,
}

/// Keeps registered surfaces in step with their sources
pub struct SyncHub<T> {
    state: RwLock<HubState<T>>,
    tx: broadcast::Sender<PatchBatch<T>>,
}

impl<T: Trackable + Send + Sync + 'static> Default for SyncHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Trackable + Send + Sync + 'static> SyncHub<T> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(HubState {
                surfaces: HashMap::new(),
                next_sequence: 1,
            }),
            tx,
        }
    }

    /// Register a surface. Returns false if the name is already taken.
    pub async fn register(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        if state.surfaces.contains_key(name) {
            warn!(surface = %name, "Surface already registered, rejecting register");
            return false;
        }
        state.surfaces.insert(
            name.to_string(),
            Registered {
                reconciler: Reconciler::new(),
                mirror: VecSurface::new(),
            },
        );
        info!(surface = %name, "Surface registered");
        true
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.state.write().await.surfaces.remove(name).is_some();
        if removed {
            info!(surface = %name, "Surface unregistered");
        }
        removed
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.state.read().await.surfaces.contains_key(name)
    }

    /// Receive every batch published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PatchBatch<T>> {
        self.tx.subscribe()
    }

    /// Reconcile `name` against `fresh` and publish the resulting operations.
    ///
    /// Returns the number of operations, or `None` for an unknown surface. Nothing is
    /// published when the surface is already up to date.
    pub async fn refresh(&self, name: &str, fresh: &[T]) -> Option<usize> {
        let mut state = self.state.write().await;
        let registered = state.surfaces.get_mut(name)?;
        let ops = registered
            .reconciler
            .reconcile(fresh, &mut registered.mirror);
        let count = ops.len();
        if ops.is_empty() {
            return Some(0);
        }

        let sequence = state.next_sequence;
        state.next_sequence = sequence.saturating_add(1);
        tracing::debug!(surface = %name, sequence, ops = count, "Publishing patch batch");

        // No receivers is not an error; the mirror is still current.
        let _ = self.tx.send(PatchBatch {
            sequence,
            surface: name.to_string(),
            ops,
        });
        Some(count)
    }

    /// Fetch from `source` and refresh `name` with the result.
    pub async fn refresh_from(&self, name: &str, source: &dyn ListSource<T>) -> Option<usize> {
        if !self.is_registered(name).await {
            return None;
        }
        let fresh = source.fetch().await;
        self.refresh(name, &fresh).await
    }

    /// Current contents of the mirror for `name`.
    pub async fn snapshot(&self, name: &str) -> Option<Vec<T>> {
        self.state
            .read()
            .await
            .surfaces
            .get(name)
            .map(|r| r.mirror.items().to_vec())
    }
}
