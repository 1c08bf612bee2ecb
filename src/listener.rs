use parking_lot::RwLock;
use std::sync::Arc;

/// Observer of container mutations. All methods default to no-ops so
/// implementors override only what they consume.
///
/// Callbacks are invoked outside the container's lock; implementations may
/// call back into the container.
pub trait ContainerListener: Send + Sync {
    /// Rows `begin..=end` of the filtered projection changed in place.
    fn rows_changed(&self, _begin: usize, _end: usize) {}

    /// Rows `begin..=end` were inserted into the filtered projection.
    fn rows_inserted(&self, _begin: usize, _end: usize) {}

    /// Rows `begin..=end` were removed from the filtered projection.
    fn rows_removed(&self, _begin: usize, _end: usize) {}

    /// A single filtered row was mutated.
    fn row_updated(&self, _index: usize) {}

    fn count_changed(&self, _filtered: usize, _total: usize) {}

    /// A previously-unseen property key became a column.
    fn column_added(&self, _index: usize, _key: &str, _sample: &str) {}

    fn refilter_started(&self) {}

    fn refilter_finished(&self) {}

    /// The cyclic flag flipped; a store migration is about to run.
    fn mode_changed(&self, _cyclic: bool) {}

    fn migration_progress(&self, _done: usize, _total: usize) {}

    /// Both sequences were dropped and the id counter reset.
    fn reset(&self) {}
}

/// Per-container listener registry. Owned by the container instance; there
/// is no process-wide registry.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ContainerListener>>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Arc<dyn ContainerListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn remove(&self, listener: &Arc<dyn ContainerListener>) {
        self.listeners
            .write()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Snapshots the registry, then invokes `f` on each listener without
    /// holding the registry lock.
    pub(crate) fn emit(&self, f: impl Fn(&dyn ContainerListener)) {
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }
}
