use crate::{
    color::{Colorizer, DefaultColorizer},
    listener::{ContainerListener, ListenerRegistry},
    ring::Backing,
    rule::{Rule, RuleListenerId},
    schema::SchemaTracker,
    sort::{self, Column},
    types::{EventId, EventRecord, EventWrapper, RowColors, Timestamp},
};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 5000;

/// The event store behind one log view.
///
/// Owns the unfiltered sequence (every accepted event, in arrival order) and
/// the filtered projection (the subsequence passing the active rule). Both
/// live under a single mutex so readers never observe them mutually
/// inconsistent. Producers call [`add`](Self::add) from their own threads;
/// mode switches migrate the backing store on a background thread.
///
/// The filtered projection holds event ids, resolved against the unfiltered
/// sequence by binary search; there is no second wrapper object per row.
pub struct EventContainer {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    schema: Mutex<SchemaTracker>,
    listeners: ListenerRegistry,
    migration_generation: AtomicU64,
}

struct Inner {
    unfiltered: Backing,
    filtered: Vec<EventId>,
    rule: Option<Arc<dyn Rule>>,
    rule_subscription: Option<RuleListenerId>,
    colorizer: Arc<dyn Colorizer>,
    next_id: EventId,
    capacity: usize,
    cyclic: bool,
    reached_capacity: bool,
    sort: Option<(Column, bool)>,
}

/// Structural notification, collected under the lock and emitted after it
/// drops so listeners may call back into the container.
#[derive(Copy, Clone, Debug)]
enum Change {
    RowsChanged(usize, usize),
    RowsInserted(usize, usize),
    RowsRemoved(usize, usize),
    RowUpdated(usize),
    CountChanged(usize, usize),
}

impl EventContainer {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, cyclic: bool, colorizer: Arc<dyn Colorizer>) -> Self {
        assert!(capacity > 0, "container capacity must be non-zero");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    unfiltered: Backing::new(cyclic, capacity),
                    filtered: Vec::new(),
                    rule: None,
                    rule_subscription: None,
                    colorizer,
                    next_id: 1,
                    capacity,
                    cyclic,
                    reached_capacity: false,
                    sort: None,
                }),
                schema: Mutex::new(SchemaTracker::new()),
                listeners: ListenerRegistry::default(),
                migration_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Cyclic container with the default colorizer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, true, Arc::new(DefaultColorizer))
    }

    pub fn add_listener(&self, listener: Arc<dyn ContainerListener>) {
        self.shared.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ContainerListener>) {
        self.shared.listeners.remove(listener);
    }

    /// Ingests one event. Returns true when the event is visible under the
    /// active rule (i.e. it entered the filtered projection).
    ///
    /// Assigns an id if the record does not carry one, resolves row colors
    /// and the search-match flag, and computes the millisecond gap to the
    /// previous displayed event. The schema check for new property keys runs
    /// after the container lock is released.
    pub fn add(&self, mut record: EventRecord) -> bool {
        let mut changes = Vec::new();
        let properties: Vec<(String, String)>;
        let visible;
        {
            let mut inner = self.shared.inner.lock();

            // Ids must be strictly increasing in arrival order so the
            // filtered projection can resolve them by binary search.
            let id = match record.id_property() {
                Some(existing) if existing >= inner.next_id => existing,
                Some(stale) => {
                    warn!(id = stale, "stale id on arriving event, reassigning");
                    record.overwrite_id(inner.next_id);
                    inner.next_id
                }
                None => {
                    record.assign_id(inner.next_id);
                    inner.next_id
                }
            };
            inner.next_id = id + 1;

            let colors = inner.colorizer.colors(&record);
            let search_match = match inner.colorizer.find_rule() {
                Some(find) => rule_passes(find.as_ref(), &record),
                None => false,
            };
            visible = match &inner.rule {
                None => true,
                Some(rule) => rule_passes(rule.as_ref(), &record),
            };

            properties = record
                .properties()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            let timestamp = record.timestamp;

            let mut wrapper = EventWrapper::new(record, id, colors);
            wrapper.set_search_match(search_match);
            wrapper.set_displayed(visible);
            if visible {
                let delta = inner
                    .filtered
                    .last()
                    .and_then(|&fid| inner.unfiltered.get_by_id(fid))
                    .map(|prev| timestamp.saturating_sub(prev.timestamp()))
                    .unwrap_or(0);
                wrapper.set_millis_delta(delta);
            }

            if let Some(evicted) = inner.unfiltered.push(wrapper) {
                inner.reached_capacity = true;
                if let Some(pos) = inner.filtered.iter().position(|&fid| fid == evicted.id()) {
                    inner.filtered.remove(pos);
                    changes.push(Change::RowsRemoved(pos, pos));
                }
            } else if inner.cyclic && inner.unfiltered.len() == inner.capacity {
                inner.reached_capacity = true;
            }

            if visible {
                inner.filtered.push(id);
                let row = inner.filtered.len() - 1;
                changes.push(Change::RowsInserted(row, row));
            }
            changes.push(Change::CountChanged(
                inner.filtered.len(),
                inner.unfiltered.len(),
            ));
        }

        // Schema growth is detected outside the container lock
        let new_columns = self
            .shared
            .schema
            .lock()
            .observe(properties.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.emit(&changes);
        for col in new_columns {
            self.shared
                .listeners
                .emit(|l| l.column_added(col.index, &col.key, &col.sample));
        }
        visible
    }

    /// Swaps the active visibility rule and re-filters. Passing `None`
    /// makes every event visible.
    ///
    /// The container unsubscribes from the previous rule's change
    /// notifications and subscribes to the new one's, so an observable rule
    /// whose criteria change later triggers another re-filter on its own.
    pub fn set_rule(&self, rule: Option<Arc<dyn Rule>>) {
        {
            let mut inner = self.shared.inner.lock();
            if let (Some(old), Some(subscription)) = (&inner.rule, inner.rule_subscription) {
                old.unsubscribe(subscription);
            }
            inner.rule_subscription = rule.as_ref().and_then(|r| {
                let weak = Arc::downgrade(&self.shared);
                r.subscribe(Arc::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        Shared::refilter(&shared);
                    }
                }))
            });
            inner.rule = rule;
        }
        Shared::refilter(&self.shared);
    }

    /// Rebuilds the filtered projection from scratch against the active
    /// rule. See [`Shared::refilter`] for the notification contract.
    pub fn refilter(&self) {
        Shared::refilter(&self.shared);
    }

    /// Scans the filtered projection for the next row matching `rule`,
    /// starting at `start` and wrapping around at the boundary. Returns
    /// `None` only when no row matches at all.
    ///
    /// The rows are snapshotted under the lock; rule evaluation happens
    /// outside it.
    pub fn locate(&self, rule: &dyn Rule, start: usize, forward: bool) -> Option<usize> {
        let records: Vec<EventRecord> = {
            let inner = self.shared.inner.lock();
            inner
                .filtered
                .iter()
                .filter_map(|&id| inner.unfiltered.get_by_id(id))
                .map(|w| w.record().clone())
                .collect()
        };
        wrap_scan(records.len(), start, forward).find(|&i| rule_passes(rule, &records[i]))
    }

    /// Same wrap-around scan as [`locate`](Self::locate), but the predicate
    /// is "row colors differ from the default pair".
    pub fn find_colored_row(&self, start: usize, forward: bool) -> Option<usize> {
        let colors: Vec<RowColors> = {
            let inner = self.shared.inner.lock();
            inner
                .filtered
                .iter()
                .filter_map(|&id| inner.unfiltered.get_by_id(id))
                .map(|w| w.colors())
                .collect()
        };
        wrap_scan(colors.len(), start, forward).find(|&i| !colors[i].is_default())
    }

    /// Re-evaluates the find rule against every event and updates each
    /// search-match flag. Returns how many displayed events match, for a
    /// "N matches" indicator. `None` clears all flags.
    ///
    /// Search matches never affect visibility.
    pub fn update_search_rule(&self, rule: Option<Arc<dyn Rule>>) -> usize {
        let (count, filtered_len) = {
            let mut inner = self.shared.inner.lock();
            let mut count = 0;
            for i in 0..inner.unfiltered.len() {
                let hit = match (&rule, inner.unfiltered.get(i)) {
                    (Some(rule), Some(w)) => rule_passes(rule.as_ref(), w.record()),
                    _ => false,
                };
                if let Some(w) = inner.unfiltered.get_mut(i) {
                    w.set_search_match(hit);
                    if hit && w.is_displayed() {
                        count += 1;
                    }
                }
            }
            (count, inner.filtered.len())
        };
        if filtered_len > 0 {
            self.emit(&[Change::RowsChanged(0, filtered_len - 1)]);
        }
        count
    }

    /// Drops both sequences and resets the id counter and the
    /// capacity-reached flag.
    pub fn clear(&self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.unfiltered.clear();
            inner.filtered.clear();
            inner.next_id = 1;
            inner.reached_capacity = false;
        }
        self.shared.listeners.emit(|l| l.reset());
        self.emit(&[Change::CountChanged(0, 0)]);
    }

    /// Removes `key` from every event's property table, emitting a per-row
    /// update for each filtered row actually mutated.
    pub fn remove_property(&self, key: &str) {
        let updated_rows: Vec<usize> = {
            let mut inner = self.shared.inner.lock();
            let positions: FxHashMap<EventId, usize> = inner
                .filtered
                .iter()
                .enumerate()
                .map(|(pos, &id)| (id, pos))
                .collect();
            let mut rows = Vec::new();
            for i in 0..inner.unfiltered.len() {
                if let Some(w) = inner.unfiltered.get_mut(i) {
                    if w.record_mut().remove_property(key) && w.is_displayed() {
                        if let Some(&pos) = positions.get(&w.id()) {
                            rows.push(pos);
                        }
                    }
                }
            }
            rows
        };
        for row in updated_rows {
            self.emit(&[Change::RowUpdated(row)]);
        }
    }

    /// Sets a property on the event with the given id, through the
    /// container's lock. Returns false when no such event is stored.
    pub fn set_property(&self, id: EventId, key: String, value: String) -> bool {
        let (found, updated_row) = {
            let mut inner = self.shared.inner.lock();
            let Inner {
                unfiltered,
                filtered,
                ..
            } = &mut *inner;
            match unfiltered.get_by_id_mut(id) {
                Some(w) => {
                    w.record_mut().set_property(key, value);
                    let row = if w.is_displayed() {
                        filtered.iter().position(|&fid| fid == id)
                    } else {
                        None
                    };
                    (true, row)
                }
                None => (false, None),
            }
        };
        if let Some(row) = updated_row {
            self.emit(&[Change::RowUpdated(row)]);
        }
        found
    }

    /// Flips between cyclic (bounded, oldest-evicted) and unbounded mode.
    /// No-op when the flag is unchanged. The actual store migration runs on
    /// a background thread; see [`Shared::migrate`].
    pub fn set_cyclic(&self, cyclic: bool) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.cyclic == cyclic {
                return;
            }
            inner.cyclic = cyclic;
        }
        self.shared.listeners.emit(|l| l.mode_changed(cyclic));
        self.spawn_migration();
    }

    /// Sorts the filtered projection by one column and remembers the
    /// criteria so later re-filters preserve the order. Sorting never
    /// reorders the unfiltered sequence.
    pub fn sort_column(&self, column: Column, ascending: bool) {
        let filtered_len = {
            let mut inner = self.shared.inner.lock();
            inner.sort = Some((column.clone(), ascending));
            inner.apply_sort(&column, ascending);
            inner.filtered.len()
        };
        if filtered_len > 0 {
            self.emit(&[Change::RowsChanged(0, filtered_len - 1)]);
        }
    }

    /// Re-applies the stored sort criteria, if any.
    pub fn sort(&self) {
        let filtered_len = {
            let mut inner = self.shared.inner.lock();
            let Some((column, ascending)) = inner.sort.clone() else {
                return;
            };
            inner.apply_sort(&column, ascending);
            inner.filtered.len()
        };
        if filtered_len > 0 {
            self.emit(&[Change::RowsChanged(0, filtered_len - 1)]);
        }
    }

    /// Caches a measured row height for one filtered row. Returns false
    /// when the index is out of range.
    pub fn set_row_height(&self, index: usize, height: u16) -> bool {
        let mut inner = self.shared.inner.lock();
        let Some(&id) = inner.filtered.get(index) else {
            return false;
        };
        match inner.unfiltered.get_by_id_mut(id) {
            Some(w) => {
                w.set_row_height(height);
                true
            }
            None => false,
        }
    }

    /// Drops every cached row height, forcing remeasurement on redisplay.
    pub fn invalidate_row_heights(&self) {
        let filtered_len = {
            let mut inner = self.shared.inner.lock();
            for i in 0..inner.unfiltered.len() {
                if let Some(w) = inner.unfiltered.get_mut(i) {
                    w.invalidate_row_height();
                }
            }
            inner.filtered.len()
        };
        if filtered_len > 0 {
            self.emit(&[Change::RowsChanged(0, filtered_len - 1)]);
        }
    }

    /// Total number of stored (unfiltered) events.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().unfiltered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn filtered_len(&self) -> usize {
        self.shared.inner.lock().filtered.len()
    }

    /// One filtered row, by display index.
    pub fn row(&self, index: usize) -> Option<EventWrapper> {
        let inner = self.shared.inner.lock();
        let id = *inner.filtered.get(index)?;
        inner.unfiltered.get_by_id(id).cloned()
    }

    /// Copy of the filtered projection, in display order.
    pub fn filtered_snapshot(&self) -> Vec<EventWrapper> {
        let inner = self.shared.inner.lock();
        inner
            .filtered
            .iter()
            .filter_map(|&id| inner.unfiltered.get_by_id(id))
            .cloned()
            .collect()
    }

    /// Copy of every stored event, in arrival order.
    pub fn unfiltered_snapshot(&self) -> Vec<EventWrapper> {
        let inner = self.shared.inner.lock();
        inner.unfiltered.iter().cloned().collect()
    }

    pub fn is_cyclic(&self) -> bool {
        self.shared.inner.lock().cyclic
    }

    /// Eviction capacity. `None` in unbounded mode, where the value would
    /// be meaningless.
    pub fn max_size(&self) -> Option<usize> {
        let inner = self.shared.inner.lock();
        inner.cyclic.then_some(inner.capacity)
    }

    /// True once the cyclic store has filled to capacity (and so has begun,
    /// or is about to begin, evicting).
    pub fn reached_capacity(&self) -> bool {
        self.shared.inner.lock().reached_capacity
    }

    /// Current column set: the base columns plus every dynamically
    /// discovered property key, in discovery order.
    pub fn columns(&self) -> Vec<String> {
        self.shared.schema.lock().columns().to_vec()
    }

    fn spawn_migration(&self) {
        let generation = self
            .shared
            .migration_generation
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        let weak = Arc::downgrade(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("store-migration".to_owned())
            .spawn(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                Shared::migrate(&shared, generation);
            });
        if let Err(e) = spawned {
            // The old store stays installed, which is a valid state
            warn!(error = %e, "failed to spawn migration thread");
        }
    }

    fn emit(&self, changes: &[Change]) {
        self.shared.emit(changes);
    }
}

impl Default for EventContainer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Shared {
    /// Clears the filtered projection and rebuilds it by walking the
    /// unfiltered sequence in order, recomputing display flags and
    /// millis-deltas. Runs entirely under one lock acquisition so the
    /// structural notification cannot double-count concurrent ingestion.
    ///
    /// Emits refilter-started/finished around the operation, then an
    /// update-in-place range when the row count is unchanged, or an
    /// update plus insert/remove split when it changed.
    fn refilter(shared: &Arc<Shared>) {
        shared.listeners.emit(|l| l.refilter_started());
        let mut changes = Vec::new();
        {
            let mut inner = shared.inner.lock();
            let old_len = inner.filtered.len();
            inner.rebuild_filtered();
            if let Some((column, ascending)) = inner.sort.clone() {
                inner.apply_sort(&column, ascending);
            }
            let new_len = inner.filtered.len();

            if new_len == old_len {
                if new_len > 0 {
                    changes.push(Change::RowsChanged(0, new_len - 1));
                }
            } else if new_len > old_len {
                if old_len > 0 {
                    changes.push(Change::RowsChanged(0, old_len - 1));
                }
                changes.push(Change::RowsInserted(old_len, new_len - 1));
            } else {
                if new_len > 0 {
                    changes.push(Change::RowsChanged(0, new_len - 1));
                }
                changes.push(Change::RowsRemoved(new_len, old_len - 1));
            }
            changes.push(Change::CountChanged(new_len, inner.unfiltered.len()));
        }
        shared.emit(&changes);
        shared.listeners.emit(|l| l.refilter_finished());
    }

    fn emit(&self, changes: &[Change]) {
        for &change in changes {
            self.listeners.emit(|l| match change {
                Change::RowsChanged(begin, end) => l.rows_changed(begin, end),
                Change::RowsInserted(begin, end) => l.rows_inserted(begin, end),
                Change::RowsRemoved(begin, end) => l.rows_removed(begin, end),
                Change::RowUpdated(index) => l.row_updated(index),
                Change::CountChanged(filtered, total) => l.count_changed(filtered, total),
            });
        }
    }

    /// Migrates every stored event into a freshly-allocated backing store
    /// matching the current mode, then re-filters.
    ///
    /// The copy and the install happen under the same lock `add` uses, so
    /// no concurrently-ingested event is lost or duplicated. A later mode
    /// flip bumps the generation and this migration abandons without
    /// touching the stores.
    fn migrate(shared: &Arc<Shared>, generation: u64) {
        let total = {
            let inner = shared.inner.lock();
            if shared.migration_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            inner.unfiltered.len()
        };
        shared.listeners.emit(|l| l.migration_progress(0, total));

        let copied = {
            let mut inner = shared.inner.lock();
            if shared.migration_generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "migration superseded");
                return;
            }
            let mut fresh = Backing::new(inner.cyclic, inner.capacity);
            for i in 0..inner.unfiltered.len() {
                if let Some(w) = inner.unfiltered.get(i) {
                    // Pushing in order means a smaller ring keeps the newest
                    let _ = fresh.push(w.clone());
                }
            }
            let copied = fresh.len();
            inner.reached_capacity = fresh.capacity().is_some_and(|c| copied == c);
            inner.unfiltered = fresh;
            // Keep filtered within unfiltered until the refilter below rebuilds it
            let Inner {
                unfiltered,
                filtered,
                ..
            } = &mut *inner;
            filtered.retain(|&id| unfiltered.index_of(id).is_some());
            copied
        };

        Shared::refilter(shared);
        shared.listeners.emit(|l| l.migration_progress(copied, copied));
        debug!(copied, "store migration complete");
    }
}

impl Inner {
    fn rebuild_filtered(&mut self) {
        let rule = self.rule.clone();
        self.filtered.clear();
        let mut prev_ts: Option<Timestamp> = None;
        for i in 0..self.unfiltered.len() {
            let Some(w) = self.unfiltered.get(i) else {
                break;
            };
            let pass = match &rule {
                None => true,
                Some(rule) => rule_passes(rule.as_ref(), w.record()),
            };
            let (id, ts) = (w.id(), w.timestamp());
            let Some(w) = self.unfiltered.get_mut(i) else {
                break;
            };
            w.set_displayed(pass);
            if pass {
                w.set_millis_delta(prev_ts.map(|p| ts.saturating_sub(p)).unwrap_or(0));
                prev_ts = Some(ts);
                self.filtered.push(id);
            }
        }
    }

    /// Stable sort of the filtered projection; equal keys keep their
    /// relative order. Adjacency changes, so millis-deltas are recomputed
    /// over the new display order.
    fn apply_sort(&mut self, column: &Column, ascending: bool) {
        let Inner {
            unfiltered,
            filtered,
            ..
        } = self;
        filtered.sort_by(|&a, &b| {
            match (unfiltered.get_by_id(a), unfiltered.get_by_id(b)) {
                (Some(x), Some(y)) => sort::compare(column, ascending, x, y),
                _ => std::cmp::Ordering::Equal,
            }
        });

        let mut prev_ts: Option<Timestamp> = None;
        for idx in 0..filtered.len() {
            let id = filtered[idx];
            if let Some(w) = unfiltered.get_by_id_mut(id) {
                let ts = w.timestamp();
                w.set_millis_delta(prev_ts.map(|p| ts.saturating_sub(p)).unwrap_or(0));
                prev_ts = Some(ts);
            }
        }
    }
}

fn rule_passes(rule: &dyn Rule, record: &EventRecord) -> bool {
    match rule.evaluate(record, None) {
        Ok(hit) => hit,
        Err(e) => {
            // A failing rule must not corrupt or stall ingestion
            warn!(error = %e, "rule failed to evaluate, treating as no match");
            false
        }
    }
}

/// Indices `start, start±1, ...` over a sequence of `len` rows, wrapping at
/// the boundary so every row is visited exactly once.
fn wrap_scan(len: usize, start: usize, forward: bool) -> impl Iterator<Item = usize> {
    let start = if len == 0 { 0 } else { start % len };
    (0..len).map(move |k| {
        if forward {
            (start + k) % len
        } else {
            (start + len - k) % len
        }
    })
}
