use crate::types::{EventId, EventRecord, RowColors, Timestamp};

/// An [`EventRecord`] plus the derived display state the container maintains
/// for it: the assigned id, visibility under the active rule, search-match
/// flag, the millisecond gap to the previous displayed event, resolved row
/// colors, and a cached row height.
///
/// Wrappers live in the unfiltered sequence only; the filtered projection
/// refers to them by id.
#[derive(Clone, PartialEq, Debug)]
pub struct EventWrapper {
    record: EventRecord,
    id: EventId,
    displayed: bool,
    search_match: bool,
    millis_delta: u64,
    colors: RowColors,
    row_height: Option<u16>,
}

impl EventWrapper {
    pub(crate) fn new(record: EventRecord, id: EventId, colors: RowColors) -> Self {
        Self {
            record,
            id,
            displayed: false,
            search_match: false,
            millis_delta: 0,
            colors,
            row_height: None,
        }
    }

    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut EventRecord {
        &mut self.record
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.record.timestamp
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    pub(crate) fn set_displayed(&mut self, displayed: bool) {
        self.displayed = displayed;
    }

    pub fn is_search_match(&self) -> bool {
        self.search_match
    }

    pub(crate) fn set_search_match(&mut self, matched: bool) {
        self.search_match = matched;
    }

    /// Gap in milliseconds to the previous event in displayed order.
    /// Zero for the first displayed event.
    pub fn millis_delta(&self) -> u64 {
        self.millis_delta
    }

    pub(crate) fn set_millis_delta(&mut self, delta: u64) {
        self.millis_delta = delta;
    }

    pub fn colors(&self) -> RowColors {
        self.colors
    }

    pub fn row_height(&self) -> Option<u16> {
        self.row_height
    }

    /// Caches a measured row height until the next redisplay invalidation.
    pub fn set_row_height(&mut self, height: u16) {
        self.row_height = Some(height);
    }

    pub(crate) fn invalidate_row_height(&mut self) {
        self.row_height = None;
    }
}
