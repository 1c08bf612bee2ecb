use crate::{
    rule::Rule,
    types::{Color, EventRecord, RowColors},
};
use std::sync::Arc;

/// Supplies per-event row colors, plus an optional rule used purely for
/// search highlighting. Independent of the visibility rule.
pub trait Colorizer: Send + Sync {
    fn background(&self, record: &EventRecord) -> Color;

    fn foreground(&self, record: &EventRecord) -> Color;

    /// Highlight-only rule; events it matches get their search-match flag
    /// set on ingestion.
    fn find_rule(&self) -> Option<Arc<dyn Rule>> {
        None
    }

    fn colors(&self, record: &EventRecord) -> RowColors {
        RowColors {
            background: self.background(record),
            foreground: self.foreground(record),
        }
    }
}

/// Colorizer that always yields the default pair and no find rule.
#[derive(Copy, Clone, Default, Debug)]
pub struct DefaultColorizer;

impl Colorizer for DefaultColorizer {
    fn background(&self, _record: &EventRecord) -> Color {
        Color::WHITE
    }

    fn foreground(&self, _record: &EventRecord) -> Color {
        Color::BLACK
    }
}
