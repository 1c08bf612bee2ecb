use fxhash::FxHashSet;
use itertools::Itertools;
use tracing::debug;

/// Columns every view starts with, before any dynamic property keys arrive.
pub const BASE_COLUMNS: &[&str] = &[
    "ID",
    "TIMESTAMP",
    "LEVEL",
    "LOGGER",
    "THREAD",
    "MESSAGE",
    "NDC",
    "LOCATION",
];

/// A column appended for a newly-observed property key, with the value the
/// triggering event carried for it.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct NewColumn {
    pub index: usize,
    pub key: String,
    pub sample: String,
}

/// Tracks the set of known (uppercased) column keys and grows it as events
/// arrive with property keys not seen before. Columns are never removed.
#[derive(Clone, Debug)]
pub struct SchemaTracker {
    known: FxHashSet<String>,
    columns: Vec<String>,
}

impl Default for SchemaTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaTracker {
    pub fn new() -> Self {
        let columns: Vec<String> = BASE_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
        let known = columns.iter().cloned().collect();
        Self { known, columns }
    }

    /// Folds one event's property table into the known set, returning the
    /// columns that are new. Keys are compared uppercased; within a single
    /// event, new keys are appended in sorted order so column layout is
    /// deterministic.
    pub fn observe<'a>(
        &mut self,
        properties: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<NewColumn> {
        let mut added = Vec::new();
        for (key, value) in properties
            .into_iter()
            .sorted_by_key(|(key, _)| key.to_owned())
        {
            let canonical = key.to_uppercase();
            if self.known.insert(canonical.clone()) {
                debug!(key = canonical.as_str(), "new column");
                self.columns.push(canonical.clone());
                added.push(NewColumn {
                    index: self.columns.len() - 1,
                    key: canonical,
                    sample: value.to_owned(),
                });
            }
        }
        added
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seeded_with_base_columns() {
        let tracker = SchemaTracker::new();
        assert_eq!(tracker.column_count(), BASE_COLUMNS.len());
        assert_eq!(tracker.columns()[0], "ID");
    }

    #[test]
    fn new_keys_append_once() {
        let mut tracker = SchemaTracker::new();

        let added = tracker.observe(vec![("host", "web-1"), ("region", "us-east")]);
        assert_eq!(
            added,
            vec![
                NewColumn {
                    index: BASE_COLUMNS.len(),
                    key: "HOST".to_owned(),
                    sample: "web-1".to_owned(),
                },
                NewColumn {
                    index: BASE_COLUMNS.len() + 1,
                    key: "REGION".to_owned(),
                    sample: "us-east".to_owned(),
                },
            ]
        );

        // Case-insensitive: HOST is already known
        let added = tracker.observe(vec![("HOST", "web-2")]);
        assert!(added.is_empty());
        assert_eq!(tracker.column_count(), BASE_COLUMNS.len() + 2);
    }

    #[test]
    fn base_keys_never_reported() {
        let mut tracker = SchemaTracker::new();
        let added = tracker.observe(vec![("id", "9"), ("level", "INFO")]);
        assert!(added.is_empty());
    }
}
