use crate::{
    error::RuleError,
    types::{EventRecord, LogLevel},
};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Substrings that matched during evaluation, keyed by field name.
/// Rules fill this in when the caller wants highlight spans.
pub type FieldMatches = FxHashMap<String, Vec<String>>;

pub type RuleListenerId = u64;

/// Callback fired when an observable rule's criteria change.
pub type RuleChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Boolean predicate over an event record.
///
/// `matches` is an optional side channel for recording which field values
/// matched, used purely for highlighting. Rules whose criteria can change
/// after construction override the subscription hooks so the container can
/// re-filter when they do.
pub trait Rule: Send + Sync {
    fn evaluate(
        &self,
        record: &EventRecord,
        matches: Option<&mut FieldMatches>,
    ) -> Result<bool, RuleError>;

    /// Registers interest in criteria changes. Rules with fixed criteria
    /// keep the default and return `None`.
    fn subscribe(&self, _listener: RuleChangeListener) -> Option<RuleListenerId> {
        None
    }

    fn unsubscribe(&self, _id: RuleListenerId) {}
}

/// Matches events whose message contains the configured substring
/// (case-sensitive). Records the matched span under `MESSAGE`.
#[derive(Clone, Debug)]
pub struct MessageContainsRule {
    needle: String,
}

impl MessageContainsRule {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl Rule for MessageContainsRule {
    fn evaluate(
        &self,
        record: &EventRecord,
        matches: Option<&mut FieldMatches>,
    ) -> Result<bool, RuleError> {
        let hit = record.message.contains(&self.needle);
        if hit {
            if let Some(matches) = matches {
                matches
                    .entry("MESSAGE".to_owned())
                    .or_default()
                    .push(self.needle.clone());
            }
        }
        Ok(hit)
    }
}

/// Matches events at or above a level threshold.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LevelAtLeastRule {
    min: LogLevel,
}

impl LevelAtLeastRule {
    pub fn new(min: LogLevel) -> Self {
        Self { min }
    }
}

impl Rule for LevelAtLeastRule {
    fn evaluate(
        &self,
        record: &EventRecord,
        _matches: Option<&mut FieldMatches>,
    ) -> Result<bool, RuleError> {
        Ok(record.level.ordinal() >= self.min.ordinal())
    }
}

/// A rule whose inner predicate can be swapped at runtime. Swapping notifies
/// subscribed containers, which re-filter against the new predicate.
pub struct ObservableRule {
    state: Mutex<ObservableState>,
}

struct ObservableState {
    inner: Option<Arc<dyn Rule>>,
    listeners: Vec<(RuleListenerId, RuleChangeListener)>,
    next_listener_id: RuleListenerId,
}

impl ObservableRule {
    pub fn new(inner: Option<Arc<dyn Rule>>) -> Self {
        Self {
            state: Mutex::new(ObservableState {
                inner,
                listeners: Vec::new(),
                next_listener_id: 0,
            }),
        }
    }

    /// Replaces the inner predicate and fires change listeners.
    pub fn set_inner(&self, inner: Option<Arc<dyn Rule>>) {
        let listeners: Vec<RuleChangeListener> = {
            let mut state = self.state.lock();
            state.inner = inner;
            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener();
        }
    }
}

impl Rule for ObservableRule {
    fn evaluate(
        &self,
        record: &EventRecord,
        matches: Option<&mut FieldMatches>,
    ) -> Result<bool, RuleError> {
        let inner = self.state.lock().inner.clone();
        match inner {
            Some(rule) => rule.evaluate(record, matches),
            // No criteria means everything passes
            None => Ok(true),
        }
    }

    fn subscribe(&self, listener: RuleChangeListener) -> Option<RuleListenerId> {
        let mut state = self.state.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push((id, listener));
        Some(id)
    }

    fn unsubscribe(&self, id: RuleListenerId) {
        self.state.lock().listeners.retain(|(lid, _)| *lid != id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(level: LogLevel, message: &str) -> EventRecord {
        EventRecord::new(0, level, "test.logger", message)
    }

    #[test]
    fn message_contains_records_span() {
        let rule = MessageContainsRule::new("time");
        let mut matches = FieldMatches::default();
        let hit = rule
            .evaluate(&record(LogLevel::Info, "timeout waiting"), Some(&mut matches))
            .unwrap();
        assert!(hit);
        assert_eq!(matches.get("MESSAGE"), Some(&vec!["time".to_owned()]));

        assert!(!rule
            .evaluate(&record(LogLevel::Info, "connected"), None)
            .unwrap());
    }

    #[test]
    fn level_threshold() {
        let rule = LevelAtLeastRule::new(LogLevel::Warn);
        assert!(rule.evaluate(&record(LogLevel::Error, "x"), None).unwrap());
        assert!(rule.evaluate(&record(LogLevel::Warn, "x"), None).unwrap());
        assert!(!rule.evaluate(&record(LogLevel::Info, "x"), None).unwrap());
    }

    #[test]
    fn observable_rule_fires_listeners_on_swap() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let rule = ObservableRule::new(None);
        assert!(rule.evaluate(&record(LogLevel::Info, "x"), None).unwrap());

        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        let id = rule
            .subscribe(Arc::new(move || {
                fired2.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        rule.set_inner(Some(Arc::new(LevelAtLeastRule::new(LogLevel::Error))));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!rule.evaluate(&record(LogLevel::Info, "x"), None).unwrap());

        rule.unsubscribe(id);
        rule.set_inner(None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
