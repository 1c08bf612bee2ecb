use crate::types::{EventId, LogLevel, Timestamp, ID_PROPERTY};
use fxhash::FxHashMap;
use internment::Intern;
use serde::{Deserialize, Serialize};

/// Source location of the logging call, when the producer supplied one.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct LocationInfo {
    pub file: String,
    pub method: String,
    pub line: u32,
}

/// A single log event as delivered by a producer.
///
/// The core fields are fixed at construction. The `properties` side table is
/// the one mutable part; it collects values attached after the fact (the
/// assigned id, receiver annotations). Once an [`ID_PROPERTY`] value is set
/// it never changes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub message: String,
    pub thread: Intern<String>,
    pub logger: Intern<String>,
    pub location: Option<LocationInfo>,
    pub ndc: Option<String>,
    pub mdc: FxHashMap<String, String>,
    properties: FxHashMap<String, String>,
}

impl EventRecord {
    pub fn new(
        timestamp: Timestamp,
        level: LogLevel,
        logger: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            thread: Intern::new("main".to_owned()),
            logger: Intern::new(logger.into()),
            location: None,
            ndc: None,
            mdc: FxHashMap::default(),
            properties: FxHashMap::default(),
        }
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Intern::new(thread.into());
        self
    }

    pub fn with_ndc(mut self, ndc: impl Into<String>) -> Self {
        self.ndc = Some(ndc.into());
        self
    }

    pub fn with_location(mut self, location: LocationInfo) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_mdc(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mdc.insert(key.into(), value.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn property_keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets a property, returning the prior value.
    ///
    /// Writes to [`ID_PROPERTY`] are ignored once an id has been assigned.
    pub fn set_property(&mut self, key: String, value: String) -> Option<String> {
        if key == ID_PROPERTY && self.properties.contains_key(ID_PROPERTY) {
            return self.properties.get(ID_PROPERTY).cloned();
        }
        self.properties.insert(key, value)
    }

    /// Removes a property, returning true when the key was present.
    /// The [`ID_PROPERTY`] cannot be removed once assigned.
    pub fn remove_property(&mut self, key: &str) -> bool {
        if key == ID_PROPERTY {
            return false;
        }
        self.properties.remove(key).is_some()
    }

    /// The assigned id, if one has been stored in the property table.
    pub fn id_property(&self) -> Option<EventId> {
        self.property(ID_PROPERTY).and_then(|v| v.parse().ok())
    }

    pub(crate) fn assign_id(&mut self, id: EventId) {
        if !self.properties.contains_key(ID_PROPERTY) {
            self.properties.insert(ID_PROPERTY.to_owned(), id.to_string());
        }
    }

    /// Normalizes an id that would break the store's strictly-increasing id
    /// order (a replayed record carrying a stale id). Never used on records
    /// whose id this container assigned.
    pub(crate) fn overwrite_id(&mut self, id: EventId) {
        self.properties.insert(ID_PROPERTY.to_owned(), id.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record() -> EventRecord {
        EventRecord::new(1000, LogLevel::Info, "com.example.Service", "started")
    }

    #[test]
    fn id_property_is_write_once() {
        let mut r = record();
        assert_eq!(r.id_property(), None);

        r.assign_id(7);
        assert_eq!(r.id_property(), Some(7));

        r.assign_id(9);
        assert_eq!(r.id_property(), Some(7));

        r.set_property(ID_PROPERTY.to_owned(), "42".to_owned());
        assert_eq!(r.id_property(), Some(7));
    }

    #[test]
    fn ordinary_properties_overwrite() {
        let mut r = record();
        assert_eq!(r.set_property("host".to_owned(), "a".to_owned()), None);
        assert_eq!(
            r.set_property("host".to_owned(), "b".to_owned()),
            Some("a".to_owned())
        );
        assert_eq!(r.property("host"), Some("b"));
        assert!(r.remove_property("host"));
        assert!(!r.remove_property("host"));
    }
}
