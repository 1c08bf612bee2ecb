#![doc = include_str!("../README.md")]

pub use crate::color::{Colorizer, DefaultColorizer};
pub use crate::container::{EventContainer, DEFAULT_CAPACITY};
pub use crate::error::RuleError;
pub use crate::listener::ContainerListener;
pub use crate::ring::BoundedRingStore;
pub use crate::rule::{
    FieldMatches, LevelAtLeastRule, MessageContainsRule, ObservableRule, Rule, RuleChangeListener,
    RuleListenerId,
};
pub use crate::schema::{NewColumn, SchemaTracker, BASE_COLUMNS};
pub use crate::sort::Column;
pub use crate::types::*;

pub mod color;
pub mod container;
pub mod error;
pub mod listener;
pub mod ring;
pub mod rule;
pub mod schema;
pub mod sort;
pub mod types;
