use derive_more::Display;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};

pub use event::{EventRecord, LocationInfo};
pub use wrapper::EventWrapper;

pub mod event;
pub mod wrapper;

pub type EventId = u64;

/// Timestamp in milliseconds since the UNIX epoch
pub type Timestamp = u64;

/// Property key under which an event's assigned id is stored.
pub const ID_PROPERTY: &str = "ID";

#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Display,
    IntoPrimitive,
    FromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(i32)]
pub enum LogLevel {
    #[display("TRACE")]
    Trace = 0,
    #[display("DEBUG")]
    Debug = 1,
    #[display("INFO")]
    Info = 2,
    #[display("WARN")]
    Warn = 3,
    #[display("ERROR")]
    Error = 4,
    #[display("FATAL")]
    Fatal = 5,
    #[display("{_0}")]
    #[num_enum(catch_all)]
    Other(i32),
}

impl LogLevel {
    /// Numeric ordinal used for level-column ordering.
    pub fn ordinal(self) -> i32 {
        self.into()
    }
}

/// 24-bit RGB color, `0xRRGGBB`.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize,
)]
#[display("#{_0:06x}")]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0x00FF_FFFF);
    pub const BLACK: Color = Color(0x0000_0000);
}

/// Resolved background/foreground pair for a rendered row.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct RowColors {
    pub background: Color,
    pub foreground: Color,
}

impl Default for RowColors {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            foreground: Color::BLACK,
        }
    }
}

impl RowColors {
    /// True when neither color differs from the default pair.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_ordinals() {
        assert!(LogLevel::Trace.ordinal() < LogLevel::Debug.ordinal());
        assert!(LogLevel::Warn.ordinal() < LogLevel::Error.ordinal());
        assert_eq!(LogLevel::Other(42).ordinal(), 42);
        assert_eq!(LogLevel::from(3), LogLevel::Warn);
        assert_eq!(LogLevel::from(99), LogLevel::Other(99));
    }

    #[test]
    fn level_display() {
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Other(7).to_string(), "7");
    }

    #[test]
    fn default_colors() {
        let colors = RowColors::default();
        assert!(colors.is_default());
        let highlighted = RowColors {
            background: Color(0x00FF_0000),
            ..Default::default()
        };
        assert!(!highlighted.is_default());
    }
}
