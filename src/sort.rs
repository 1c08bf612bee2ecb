use crate::types::EventWrapper;
use std::cmp::Ordering;

/// Sortable columns of the filtered view. `Property` covers dynamically
/// discovered columns by key.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Column {
    Id,
    Timestamp,
    Level,
    Logger,
    Thread,
    Message,
    Ndc,
    Property(String),
}

/// Compares two wrappers by one column, ascending or descending.
///
/// The underlying sort must be stable, so equal keys keep their relative
/// (arrival) order. The direction flag flips non-equal orderings only.
pub fn compare(column: &Column, ascending: bool, a: &EventWrapper, b: &EventWrapper) -> Ordering {
    let natural = compare_natural(column, a, b);
    if ascending {
        natural
    } else {
        natural.reverse()
    }
}

fn compare_natural(column: &Column, a: &EventWrapper, b: &EventWrapper) -> Ordering {
    let (a, b) = (a.record(), b.record());
    match column {
        // Newest first in the id column's natural order
        Column::Id => {
            let (aid, bid) = (a.id_property(), b.id_property());
            bid.cmp(&aid)
        }
        Column::Timestamp => a.timestamp.cmp(&b.timestamp),
        Column::Level => a.level.ordinal().cmp(&b.level.ordinal()),
        Column::Logger => cmp_ignore_case(&a.logger, &b.logger),
        Column::Thread => cmp_ignore_case(&a.thread, &b.thread),
        Column::Message => cmp_ignore_case(&a.message, &b.message),
        Column::Ndc => match (a.ndc.as_deref(), b.ndc.as_deref()) {
            (Some(x), Some(y)) => cmp_ignore_case(x, y),
            _ => Ordering::Equal,
        },
        Column::Property(key) => match (a.property(key), b.property(key)) {
            (Some(x), Some(y)) => cmp_ignore_case(x, y),
            // A value missing on either side carries no ordering information
            _ => Ordering::Equal,
        },
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
