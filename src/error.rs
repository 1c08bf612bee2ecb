use thiserror::Error;

/// Failure reported by an externally supplied [`Rule`](crate::rule::Rule).
///
/// The container never propagates this: a rule that fails to evaluate is
/// treated as not matching the event in question, and ingestion continues.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Error)]
#[error("Rule evaluation failed ({0})")]
pub struct RuleError(pub String);

impl RuleError {
    pub fn new<S: AsRef<str>>(msg: S) -> Self {
        RuleError(msg.as_ref().to_owned())
    }
}
