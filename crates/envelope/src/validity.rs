//! Envelope classes and sink acceptance
//!
//! `Validity` is the tri-state verdict stamped by the annotator.
//! `AcceptedClass` is the routing predicate a sink declares; the manifold
//! only hands an envelope to sinks whose accepted class matches the verdict.

use serde::{Deserialize, Serialize};

/// Validation verdict for an envelope
///
/// Envelopes are born `Unknown` and must be resolved to `Valid` or
/// `Invalid` before dispatch. The manifold never routes an `Unknown`
/// envelope to a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Not yet annotated
    #[default]
    Unknown,

    /// Payload conformed to its schema
    Valid,

    /// Payload failed validation or schema resolution
    Invalid,
}

impl Validity {
    /// Whether the verdict has been resolved
    #[inline]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Which envelope classes a sink accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptedClass {
    /// Only envelopes that validated successfully
    Valid,

    /// Only envelopes that failed validation
    Invalid,

    /// Every resolved envelope
    #[default]
    All,
}

impl AcceptedClass {
    /// Whether an envelope with the given verdict should be routed here
    ///
    /// `Unknown` matches nothing; the annotator must resolve first.
    #[inline]
    pub fn matches(&self, validity: Validity) -> bool {
        match (self, validity) {
            (_, Validity::Unknown) => false,
            (Self::All, _) => true,
            (Self::Valid, Validity::Valid) => true,
            (Self::Invalid, Validity::Invalid) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_matches_nothing() {
        for class in [AcceptedClass::Valid, AcceptedClass::Invalid, AcceptedClass::All] {
            assert!(!class.matches(Validity::Unknown));
        }
    }

    #[test]
    fn test_all_matches_resolved() {
        assert!(AcceptedClass::All.matches(Validity::Valid));
        assert!(AcceptedClass::All.matches(Validity::Invalid));
    }

    #[test]
    fn test_exact_classes() {
        assert!(AcceptedClass::Valid.matches(Validity::Valid));
        assert!(!AcceptedClass::Valid.matches(Validity::Invalid));
        assert!(AcceptedClass::Invalid.matches(Validity::Invalid));
        assert!(!AcceptedClass::Invalid.matches(Validity::Valid));
    }

    #[test]
    fn test_default_is_all() {
        assert_eq!(AcceptedClass::default(), AcceptedClass::All);
        assert_eq!(Validity::default(), Validity::Unknown);
    }
}
