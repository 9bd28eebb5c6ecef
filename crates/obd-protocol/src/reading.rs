//! Resolved parameter values with explicit availability

use serde::{Deserialize, Serialize};

/// A parameter value as resolved by a single read
///
/// Absence is always explicit. A reading is created fresh by every read
/// and consumed immediately by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading<T> {
    /// The adapter answered with a well-formed value
    Available(T),
    /// Timeout, closed link, or a garbled/mismatched response
    Unavailable,
}

impl<T> Reading<T> {
    /// Whether a value was resolved
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }

    /// Convert into an `Option`
    pub fn value(self) -> Option<T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::Unavailable => None,
        }
    }

    /// Map the resolved value, keeping `Unavailable` as is
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reading<U> {
        match self {
            Reading::Available(v) => Reading::Available(f(v)),
            Reading::Unavailable => Reading::Unavailable,
        }
    }

    /// Chain a fallible conversion
    pub fn and_then<U, F: FnOnce(T) -> Reading<U>>(self, f: F) -> Reading<U> {
        match self {
            Reading::Available(v) => f(v),
            Reading::Unavailable => Reading::Unavailable,
        }
    }
}

impl<T: Default> Reading<T> {
    /// Write the reading into an output slot and report success.
    ///
    /// On `Unavailable` the slot is set to the type's zero value, so the
    /// slot is never left holding a stale or partial value. Callers must
    /// check the returned flag: zero is also a legitimate reading.
    pub fn write_to(self, slot: &mut T) -> bool {
        match self {
            Reading::Available(v) => {
                *slot = v;
                true
            }
            Reading::Unavailable => {
                *slot = T::default();
                false
            }
        }
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reading::Available(v),
            None => Reading::Unavailable,
        }
    }
}
