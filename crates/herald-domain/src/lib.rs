//! Domain types shared across all Herald services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; persistence maps to and from
//! the string/integer wire forms defined here.

pub mod channel;
pub mod severity;
pub mod source;

use thiserror::Error;

/// Error returned when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
