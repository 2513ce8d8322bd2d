//! Core domain types.
//!
//! Everything here is pure: no network, no filesystem, no async. The
//! aggregator, formatter and tools all build on these records.

pub mod candidate;
pub mod normalize;
pub mod priority;
pub mod text;

pub use candidate::{Candidate, MIN_TITLE_CHARS, NormalizedTitle};
pub use normalize::{normalize, normalize_all};
pub use priority::PublicationPriority;
