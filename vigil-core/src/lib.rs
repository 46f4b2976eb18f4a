//! Vigil Core
//!
//! Load-bearing logic of the monitoring head: admission control over in-flight calls
//! and the event filter.

pub mod admission;
pub mod filter;

/// Re-export common types
pub use admission::{AdmissionCounter, AdmissionPermit, CallGuard, GuardError};
pub use filter::{filter_events, EntityId, FilterCriteria, WILDCARD};
