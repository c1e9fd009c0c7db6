//! # Core Type Definitions
//!
//! Orders, pool views and events shared by the pair and its drivers.

pub mod events;
pub mod orders;
pub mod pool;

// Re-export all types
pub use events::*;
pub use orders::*;
pub use pool::*;
