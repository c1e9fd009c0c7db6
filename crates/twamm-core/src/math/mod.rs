//! # Mathematical Functions
//!
//! Checked integer helpers, sales-rate and reward-factor accounting, and the
//! closed-form virtual order trade.

pub mod big_int;
pub mod reward_math;
pub mod safe_math;
pub mod twamm_math;

// Re-export commonly used functions
pub use big_int::*;
pub use reward_math::*;
pub use safe_math::*;
pub use twamm_math::*;
