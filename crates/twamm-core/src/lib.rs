//! # TWAMM Core - Time-Weighted Average Market Maker
//!
//! Constant-product pair with embedded long-term orders. Long-term orders
//! sell at a constant rate against the pair between submission and
//! expiration; the engine settles that flow lazily, one constant-rate step per
//! scheduled expiration, with a closed-form solution for two opposing flows.
//! It provides:
//!
//! - Fixed-point sales-rate and reward-factor accounting
//! - The virtual order execution engine with bounded catch-up
//! - Order submission, cancellation and proceeds withdrawal
//! - Instant swaps, liquidity shares and a pause switch
//! - A pair factory
//!
//! ## Feature Flags
//!
//! - `client`: Enables serde serialization of views, events and errors

pub mod clock;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod factory;
pub mod journal;
pub mod lifecycle;
pub mod liquidity;
pub mod math;
pub mod order_pool;
pub mod pair;
pub mod pause;
pub mod reserves;
pub mod types;

// Re-export commonly used items
pub use clock::{Clock, Context, ManualClock};
pub use constants::*;
pub use engine::{PairParams, PairState};
pub use errors::{TwammError, TwammResult};
pub use factory::PairFactory;
pub use lifecycle::Submission;
pub use pair::TwammPair;
pub use types::*;
