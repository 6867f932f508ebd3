//! # Pool Engine
//!
//! A two-asset constant product pool: liquidity shares, fee-charging swaps,
//! flash borrows and a cumulative price oracle, all in exact integer math.

/// Error taxonomy shared by every pool operation
pub mod error;
/// Protocol fee accounting and swap pricing
pub mod fees;
/// Flash borrow callback interface
pub mod flash;
/// LP share ledger
pub mod ledger;
/// Reentrancy protection
pub mod lock;
/// Checked integer arithmetic
pub mod math;
/// The pool engine
pub mod pool;
/// Reserves and price accumulators
pub mod reserves;
/// Test helpers and utilities
#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::PoolError;
pub use flash::FlashBorrower;
pub use pool::Pool;
pub use reserves::Side;
