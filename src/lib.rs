/*!
 * # Tidepool - Constant Product Liquidity Pools
 *
 * Tidepool is an in-process engine for two-asset automated market maker
 * pools. Prices follow the `reserve_a * reserve_b = k` curve and all
 * amounts are 256-bit unsigned integers with checked arithmetic.
 *
 * ## Core Features
 *
 * - **Liquidity**: Proportional LP shares with an optional locked minimum
 * - **Swaps**: Fee-charging swaps with slippage protection and a protocol fee share
 * - **Flash Borrows**: Uncollateralized loans repaid within a callback
 * - **Price Oracle**: Cumulative prices and time-weighted averages
 * - **Atomicity**: Failed operations leave pool and token state untouched
 *
 * ## Module Structure
 *
 * - `amm`: The pool engine and its building blocks
 * - `config`: Pool parameters loaded from the environment
 * - `models`: Persisted pool state
 * - `token`: The token collaborator interface and an in-memory bank
 * - `utils`: Constants, clocks and logging
 */

/// The pool engine and its building blocks
pub mod amm;
/// Pool parameters loaded from the environment
pub mod config;
/// Persisted pool state
pub mod models;
/// Token collaborator interface and in-memory bank
pub mod token;
/// Utility functions and helpers
pub mod utils;
