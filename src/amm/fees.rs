//! Swap pricing and fee split.
//!
//! Rates are integer fractions of [`FEE_DENOMINATOR`] (basis points): a
//! `fee_rate` of 30 is 0.3%. All functions floor, so the pool keeps the dust.

use alloy::primitives::U256;

use super::error::PoolError;
use super::math;
use crate::utils::constants::FEE_DENOMINATOR;

/// The full breakdown of a swap before any state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Amount paid in by the trader
    pub amount_in: U256,
    /// Total fee charged on `amount_in`
    pub total_fee: U256,
    /// Part of the fee owed to the protocol, kept out of the reserves
    pub protocol_fee: U256,
    /// Part of the fee left in the reserves for liquidity providers
    pub lp_fee: U256,
    /// `amount_in - total_fee`, the amount that moves the price
    pub amount_in_after_fee: U256,
    /// Amount paid out to the trader
    pub amount_out: U256,
}

impl SwapQuote {
    /// How much the input reserve grows: everything except the protocol fee.
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if the sum overflows
    pub fn reserve_in_increase(&self) -> Result<U256, PoolError> {
        math::add(self.amount_in_after_fee, self.lp_fee)
    }
}

/// `floor(amount * rate / FEE_DENOMINATOR)`
///
/// # Errors
/// Returns [`PoolError::Overflow`] if `amount * rate` overflows
pub fn fee_from_amount(amount: U256, rate: u32) -> Result<U256, PoolError> {
    math::mul_div(amount, U256::from(rate), U256::from(FEE_DENOMINATOR))
}

/// Splits `total_fee` into `(protocol_fee, lp_fee)`.
///
/// The LP part is the remainder, so the two always add up to `total_fee`.
///
/// # Errors
/// * [`PoolError::Overflow`] if the protocol share computation overflows
/// * [`PoolError::Underflow`] if `protocol_share_rate` exceeds the denominator
pub fn split_fee(total_fee: U256, protocol_share_rate: u32) -> Result<(U256, U256), PoolError> {
    let protocol_fee = fee_from_amount(total_fee, protocol_share_rate)?;
    let lp_fee = math::sub(total_fee, protocol_fee)?;
    Ok((protocol_fee, lp_fee))
}

/// Constant product output: `floor(reserve_out * x / (reserve_in + x))`
///
/// # Errors
/// * [`PoolError::Overflow`] on intermediate overflow
/// * [`PoolError::DivisionByZero`] if `reserve_in + amount_in_after_fee` is zero
pub fn amount_out(
    amount_in_after_fee: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, PoolError> {
    let denominator = math::add(reserve_in, amount_in_after_fee)?;
    math::mul_div(reserve_out, amount_in_after_fee, denominator)
}

/// Prices a swap of `amount_in` against the given reserves.
///
/// # Errors
/// Propagates arithmetic errors from the helpers above
pub fn quote_swap(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_rate: u32,
    fee_share_protocol: u32,
) -> Result<SwapQuote, PoolError> {
    let total_fee = fee_from_amount(amount_in, fee_rate)?;
    let (protocol_fee, lp_fee) = split_fee(total_fee, fee_share_protocol)?;
    let amount_in_after_fee = math::sub(amount_in, total_fee)?;
    let amount_out = amount_out(amount_in_after_fee, reserve_in, reserve_out)?;

    Ok(SwapQuote {
        amount_in,
        total_fee,
        protocol_fee,
        lp_fee,
        amount_in_after_fee,
        amount_out,
    })
}
