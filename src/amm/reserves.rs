//! Reserve bookkeeping and the cumulative price accumulator.
//!
//! Updates are staged: callers compute a [`ReserveUpdate`] or an
//! [`Observation`] with checked math first, and only apply it once every
//! fallible step of the surrounding operation has succeeded.

use std::collections::VecDeque;

use alloy::primitives::U256;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::PoolError;
use super::fees::SwapQuote;
use super::math;
use crate::utils::constants::FEE_DENOMINATOR;

/// One of the two assets of a pool.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The first asset, `token_a`
    A,
    /// The second asset, `token_b`
    B,
}

impl Side {
    /// The opposite side
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Cumulative prices at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// When the accumulators had these values, in seconds
    pub timestamp: u64,
    /// `Σ reserve_b × elapsed`
    pub price_cumulative_a: U256,
    /// `Σ reserve_a × elapsed`
    pub price_cumulative_b: U256,
}

impl Observation {
    /// The accumulator of `side`
    #[must_use]
    pub const fn cumulative(&self, side: Side) -> U256 {
        match side {
            Side::A => self.price_cumulative_a,
            Side::B => self.price_cumulative_b,
        }
    }
}

/// New reserve and protocol fee values, computed but not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveUpdate {
    /// New `reserve_a`
    pub reserve_a: U256,
    /// New `reserve_b`
    pub reserve_b: U256,
    /// New `protocol_fee_a`
    pub protocol_fee_a: U256,
    /// New `protocol_fee_b`
    pub protocol_fee_b: U256,
}

/// Per-pool reserves, fees, fee parameters and price accumulators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveAccount {
    /// Tradable amount of `token_a`
    reserve_a: U256,
    /// Tradable amount of `token_b`
    reserve_b: U256,
    /// Accrued protocol fees in `token_a`
    protocol_fee_a: U256,
    /// Accrued protocol fees in `token_b`
    protocol_fee_b: U256,
    /// Swap fee in basis points
    fee_rate: u32,
    /// Protocol share of the swap fee in basis points
    fee_share_protocol: u32,
    /// `Σ reserve_b × elapsed`
    price_cumulative_a: U256,
    /// `Σ reserve_a × elapsed`
    price_cumulative_b: U256,
    /// Last accumulator update, in seconds
    last_timestamp: u64,
    /// Recent accumulator values, oldest first
    observations: VecDeque<Observation>,
    /// Maximum number of retained observations
    observation_capacity: usize,
}

impl ReserveAccount {
    /// Creates an empty account at time `now`.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidFeeRate`] if either rate exceeds the denominator
    pub fn new(
        fee_rate: u32,
        fee_share_protocol: u32,
        observation_capacity: usize,
        now: u64,
    ) -> Result<Self, PoolError> {
        if fee_rate > FEE_DENOMINATOR || fee_share_protocol > FEE_DENOMINATOR {
            return Err(PoolError::InvalidFeeRate);
        }
        let genesis = Observation {
            timestamp: now,
            price_cumulative_a: U256::ZERO,
            price_cumulative_b: U256::ZERO,
        };
        Ok(Self {
            reserve_a: U256::ZERO,
            reserve_b: U256::ZERO,
            protocol_fee_a: U256::ZERO,
            protocol_fee_b: U256::ZERO,
            fee_rate,
            fee_share_protocol,
            price_cumulative_a: U256::ZERO,
            price_cumulative_b: U256::ZERO,
            last_timestamp: now,
            observations: VecDeque::from([genesis]),
            observation_capacity: observation_capacity.max(1),
        })
    }

    /// `(reserve_a, reserve_b)`
    #[must_use]
    pub const fn reserves(&self) -> (U256, U256) {
        (self.reserve_a, self.reserve_b)
    }

    /// Reserve of one side
    #[must_use]
    pub const fn reserve(&self, side: Side) -> U256 {
        match side {
            Side::A => self.reserve_a,
            Side::B => self.reserve_b,
        }
    }

    /// `(protocol_fee_a, protocol_fee_b)`
    #[must_use]
    pub const fn protocol_fees(&self) -> (U256, U256) {
        (self.protocol_fee_a, self.protocol_fee_b)
    }

    /// Accrued protocol fee of one side
    #[must_use]
    pub const fn protocol_fee(&self, side: Side) -> U256 {
        match side {
            Side::A => self.protocol_fee_a,
            Side::B => self.protocol_fee_b,
        }
    }

    /// Swap fee in basis points
    #[must_use]
    pub const fn fee_rate(&self) -> u32 {
        self.fee_rate
    }

    /// Protocol share of the swap fee in basis points
    #[must_use]
    pub const fn fee_share_protocol(&self) -> u32 {
        self.fee_share_protocol
    }

    /// `(price_cumulative_a, price_cumulative_b)` as of the last update
    #[must_use]
    pub const fn price_cumulative_last(&self) -> (U256, U256) {
        (self.price_cumulative_a, self.price_cumulative_b)
    }

    /// Last accumulator update, in seconds
    #[must_use]
    pub const fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// Retained observations, oldest first
    #[must_use]
    pub const fn observations(&self) -> &VecDeque<Observation> {
        &self.observations
    }

    /// `reserve_a * reserve_b`
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if the product overflows
    pub fn k(&self) -> Result<U256, PoolError> {
        math::mul(self.reserve_a, self.reserve_b)
    }

    /// The accumulator values at `now`, extrapolated from the current reserves.
    ///
    /// Nothing is written; pass the result to [`ReserveAccount::record`] to
    /// keep it. A `now` at or before the last update returns the stored values.
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if an accumulator overflows
    pub fn observe(&self, now: u64) -> Result<Observation, PoolError> {
        let elapsed = now.saturating_sub(self.last_timestamp);
        if elapsed == 0 {
            return Ok(Observation {
                timestamp: self.last_timestamp,
                price_cumulative_a: self.price_cumulative_a,
                price_cumulative_b: self.price_cumulative_b,
            });
        }

        let elapsed = U256::from(elapsed);
        Ok(Observation {
            timestamp: now,
            price_cumulative_a: math::add(
                self.price_cumulative_a,
                math::mul(self.reserve_b, elapsed)?,
            )?,
            price_cumulative_b: math::add(
                self.price_cumulative_b,
                math::mul(self.reserve_a, elapsed)?,
            )?,
        })
    }

    /// Stores an observation produced by [`ReserveAccount::observe`].
    ///
    /// Observations that do not advance time are ignored.
    pub fn record(&mut self, observation: Observation) {
        if observation.timestamp <= self.last_timestamp {
            return;
        }
        self.price_cumulative_a = observation.price_cumulative_a;
        self.price_cumulative_b = observation.price_cumulative_b;
        self.last_timestamp = observation.timestamp;

        while self.observations.len() >= self.observation_capacity.max(1) {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);
    }

    /// Time-weighted average of the other side's reserve over the last
    /// `duration` seconds.
    ///
    /// The reserves are constant between two observations, so the accumulator
    /// at the window start is interpolated exactly from the observations
    /// around it.
    ///
    /// # Errors
    /// * [`PoolError::InvalidAmounts`] if `duration` is zero
    /// * [`PoolError::DurationTooLong`] if the window starts before the oldest observation
    /// * [`PoolError::Overflow`] if extrapolating the accumulator overflows
    pub fn twap(&self, side: Side, duration: u64, now: u64) -> Result<U256, PoolError> {
        if duration == 0 {
            return Err(PoolError::InvalidAmounts);
        }
        let window_start = now
            .checked_sub(duration)
            .ok_or(PoolError::DurationTooLong)?;
        let index = self
            .observations
            .iter()
            .rposition(|observation| observation.timestamp <= window_start)
            .ok_or(PoolError::DurationTooLong)?;

        let current = self.observe(now)?;
        let before = self.observations[index];
        let after = self.observations.get(index + 1).copied().unwrap_or(current);

        let span = after.timestamp.saturating_sub(before.timestamp);
        let cumulative_start = if span == 0 {
            before.cumulative(side)
        } else {
            math::add(
                before.cumulative(side),
                math::mul_div(
                    math::sub(after.cumulative(side), before.cumulative(side))?,
                    U256::from(window_start - before.timestamp),
                    U256::from(span),
                )?,
            )?
        };
        let delta = math::sub(current.cumulative(side), cumulative_start)?;
        math::div(delta, U256::from(duration))
    }

    /// Checks the fee rates and observation capacity of a restored account.
    ///
    /// # Errors
    /// * [`PoolError::InvalidFeeRate`] if either rate exceeds the denominator
    /// * [`PoolError::InvalidConfig`] if the observation capacity is zero
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.fee_rate > FEE_DENOMINATOR || self.fee_share_protocol > FEE_DENOMINATOR {
            return Err(PoolError::InvalidFeeRate);
        }
        if self.observation_capacity == 0 {
            return Err(PoolError::InvalidConfig {
                key: "observation_capacity".to_string(),
            });
        }
        Ok(())
    }

    /// Reserves after a swap into `side_in`: the input side grows by everything
    /// but the protocol fee, the output side shrinks by the amount paid out,
    /// and the protocol fee is accrued on the input side.
    ///
    /// # Errors
    /// * [`PoolError::Overflow`] if the input side overflows
    /// * [`PoolError::Underflow`] if the output exceeds the reserve
    pub fn after_swap(&self, side_in: Side, quote: &SwapQuote) -> Result<ReserveUpdate, PoolError> {
        let reserve_in = math::add(self.reserve(side_in), quote.reserve_in_increase()?)?;
        let reserve_out = math::sub(self.reserve(side_in.other()), quote.amount_out)?;
        let protocol_fee_in = math::add(self.protocol_fee(side_in), quote.protocol_fee)?;

        let mut update = self.unchanged();
        match side_in {
            Side::A => {
                update.reserve_a = reserve_in;
                update.reserve_b = reserve_out;
                update.protocol_fee_a = protocol_fee_in;
            }
            Side::B => {
                update.reserve_b = reserve_in;
                update.reserve_a = reserve_out;
                update.protocol_fee_b = protocol_fee_in;
            }
        }
        Ok(update)
    }

    /// Reserves after a deposit of `(amount_a, amount_b)`
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if a reserve overflows
    pub fn after_deposit(&self, amount_a: U256, amount_b: U256) -> Result<ReserveUpdate, PoolError> {
        Ok(ReserveUpdate {
            reserve_a: math::add(self.reserve_a, amount_a)?,
            reserve_b: math::add(self.reserve_b, amount_b)?,
            ..self.unchanged()
        })
    }

    /// Reserves after a withdrawal of `(amount_a, amount_b)`
    ///
    /// # Errors
    /// Returns [`PoolError::Underflow`] if a withdrawal exceeds its reserve
    pub fn after_withdrawal(
        &self,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<ReserveUpdate, PoolError> {
        Ok(ReserveUpdate {
            reserve_a: math::sub(self.reserve_a, amount_a)?,
            reserve_b: math::sub(self.reserve_b, amount_b)?,
            ..self.unchanged()
        })
    }

    /// Reserves set to the pool's true balances, net of accrued protocol fees
    ///
    /// # Errors
    /// Returns [`PoolError::Underflow`] if a balance is below its accrued protocol fee
    pub fn after_sync(&self, balance_a: U256, balance_b: U256) -> Result<ReserveUpdate, PoolError> {
        Ok(ReserveUpdate {
            reserve_a: self.tradable(Side::A, balance_a)?,
            reserve_b: self.tradable(Side::B, balance_b)?,
            ..self.unchanged()
        })
    }

    /// Protocol fees zeroed, reserves untouched
    #[must_use]
    pub const fn after_claim(&self) -> ReserveUpdate {
        ReserveUpdate {
            protocol_fee_a: U256::ZERO,
            protocol_fee_b: U256::ZERO,
            ..self.unchanged()
        }
    }

    /// The part of a true token balance that is not owed to the protocol
    ///
    /// # Errors
    /// Returns [`PoolError::Underflow`] if `balance` is below the accrued protocol fee
    pub fn tradable(&self, side: Side, balance: U256) -> Result<U256, PoolError> {
        math::sub(balance, self.protocol_fee(side))
    }

    /// Writes a staged update
    pub fn apply(&mut self, update: ReserveUpdate) {
        self.reserve_a = update.reserve_a;
        self.reserve_b = update.reserve_b;
        self.protocol_fee_a = update.protocol_fee_a;
        self.protocol_fee_b = update.protocol_fee_b;
    }

    /// The current values as an update
    const fn unchanged(&self) -> ReserveUpdate {
        ReserveUpdate {
            reserve_a: self.reserve_a,
            reserve_b: self.reserve_b,
            protocol_fee_a: self.protocol_fee_a,
            protocol_fee_b: self.protocol_fee_b,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::amm::fees::quote_swap;

    fn account_with(reserve_a: u64, reserve_b: u64, now: u64) -> ReserveAccount {
        let mut account = ReserveAccount::new(30, 2_000, 4, now).unwrap();
        let update = account
            .after_deposit(U256::from(reserve_a), U256::from(reserve_b))
            .unwrap();
        account.apply(update);
        account
    }

    #[test]
    fn test_rejects_fee_rate_above_denominator() {
        assert_eq!(
            ReserveAccount::new(FEE_DENOMINATOR + 1, 0, 4, 0),
            Err(PoolError::InvalidFeeRate)
        );
        assert_eq!(
            ReserveAccount::new(0, FEE_DENOMINATOR + 1, 4, 0),
            Err(PoolError::InvalidFeeRate)
        );
        assert!(ReserveAccount::new(FEE_DENOMINATOR, FEE_DENOMINATOR, 4, 0).is_ok());
    }

    #[test]
    fn test_accumulates_other_reserve_times_elapsed() {
        let mut account = account_with(100, 300, 1_000);

        let observation = account.observe(1_010).unwrap();
        assert_eq!(observation.price_cumulative_a, U256::from(3_000));
        assert_eq!(observation.price_cumulative_b, U256::from(1_000));
        // Observing writes nothing
        assert_eq!(account.last_timestamp(), 1_000);

        account.record(observation);
        assert_eq!(account.last_timestamp(), 1_010);
        assert_eq!(
            account.price_cumulative_last(),
            (U256::from(3_000), U256::from(1_000))
        );
    }

    #[test]
    fn test_no_elapsed_time_is_noop() {
        let mut account = account_with(100, 300, 1_000);
        let observation = account.observe(1_000).unwrap();
        account.record(observation);
        assert_eq!(account.observations().len(), 1);

        // A clock running backwards never decreases the accumulators
        let observation = account.observe(900).unwrap();
        assert_eq!(observation.timestamp, 1_000);
        assert_eq!(observation.price_cumulative_a, U256::ZERO);
    }

    #[test]
    fn test_observation_ring_buffer_is_bounded() {
        let mut account = account_with(1, 1, 0);
        for now in 1..=10 {
            let observation = account.observe(now).unwrap();
            account.record(observation);
        }
        assert_eq!(account.observations().len(), 4);
        assert_eq!(account.observations().front().unwrap().timestamp, 7);
        assert_eq!(account.observations().back().unwrap().timestamp, 10);
    }

    #[test]
    fn test_twap() {
        let mut account = account_with(100, 200, 0);
        // reserve_b is 200 for 10s, then 400 for 10s
        let observation = account.observe(10).unwrap();
        account.record(observation);
        account.apply(account.after_deposit(U256::from(100), U256::from(200)).unwrap());

        assert_eq!(account.twap(Side::A, 20, 20).unwrap(), U256::from(300));
        assert_eq!(account.twap(Side::A, 10, 20).unwrap(), U256::from(400));
        assert_eq!(account.twap(Side::B, 20, 20).unwrap(), U256::from(150));
        assert_eq!(account.twap(Side::A, 5, 20).unwrap(), U256::from(400));
        // 5s at 200 then 10s at 400
        assert_eq!(account.twap(Side::A, 15, 20).unwrap(), U256::from(333));
        // 5s at 100 then 10s at 200
        assert_eq!(account.twap(Side::B, 15, 20).unwrap(), U256::from(166));
    }

    #[test]
    fn test_restored_account_is_trimmed_and_validated() {
        let mut account = account_with(1, 1, 0);
        for now in 1..=3 {
            account.record(account.observe(now).unwrap());
        }
        assert_eq!(account.observations().len(), 4);

        let mut json = serde_json::to_value(&account).unwrap();
        json["observation_capacity"] = 2.into();
        let mut shrunk: ReserveAccount = serde_json::from_value(json.clone()).unwrap();
        assert!(shrunk.validate().is_ok());
        shrunk.record(shrunk.observe(4).unwrap());
        assert_eq!(shrunk.observations().len(), 2);
        assert_eq!(shrunk.observations().front().unwrap().timestamp, 3);

        json["observation_capacity"] = 0.into();
        let mut empty: ReserveAccount = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(empty.validate().unwrap_err().code(), "INVALID_CONFIG");
        for now in 4..=10 {
            empty.record(empty.observe(now).unwrap());
        }
        assert_eq!(empty.observations().len(), 1);

        json["observation_capacity"] = 4.into();
        json["fee_rate"] = (FEE_DENOMINATOR + 1).into();
        let expensive: ReserveAccount = serde_json::from_value(json).unwrap();
        assert_eq!(expensive.validate(), Err(PoolError::InvalidFeeRate));
    }

    #[test]
    fn test_twap_duration_errors() {
        let account = account_with(100, 200, 100);
        assert_eq!(account.twap(Side::A, 0, 150), Err(PoolError::InvalidAmounts));
        assert_eq!(account.twap(Side::A, 51, 150), Err(PoolError::DurationTooLong));
        assert_eq!(account.twap(Side::A, 151, 150), Err(PoolError::DurationTooLong));
        assert_eq!(account.twap(Side::A, 50, 150).unwrap(), U256::from(200));
    }

    #[test]
    fn test_after_swap_keeps_protocol_fee_out_of_reserves() {
        let account = account_with(1_000_000, 1_000_000, 0);
        let quote = quote_swap(U256::from(10_000), U256::from(1_000_000), U256::from(1_000_000), 30, 2_000)
            .unwrap();
        let update = account.after_swap(Side::B, &quote).unwrap();

        assert_eq!(update.reserve_b, U256::from(1_000_000 + 10_000 - 6));
        assert_eq!(update.reserve_a, U256::from(1_000_000) - quote.amount_out);
        assert_eq!(update.protocol_fee_b, U256::from(6));
        assert_eq!(update.protocol_fee_a, U256::ZERO);
        assert!(update.reserve_a * update.reserve_b >= account.k().unwrap());
    }

    #[test]
    fn test_after_sync_nets_out_protocol_fees() {
        let mut account = account_with(1_000, 1_000, 0);
        let quote = quote_swap(U256::from(10_000), U256::from(1_000), U256::from(1_000), 30, 10_000)
            .unwrap();
        account.apply(account.after_swap(Side::A, &quote).unwrap());
        let fee_a = account.protocol_fee(Side::A);
        assert_eq!(fee_a, U256::from(30));

        let update = account.after_sync(U256::from(5_000), U256::from(700)).unwrap();
        assert_eq!(update.reserve_a, U256::from(5_000) - fee_a);
        assert_eq!(update.reserve_b, U256::from(700));
        assert_eq!(
            account.after_sync(U256::from(29), U256::ZERO),
            Err(PoolError::Underflow)
        );
    }
}
