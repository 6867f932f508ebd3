//! The pool engine: liquidity, swaps, flash borrows and the price oracle.
//!
//! Every mutating entry point follows the same shape:
//!
//! 1. take the pool lock (reentrant calls fail with [`PoolError::Reentrant`])
//! 2. checkpoint the token service
//! 3. validate the inputs and compute every new value with checked math
//! 4. move tokens
//! 5. write the new pool state
//!
//! Any error in steps 3-5 rolls the token service back to the checkpoint, and
//! pool state is only written once nothing else can fail, so a failed call
//! leaves no trace.

use std::cmp::min;
use std::fmt::{self, Debug};

use alloy::primitives::{Address, U256, U512};

use super::error::PoolError;
use super::fees::{self, SwapQuote};
use super::flash::FlashBorrower;
use super::ledger::LiquidityLedger;
use super::lock::ReentrancyLock;
use super::math;
use super::reserves::{ReserveAccount, Side};
use crate::config::Config;
use crate::models::snapshot::PoolSnapshot;
use crate::token::TokenService;
use crate::utils::clock::Clock;
use crate::utils::constants::{BURN_ADDRESS, FEE_DENOMINATOR};

/// A constant product pool over two tokens.
///
/// `T` moves the traded tokens, `C` tells the time for the price accumulator.
pub struct Pool<T: TokenService, C: Clock> {
    /// The pool's own account in the token service
    address: Address,
    /// First traded token
    token_a: Address,
    /// Second traded token
    token_b: Address,
    /// Shares locked out of the first deposit
    minimum_liquidity: U256,
    /// Receives claimed protocol fees
    protocol_fee_receiver: Address,
    /// Reserves, fees and price accumulators
    reserves: ReserveAccount,
    /// LP shares
    lp: LiquidityLedger,
    /// Reentrancy protection
    lock: ReentrancyLock,
    /// Token collaborator
    tokens: T,
    /// Time source
    clock: C,
}

impl<T: TokenService, C: Clock> Debug for Pool<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (reserve_a, reserve_b) = self.reserves.reserves();
        write!(
            f,
            "Pool({}, {} {} / {} {}, {} shares)",
            self.address,
            reserve_a,
            self.token_a,
            reserve_b,
            self.token_b,
            self.lp.total_supply()
        )
    }
}

impl<T: TokenService, C: Clock> Pool<T, C> {
    /// Creates an empty pool.
    ///
    /// # Arguments
    /// * `address` - The pool's own account in `tokens`
    /// * `token_a` - First traded token
    /// * `token_b` - Second traded token
    /// * `config` - Fee rates and policies, fixed for the pool's lifetime
    /// * `tokens` - Token collaborator
    /// * `clock` - Time source; the creation time seeds the price accumulator
    ///
    /// # Errors
    /// * [`PoolError::InvalidToken`] if both tokens are the same
    /// * [`PoolError::InvalidFeeRate`] or [`PoolError::InvalidConfig`] if `config` is invalid
    pub fn new(
        address: Address,
        token_a: Address,
        token_b: Address,
        config: &Config,
        tokens: T,
        clock: C,
    ) -> Result<Self, PoolError> {
        if token_a == token_b {
            return Err(PoolError::InvalidToken);
        }
        config.validate()?;

        let reserves = ReserveAccount::new(
            config.fee_rate,
            config.fee_share_protocol,
            config.observation_capacity,
            clock.now(),
        )?;
        log::info!(
            "pool::new: {address} trading {token_a}/{token_b} at {} bps",
            config.fee_rate
        );

        Ok(Self {
            address,
            token_a,
            token_b,
            minimum_liquidity: config.minimum_liquidity,
            protocol_fee_receiver: config.protocol_fee_receiver,
            reserves,
            lp: LiquidityLedger::new(),
            lock: ReentrancyLock::new(),
            tokens,
            clock,
        })
    }

    /// Rebuilds a pool from persisted state.
    ///
    /// # Errors
    /// * [`PoolError::InvalidToken`] if the snapshot's tokens are the same
    /// * [`PoolError::InvalidFeeRate`] or [`PoolError::InvalidConfig`] if the
    ///   restored fee rates or observation capacity are out of range
    pub fn from_snapshot(snapshot: PoolSnapshot, tokens: T, clock: C) -> Result<Self, PoolError> {
        if snapshot.token_a == snapshot.token_b {
            return Err(PoolError::InvalidToken);
        }
        snapshot.reserves.validate()?;
        Ok(Self {
            address: snapshot.address,
            token_a: snapshot.token_a,
            token_b: snapshot.token_b,
            minimum_liquidity: snapshot.minimum_liquidity,
            protocol_fee_receiver: snapshot.protocol_fee_receiver,
            reserves: snapshot.reserves,
            lp: snapshot.lp,
            lock: ReentrancyLock::new(),
            tokens,
            clock,
        })
    }

    /// Captures the persisted state of the pool
    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            address: self.address,
            token_a: self.token_a,
            token_b: self.token_b,
            minimum_liquidity: self.minimum_liquidity,
            protocol_fee_receiver: self.protocol_fee_receiver,
            reserves: self.reserves.clone(),
            lp: self.lp.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// The pool's own account
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// First traded token
    #[must_use]
    pub const fn token_a(&self) -> Address {
        self.token_a
    }

    /// Second traded token
    #[must_use]
    pub const fn token_b(&self) -> Address {
        self.token_b
    }

    /// `(reserve_a, reserve_b)`
    #[must_use]
    pub const fn reserves(&self) -> (U256, U256) {
        self.reserves.reserves()
    }

    /// `(protocol_fee_a, protocol_fee_b)` accrued and not yet claimed
    #[must_use]
    pub const fn protocol_fees(&self) -> (U256, U256) {
        self.reserves.protocol_fees()
    }

    /// `(price_cumulative_a, price_cumulative_b)` as of the last update
    #[must_use]
    pub const fn price_cumulative_last(&self) -> (U256, U256) {
        self.reserves.price_cumulative_last()
    }

    /// Time of the last accumulator update
    #[must_use]
    pub const fn last_timestamp(&self) -> u64 {
        self.reserves.last_timestamp()
    }

    /// Swap fee in basis points
    #[must_use]
    pub const fn fee_rate(&self) -> u32 {
        self.reserves.fee_rate()
    }

    /// Protocol share of the swap fee in basis points
    #[must_use]
    pub const fn fee_share_protocol(&self) -> u32 {
        self.reserves.fee_share_protocol()
    }

    /// Reserves, fees and accumulators
    #[must_use]
    pub const fn reserve_account(&self) -> &ReserveAccount {
        &self.reserves
    }

    /// LP shares held by `account`
    #[must_use]
    pub fn lp_balance(&self, account: Address) -> U256 {
        self.lp.balance_of(account)
    }

    /// Total LP shares
    #[must_use]
    pub const fn total_supply(&self) -> U256 {
        self.lp.total_supply()
    }

    /// The LP share ledger
    #[must_use]
    pub const fn lp(&self) -> &LiquidityLedger {
        &self.lp
    }

    /// The token collaborator
    #[must_use]
    pub const fn tokens(&self) -> &T {
        &self.tokens
    }

    /// The token collaborator, for funding accounts and repaying flash borrows
    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    /// The time source
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Whether an operation is in progress
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Which side of the pool `token` is
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidToken`] if `token` is not traded by this pool
    pub fn side_of(&self, token: Address) -> Result<Side, PoolError> {
        if token == self.token_a {
            Ok(Side::A)
        } else if token == self.token_b {
            Ok(Side::B)
        } else {
            Err(PoolError::InvalidToken)
        }
    }

    /// Token address of `side`
    #[must_use]
    pub const fn token(&self, side: Side) -> Address {
        match side {
            Side::A => self.token_a,
            Side::B => self.token_b,
        }
    }

    /// Time-weighted average over the last `duration` seconds of the reserve
    /// opposite to `asset`.
    ///
    /// # Errors
    /// * [`PoolError::InvalidToken`] if `asset` is not traded by this pool
    /// * [`PoolError::InvalidAmounts`] if `duration` is zero
    /// * [`PoolError::DurationTooLong`] if the window predates the retained observations
    pub fn twap(&self, asset: Address, duration: u64) -> Result<U256, PoolError> {
        let side = self.side_of(asset)?;
        self.reserves.twap(side, duration, self.clock.now())
    }

    /// Prices a swap against the current reserves without executing it.
    ///
    /// # Errors
    /// * [`PoolError::InvalidToken`] if `token_in` is not traded by this pool
    /// * [`PoolError::InsufficientLiquidity`] if either reserve is empty
    pub fn preview_swap(&self, token_in: Address, amount_in: U256) -> Result<SwapQuote, PoolError> {
        let side_in = self.side_of(token_in)?;
        let reserve_in = self.reserves.reserve(side_in);
        let reserve_out = self.reserves.reserve(side_in.other());
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(PoolError::InsufficientLiquidity);
        }
        fees::quote_swap(
            amount_in,
            reserve_in,
            reserve_out,
            self.reserves.fee_rate(),
            self.reserves.fee_share_protocol(),
        )
    }

    // ------------------------------------------------------------------
    // Liquidity
    // ------------------------------------------------------------------

    /// Deposits both tokens and mints LP shares to `provider`.
    ///
    /// The first deposit sets the price and mints `sqrt(amount_a * amount_b)`
    /// shares, minus the configured minimum liquidity which is locked forever.
    /// Later deposits are trimmed to the current reserve ratio: only the
    /// effective amounts are pulled from the provider and the price does not
    /// move.
    ///
    /// # Arguments
    /// * `amount_a` / `amount_b` - Most the provider is willing to deposit
    /// * `min_amount_a` / `min_amount_b` - Least the provider accepts to deposit
    /// * `provider` - Pays the tokens and receives the shares; must have
    ///   approved the pool for both tokens
    ///
    /// # Returns
    /// The number of shares minted to `provider`
    ///
    /// # Errors
    /// * [`PoolError::InvalidAmounts`] if either amount is zero
    /// * [`PoolError::SlippageExceeded`] if an effective amount is below its minimum
    /// * [`PoolError::InsufficientLiquidityMinted`] if no shares would be minted
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any token service error while pulling the tokens
    pub fn add_liquidity(
        &mut self,
        amount_a: U256,
        amount_b: U256,
        min_amount_a: U256,
        min_amount_b: U256,
        provider: Address,
    ) -> Result<U256, PoolError> {
        let _guard = self.lock.acquire()?;
        self.with_rollback(|pool| {
            pool.add_liquidity_inner(amount_a, amount_b, min_amount_a, min_amount_b, provider)
        })
    }

    /// Body of [`Pool::add_liquidity`]
    fn add_liquidity_inner(
        &mut self,
        amount_a: U256,
        amount_b: U256,
        min_amount_a: U256,
        min_amount_b: U256,
        provider: Address,
    ) -> Result<U256, PoolError> {
        if amount_a.is_zero() || amount_b.is_zero() {
            return Err(PoolError::InvalidAmounts);
        }

        let (reserve_a, reserve_b) = self.reserves.reserves();
        let total_supply = self.lp.total_supply();
        let first_deposit = total_supply.is_zero() || (reserve_a.is_zero() && reserve_b.is_zero());

        let (amount_a, amount_b, liquidity, locked) = if first_deposit {
            let minted = math::sqrt(math::mul(amount_a, amount_b)?);
            if minted <= self.minimum_liquidity {
                return Err(PoolError::InsufficientLiquidityMinted);
            }
            (
                amount_a,
                amount_b,
                minted - self.minimum_liquidity,
                self.minimum_liquidity,
            )
        } else {
            let (amount_a, amount_b) =
                optimal_amounts(amount_a, amount_b, reserve_a, reserve_b)?;
            let liquidity = min(
                math::mul_div(amount_a, total_supply, reserve_a)?,
                math::mul_div(amount_b, total_supply, reserve_b)?,
            );
            (amount_a, amount_b, liquidity, U256::ZERO)
        };

        if amount_a < min_amount_a || amount_b < min_amount_b {
            log::warn!(
                "pool::add_liquidity: effective amounts {amount_a}/{amount_b} below minimums {min_amount_a}/{min_amount_b}"
            );
            return Err(PoolError::SlippageExceeded);
        }
        if liquidity.is_zero() {
            return Err(PoolError::InsufficientLiquidityMinted);
        }

        // Minting cannot fail once the new supply is known to fit
        math::add(math::add(total_supply, liquidity)?, locked)?;
        let observation = self.reserves.observe(self.clock.now())?;
        let update = self.reserves.after_deposit(amount_a, amount_b)?;

        self.pull(Side::A, provider, amount_a)?;
        self.pull(Side::B, provider, amount_b)?;

        if !locked.is_zero() {
            self.lp.mint(BURN_ADDRESS, locked)?;
        }
        self.lp.mint(provider, liquidity)?;
        self.reserves.record(observation);
        self.reserves.apply(update);

        log::info!(
            "pool::add_liquidity: {provider} deposited {amount_a}/{amount_b}, minted {liquidity} shares"
        );
        Ok(liquidity)
    }

    /// Burns `share_amount` of `provider`'s shares and pays out the
    /// proportional part of both reserves.
    ///
    /// # Returns
    /// `(amount_a, amount_b)` sent to `provider`
    ///
    /// # Errors
    /// * [`PoolError::InvalidAmounts`] if `share_amount` is zero or redeems nothing
    /// * [`PoolError::InsufficientShares`] if `provider` holds fewer shares
    /// * [`PoolError::SlippageExceeded`] if an amount is below its minimum
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any token service error while paying out
    pub fn remove_liquidity(
        &mut self,
        share_amount: U256,
        min_amount_a: U256,
        min_amount_b: U256,
        provider: Address,
    ) -> Result<(U256, U256), PoolError> {
        let _guard = self.lock.acquire()?;
        self.with_rollback(|pool| {
            pool.remove_liquidity_inner(share_amount, min_amount_a, min_amount_b, provider)
        })
    }

    /// Body of [`Pool::remove_liquidity`]
    fn remove_liquidity_inner(
        &mut self,
        share_amount: U256,
        min_amount_a: U256,
        min_amount_b: U256,
        provider: Address,
    ) -> Result<(U256, U256), PoolError> {
        if share_amount.is_zero() {
            return Err(PoolError::InvalidAmounts);
        }
        if self.lp.balance_of(provider) < share_amount {
            return Err(PoolError::InsufficientShares);
        }

        let (reserve_a, reserve_b) = self.reserves.reserves();
        let total_supply = self.lp.total_supply();
        let amount_a = math::mul_div(share_amount, reserve_a, total_supply)?;
        let amount_b = math::mul_div(share_amount, reserve_b, total_supply)?;

        if amount_a.is_zero() && amount_b.is_zero() {
            return Err(PoolError::InvalidAmounts);
        }
        if amount_a < min_amount_a || amount_b < min_amount_b {
            log::warn!(
                "pool::remove_liquidity: amounts {amount_a}/{amount_b} below minimums {min_amount_a}/{min_amount_b}"
            );
            return Err(PoolError::SlippageExceeded);
        }

        let observation = self.reserves.observe(self.clock.now())?;
        let update = self.reserves.after_withdrawal(amount_a, amount_b)?;

        self.push(Side::A, provider, amount_a)?;
        self.push(Side::B, provider, amount_b)?;

        self.lp.burn(provider, share_amount)?;
        self.reserves.record(observation);
        self.reserves.apply(update);

        log::info!(
            "pool::remove_liquidity: {provider} burned {share_amount} shares for {amount_a}/{amount_b}"
        );
        Ok((amount_a, amount_b))
    }

    // ------------------------------------------------------------------
    // Swaps
    // ------------------------------------------------------------------

    /// Sells `amount_in` of `token_in` for the other token.
    ///
    /// The protocol part of the fee is kept out of the reserves; the LP part
    /// stays in them, so `reserve_a * reserve_b` never decreases.
    ///
    /// # Arguments
    /// * `token_in` - The token being sold
    /// * `amount_in` - How much is sold
    /// * `min_amount_out` - Least the caller accepts to receive
    /// * `caller` - Pays `amount_in` (must have approved the pool) and receives the output
    ///
    /// # Returns
    /// The amount of the other token paid to `caller`
    ///
    /// # Errors
    /// * [`PoolError::InvalidToken`] if `token_in` is not traded by this pool
    /// * [`PoolError::InvalidAmounts`] if `amount_in` or `min_amount_out` is zero
    /// * [`PoolError::InsufficientLiquidity`] if either reserve is empty
    /// * [`PoolError::SlippageExceeded`] if the output is below `min_amount_out`
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any token service error while moving the tokens
    pub fn swap(
        &mut self,
        token_in: Address,
        amount_in: U256,
        min_amount_out: U256,
        caller: Address,
    ) -> Result<U256, PoolError> {
        let _guard = self.lock.acquire()?;
        self.with_rollback(|pool| pool.swap_inner(token_in, amount_in, min_amount_out, caller))
    }

    /// Body of [`Pool::swap`]
    fn swap_inner(
        &mut self,
        token_in: Address,
        amount_in: U256,
        min_amount_out: U256,
        caller: Address,
    ) -> Result<U256, PoolError> {
        let side_in = self.side_of(token_in)?;
        if amount_in.is_zero() || min_amount_out.is_zero() {
            return Err(PoolError::InvalidAmounts);
        }

        let quote = self.preview_swap(token_in, amount_in)?;
        log::debug!("pool::swap: {quote:?}");
        if quote.amount_out < min_amount_out {
            log::warn!(
                "pool::swap: output {} below minimum {min_amount_out}",
                quote.amount_out
            );
            return Err(PoolError::SlippageExceeded);
        }

        let observation = self.reserves.observe(self.clock.now())?;
        let update = self.reserves.after_swap(side_in, &quote)?;

        self.pull(side_in, caller, amount_in)?;
        self.push(side_in.other(), caller, quote.amount_out)?;

        self.reserves.record(observation);
        self.reserves.apply(update);

        log::info!(
            "pool::swap: {caller} sold {amount_in} {side_in} for {} {}",
            quote.amount_out,
            side_in.other()
        );
        Ok(quote.amount_out)
    }

    // ------------------------------------------------------------------
    // Flash borrows
    // ------------------------------------------------------------------

    /// Lends reserves to `borrower` for the duration of its callback.
    ///
    /// The borrower must return the loan plus the swap fee before its callback
    /// returns. Afterwards the fee-adjusted product of the pool balances must be
    /// at least the reserve product from before the loan.
    ///
    /// # Arguments
    /// * `amount_a_out` / `amount_b_out` - Amounts lent; either may be zero
    /// * `borrower` - Receives the loan and the callback
    /// * `data` - Passed through to the callback
    /// * `initiator` - Passed through to the callback
    ///
    /// # Errors
    /// * [`PoolError::InvalidAmounts`] if both amounts are zero or one exceeds its reserve
    /// * [`PoolError::InsufficientRepayment`] if nothing came back
    /// * [`PoolError::InvariantViolation`] if the repayment does not cover the fee
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any error returned by the borrower or the token service
    pub fn flash_borrow<B: FlashBorrower<T, C>>(
        &mut self,
        amount_a_out: U256,
        amount_b_out: U256,
        borrower: &mut B,
        data: &[u8],
        initiator: Address,
    ) -> Result<(), PoolError> {
        let _guard = self.lock.acquire()?;
        self.with_rollback(|pool| {
            pool.flash_borrow_inner(amount_a_out, amount_b_out, borrower, data, initiator)
        })
    }

    /// Body of [`Pool::flash_borrow`]
    fn flash_borrow_inner<B: FlashBorrower<T, C>>(
        &mut self,
        amount_a_out: U256,
        amount_b_out: U256,
        borrower: &mut B,
        data: &[u8],
        initiator: Address,
    ) -> Result<(), PoolError> {
        let (reserve_a, reserve_b) = self.reserves.reserves();
        if amount_a_out.is_zero() && amount_b_out.is_zero() {
            return Err(PoolError::InvalidAmounts);
        }
        if amount_a_out > reserve_a || amount_b_out > reserve_b {
            return Err(PoolError::InvalidAmounts);
        }

        let k_before = math::wide_mul(reserve_a, reserve_b);
        let to = borrower.address();
        self.push(Side::A, to, amount_a_out)?;
        self.push(Side::B, to, amount_b_out)?;

        log::debug!("pool::flash_borrow: lent {amount_a_out}/{amount_b_out} to {to}");
        borrower.on_flash_borrow(self, initiator, amount_a_out, amount_b_out, data)?;

        let (raw_a, raw_b) = self.balances()?;
        let balance_a = self.reserves.tradable(Side::A, raw_a)?;
        let balance_b = self.reserves.tradable(Side::B, raw_b)?;
        let amount_a_in = balance_a.saturating_sub(math::sub(reserve_a, amount_a_out)?);
        let amount_b_in = balance_b.saturating_sub(math::sub(reserve_b, amount_b_out)?);
        if amount_a_in.is_zero() && amount_b_in.is_zero() {
            log::warn!("pool::flash_borrow: {to} repaid nothing");
            return Err(PoolError::InsufficientRepayment);
        }

        let fee_rate = U256::from(self.reserves.fee_rate());
        let adjusted_a = fee_adjusted(balance_a, amount_a_in, fee_rate)?;
        let adjusted_b = fee_adjusted(balance_b, amount_b_in, fee_rate)?;
        let k_after = adjusted_a
            .checked_mul(adjusted_b)
            .ok_or(PoolError::Overflow)?;
        let k_required = k_before
            .checked_mul(math::wide_mul(denominator(), denominator()))
            .ok_or(PoolError::Overflow)?;
        if k_after < k_required {
            log::warn!(
                "pool::flash_borrow: {to} repaid {amount_a_in}/{amount_b_in}, fee-adjusted product {k_after} below {k_required}"
            );
            return Err(PoolError::InvariantViolation);
        }

        let observation = self.reserves.observe(self.clock.now())?;
        let update = self.reserves.after_sync(raw_a, raw_b)?;
        self.reserves.record(observation);
        self.reserves.apply(update);

        log::info!(
            "pool::flash_borrow: {to} borrowed {amount_a_out}/{amount_b_out} and repaid {amount_a_in}/{amount_b_in}"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Sends the accrued protocol fees to the configured receiver.
    ///
    /// With the default receiver, [`BURN_ADDRESS`], the fees are burned.
    ///
    /// # Returns
    /// `(fee_a, fee_b)` sent
    ///
    /// # Errors
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any token service error while paying out
    pub fn claim_protocol_fees(&mut self) -> Result<(U256, U256), PoolError> {
        let _guard = self.lock.acquire()?;
        self.with_rollback(|pool| {
            let (fee_a, fee_b) = pool.reserves.protocol_fees();
            let receiver = pool.protocol_fee_receiver;
            if receiver == BURN_ADDRESS {
                log::warn!("pool::claim_protocol_fees: no receiver configured, burning {fee_a}/{fee_b}");
            }
            pool.push(Side::A, receiver, fee_a)?;
            pool.push(Side::B, receiver, fee_b)?;

            let update = pool.reserves.after_claim();
            pool.reserves.apply(update);

            log::info!("pool::claim_protocol_fees: sent {fee_a}/{fee_b} to {receiver}");
            Ok((fee_a, fee_b))
        })
    }

    /// Sets the reserves to the pool's true balances, net of protocol fees.
    ///
    /// Tokens sent to the pool outside of its operations become part of the
    /// reserves.
    ///
    /// # Returns
    /// The new `(reserve_a, reserve_b)`
    ///
    /// # Errors
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any token service error while reading balances
    pub fn sync_reserves(&mut self) -> Result<(U256, U256), PoolError> {
        let _guard = self.lock.acquire()?;
        let (balance_a, balance_b) = self.balances()?;
        let observation = self.reserves.observe(self.clock.now())?;
        let update = self.reserves.after_sync(balance_a, balance_b)?;

        self.reserves.record(observation);
        self.reserves.apply(update);

        log::info!(
            "pool::sync_reserves: reserves now {}/{}",
            update.reserve_a,
            update.reserve_b
        );
        Ok((update.reserve_a, update.reserve_b))
    }

    /// Sends tokens held beyond the reserves and protocol fees to `to`.
    ///
    /// # Returns
    /// `(excess_a, excess_b)` sent
    ///
    /// # Errors
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    /// * Any token service error while reading balances or paying out
    pub fn skim(&mut self, to: Address) -> Result<(U256, U256), PoolError> {
        let _guard = self.lock.acquire()?;
        self.with_rollback(|pool| {
            let (balance_a, balance_b) = pool.balances()?;
            let (reserve_a, reserve_b) = pool.reserves.reserves();
            let excess_a = math::sub(pool.reserves.tradable(Side::A, balance_a)?, reserve_a)?;
            let excess_b = math::sub(pool.reserves.tradable(Side::B, balance_b)?, reserve_b)?;

            pool.push(Side::A, to, excess_a)?;
            pool.push(Side::B, to, excess_b)?;

            log::info!("pool::skim: sent {excess_a}/{excess_b} to {to}");
            Ok((excess_a, excess_b))
        })
    }

    // ------------------------------------------------------------------
    // LP shares
    // ------------------------------------------------------------------

    /// Moves LP shares between accounts
    ///
    /// # Errors
    /// * [`PoolError::InsufficientBalance`] if `from` holds fewer shares
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    pub fn transfer_shares(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let _guard = self.lock.acquire()?;
        self.lp.transfer(from, to, amount)
    }

    /// Sets `spender`'s allowance over `owner`'s LP shares
    ///
    /// # Errors
    /// Returns [`PoolError::Reentrant`] if called while the pool is locked
    pub fn approve_shares(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let _guard = self.lock.acquire()?;
        self.lp.approve(owner, spender, amount);
        Ok(())
    }

    /// Raises `spender`'s allowance over `owner`'s LP shares
    ///
    /// # Errors
    /// * [`PoolError::Overflow`] if the allowance overflows
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    pub fn increase_share_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let _guard = self.lock.acquire()?;
        self.lp.increase_allowance(owner, spender, amount)
    }

    /// Lowers `spender`'s allowance over `owner`'s LP shares
    ///
    /// # Errors
    /// * [`PoolError::InsufficientAllowance`] if the allowance would go below zero
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    pub fn decrease_share_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let _guard = self.lock.acquire()?;
        self.lp.decrease_allowance(owner, spender, amount)
    }

    /// Moves `owner`'s LP shares to `to` on `spender`'s allowance
    ///
    /// # Errors
    /// * [`PoolError::InsufficientAllowance`] if the allowance is too small
    /// * [`PoolError::InsufficientBalance`] if `owner` holds fewer shares
    /// * [`PoolError::Reentrant`] if called while the pool is locked
    pub fn transfer_shares_from(
        &mut self,
        owner: Address,
        spender: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let _guard = self.lock.acquire()?;
        self.lp.transfer_from(owner, spender, to, amount)
    }

    // ------------------------------------------------------------------
    // Token movements
    // ------------------------------------------------------------------

    /// Runs `operation`, undoing its token movements if it fails
    fn with_rollback<R>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> Result<R, PoolError>,
    ) -> Result<R, PoolError> {
        let checkpoint = self.tokens.checkpoint();
        let result = operation(self);
        if let Err(e) = &result {
            log::warn!("pool: operation failed, rolling back token transfers: {e}");
            self.tokens.rollback(checkpoint);
        }
        result
    }

    /// Moves `amount` of `side` from `from` into the pool
    fn pull(&mut self, side: Side, from: Address, amount: U256) -> Result<(), PoolError> {
        let token = self.token(side);
        self.tokens
            .transfer_from(token, from, self.address, self.address, amount)
    }

    /// Moves `amount` of `side` from the pool to `to`
    fn push(&mut self, side: Side, to: Address, amount: U256) -> Result<(), PoolError> {
        let token = self.token(side);
        self.tokens.transfer(token, self.address, to, amount)
    }

    /// The pool's true balances of both tokens
    fn balances(&self) -> Result<(U256, U256), PoolError> {
        Ok((
            self.tokens.balance_of(self.token_a, self.address)?,
            self.tokens.balance_of(self.token_b, self.address)?,
        ))
    }
}

/// [`FEE_DENOMINATOR`] as an amount
fn denominator() -> U256 {
    U256::from(FEE_DENOMINATOR)
}

/// `balance * FEE_DENOMINATOR - amount_in * fee_rate`, in 512 bits
fn fee_adjusted(balance: U256, amount_in: U256, fee_rate: U256) -> Result<U512, PoolError> {
    math::wide_mul(balance, denominator())
        .checked_sub(math::wide_mul(amount_in, fee_rate))
        .ok_or(PoolError::Underflow)
}

/// Trims a deposit to the current reserve ratio.
///
/// Keeps all of `amount_a` if the matching `b` fits in `amount_b`, otherwise
/// keeps all of `amount_b` and scales `a` down.
fn optimal_amounts(
    amount_a: U256,
    amount_b: U256,
    reserve_a: U256,
    reserve_b: U256,
) -> Result<(U256, U256), PoolError> {
    let b_optimal = math::mul_div(amount_a, reserve_b, reserve_a)?;
    if b_optimal <= amount_b {
        return Ok((amount_a, b_optimal));
    }
    let a_optimal = math::mul_div(amount_b, reserve_a, reserve_b)?;
    Ok((a_optimal, amount_b))
}
