#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use alloy::primitives::{Address, U256};

use super::error::PoolError;
use super::flash::FlashBorrower;
use super::pool::Pool;
pub use crate::config::Config;
use crate::token::TokenService;
pub use crate::token::TokenBank;
pub use crate::utils::clock::ManualClock;

/// Pool over the in-memory bank with a settable clock
pub type TestPool = Pool<TokenBank, ManualClock>;

/// Clock value every test pool starts at
pub const START_TIME: u64 = 1_000;

/// Builds an address from a short hex suffix, e.g. `"A1"` -> `0x00..00a1`
pub fn address_from_str(s: &str) -> Address {
    Address::from_str(&format!("0x{s:0>40}")).unwrap()
}

/// An empty pool trading `A`/`B` at `F1`, plus a handle on its clock
pub fn empty_pool(config: &Config) -> (TestPool, ManualClock) {
    let clock = ManualClock::new(START_TIME);
    let pool = Pool::new(
        address_from_str("F1"),
        address_from_str("A"),
        address_from_str("B"),
        config,
        TokenBank::new(address_from_str("E7")),
        clock.clone(),
    )
    .unwrap();
    (pool, clock)
}

/// A pool whose first deposit of `reserve_a`/`reserve_b` was made by `A1`
pub fn seeded_pool(reserve_a: u64, reserve_b: u64, config: &Config) -> (TestPool, ManualClock) {
    let (mut pool, clock) = empty_pool(config);
    let alice = address_from_str("A1");
    fund(&mut pool, alice, reserve_a, reserve_b);
    pool.add_liquidity(
        U256::from(reserve_a),
        U256::from(reserve_b),
        U256::ZERO,
        U256::ZERO,
        alice,
    )
    .unwrap();
    (pool, clock)
}

/// Mints both tokens to `account` and lets the pool spend all of them
pub fn fund(pool: &mut TestPool, account: Address, amount_a: u64, amount_b: u64) {
    let (token_a, token_b, address) = (pool.token_a(), pool.token_b(), pool.address());
    let bank = pool.tokens_mut();
    bank.mint(token_a, account, U256::from(amount_a)).unwrap();
    bank.mint(token_b, account, U256::from(amount_b)).unwrap();
    bank.approve(token_a, account, address, U256::MAX);
    bank.approve(token_b, account, address, U256::MAX);
}

/// `(balance_a, balance_b)` of `account`
pub fn token_balances(pool: &TestPool, account: Address) -> (U256, U256) {
    let bank = pool.tokens();
    (
        bank.balance_of(pool.token_a(), account).unwrap(),
        bank.balance_of(pool.token_b(), account).unwrap(),
    )
}

/// `(balance_a, balance_b)` held by the pool itself
pub fn pool_balances(pool: &TestPool) -> (U256, U256) {
    token_balances(pool, pool.address())
}

/// Flash borrower that sends back fixed amounts
pub struct Repayer {
    /// Receives the loan and pays the repayment
    pub address: Address,
    /// Amount of `A` sent back
    pub repay_a: U256,
    /// Amount of `B` sent back
    pub repay_b: U256,
    /// `(amount_a, amount_b, data)` of every callback
    pub calls: Vec<(U256, U256, Vec<u8>)>,
}

impl Repayer {
    /// A borrower at `address` repaying `repay_a`/`repay_b`
    pub fn new(address: Address, repay_a: u64, repay_b: u64) -> Self {
        Self {
            address,
            repay_a: U256::from(repay_a),
            repay_b: U256::from(repay_b),
            calls: Vec::new(),
        }
    }
}

impl FlashBorrower<TokenBank, ManualClock> for Repayer {
    fn address(&self) -> Address {
        self.address
    }

    fn on_flash_borrow(
        &mut self,
        pool: &mut TestPool,
        _initiator: Address,
        amount_a: U256,
        amount_b: U256,
        data: &[u8],
    ) -> Result<(), PoolError> {
        self.calls.push((amount_a, amount_b, data.to_vec()));
        let (token_a, token_b, to) = (pool.token_a(), pool.token_b(), pool.address());
        pool.tokens_mut()
            .transfer(token_a, self.address, to, self.repay_a)?;
        pool.tokens_mut()
            .transfer(token_b, self.address, to, self.repay_b)
    }
}

/// Flash borrower that calls back into the pool and reports what happened
pub struct Reenterer {
    /// Receives the loan
    pub address: Address,
    /// Errors returned by the pool calls made from the callback
    pub attempts: Vec<PoolError>,
}

impl Reenterer {
    /// A borrower at `address` with no attempts yet
    pub fn new(address: Address) -> Self {
        Self {
            address,
            attempts: Vec::new(),
        }
    }
}

impl FlashBorrower<TokenBank, ManualClock> for Reenterer {
    fn address(&self) -> Address {
        self.address
    }

    fn on_flash_borrow(
        &mut self,
        pool: &mut TestPool,
        _initiator: Address,
        _amount_a: U256,
        _amount_b: U256,
        _data: &[u8],
    ) -> Result<(), PoolError> {
        let one = U256::from(1);
        let token_a = pool.token_a();
        let results = [
            pool.swap(token_a, U256::from(100), one, self.address).err(),
            pool.add_liquidity(one, one, U256::ZERO, U256::ZERO, self.address)
                .err(),
            pool.sync_reserves().err(),
            pool.flash_borrow(one, U256::ZERO, &mut Repayer::new(self.address, 2, 0), &[], self.address)
                .err(),
        ];
        self.attempts.extend(results.into_iter().flatten());
        match self.attempts.first() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
