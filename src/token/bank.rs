use std::collections::HashMap;

use alloy::primitives::{Address, U256};

use super::{TokenService, WrappedNative};
use crate::amm::error::PoolError;
use crate::amm::ledger::LiquidityLedger;
use crate::amm::math;

/// Every token held in memory, one [`LiquidityLedger`] per token address.
///
/// Used to run pools without a chain: tests, benchmarks and simulations.
/// Rollback restores a full copy, which is fine at this scale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBank {
    /// Ledger of each token
    ledgers: HashMap<Address, LiquidityLedger>,
    /// Native coin balances
    native: HashMap<Address, U256>,
    /// Token that wraps the native coin
    wrapped: Address,
}

impl TokenBank {
    /// Creates an empty bank whose wrapped native token lives at `wrapped`
    #[must_use]
    pub fn new(wrapped: Address) -> Self {
        Self {
            wrapped,
            ..Self::default()
        }
    }

    /// Creates `amount` of `token` out of thin air for `account`
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if the supply overflows
    pub fn mint(&mut self, token: Address, account: Address, amount: U256) -> Result<(), PoolError> {
        self.ledgers.entry(token).or_default().mint(account, amount)
    }

    /// Lets `spender` move up to `amount` of `owner`'s `token`
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.ledgers
            .entry(token)
            .or_default()
            .approve(owner, spender, amount);
    }

    /// Remaining allowance of `spender` over `owner`'s `token`
    #[must_use]
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.ledgers
            .get(&token)
            .map(|ledger| ledger.allowance(owner, spender))
            .unwrap_or_default()
    }

    /// Total supply of `token`
    #[must_use]
    pub fn total_supply(&self, token: Address) -> U256 {
        self.ledgers
            .get(&token)
            .map(LiquidityLedger::total_supply)
            .unwrap_or_default()
    }

    /// Credits native coin to `account`
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if the balance overflows
    pub fn deposit_native(&mut self, account: Address, amount: U256) -> Result<(), PoolError> {
        let balance = math::add(self.native_balance(account), amount)?;
        self.native.insert(account, balance);
        Ok(())
    }

    /// Native coin balance of `account`
    #[must_use]
    pub fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    /// The ledger of a token that must already exist
    fn ledger_mut(&mut self, token: Address) -> Result<&mut LiquidityLedger, PoolError> {
        self.ledgers
            .get_mut(&token)
            .ok_or(PoolError::InsufficientBalance)
    }
}

impl TokenService for TokenBank {
    type Checkpoint = Self;

    fn balance_of(&self, token: Address, account: Address) -> Result<U256, PoolError> {
        Ok(self
            .ledgers
            .get(&token)
            .map(|ledger| ledger.balance_of(account))
            .unwrap_or_default())
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.ledger_mut(token)?.transfer(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.ledger_mut(token)?
            .transfer_from(owner, spender, to, amount)
    }

    fn checkpoint(&self) -> Self::Checkpoint {
        self.clone()
    }

    fn rollback(&mut self, checkpoint: Self::Checkpoint) {
        *self = checkpoint;
    }
}

impl WrappedNative for TokenBank {
    fn wrapped_token(&self) -> Address {
        self.wrapped
    }

    fn wrap(&mut self, account: Address, amount: U256) -> Result<(), PoolError> {
        let native = self
            .native_balance(account)
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientBalance)?;
        let wrapped = self.wrapped;
        self.mint(wrapped, account, amount)?;
        self.native.insert(account, native);
        Ok(())
    }

    fn unwrap(&mut self, account: Address, amount: U256) -> Result<(), PoolError> {
        let native = math::add(self.native_balance(account), amount)?;
        let wrapped = self.wrapped;
        self.ledger_mut(wrapped)?.burn(account, amount)?;
        self.native.insert(account, native);
        Ok(())
    }
}
