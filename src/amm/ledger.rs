//! LP share ledger: balances, allowances and total supply.
//!
//! Every operation checks all of its preconditions before writing anything,
//! so a failed call leaves the ledger exactly as it was.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::error::PoolError;
use super::math;

/// Balances and allowances of a fungible share.
///
/// Accounts whose balance drops to zero are removed, so `balances` only holds
/// non-zero entries and `total_supply` is always their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityLedger {
    /// Sum of all balances
    total_supply: U256,
    /// Non-zero balance per account
    balances: HashMap<Address, U256>,
    /// Spending permission: owner -> spender -> amount
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl LiquidityLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of shares in existence
    #[must_use]
    pub const fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Balance of `account`, zero if it holds nothing
    #[must_use]
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    /// Amount `spender` may still move on behalf of `owner`
    #[must_use]
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|spenders| spenders.get(&spender))
            .copied()
            .unwrap_or_default()
    }

    /// Iterates over every account with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.balances.iter()
    }

    /// Creates `amount` new shares for `account`.
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if the balance or the supply overflows
    pub fn mint(&mut self, account: Address, amount: U256) -> Result<(), PoolError> {
        let total_supply = math::add(self.total_supply, amount)?;
        let balance = math::add(self.balance_of(account), amount)?;

        self.total_supply = total_supply;
        self.set_balance(account, balance);
        Ok(())
    }

    /// Destroys `amount` shares held by `account`.
    ///
    /// # Errors
    /// Returns [`PoolError::InsufficientBalance`] if `account` holds less than `amount`
    pub fn burn(&mut self, account: Address, amount: U256) -> Result<(), PoolError> {
        let balance = self
            .balance_of(account)
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientBalance)?;
        let total_supply = math::sub(self.total_supply, amount)?;

        self.total_supply = total_supply;
        self.set_balance(account, balance);
        Ok(())
    }

    /// Moves `amount` shares from `from` to `to`.
    ///
    /// Transferring to oneself succeeds without changing anything, as long as
    /// the balance covers `amount`.
    ///
    /// # Errors
    /// * [`PoolError::InsufficientBalance`] if `from` holds less than `amount`
    /// * [`PoolError::Overflow`] if the receiving balance overflows
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), PoolError> {
        let from_balance = self
            .balance_of(from)
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientBalance)?;
        if from == to {
            return Ok(());
        }
        let to_balance = math::add(self.balance_of(to), amount)?;

        self.set_balance(from, from_balance);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Sets the allowance of `spender` over `owner`'s shares to `amount`
    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.set_allowance(owner, spender, amount);
    }

    /// Raises the allowance of `spender` over `owner`'s shares by `amount`
    ///
    /// # Errors
    /// Returns [`PoolError::Overflow`] if the allowance overflows
    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let allowance = math::add(self.allowance(owner, spender), amount)?;
        self.set_allowance(owner, spender, allowance);
        Ok(())
    }

    /// Lowers the allowance of `spender` over `owner`'s shares by `amount`.
    ///
    /// Never clamps: asking to go below zero is an error.
    ///
    /// # Errors
    /// Returns [`PoolError::InsufficientAllowance`] if the allowance is smaller than `amount`
    pub fn decrease_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let allowance = self.checked_allowance(owner, spender, amount)?;
        self.set_allowance(owner, spender, allowance);
        Ok(())
    }

    /// Moves `amount` of `owner`'s shares to `to`, spending `spender`'s allowance.
    ///
    /// # Errors
    /// * [`PoolError::InsufficientAllowance`] if the allowance is smaller than `amount`
    /// * Any error of [`LiquidityLedger::transfer`]
    pub fn transfer_from(
        &mut self,
        owner: Address,
        spender: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let allowance = self.checked_allowance(owner, spender, amount)?;
        self.transfer(owner, to, amount)?;
        self.set_allowance(owner, spender, allowance);
        Ok(())
    }

    /// Burns `amount` of `owner`'s shares, spending `spender`'s allowance.
    ///
    /// # Errors
    /// * [`PoolError::InsufficientAllowance`] if the allowance is smaller than `amount`
    /// * [`PoolError::InsufficientBalance`] if `owner` holds less than `amount`
    pub fn burn_from(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        let allowance = self.checked_allowance(owner, spender, amount)?;
        self.burn(owner, amount)?;
        self.set_allowance(owner, spender, allowance);
        Ok(())
    }

    /// The allowance left after spending `amount`
    fn checked_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<U256, PoolError> {
        self.allowance(owner, spender)
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientAllowance)
    }

    /// Writes a balance, dropping the entry when it reaches zero
    fn set_balance(&mut self, account: Address, balance: U256) {
        if balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }

    /// Writes an allowance, dropping the entry when it reaches zero
    fn set_allowance(&mut self, owner: Address, spender: Address, amount: U256) {
        if amount.is_zero() {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances
                .entry(owner)
                .or_default()
                .insert(spender, amount);
        }
    }
}
