//! # Token collaborator
//!
//! The pool never implements the traded assets itself. It moves them through
//! a [`TokenService`], whose failures abort the enclosing pool operation.

use alloy::primitives::{Address, U256};

use crate::amm::error::PoolError;

/// In-memory token bank
pub mod bank;

pub use bank::TokenBank;

/// Balances and transfers of fungible tokens, as seen by a pool.
pub trait TokenService {
    /// Saved state that [`TokenService::rollback`] returns to
    type Checkpoint;

    /// Balance of `account` in `token`
    ///
    /// # Errors
    /// Implementation specific; the pool aborts on any error
    fn balance_of(&self, token: Address, account: Address) -> Result<U256, PoolError>;

    /// Moves `amount` of `token` from `from` to `to`, authorized by `from`
    ///
    /// # Errors
    /// Implementation specific; the pool aborts on any error
    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError>;

    /// Moves `amount` of `owner`'s `token` to `to`, spending `spender`'s allowance
    ///
    /// # Errors
    /// Implementation specific; the pool aborts on any error
    fn transfer_from(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError>;

    /// Saves the current state
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Undoes everything since `checkpoint` was taken
    fn rollback(&mut self, checkpoint: Self::Checkpoint);
}

/// Conversion between a native coin and its wrapped token, for pools that
/// trade the native coin.
pub trait WrappedNative {
    /// The token that represents the native coin
    fn wrapped_token(&self) -> Address;

    /// Turns `amount` of `account`'s native coin into wrapped tokens
    ///
    /// # Errors
    /// Implementation specific
    fn wrap(&mut self, account: Address, amount: U256) -> Result<(), PoolError>;

    /// Turns `amount` of `account`'s wrapped tokens back into native coin
    ///
    /// # Errors
    /// Implementation specific
    fn unwrap(&mut self, account: Address, amount: U256) -> Result<(), PoolError>;
}
