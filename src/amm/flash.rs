//! Flash borrow callbacks.

use alloy::primitives::{Address, U256};

use super::error::PoolError;
use super::pool::Pool;
use crate::token::TokenService;
use crate::utils::clock::Clock;

/// Receiver of a flash borrow.
///
/// The pool sends the borrowed amounts to [`FlashBorrower::address`] and then
/// calls [`FlashBorrower::on_flash_borrow`]. Before returning, the borrower
/// must send the principal plus the swap fee back to the pool through
/// [`Pool::tokens_mut`]. The pool is locked for the whole callback, so every
/// mutating pool call made from inside it fails with [`PoolError::Reentrant`].
pub trait FlashBorrower<T: TokenService, C: Clock> {
    /// Account that receives the borrowed tokens
    fn address(&self) -> Address;

    /// Uses and repays the loan.
    ///
    /// # Errors
    /// Any error aborts the flash borrow and undoes every transfer
    fn on_flash_borrow(
        &mut self,
        pool: &mut Pool<T, C>,
        initiator: Address,
        amount_a: U256,
        amount_b: U256,
        data: &[u8],
    ) -> Result<(), PoolError>;
}
