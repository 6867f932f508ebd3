//! The error taxonomy shared by every pool operation.

use derive_more::{Display, Error};

/// Every way a pool operation can fail.
///
/// Each variant aborts the whole operation. Integrators branch on the variant
/// itself or on the stable string returned by [`PoolError::code`].
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// An addition or multiplication left the 256-bit range
    #[display("arithmetic overflow")]
    Overflow,
    /// A subtraction went below zero
    #[display("arithmetic underflow")]
    Underflow,
    /// Division by a zero divisor
    #[display("division by zero")]
    DivisionByZero,
    /// The account holds less than the requested amount
    #[display("insufficient balance")]
    InsufficientBalance,
    /// The spender was approved for less than the requested amount
    #[display("insufficient allowance")]
    InsufficientAllowance,
    /// The provider holds fewer LP shares than it tried to redeem
    #[display("insufficient LP shares")]
    InsufficientShares,
    /// A computed amount fell below the caller's minimum
    #[display("slippage exceeded")]
    SlippageExceeded,
    /// A deposit would mint zero shares
    #[display("insufficient liquidity minted")]
    InsufficientLiquidityMinted,
    /// The token is not one of the two pool assets, or both assets are equal
    #[display("invalid token")]
    InvalidToken,
    /// The amounts are zero where they must not be, or exceed the reserves
    #[display("invalid amounts")]
    InvalidAmounts,
    /// A flash borrower returned nothing
    #[display("insufficient repayment")]
    InsufficientRepayment,
    /// The fee-adjusted reserve product decreased
    #[display("constant product invariant violated")]
    InvariantViolation,
    /// A pool entry point was called while the pool was locked
    #[display("reentrant call")]
    Reentrant,
    /// A TWAP window reaches further back than the retained observations
    #[display("duration too long")]
    DurationTooLong,
    /// A swap was attempted against an empty side of the pool
    #[display("insufficient liquidity")]
    InsufficientLiquidity,
    /// A fee rate is larger than the fee denominator
    #[display("invalid fee rate")]
    InvalidFeeRate,
    /// A configuration value could not be parsed
    #[display("invalid config value for {key}")]
    InvalidConfig {
        /// The offending configuration key
        key: String,
    },
    /// The flash borrower's callback failed
    #[display("flash borrower failed: {reason}")]
    Borrower {
        /// The borrower's own description of the failure
        reason: String,
    },
}

impl PoolError {
    /// Stable machine-readable code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Overflow => "OVERFLOW",
            Self::Underflow => "UNDERFLOW",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance => "INSUFFICIENT_ALLOWANCE",
            Self::InsufficientShares => "INSUFFICIENT_SHARES",
            Self::SlippageExceeded => "SLIPPAGE_EXCEEDED",
            Self::InsufficientLiquidityMinted => "INSUFFICIENT_LIQUIDITY_MINTED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidAmounts => "INVALID_AMOUNTS",
            Self::InsufficientRepayment => "INSUFFICIENT_REPAYMENT",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::Reentrant => "REENTRANT",
            Self::DurationTooLong => "DURATION_TOO_LONG",
            Self::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            Self::InvalidFeeRate => "INVALID_FEE_RATE",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Borrower { .. } => "BORROWER_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_code() {
        assert_eq!(PoolError::SlippageExceeded.to_string(), "slippage exceeded");
        assert_eq!(PoolError::SlippageExceeded.code(), "SLIPPAGE_EXCEEDED");

        let err = PoolError::InvalidConfig {
            key: "POOL_FEE_RATE".to_string(),
        };
        assert_eq!(err.to_string(), "invalid config value for POOL_FEE_RATE");
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_converts_into_eyre_report() {
        let report = eyre::Report::new(PoolError::Reentrant);
        assert_eq!(report.to_string(), "reentrant call");
    }
}
