//! Pool configuration.
//!
//! Values come from the environment (optionally through a `.env` file) and
//! fall back to the defaults in [`crate::utils::constants`].

use std::env;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::amm::error::PoolError;
use crate::utils::constants::{
    BURN_ADDRESS, DEFAULT_FEE_RATE, DEFAULT_FEE_SHARE_PROTOCOL, DEFAULT_OBSERVATION_CAPACITY,
    FEE_DENOMINATOR,
};

/// Parameters fixed when a pool is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Swap fee in basis points
    pub fee_rate: u32,
    /// Protocol share of the swap fee in basis points
    pub fee_share_protocol: u32,
    /// Shares permanently locked out of the first deposit; zero disables the lock
    pub minimum_liquidity: U256,
    /// Receives accrued protocol fees on claim.
    ///
    /// Defaults to the zero address, so claiming with a default
    /// configuration burns the fees. Set `POOL_PROTOCOL_FEE_RECEIVER` to keep them.
    pub protocol_fee_receiver: Address,
    /// Number of price observations kept for TWAP queries
    pub observation_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_FEE_RATE,
            fee_share_protocol: DEFAULT_FEE_SHARE_PROTOCOL,
            minimum_liquidity: U256::ZERO,
            protocol_fee_receiver: BURN_ADDRESS,
            observation_capacity: DEFAULT_OBSERVATION_CAPACITY,
        }
    }
}

impl Config {
    /// Loads the configuration from the environment.
    ///
    /// # Environment Variables
    /// * `POOL_FEE_RATE` - swap fee in basis points
    /// * `POOL_FEE_SHARE_PROTOCOL` - protocol share of the fee in basis points
    /// * `POOL_MINIMUM_LIQUIDITY` - shares locked on the first deposit
    /// * `POOL_PROTOCOL_FEE_RECEIVER` - checksummed or lowercase hex address
    /// * `POOL_OBSERVATION_CAPACITY` - retained price observations
    ///
    /// # Errors
    /// * If a variable is set but cannot be parsed
    /// * If the resulting configuration is invalid
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            fee_rate: var_or("POOL_FEE_RATE", defaults.fee_rate)?,
            fee_share_protocol: var_or("POOL_FEE_SHARE_PROTOCOL", defaults.fee_share_protocol)?,
            minimum_liquidity: var_or("POOL_MINIMUM_LIQUIDITY", defaults.minimum_liquidity)?,
            protocol_fee_receiver: var_or(
                "POOL_PROTOCOL_FEE_RECEIVER",
                defaults.protocol_fee_receiver,
            )?,
            observation_capacity: var_or(
                "POOL_OBSERVATION_CAPACITY",
                defaults.observation_capacity,
            )?,
        };
        config.validate()?;

        log::info!(
            "config: fee_rate={} fee_share_protocol={} minimum_liquidity={}",
            config.fee_rate,
            config.fee_share_protocol,
            config.minimum_liquidity
        );
        Ok(config)
    }

    /// Checks the values a pool cannot work with.
    ///
    /// # Errors
    /// * [`PoolError::InvalidFeeRate`] if a rate exceeds the fee denominator
    /// * [`PoolError::InvalidConfig`] if no observation can be retained
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
}

/// Reads and parses `key`, or returns `default` when it is not set
fn var_or<T: FromStr>(key: &str, default: T) -> Result<T, PoolError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| PoolError::InvalidConfig {
            key: key.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert_eq!(config.fee_rate, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = Config {
            fee_rate: FEE_DENOMINATOR + 1,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(PoolError::InvalidFeeRate));

        let config = Config {
            observation_capacity: 0,
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_var_or() {
        assert_eq!(var_or("TIDEPOOL_TEST_UNSET_VARIABLE", 7_u32).unwrap(), 7);

        env::set_var("TIDEPOOL_TEST_BAD_NUMBER", "thirty");
        assert_eq!(
            var_or("TIDEPOOL_TEST_BAD_NUMBER", 7_u32),
            Err(PoolError::InvalidConfig {
                key: "TIDEPOOL_TEST_BAD_NUMBER".to_string()
            })
        );

        env::set_var("TIDEPOOL_TEST_ADDRESS", "0x00000000000000000000000000000000000000f1");
        assert_eq!(
            var_or("TIDEPOOL_TEST_ADDRESS", Address::ZERO).unwrap(),
            Address::from_str("0x00000000000000000000000000000000000000f1").unwrap()
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let config = Config {
            minimum_liquidity: U256::from(1_000),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
