use alloy::primitives::{Address, U256};
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::amm::ledger::LiquidityLedger;
use crate::amm::reserves::ReserveAccount;

/// Everything needed to rebuild a pool, minus its token service and clock.
///
/// The reentrancy lock is not part of a snapshot: a restored pool always
/// starts unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// The pool's own account
    pub address: Address,
    /// First traded token
    pub token_a: Address,
    /// Second traded token
    pub token_b: Address,
    /// Shares locked out of the first deposit
    pub minimum_liquidity: U256,
    /// Receives claimed protocol fees
    pub protocol_fee_receiver: Address,
    /// Reserves, fees and price accumulators
    pub reserves: ReserveAccount,
    /// LP shares
    pub lp: LiquidityLedger,
}

impl PoolSnapshot {
    /// Serializes the snapshot to JSON
    ///
    /// # Errors
    /// If serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot from JSON
    ///
    /// # Errors
    /// If `json` is not a valid snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(PoolSnapshot::from_json("{\"address\": 1}").is_err());
        assert!(PoolSnapshot::from_json("").is_err());
    }
}
