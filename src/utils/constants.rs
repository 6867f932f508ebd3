use alloy::primitives::Address;

/// Denominator of every fee rate: rates are expressed in basis points
pub const FEE_DENOMINATOR: u32 = 10_000;
/// Shares locked by the minimum-liquidity policy are minted here
pub const BURN_ADDRESS: Address = Address::ZERO;
/// Default swap fee: 0.3%
pub const DEFAULT_FEE_RATE: u32 = 30;
/// Default protocol cut of the swap fee: 20%
pub const DEFAULT_FEE_SHARE_PROTOCOL: u32 = 2_000;
/// Default number of retained price observations
pub const DEFAULT_OBSERVATION_CAPACITY: usize = 64;
