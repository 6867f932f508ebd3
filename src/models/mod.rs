/// Persisted pool state
pub mod snapshot;

pub use snapshot::PoolSnapshot;
