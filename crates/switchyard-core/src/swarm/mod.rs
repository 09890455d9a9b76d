//! Swarm composition
//!
//! Spreads many agents over the vendors that offer a model for the swarm's
//! task type. Assignment is static: it happens once at composition time and
//! never rebalances. Performance-based distribution asks the failover engine
//! for its best vendor per slot, and since health does not move during one
//! composition every slot lands on the same vendor.

mod composer;
mod types;

pub use composer::SwarmComposer;
pub use types::{
    DEFAULT_SWARM_VENDORS, DistributionStrategy, RandomSource, StdRandomSource, Swarm,
    SwarmAgentSlot, SwarmConfig, SwarmSettings,
};
