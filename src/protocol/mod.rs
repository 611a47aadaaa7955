pub mod definition;
pub mod materialize;

pub use definition::{
    FilterRule, IdentitySet, ProbePolicy, ProtocolDefinition, ProtocolConfig, ProtocolTable,
    RuleConfig,
};
pub use materialize::{
    materialize, order_key, sort_dedup, Materialization, MaterializedProtocol,
};
