pub mod api;
pub mod config;
pub mod limits;
pub mod storage;

pub use api::{create_router, AgentLimitResponse, ApiState};
pub use config::SubscriptionConfig;
pub use limits::{
    AccountLimits, AgentFloors, AgentLimit, AgentUsage, Agents, LimitError, LimitService,
    RequestContext,
};
pub use storage::{
    ConnectionConfig, GatewayFactory, MemoryStore, SqliteGatewayFactory, StoreError, StoreGateway,
};
