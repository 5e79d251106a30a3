pub mod account;
pub mod context;
pub mod error;
pub mod service;

pub use account::{AccountLimits, AgentFloors, AgentLimit, AgentUsage, Agents};
pub use context::RequestContext;
pub use error::LimitError;
pub use service::LimitService;

pub const COMPANY_ID_FIELD: &str = "company_id";
pub const AGENTS_LIMIT_FIELD: &str = "agents.limit";
pub const AGENTS_USED_FIELD: &str = "agents.used";
