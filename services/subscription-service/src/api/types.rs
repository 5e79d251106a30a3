use serde::{Deserialize, Serialize};

use crate::limits::{AccountLimits, AgentLimit, AgentUsage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAgentLimitRequest {
    pub company_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAgentLimitRequest {
    pub company_id: String,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUsedAgentRequest {
    pub company_id: String,
    pub used: i64,
}

/// Shared response for all three agent operations.
///
/// Failures are reported in `status` with zeroed counters and HTTP 200;
/// clients treat a present, non-empty `status` as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLimitResponse {
    pub limit: i64,
    pub used: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grandfathered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl AgentLimitResponse {
    pub fn failure(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status.as_deref().is_some_and(|status| !status.is_empty())
    }
}

impl From<AccountLimits> for AgentLimitResponse {
    fn from(limits: AccountLimits) -> Self {
        Self {
            limit: limits.agents.limit,
            used: limits.agents.used,
            grandfathered: Some(limits.grandfathered),
            status: None,
        }
    }
}

impl From<AgentLimit> for AgentLimitResponse {
    fn from(agent: AgentLimit) -> Self {
        Self {
            limit: agent.limit,
            ..Self::default()
        }
    }
}

impl From<AgentUsage> for AgentLimitResponse {
    fn from(usage: AgentUsage) -> Self {
        Self {
            limit: usage.limit,
            used: usage.used,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
