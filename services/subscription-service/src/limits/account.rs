use serde::{Deserialize, Serialize};

/// One company's entitlement document as stored in the `subs` collection.
///
/// Unknown fields (such as the `projects` counters some documents carry)
/// are ignored on decode; missing ones take their zero value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    pub company_id: String,
    #[serde(default)]
    pub grandfathered: bool,
    #[serde(default)]
    pub agents: Agents,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Agents {
    pub limit: i64,
    pub used: i64,
}

/// Result of a limit update: the value actually stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLimit {
    pub limit: i64,
}

/// Result of a usage update. `limit` is the value read before the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUsage {
    pub limit: i64,
    pub used: i64,
}

/// Minimum agent limits, chosen by grandfathering status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFloors {
    pub minimum_agents: i64,
    pub minimum_grandfathered_agents: i64,
}

impl Default for AgentFloors {
    fn default() -> Self {
        Self {
            minimum_agents: 2,
            minimum_grandfathered_agents: 10,
        }
    }
}

impl AgentFloors {
    pub fn floor_for(&self, grandfathered: bool) -> i64 {
        if grandfathered {
            self.minimum_grandfathered_agents
        } else {
            self.minimum_agents
        }
    }

    /// Raises `requested` to the applicable floor. There is no upper bound.
    pub fn clamp(&self, requested: i64, grandfathered: bool) -> i64 {
        requested.max(self.floor_for(grandfathered))
    }
}
