use tracing::{debug, info, warn};

use crate::storage::{ConnectionConfig, Filter, StoreGateway, Update, UpdateResult};

use super::account::{AccountLimits, AgentFloors, AgentLimit, AgentUsage};
use super::context::RequestContext;
use super::error::LimitError;
use super::{AGENTS_LIMIT_FIELD, AGENTS_USED_FIELD, COMPANY_ID_FIELD};

/// Request-scoped limit logic bound to one store gateway.
///
/// Every operation opens its own store session and releases it before
/// returning, on success, failure and cancellation alike. Updates read the
/// current document in one session and write in another, so concurrent
/// updates for the same company are last-writer-wins.
pub struct LimitService {
    ctx: RequestContext,
    floors: AgentFloors,
    connection: ConnectionConfig,
    gateway: Box<dyn StoreGateway>,
}

impl LimitService {
    pub fn new(
        ctx: RequestContext,
        floors: AgentFloors,
        connection: ConnectionConfig,
        gateway: Box<dyn StoreGateway>,
    ) -> Self {
        Self {
            ctx,
            floors,
            connection,
            gateway,
        }
    }

    pub async fn get_agent_limit(&mut self, company_id: &str) -> Result<AccountLimits, LimitError> {
        validate_company_id(company_id)?;

        self.open(company_id).await?;
        let outcome = self
            .ctx
            .run(find_account(self.gateway.as_mut(), company_id))
            .await;
        self.close(company_id).await;

        outcome
    }

    /// Stores `max(requested_limit, floor)` and returns the stored value.
    pub async fn update_agent_limit(
        &mut self,
        company_id: &str,
        requested_limit: i64,
    ) -> Result<AgentLimit, LimitError> {
        let current = self.get_agent_limit(company_id).await?;
        let effective = self.floors.clamp(requested_limit, current.grandfathered);

        self.apply_update(company_id, &Update::set(AGENTS_LIMIT_FIELD, effective))
            .await?;

        info!(
            company_id,
            requested_limit,
            effective_limit = effective,
            grandfathered = current.grandfathered,
            "agent limit updated"
        );
        Ok(AgentLimit { limit: effective })
    }

    /// Stores `requested_used` as-is and echoes the limit read beforehand.
    pub async fn update_used_agent(
        &mut self,
        company_id: &str,
        requested_used: i64,
    ) -> Result<AgentUsage, LimitError> {
        let current = self.get_agent_limit(company_id).await?;

        self.apply_update(company_id, &Update::set(AGENTS_USED_FIELD, requested_used))
            .await?;

        info!(
            company_id,
            used = requested_used,
            limit = current.agents.limit,
            "agent usage updated"
        );
        Ok(AgentUsage {
            limit: current.agents.limit,
            used: requested_used,
        })
    }

    async fn apply_update(
        &mut self,
        company_id: &str,
        update: &Update,
    ) -> Result<UpdateResult, LimitError> {
        self.open(company_id).await?;
        let outcome = self
            .ctx
            .run(update_account(self.gateway.as_mut(), company_id, update))
            .await;
        self.close(company_id).await;

        let result = outcome?;
        if result.matched_count == 0 {
            warn!(company_id, "agent limits update matched no document");
        }
        Ok(result)
    }

    async fn open(&mut self, company_id: &str) -> Result<(), LimitError> {
        let Self {
            ref ctx,
            ref connection,
            ref mut gateway,
            ..
        } = *self;

        ctx.run(async {
            gateway
                .connect(connection)
                .await
                .map_err(|err| LimitError::from_store(err, company_id))
        })
        .await?;
        debug!(company_id, "store session opened");
        Ok(())
    }

    /// Runs outside the request context so a cancelled request still releases its session.
    async fn close(&mut self, company_id: &str) {
        match self.gateway.disconnect().await {
            Ok(()) => debug!(company_id, "store session closed"),
            Err(err) => warn!(company_id, error = %err, "error disconnecting store session"),
        }
    }
}

async fn find_account(
    gateway: &mut dyn StoreGateway,
    company_id: &str,
) -> Result<AccountLimits, LimitError> {
    let document = gateway
        .find_one(&Filter::equals(COMPANY_ID_FIELD, company_id))
        .await
        .map_err(|err| LimitError::from_store(err, company_id))?;

    serde_json::from_value(document).map_err(|err| LimitError::Decode(err.to_string()))
}

async fn update_account(
    gateway: &mut dyn StoreGateway,
    company_id: &str,
    update: &Update,
) -> Result<UpdateResult, LimitError> {
    gateway
        .update_one(&Filter::equals(COMPANY_ID_FIELD, company_id), update)
        .await
        .map_err(|err| LimitError::from_store(err, company_id))
}

// Negative limit/used values are passed through untouched; only an empty
// company id is rejected.
fn validate_company_id(company_id: &str) -> Result<(), LimitError> {
    if company_id.is_empty() {
        return Err(LimitError::InvalidArgument(
            "company_id cannot be empty".into(),
        ));
    }
    Ok(())
}
