use std::sync::Arc;

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::*;
pub use router::create_router;
pub use types::*;

use crate::config::SubscriptionConfig;
use crate::limits::{LimitService, RequestContext};
use crate::storage::GatewayFactory;

pub struct ApiState {
    pub gateways: Arc<dyn GatewayFactory>,
    pub config: Arc<SubscriptionConfig>,
}

impl ApiState {
    pub fn new(gateways: Arc<dyn GatewayFactory>, config: SubscriptionConfig) -> Self {
        Self {
            gateways,
            config: Arc::new(config),
        }
    }

    /// Builds a service bound to a fresh, unconnected gateway.
    pub fn limit_service(&self, ctx: RequestContext) -> LimitService {
        LimitService::new(
            ctx,
            self.config.floors(),
            self.config.connection(),
            self.gateways.create(),
        )
    }
}
