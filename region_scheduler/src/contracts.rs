use async_trait::async_trait;
use entities::outage_schedules::RegionId;

/// Operational alerting collaborator. Raised when a region keeps failing;
/// delivery (email, chat, pager) is the implementor's concern.
#[async_trait]
pub trait Alerts: Send + Sync {
    async fn raise(&self, region: &RegionId, message: String) -> anyhow::Result<()>;
}
