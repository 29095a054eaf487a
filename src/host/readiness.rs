//! One-shot readiness wait over host mutations

use tokio::sync::watch::error::RecvError;

use super::MutationFeed;

/// Resolve once `condition` holds
///
/// The condition is checked immediately and then after every mutation. The
/// feed is consumed, so the subscription ends as soon as the wait resolves.
/// Dropping the returned future cancels the wait. Errors when the host closes
/// the feed before the condition became true.
pub async fn ready_when<F>(mut feed: MutationFeed, mut condition: F) -> Result<(), RecvError>
where
    F: FnMut() -> bool,
{
    loop {
        if condition() {
            return Ok(());
        }
        feed.changed().await?;
    }
}
