//! Correlation identifier carried through a request and any work it spawns.
//!
//! The identifier lives in tokio task-local storage. Spawned tasks do not
//! inherit task-locals, so detached work (for example the generation chain
//! trigger) must be wrapped with [`TraceId::propagate`] before spawning.

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::task_local;
use uuid::Uuid;

/// Header carrying the trace identifier in both directions.
pub const TRACE_ID_HEADER: &str = "trace-id";

task_local! {
    static TRACE_ID: TraceId;
}

/// Per-request trace identifier.
///
/// # Examples
/// ```
/// use songsmith::domain::TraceId;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let id = TraceId::generate();
/// let seen = TraceId::scope(id, async { TraceId::current() }).await;
/// assert_eq!(seen, Some(id));
/// # });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The identifier in scope for the running task, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        TRACE_ID.try_with(|id| *id).ok()
    }

    /// Run `fut` with `trace_id` in scope.
    pub async fn scope<Fut>(trace_id: TraceId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        TRACE_ID.scope(trace_id, fut).await
    }

    /// Wrap `fut` so that it observes the caller's identifier once spawned.
    ///
    /// When no identifier is in scope the future is returned unchanged.
    pub fn propagate<Fut>(fut: Fut) -> BoxFuture<'static, Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        match Self::current() {
            Some(id) => TRACE_ID.scope(id, fut).boxed(),
            None => fut.boxed(),
        }
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_is_none_outside_a_scope() {
        assert!(TraceId::current().is_none());
    }

    #[tokio::test]
    async fn propagate_carries_the_identifier_into_spawned_tasks() {
        let expected = TraceId::generate();
        let observed = TraceId::scope(expected, async {
            tokio::spawn(TraceId::propagate(async { TraceId::current() }))
                .await
                .expect("spawned task completes")
        })
        .await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn spawned_tasks_lose_the_identifier_without_propagation() {
        let observed = TraceId::scope(TraceId::generate(), async {
            tokio::spawn(async { TraceId::current() })
                .await
                .expect("spawned task completes")
        })
        .await;
        assert!(observed.is_none());
    }

    #[test]
    fn parses_hyphenated_uuids() {
        let id: TraceId = "00000000-0000-0000-0000-000000000000"
            .parse()
            .expect("nil uuid parses");
        assert_eq!(id.to_string(), Uuid::nil().to_string());
    }
}
