//! Call-scoped cancellation
//!
//! Every adapter call merges the caller's token with an internal one.
//! The merged token is owned by the call, never by the adapter, so one
//! adapter instance can serve concurrent calls. The internal side fires
//! when the call ends, including when its future is dropped mid-flight,
//! so nothing holding the merged token outlives the call.

use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

/// Which side cancelled a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSource {
    /// The caller's token fired
    Caller,
    /// The call ended or was abandoned before the caller cancelled
    Internal,
}

/// Caller token merged with a call-internal token
///
/// Cancelling either side cancels [`token`](Self::token) once; the
/// first source to fire is recorded and never overwritten.
#[derive(Debug)]
pub struct CallCancellation {
    external: CancellationToken,
    merged: CancellationToken,
    source: OnceLock<CancelSource>,
}

impl CallCancellation {
    /// Merge the caller's token with a fresh internal one
    pub fn merge(external: &CancellationToken) -> Self {
        Self {
            external: external.clone(),
            merged: external.child_token(),
            source: OnceLock::new(),
        }
    }

    /// The effective token passed to I/O
    pub const fn token(&self) -> &CancellationToken {
        &self.merged
    }

    /// Cancel from inside the gateway
    pub fn cancel(&self) {
        let source = if self.external.is_cancelled() {
            CancelSource::Caller
        } else {
            CancelSource::Internal
        };
        let _ = self.source.set(source);
        self.merged.cancel();
    }

    /// Whether the merged token has fired
    pub fn is_cancelled(&self) -> bool {
        self.merged.is_cancelled()
    }

    /// First source that fired, if any
    pub fn source(&self) -> Option<CancelSource> {
        if let Some(source) = self.source.get() {
            return Some(*source);
        }

        if self.external.is_cancelled() {
            return Some(*self.source.get_or_init(|| CancelSource::Caller));
        }

        None
    }

    /// Wait until either side cancels
    pub async fn cancelled(&self) {
        self.merged.cancelled().await;
    }
}

impl Drop for CallCancellation {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn caller_cancel_propagates() {
        let external = CancellationToken::new();
        let call = CallCancellation::merge(&external);
        assert!(!call.is_cancelled());
        assert_eq!(call.source(), None);

        external.cancel();

        assert!(call.is_cancelled());
        assert_eq!(call.source(), Some(CancelSource::Caller));
    }

    #[test]
    fn internal_cancel_leaves_caller_untouched() {
        let external = CancellationToken::new();
        let call = CallCancellation::merge(&external);

        call.cancel();

        assert!(call.is_cancelled());
        assert!(!external.is_cancelled());
        assert_eq!(call.source(), Some(CancelSource::Internal));
    }

    #[test]
    fn first_source_wins() {
        let external = CancellationToken::new();
        let call = CallCancellation::merge(&external);

        call.cancel();
        external.cancel();
        call.cancel();

        assert_eq!(call.source(), Some(CancelSource::Internal));
    }

    #[test]
    fn already_cancelled_caller_is_seen_immediately() {
        let external = CancellationToken::new();
        external.cancel();

        let call = CallCancellation::merge(&external);
        assert!(call.is_cancelled());
        call.cancel();
        assert_eq!(call.source(), Some(CancelSource::Caller));
    }

    #[tokio::test]
    async fn listener_fires_once_when_both_sides_cancel() {
        let external = CancellationToken::new();
        let call = Arc::new(CallCancellation::merge(&external));
        let fired = Arc::new(AtomicU32::new(0));

        let listener = {
            let call = Arc::clone(&call);
            let fired = Arc::clone(&fired);
            tokio::spawn(async move {
                call.cancelled().await;
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };

        external.cancel();
        call.cancel();
        listener.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ending_the_call_releases_token_holders() {
        let external = CancellationToken::new();
        let call = CallCancellation::merge(&external);
        let held = call.token().clone();

        let holder = tokio::spawn(async move { held.cancelled().await });

        drop(call);
        holder.await.unwrap();

        assert!(!external.is_cancelled());
    }

    #[tokio::test]
    async fn abandoned_call_future_cancels_merged_token() {
        let external = CancellationToken::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let call_future = {
            let external = external.clone();
            async move {
                let call = CallCancellation::merge(&external);
                tx.send(call.token().clone()).ok();
                std::future::pending::<()>().await;
            }
        };

        let task = tokio::spawn(call_future);
        let merged = rx.await.unwrap();
        assert!(!merged.is_cancelled());

        task.abort();
        let _ = task.await;

        assert!(merged.is_cancelled());
        assert!(!external.is_cancelled());
    }

    #[test]
    fn concurrent_calls_are_independent() {
        let first_caller = CancellationToken::new();
        let first = CallCancellation::merge(&first_caller);
        let second = CallCancellation::merge(&CancellationToken::new());

        first_caller.cancel();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
