use super::fetch::{fetch_with_retry, EpisodeSource, RetryPolicy};
use super::state::{CardModel, ViewState};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

type RetryAck = oneshot::Sender<bool>;

/// A mounted card: a background task owns the state machine and publishes
/// every state it enters. Dropping the handle unmounts the card.
pub struct CardHandle {
    states: watch::Receiver<ViewState>,
    retries: mpsc::Sender<RetryAck>,
    task: JoinHandle<()>,
}

impl CardHandle {
    pub fn mount(source: Arc<dyn EpisodeSource>, policy: RetryPolicy) -> Self {
        let (state_tx, states) = watch::channel(ViewState::Loading);
        let (retries, retry_rx) = mpsc::channel(1);
        let task = tokio::spawn(drive(source, policy, state_tx, retry_rx));
        Self {
            states,
            retries,
            task,
        }
    }

    pub fn state(&self) -> ViewState {
        self.states.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.states.clone()
    }

    /// Press the retry control. Returns false when there is no idle error to retry.
    pub async fn retry(&self) -> bool {
        if !matches!(
            *self.states.borrow(),
            ViewState::Error {
                retrying: false,
                ..
            }
        ) {
            return false;
        }
        let (ack, accepted) = oneshot::channel();
        if self.retries.send(ack).await.is_err() {
            return false;
        }
        accepted.await.unwrap_or(false)
    }

    /// Waits until the card leaves `Loading` and any manual retry has finished.
    pub async fn settled(&mut self) -> ViewState {
        if let Ok(state) = self.states.wait_for(ViewState::is_settled).await {
            return state.clone();
        }
        self.states.borrow().clone()
    }
}

impl Drop for CardHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    source: Arc<dyn EpisodeSource>,
    policy: RetryPolicy,
    states: watch::Sender<ViewState>,
    mut retries: mpsc::Receiver<RetryAck>,
) {
    let mut model = CardModel::new();

    let ticket = model.begin_request();
    let outcome = fetch_with_retry(source.as_ref(), &policy).await;
    model.settle(ticket, outcome);
    states.send_replace(model.state().clone());

    while let Some(ack) = retries.recv().await {
        let Some(ticket) = model.begin_retry() else {
            let _ = ack.send(false);
            continue;
        };
        debug!("Manual retry requested");
        states.send_replace(model.state().clone());
        let _ = ack.send(true);

        let outcome = fetch_with_retry(source.as_ref(), &policy).await;
        model.settle(ticket, outcome);
        states.send_replace(model.state().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::fetch::FetchError;
    use crate::card::state::LoadError;
    use crate::models::NearestEpisode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with 500 for the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl EpisodeSource for Flaky {
        async fn fetch(&self) -> Result<NearestEpisode, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(FetchError::Status {
                    status: 500,
                    info: serde_json::json!({ "error": "Internal server error" }),
                });
            }
            Ok(NearestEpisode {
                episode_id: "ep-1".to_string(),
                title: "Pilot".to_string(),
                start_time: "2025-06-16T01:00:00.000Z".to_string(),
                description: None,
            })
        }
    }

    fn policy(max_retries: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    #[tokio::test]
    async fn loads_into_ready() {
        let source = Flaky::new(0);
        let mut card = CardHandle::mount(source.clone(), policy(3, 0));
        assert!(matches!(card.settled().await, ViewState::Ready(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!card.retry().await);
    }

    #[tokio::test]
    async fn manual_retry_recovers_from_error() {
        // 1 attempt + 3 automatic retries all fail; the manual retry succeeds.
        let source = Flaky::new(4);
        let mut card = CardHandle::mount(source.clone(), policy(3, 0));
        assert_eq!(
            card.settled().await,
            ViewState::Error {
                kind: LoadError::Server,
                retrying: false
            }
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);

        assert!(card.retry().await);
        assert!(matches!(card.settled().await, ViewState::Ready(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn unmount_stops_pending_retries() {
        let source = Flaky::new(u32::MAX);
        let card = CardHandle::mount(source.clone(), policy(3, 200));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let states = card.subscribe();
        drop(card);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*states.borrow(), ViewState::Loading);
    }
}
