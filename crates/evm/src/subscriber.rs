// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Forwards ledger logs matching one event signature to a bounded channel.

use crate::{
    cancel::{CancelSignal, Canceller},
    types::{EventFilter, LogRecord},
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, trace};

pub const DEFAULT_PAGE_SIZE: u64 = 500;

/// Releases an upstream log subscription. Consumed on use so it can only run once.
#[async_trait]
pub trait Unsubscribe: Send {
    async fn unsubscribe(self: Box<Self>);
}

/// The three streams a [`LogProvider`] hands out per subscription.
pub struct LogSubscription {
    pub logs: mpsc::Receiver<LogRecord>,
    pub errors: mpsc::Receiver<anyhow::Error>,
    pub unsubscriber: Box<dyn Unsubscribe>,
}

/// Provider methods needed to follow contract logs.
#[async_trait]
pub trait LogProvider: Send + Sync {
    async fn current_block_number(&self) -> anyhow::Result<u64>;
    async fn subscribe_filtered_logs(&self, filter: &EventFilter)
        -> anyhow::Result<LogSubscription>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("Failed to set up log subscription: {0}")]
    SubscriptionSetup(String),
}

/// Why a subscription stopped forwarding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionEnd {
    Cancelled,
    ConsumerGone,
    StreamError(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriberConfig {
    pub contract_address: Address,
    pub page_size: u64,
    /// Deploy block of the contract. `None` starts at the current head.
    pub start_block: Option<u64>,
}

impl SubscriberConfig {
    pub fn new(contract_address: Address) -> Self {
        Self {
            contract_address,
            page_size: DEFAULT_PAGE_SIZE,
            start_block: None,
        }
    }
}

/// Control over one running subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    canceller: Canceller,
    done: watch::Receiver<Option<SubscriptionEnd>>,
}

impl SubscriptionHandle {
    /// Stop this subscription only. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.canceller.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.done.borrow().is_none()
    }

    /// Resolves with the termination reason once the forwarding task has exited.
    pub async fn closed(&self) -> SubscriptionEnd {
        let mut done = self.done.clone();
        let end = match done.wait_for(Option::is_some).await {
            Ok(end) => end
                .clone()
                .unwrap_or_else(|| SubscriptionEnd::StreamError("no termination reason".into())),
            Err(_) => SubscriptionEnd::StreamError("subscription task aborted".into()),
        };
        end
    }
}

pub struct EventSubscriber<L> {
    provider: Arc<L>,
    config: SubscriberConfig,
}

impl<L> Clone for EventSubscriber<L> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L: LogProvider + 'static> EventSubscriber<L> {
    pub fn new(provider: Arc<L>, config: SubscriberConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Start forwarding logs for `event_signature` into `sink`.
    ///
    /// The sink is dropped when forwarding stops, so the consumer sees the channel close.
    /// Stream failures are not retried.
    pub async fn subscribe(
        &self,
        event_signature: B256,
        cancel: &CancelSignal,
        sink: mpsc::Sender<LogRecord>,
    ) -> Result<SubscriptionHandle, SubscriberError> {
        let from_block = match self.config.start_block {
            Some(block) => block,
            None => self
                .provider
                .current_block_number()
                .await
                .map_err(|e| SubscriberError::SubscriptionSetup(format!("{e:#}")))?,
        };

        let filter = EventFilter::page(
            self.config.contract_address,
            event_signature,
            from_block,
            self.config.page_size,
        );

        let subscription = self
            .provider
            .subscribe_filtered_logs(&filter)
            .await
            .map_err(|e| SubscriberError::SubscriptionSetup(format!("{e:#}")))?;

        info!(
            address = %filter.contract_address,
            event = %event_signature,
            from_block = filter.from_block,
            to_block = filter.to_block,
            "Subscribed to contract logs"
        );

        let (canceller, cancel) = cancel.child();
        let (done_tx, done_rx) = watch::channel(None);
        tokio::spawn(async move {
            let end = forward_logs(subscription, cancel, sink).await;
            done_tx.send_replace(Some(end));
        });

        Ok(SubscriptionHandle {
            canceller,
            done: done_rx,
        })
    }
}

#[instrument(name = "log_subscription", skip_all)]
async fn forward_logs(
    subscription: LogSubscription,
    cancel: CancelSignal,
    sink: mpsc::Sender<LogRecord>,
) -> SubscriptionEnd {
    let LogSubscription {
        mut logs,
        mut errors,
        unsubscriber,
    } = subscription;
    let mut errors_open = true;

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break SubscriptionEnd::Cancelled,
            _ = sink.closed() => break SubscriptionEnd::ConsumerGone,
            maybe_err = errors.recv(), if errors_open => match maybe_err {
                Some(err) => {
                    error!("Log subscription failed: {err:#}");
                    break SubscriptionEnd::StreamError(format!("{err:#}"));
                }
                None => errors_open = false,
            },
            maybe_log = logs.recv() => match maybe_log {
                Some(log) => {
                    trace!(block = ?log.block_number, index = ?log.log_index, "Forwarding log");
                    tokio::select! {
                        _ = cancel.cancelled() => break SubscriptionEnd::Cancelled,
                        sent = sink.send(log) => {
                            if sent.is_err() {
                                break SubscriptionEnd::ConsumerGone;
                            }
                        }
                    }
                }
                None => {
                    // A failing upstream queues its error before closing the log stream.
                    if let Ok(err) = errors.try_recv() {
                        error!("Log subscription failed: {err:#}");
                        break SubscriptionEnd::StreamError(format!("{err:#}"));
                    }
                    error!("Upstream log stream closed");
                    break SubscriptionEnd::StreamError("upstream log stream closed".into());
                }
            },
        }
    };

    drop(sink);
    unsubscriber.unsubscribe().await;
    info!(?end, "Log subscription ended");
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use anyhow::anyhow;
    use std::{
        collections::VecDeque,
        sync::Mutex,
        time::Duration,
    };
    use tokio::time::timeout;

    const CONTRACT: Address = Address::repeat_byte(0xcc);
    const TOPIC: B256 = B256::repeat_byte(0xee);

    #[derive(Clone)]
    struct MockLogProvider {
        inner: Arc<Mutex<MockState>>,
    }

    struct MockState {
        block_number: u64,
        subscribe_errors: VecDeque<String>,
        filters: Vec<EventFilter>,
        feeds: Vec<(mpsc::Sender<LogRecord>, mpsc::Sender<anyhow::Error>)>,
        unsubscribe_calls: u32,
    }

    struct MockUnsubscriber {
        inner: Arc<Mutex<MockState>>,
    }

    #[async_trait]
    impl Unsubscribe for MockUnsubscriber {
        async fn unsubscribe(self: Box<Self>) {
            self.inner.lock().unwrap().unsubscribe_calls += 1;
        }
    }

    impl MockLogProvider {
        fn new(block_number: u64) -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockState {
                    block_number,
                    subscribe_errors: VecDeque::new(),
                    filters: vec![],
                    feeds: vec![],
                    unsubscribe_calls: 0,
                })),
            }
        }

        fn fail_next_subscribe(&self, msg: &str) {
            self.inner
                .lock()
                .unwrap()
                .subscribe_errors
                .push_back(msg.to_string());
        }

        fn log_feed(&self, index: usize) -> mpsc::Sender<LogRecord> {
            self.inner.lock().unwrap().feeds[index].0.clone()
        }

        fn error_feed(&self, index: usize) -> mpsc::Sender<anyhow::Error> {
            self.inner.lock().unwrap().feeds[index].1.clone()
        }

        fn close_log_feed(&self, index: usize) {
            let mut state = self.inner.lock().unwrap();
            let (_, errors) = state.feeds[index].clone();
            let (closed, _) = mpsc::channel(1);
            state.feeds[index] = (closed, errors);
        }

        fn filters(&self) -> Vec<EventFilter> {
            self.inner.lock().unwrap().filters.clone()
        }

        fn unsubscribe_calls(&self) -> u32 {
            self.inner.lock().unwrap().unsubscribe_calls
        }
    }

    #[async_trait]
    impl LogProvider for MockLogProvider {
        async fn current_block_number(&self) -> anyhow::Result<u64> {
            Ok(self.inner.lock().unwrap().block_number)
        }

        async fn subscribe_filtered_logs(
            &self,
            filter: &EventFilter,
        ) -> anyhow::Result<LogSubscription> {
            let mut state = self.inner.lock().unwrap();
            state.filters.push(filter.clone());
            if let Some(msg) = state.subscribe_errors.pop_front() {
                return Err(anyhow!("{}", msg));
            }
            let (log_tx, logs) = mpsc::channel(16);
            let (err_tx, errors) = mpsc::channel(1);
            state.feeds.push((log_tx, err_tx));
            Ok(LogSubscription {
                logs,
                errors,
                unsubscriber: Box::new(MockUnsubscriber {
                    inner: self.inner.clone(),
                }),
            })
        }
    }

    fn make_log(block_number: u64, log_index: u64) -> LogRecord {
        LogRecord {
            address: CONTRACT,
            topics: vec![TOPIC],
            block_number: Some(block_number),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    fn subscriber(mock: &MockLogProvider, start_block: Option<u64>) -> EventSubscriber<MockLogProvider> {
        EventSubscriber::new(
            Arc::new(mock.clone()),
            SubscriberConfig {
                start_block,
                ..SubscriberConfig::new(CONTRACT)
            },
        )
    }

    async fn closed(handle: &SubscriptionHandle) -> SubscriptionEnd {
        timeout(Duration::from_secs(1), handle.closed())
            .await
            .expect("subscription should end")
    }

    #[tokio::test]
    async fn test_forwards_logs_in_arrival_order() {
        let mock = MockLogProvider::new(1_000);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = subscriber(&mock, None)
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap();

        let feed = mock.log_feed(0);
        for (block, index) in [(1_001, 0), (1_001, 1), (1_005, 0)] {
            feed.send(make_log(block, index)).await.unwrap();
        }

        for (block, index) in [(1_001, 0), (1_001, 1), (1_005, 0)] {
            let log = rx.recv().await.unwrap();
            assert_eq!(log, make_log(block, index));
        }
        assert!(handle.is_active());

        // Ending the upstream drains the sink: anything left would be a duplicate.
        drop(feed);
        mock.close_log_feed(0);
        assert!(matches!(closed(&handle).await, SubscriptionEnd::StreamError(_)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_start_block_defaults_to_head() {
        let mock = MockLogProvider::new(1_000);
        let (tx, _rx) = mpsc::channel(1);
        subscriber(&mock, None)
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap();

        assert_eq!(
            mock.filters(),
            vec![EventFilter {
                contract_address: CONTRACT,
                event_signature: TOPIC,
                from_block: 1_000,
                to_block: 1_499,
            }]
        );
    }

    #[tokio::test]
    async fn test_start_block_from_config() {
        let mock = MockLogProvider::new(1_000);
        let (tx, _rx) = mpsc::channel(1);
        subscriber(&mock, Some(12))
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap();

        let filter = &mock.filters()[0];
        assert_eq!(filter.from_block, 12);
        assert_eq!(filter.to_block, 511);
    }

    #[tokio::test]
    async fn test_setup_failure() {
        let mock = MockLogProvider::new(1_000);
        mock.fail_next_subscribe("subscriptions not supported");
        let (tx, mut rx) = mpsc::channel(1);

        let err = subscriber(&mock, None)
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SubscriberError::SubscriptionSetup("subscriptions not supported".to_string())
        );
        assert!(rx.recv().await.is_none());
        assert_eq!(mock.unsubscribe_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unsubscribes_and_closes_sink() {
        let mock = MockLogProvider::new(1_000);
        let (canceller, cancel) = cancel_pair();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = subscriber(&mock, None).subscribe(TOPIC, &cancel, tx).await.unwrap();

        canceller.cancel();

        assert_eq!(closed(&handle).await, SubscriptionEnd::Cancelled);
        assert!(!handle.is_active());
        assert!(rx.recv().await.is_none());
        assert_eq!(mock.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_ends_subscription() {
        let mock = MockLogProvider::new(1_000);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = subscriber(&mock, None)
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap();

        mock.error_feed(0)
            .send(anyhow!("websocket disconnected"))
            .await
            .unwrap();

        assert_eq!(
            closed(&handle).await,
            SubscriptionEnd::StreamError("websocket disconnected".to_string())
        );
        assert!(rx.recv().await.is_none());
        assert!(mock.unsubscribe_calls() <= 1);
    }

    #[tokio::test]
    async fn test_closed_upstream_is_a_stream_error() {
        let mock = MockLogProvider::new(1_000);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = subscriber(&mock, None)
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap();

        mock.close_log_feed(0);

        assert!(matches!(
            closed(&handle).await,
            SubscriptionEnd::StreamError(_)
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_error_before_close_keeps_cause() {
        for _ in 0..64 {
            let mock = MockLogProvider::new(1_000);
            let (tx, mut rx) = mpsc::channel(8);
            let handle = subscriber(&mock, None)
                .subscribe(TOPIC, &CancelSignal::never(), tx)
                .await
                .unwrap();

            mock.error_feed(0)
                .send(anyhow!("websocket disconnected"))
                .await
                .unwrap();
            mock.close_log_feed(0);

            assert_eq!(
                closed(&handle).await,
                SubscriptionEnd::StreamError("websocket disconnected".to_string())
            );
            assert!(rx.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_cancel_while_sink_is_full() {
        let mock = MockLogProvider::new(1_000);
        let (canceller, cancel) = cancel_pair();
        let (tx, rx) = mpsc::channel(1);
        let handle = subscriber(&mock, None).subscribe(TOPIC, &cancel, tx).await.unwrap();

        let feed = mock.log_feed(0);
        feed.send(make_log(1_001, 0)).await.unwrap();
        feed.send(make_log(1_001, 1)).await.unwrap();
        // Let the task fill the sink and block on the second delivery
        while feed.capacity() < feed.max_capacity() {
            tokio::task::yield_now().await;
        }

        canceller.cancel();

        assert_eq!(closed(&handle).await, SubscriptionEnd::Cancelled);
        assert_eq!(mock.unsubscribe_calls(), 1);
        drop(rx);
    }

    #[tokio::test]
    async fn test_consumer_gone() {
        let mock = MockLogProvider::new(1_000);
        let (tx, rx) = mpsc::channel(1);
        let handle = subscriber(&mock, None)
            .subscribe(TOPIC, &CancelSignal::never(), tx)
            .await
            .unwrap();

        drop(rx);

        assert_eq!(closed(&handle).await, SubscriptionEnd::ConsumerGone);
        assert_eq!(mock.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_handle_unsubscribe_is_scoped_and_idempotent() {
        let mock = MockLogProvider::new(1_000);
        let subscriber = subscriber(&mock, None);
        let shared = CancelSignal::never();
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, _rx_b) = mpsc::channel(1);
        let a = subscriber.subscribe(TOPIC, &shared, tx_a).await.unwrap();
        let b = subscriber.subscribe(TOPIC, &shared, tx_b).await.unwrap();

        a.unsubscribe();
        a.unsubscribe();

        assert_eq!(closed(&a).await, SubscriptionEnd::Cancelled);
        assert!(b.is_active());
        assert_eq!(mock.unsubscribe_calls(), 1);

        b.unsubscribe();
        assert_eq!(closed(&b).await, SubscriptionEnd::Cancelled);
        assert_eq!(mock.unsubscribe_calls(), 2);
    }
}
