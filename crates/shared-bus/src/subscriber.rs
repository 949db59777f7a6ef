//! # Subscription Receiver
//!
//! Receiving side of the bus.

use crate::filter::SubscriptionFilter;
use shared_types::SubscriptionRequest;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::warn;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Subscription bus closed")]
    Closed,
}

/// Handle for receiving subscription requests.
pub struct Subscription {
    receiver: broadcast::Receiver<SubscriptionRequest>,
    filter: SubscriptionFilter,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<SubscriptionRequest>,
        filter: SubscriptionFilter,
    ) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching request.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<SubscriptionRequest> {
        loop {
            let request = match self.receiver.recv().await {
                Ok(r) => r,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Source subscriber lagged, requests dropped");
                    continue;
                }
            };

            if self.filter.matches(&request) {
                return Some(request);
            }
        }
    }

    /// Receive without waiting.
    ///
    /// - `Ok(Some(request))` a matching request was buffered
    /// - `Ok(None)` nothing buffered
    /// - `Err(SubscriptionError::Closed)` the bus was dropped
    pub fn try_recv(&mut self) -> Result<Option<SubscriptionRequest>, SubscriptionError> {
        loop {
            let request = match self.receiver.try_recv() {
                Ok(r) => r,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(lagged = count, "Source subscriber lagged, requests dropped");
                    continue;
                }
            };

            if self.filter.matches(&request) {
                return Ok(Some(request));
            }
        }
    }

    /// Drain every buffered matching request.
    pub fn drain(&mut self) -> Vec<SubscriptionRequest> {
        let mut out = Vec::new();
        while let Ok(Some(request)) = self.try_recv() {
            out.push(request);
        }
        out
    }

    #[must_use]
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }
}

/// `Stream` adapter for a [`Subscription`].
pub struct RequestStream {
    subscription: Subscription,
}

impl RequestStream {
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    #[must_use]
    pub fn filter(&self) -> &SubscriptionFilter {
        self.subscription.filter()
    }
}

impl Stream for RequestStream {
    type Item = SubscriptionRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(request)) => Poll::Ready(Some(request)),
            Ok(None) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{SubscriptionBus, SubscriptionPublisher};
    use shared_types::{Address, SourceKind};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = SubscriptionBus::new();
        let mut sub = bus.subscribe(SubscriptionFilter::all());

        let request = SubscriptionRequest::new(SourceKind::PersonalToken, Address::new([1; 20]), 4);
        bus.publish(request.clone()).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("request");
        assert_eq!(received, request);
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = SubscriptionBus::new();
        let mut sub = bus.subscribe(SubscriptionFilter::kinds(vec![SourceKind::SafeAccount]));

        bus.publish(SubscriptionRequest::new(
            SourceKind::PersonalToken,
            Address::new([1; 20]),
            1,
        ))
        .await;
        bus.publish(SubscriptionRequest::new(
            SourceKind::SafeAccount,
            Address::new([2; 20]),
            2,
        ))
        .await;

        let received = sub.try_recv().unwrap().unwrap();
        assert_eq!(received.kind, SourceKind::SafeAccount);
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_drain_collects_all() {
        let bus = SubscriptionBus::new();
        let mut sub = bus.subscribe(SubscriptionFilter::all());

        for byte in 1..=3u8 {
            bus.publish(SubscriptionRequest::new(
                SourceKind::WrappedErc20,
                Address::new([byte; 20]),
                u64::from(byte),
            ))
            .await;
        }
        assert_eq!(sub.drain().len(), 3);
    }

    #[tokio::test]
    async fn test_closed_after_bus_drop() {
        let bus = SubscriptionBus::new();
        let mut sub = bus.subscribe(SubscriptionFilter::all());
        drop(bus);

        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn test_request_stream() {
        let bus = SubscriptionBus::new();
        let mut stream = bus.request_stream(SubscriptionFilter::all());

        bus.publish(SubscriptionRequest::new(
            SourceKind::SafeAccount,
            Address::new([5; 20]),
            7,
        ))
        .await;

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("request");
        assert_eq!(next.from_block, 7);
    }
}
