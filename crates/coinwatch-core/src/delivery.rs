//! Handoff of cycle outcomes from the watcher task to a consumer.
//!
//! The watcher owns an [`OutcomeSender`]; the consumer owns the matching
//! [`OutcomeReceiver`] and drains it on its own task, either by hand or via
//! [`dispatch`] with a [`Consumer`] implementation. Sending never waits on the
//! consumer. Dropping the receiver deregisters the consumer: later outcomes
//! are discarded and the watcher keeps running.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::models::{CycleOutcome, RecordList};

/// One delivered cycle outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 1-based trigger sequence number.
    pub cycle: u64,
    pub completed_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutcomeSender { tx }, OutcomeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct OutcomeSender {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl OutcomeSender {
    /// Hand off a delivery. Returns `false` if no consumer is registered.
    pub fn deliver(&self, delivery: Delivery) -> bool {
        match self.tx.send(delivery) {
            Ok(()) => true,
            Err(mpsc::error::SendError(dropped)) => {
                tracing::debug!(cycle = dropped.cycle, "No consumer registered, delivery dropped");
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl OutcomeReceiver {
    /// Wait for the next delivery. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Take a delivery if one is already queued.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

/// Consumer-side callbacks for delivered outcomes.
pub trait Consumer: Send {
    fn on_data(&mut self, cycle: u64, records: RecordList);
    fn on_error(&mut self, cycle: u64, message: &str);
}

/// Drain `receiver` into `consumer` until the watcher side hangs up.
///
/// Returns the number of deliveries handled.
pub async fn dispatch<C: Consumer>(mut receiver: OutcomeReceiver, consumer: &mut C) -> u64 {
    let mut handled = 0;
    while let Some(delivery) = receiver.recv().await {
        route(delivery, consumer);
        handled += 1;
    }
    handled
}

/// Invoke the callback matching a delivery's outcome.
pub fn route<C: Consumer>(delivery: Delivery, consumer: &mut C) {
    match delivery.outcome {
        CycleOutcome::Data(records) => consumer.on_data(delivery.cycle, records),
        CycleOutcome::Failed { message, .. } => consumer.on_error(delivery.cycle, &message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureStage;
    use crate::models::Record;
    use crate::testutil::RecordingConsumer;

    fn delivery(cycle: u64, outcome: CycleOutcome) -> Delivery {
        Delivery {
            cycle,
            completed_at: Utc::now(),
            outcome,
        }
    }

    #[tokio::test]
    async fn dispatch_routes_in_send_order() {
        let (tx, rx) = channel();
        tx.deliver(delivery(
            1,
            CycleOutcome::Data(vec![Record::new("Bitcoin", "$1", "$10")]),
        ));
        tx.deliver(delivery(
            2,
            CycleOutcome::Failed {
                stage: FailureStage::Fetch,
                message: "fetch failed: Network error: refused".into(),
            },
        ));
        drop(tx);

        let mut consumer = RecordingConsumer::default();
        let handled = dispatch(rx, &mut consumer).await;

        assert_eq!(handled, 2);
        assert_eq!(consumer.data.len(), 1);
        assert_eq!(consumer.data[0].0, 1);
        assert_eq!(consumer.data[0].1[0].name, "Bitcoin");
        assert_eq!(
            consumer.errors,
            vec![(2, "fetch failed: Network error: refused".to_string())]
        );
    }

    #[tokio::test]
    async fn deliver_without_consumer_is_dropped() {
        let (tx, rx) = channel();
        assert!(tx.deliver(delivery(1, CycleOutcome::Data(vec![]))));
        drop(rx);

        assert!(!tx.deliver(delivery(2, CycleOutcome::Data(vec![]))));
    }

    #[tokio::test]
    async fn deliver_does_not_wait_for_consumer() {
        let (tx, mut rx) = channel();
        for cycle in 1..=100 {
            assert!(tx.deliver(delivery(cycle, CycleOutcome::Data(vec![]))));
        }

        assert_eq!(rx.try_recv().map(|d| d.cycle), Some(1));
        let mut last = 1;
        while let Some(d) = rx.try_recv() {
            last = d.cycle;
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn deliveries_cross_threads() {
        let (tx, mut rx) = channel();
        let producer = std::thread::spawn(move || {
            tx.deliver(delivery(7, CycleOutcome::Data(vec![])));
        });
        producer.join().unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.cycle, 7);
        assert!(rx.recv().await.is_none());
    }
}
