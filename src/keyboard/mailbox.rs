//! # Intent Mailbox
//!
//! Depth-one, latest-wins handoff of the duty-cycle intent from the input
//! task to the keyboard task. Publishing never blocks and overwrites anything
//! the keyboard task has not picked up yet. Taking never blocks either.
//!
//! ```
//! use tank_controls::controls::types::Intent;
//! use tank_controls::keyboard::mailbox::intent_mailbox;
//!
//! let (publisher, mut receiver) = intent_mailbox();
//! assert_eq!(receiver.try_take(), None);
//!
//! publisher.publish(Intent { forward: 0.2, ..Intent::NEUTRAL });
//! publisher.publish(Intent { forward: 0.9, ..Intent::NEUTRAL });
//!
//! assert_eq!(receiver.try_take().map(|i| i.forward), Some(0.9));
//! assert_eq!(receiver.try_take(), None);
//! ```

use tokio::sync::watch;

use crate::controls::types::Intent;

/// Creates a connected publisher and receiver with nothing pending.
#[must_use]
pub fn intent_mailbox() -> (IntentPublisher, IntentReceiver) {
    let (tx, rx) = watch::channel(Intent::NEUTRAL);
    (IntentPublisher { tx }, IntentReceiver { rx })
}

/// Writing side, owned by the input task.
#[derive(Debug)]
pub struct IntentPublisher {
    tx: watch::Sender<Intent>,
}

impl IntentPublisher {
    /// Replaces the pending intent.
    ///
    /// Succeeds even after the receiver is gone.
    pub fn publish(&self, intent: Intent) {
        self.tx.send_replace(intent);
    }
}

/// Reading side, owned by the keyboard emitter.
#[derive(Debug)]
pub struct IntentReceiver {
    rx: watch::Receiver<Intent>,
}

impl IntentReceiver {
    /// Takes the pending intent, if one was published since the last take.
    pub fn try_take(&mut self) -> Option<Intent> {
        let pending = self.rx.borrow_and_update();
        pending.has_changed().then(|| *pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_pending_initially() {
        let (_publisher, mut receiver) = intent_mailbox();
        assert_eq!(receiver.try_take(), None);
    }

    #[test]
    fn test_latest_publish_wins() {
        let (publisher, mut receiver) = intent_mailbox();
        for forward in [0.1, 0.2, 0.3] {
            publisher.publish(Intent { forward, ..Intent::NEUTRAL });
        }

        assert_eq!(receiver.try_take().unwrap().forward, 0.3);
    }

    #[test]
    fn test_take_consumes() {
        let (publisher, mut receiver) = intent_mailbox();
        publisher.publish(Intent::NEUTRAL);

        assert_eq!(receiver.try_take(), Some(Intent::NEUTRAL));
        assert_eq!(receiver.try_take(), None);
    }

    #[test]
    fn test_publish_without_receiver() {
        let (publisher, receiver) = intent_mailbox();
        drop(receiver);
        publisher.publish(Intent { left: 1.0, ..Intent::NEUTRAL });
    }

    #[tokio::test]
    async fn test_publish_from_another_task() {
        let (publisher, mut receiver) = intent_mailbox();

        tokio::spawn(async move {
            publisher.publish(Intent { handbrake: 1.0, ..Intent::NEUTRAL });
        })
        .await
        .unwrap();

        assert_eq!(receiver.try_take().unwrap().handbrake, 1.0);
    }
}
