use crate::domain::commitments::HostedCommitments;
use crate::domain::ports::HostedChannelRef;
use crate::error::HandshakeError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Receives the result of one opening attempt.
///
/// Exactly one of the two methods is called, exactly once.
pub trait HandshakeObserver: Send + Sync {
    fn on_established(&self, commitments: HostedCommitments, channel: HostedChannelRef);
    fn on_failure(&self, error: HandshakeError);
}

pub enum HandshakeOutcome {
    Established {
        commitments: HostedCommitments,
        channel: HostedChannelRef,
    },
    Failed(HandshakeError),
}

impl fmt::Debug for HandshakeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Established { commitments, .. } => f
                .debug_struct("Established")
                .field("commitments", commitments)
                .finish_non_exhaustive(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// Forwards the outcome of an attempt to a `oneshot` receiver.
pub struct OneshotObserver {
    sender: Mutex<Option<oneshot::Sender<HandshakeOutcome>>>,
}

impl OneshotObserver {
    pub fn channel() -> (Arc<Self>, oneshot::Receiver<HandshakeOutcome>) {
        let (sender, receiver) = oneshot::channel();
        let observer = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        });
        (observer, receiver)
    }

    fn deliver(&self, outcome: HandshakeOutcome) {
        if let Some(sender) = self.sender.lock().take() {
            // The receiver may have been dropped by a caller that gave up.
            let _ = sender.send(outcome);
        }
    }
}

impl HandshakeObserver for OneshotObserver {
    fn on_established(&self, commitments: HostedCommitments, channel: HostedChannelRef) {
        self.deliver(HandshakeOutcome::Established {
            commitments,
            channel,
        });
    }

    fn on_failure(&self, error: HandshakeError) {
        self.deliver(HandshakeOutcome::Failed(error));
    }
}
