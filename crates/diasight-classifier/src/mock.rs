//! Scripted classifier for tests and offline use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

use crate::{
    parse_prediction, ClassificationResult, Classifier, ClassifierError, ClassifierResult,
    FeatureVector,
};

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A 2xx response with this body
    Body(String),
    /// A non-2xx response
    Status(u16),
    /// The request never completes in time
    Timeout,
    /// Connection-level failure
    Transport(String),
}

/// Classifier that replays a scripted reply and records what it was sent.
///
/// While [`hold`](MockClassifier::hold) is in effect, calls are counted and
/// then block until [`release`](MockClassifier::release), which lets tests
/// observe the store with classifications in flight.
pub struct MockClassifier {
    reply: Mutex<MockReply>,
    calls: AtomicUsize,
    last_vector: Mutex<Option<FeatureVector>>,
    held: Mutex<bool>,
    released: Condvar,
}

impl MockClassifier {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            last_vector: Mutex::new(None),
            held: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Answer every call with this JSON body.
    pub fn responding(body: impl Into<String>) -> Self {
        Self::new(MockReply::Body(body.into()))
    }

    pub fn failing_with_status(status: u16) -> Self {
        Self::new(MockReply::Status(status))
    }

    pub fn timing_out() -> Self {
        Self::new(MockReply::Timeout)
    }

    /// Change the reply for subsequent calls.
    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
    }

    /// Block every classify call until [`release`](Self::release).
    pub fn hold(&self) {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Let held and future calls through.
    pub fn release(&self) {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.released.notify_all();
    }

    /// Number of classify calls made so far, including held ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent vector received.
    pub fn last_vector(&self) -> Option<FeatureVector> {
        self.last_vector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Classifier for MockClassifier {
    fn classify(&self, vector: &FeatureVector) -> ClassifierResult<ClassificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_vector.lock().unwrap_or_else(PoisonError::into_inner) = Some(vector.clone());

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(held);

        let reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match reply {
            MockReply::Body(body) => parse_prediction(&body),
            MockReply::Status(status) => Err(ClassifierError::Status {
                status,
                body: String::new(),
            }),
            MockReply::Timeout => Err(ClassifierError::Timeout(0)),
            MockReply::Transport(message) => Err(ClassifierError::Transport(message)),
        }
    }
}
