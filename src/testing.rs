//! Testing helpers shared by unit tests.

use crate::plugin::{Clock, MockReplySink, Reply};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start the clock at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).expect("duration in range");
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// A reply sink that records every delivered reply.
///
/// Returns the mock and the shared log of replies.
#[must_use]
pub fn recording_sink() -> (MockReplySink, Arc<Mutex<Vec<Reply>>>) {
    let replies = Arc::new(Mutex::new(Vec::new()));
    let log = replies.clone();

    let mut sink = MockReplySink::new();
    sink.expect_deliver().returning(move |reply| {
        log.lock().expect("reply log").push(reply);
        Ok(())
    });

    (sink, replies)
}
