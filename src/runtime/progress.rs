use tokio::sync::watch;

/// Last fully processed height of one poller.
///
/// The owning loop is the only writer. Observers hold a [`watch::Receiver`]
/// and can read but never move the value.
#[derive(Debug)]
pub struct PollerState {
    last_processed: Option<u64>,
    publisher: watch::Sender<Option<u64>>,
}

impl PollerState {
    pub fn new(resume_from_height: Option<u64>) -> Self {
        let (publisher, _) = watch::channel(resume_from_height);
        Self {
            last_processed: resume_from_height,
            publisher,
        }
    }

    pub fn last_processed(&self) -> Option<u64> {
        self.last_processed
    }

    /// First height the loop still owes the sink, once anchored.
    pub fn next_height(&self) -> Option<u64> {
        self.last_processed.map(|height| height.saturating_add(1))
    }

    /// Anchors an unanchored state at the observed tip without replaying history.
    pub fn anchor(&mut self, height: u64) {
        debug_assert!(self.last_processed.is_none(), "state is already anchored");
        self.set(height);
    }

    /// Records that `height` was fully delivered. Heights must advance by exactly one.
    pub fn mark_processed(&mut self, height: u64) {
        debug_assert_eq!(
            self.next_height(),
            Some(height),
            "heights must be processed contiguously"
        );
        self.set(height);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.publisher.subscribe()
    }

    fn set(&mut self, height: u64) {
        self.last_processed = Some(height);
        self.publisher.send_replace(Some(height));
    }
}
