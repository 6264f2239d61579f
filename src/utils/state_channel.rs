use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::{Duration, Instant},
};

/// Sending half of a state-change channel. There is exactly one publisher per channel,
/// so every value the watcher sees was written by a single owner.
pub struct StatePublisher<T: Copy> {
    sx: Sender<T>,
}

/// Receiving half of a state-change channel. Remembers the last state it observed so
/// callers can ask for the current state without blocking.
pub struct StateWatcher<T: Copy> {
    rx: Receiver<T>,
    last: T,
}

#[derive(Debug)]
pub enum StateChannelError {
    NoOneToReceiveState,
}

/// Creates a new state-change channel. Both halves start out agreeing on `initial`.
pub fn state_channel<T: Copy>(initial: T) -> (StatePublisher<T>, StateWatcher<T>) {
    let (sx, rx) = mpsc::channel();
    (StatePublisher { sx }, StateWatcher { rx, last: initial })
}

impl<T: Copy> StatePublisher<T> {
    /// Publishes a new state.
    ///
    /// # Errors
    ///
    /// - `StateChannelError::NoOneToReceiveState`: If the watcher was dropped.
    pub fn publish(&self, state: T) -> Result<(), StateChannelError> {
        self.sx
            .send(state)
            .map_err(|_| StateChannelError::NoOneToReceiveState)
    }
}

impl<T: Copy + PartialEq> StateWatcher<T> {
    /// Drains every pending transition and returns the latest published state.
    pub fn current(&mut self) -> T {
        self.drain(None);
        self.last
    }

    /// Blocks until a transition into `target` is observed or `timeout` elapses.
    ///
    /// Transitions already queued count: if the publisher went through `target` since the
    /// last call, this returns `true` right away even if the latest state differs.
    ///
    /// # Returns
    ///
    /// `true` if `target` was reached, `false` on timeout.
    pub fn wait_for(&mut self, target: T, timeout: Duration) -> bool {
        if self.last == target || self.drain(Some(target)) {
            return true;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(state) => {
                    self.last = state;
                    if state == target {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                // The publisher is gone, no further transitions can arrive
                Err(RecvTimeoutError::Disconnected) => return self.last == target,
            }
        }
    }

    /// Consumes every queued state. Returns whether `target` was among them.
    fn drain(&mut self, target: Option<T>) -> bool {
        let mut seen = false;
        while let Ok(state) = self.rx.try_recv() {
            seen |= Some(state) == target;
            self.last = state;
        }
        seen
    }
}
