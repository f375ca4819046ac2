// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Silence-framed accumulation of inbound fragments.

use std::time::Duration;

use tracing::debug;

use super::terminator::Terminator;
use super::timers::{TimeoutSupervisor, TimerKind};

/// Independent streams of inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DataClass {
    /// Replies to explicit read requests.
    Read,
    /// Unsolicited notifications on the data characteristics.
    Notify,
    /// Unsolicited notifications on the event characteristic.
    Event,
}

impl DataClass {
    /// Whether a fragment of this class answers a pending write.
    pub fn answers_write(&self) -> bool {
        matches!(self, Self::Read | Self::Notify)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Notify => "notify",
            Self::Event => "event",
        }
    }
}

/// Buffer of one data class.
///
/// A message is complete when no fragment arrived for a full quiet period.
/// The buffer is only ever non-empty while the quiet timer of its class is
/// armed: both are set in [`push`](Self::push) and both are cleared by
/// [`complete`](Self::complete) and [`discard`](Self::discard).
#[derive(Debug)]
pub(crate) struct Accumulator {
    class: DataClass,
    buffer: Vec<u8>,
    fragments: usize,
}

impl Accumulator {
    pub fn new(class: DataClass) -> Self {
        Self {
            class,
            buffer: Vec::with_capacity(256),
            fragments: 0,
        }
    }

    /// Append a fragment and restart the quiet period.
    pub fn push(&mut self, fragment: &[u8], timers: &mut TimeoutSupervisor, quiet: Duration) {
        if self.class.answers_write() {
            timers.cancel(TimerKind::FirstRead);
        }
        timers.cancel(TimerKind::Quiet(self.class));

        debug!(
            "Accumulating {} fragment: {} ({} bytes)",
            self.class.as_str(),
            hex::encode(fragment),
            fragment.len()
        );
        self.buffer.extend_from_slice(fragment);
        self.fragments += 1;

        timers.schedule(TimerKind::Quiet(self.class), quiet);
    }

    /// Drain the buffer into a message sealed with `terminator`.
    ///
    /// Called when the quiet timer of this class expired.
    pub fn complete(&mut self, terminator: Terminator) -> String {
        let bytes = std::mem::take(&mut self.buffer);
        debug!(
            "{} message complete: {} bytes in {} fragments",
            self.class.as_str(),
            bytes.len(),
            self.fragments
        );
        self.fragments = 0;
        terminator.seal(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drop partial data and stop the quiet timer.
    pub fn discard(&mut self, timers: &mut TimeoutSupervisor) {
        timers.cancel(TimerKind::Quiet(self.class));
        self.clear();
    }

    /// Drop partial data. The caller is responsible for the timer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.fragments = 0;
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::session::SessionInput;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    const QUIET: Duration = Duration::from_millis(200);

    fn supervisor() -> (TimeoutSupervisor, mpsc::UnboundedReceiver<SessionInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TimeoutSupervisor::new(Handle::current(), tx), rx)
    }

    #[tokio::test]
    async fn test_push_arms_quiet_timer() {
        let (mut timers, _rx) = supervisor();
        let mut acc = Accumulator::new(DataClass::Read);
        timers.schedule(TimerKind::FirstRead, Duration::from_secs(2));

        acc.push(b"12", &mut timers, QUIET);
        assert_eq!(acc.len(), 2);
        assert!(timers.is_armed(TimerKind::Quiet(DataClass::Read)));
        assert!(!timers.is_armed(TimerKind::FirstRead));
    }

    #[tokio::test]
    async fn test_event_fragment_keeps_first_read_armed() {
        let (mut timers, _rx) = supervisor();
        let mut acc = Accumulator::new(DataClass::Event);
        timers.schedule(TimerKind::FirstRead, Duration::from_secs(2));

        acc.push(b"EV", &mut timers, QUIET);
        assert!(timers.is_armed(TimerKind::FirstRead));
        assert!(timers.is_armed(TimerKind::Quiet(DataClass::Event)));
    }

    #[tokio::test]
    async fn test_complete_concatenates_and_seals() {
        let (mut timers, _rx) = supervisor();
        let mut acc = Accumulator::new(DataClass::Notify);
        acc.push(b"12", &mut timers, QUIET);
        acc.push(b"34", &mut timers, QUIET);

        assert_eq!(acc.complete(Terminator::CrLf), "1234\r\n");
        assert!(acc.is_empty());
    }

    #[tokio::test]
    async fn test_discard_clears_buffer_and_timer() {
        let (mut timers, _rx) = supervisor();
        let mut acc = Accumulator::new(DataClass::Read);
        acc.push(b"partial", &mut timers, QUIET);

        acc.discard(&mut timers);
        assert!(acc.is_empty());
        assert!(!timers.is_armed(TimerKind::Quiet(DataClass::Read)));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut acc = Accumulator::new(DataClass::Read);
        acc.buffer.extend_from_slice(&[b'O', 0xff, b'K']);
        assert_eq!(acc.complete(Terminator::None), "O\u{fffd}K");
    }
}
