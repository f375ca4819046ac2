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

//! Timeout supervision for one session.

use std::collections::HashMap;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use super::accumulator::DataClass;
use super::session::SessionInput;

/// Delayed actions a session can have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    Connect,
    Write,
    /// No fragment arrived after a write.
    FirstRead,
    SetMode,
    /// Quiet period of one data class; completes its message.
    Quiet(DataClass),
}

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    task: AbortHandle,
}

/// Schedules and cancels the delayed actions of one session.
///
/// Expiries are not acted upon here: each one is queued on the session
/// input channel as [`SessionInput::TimerFired`] and handled by the session
/// driver, which serialises them with transport events. Every arm gets a
/// fresh generation so an expiry that was already queued when its timer was
/// cancelled or re-armed is recognised as stale.
#[derive(Debug)]
pub(crate) struct TimeoutSupervisor {
    runtime: Handle,
    input_tx: mpsc::UnboundedSender<SessionInput>,
    armed: HashMap<TimerKind, ArmedTimer>,
    next_generation: u64,
    shut_down: bool,
}

impl TimeoutSupervisor {
    pub(crate) fn new(runtime: Handle, input_tx: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self {
            runtime,
            input_tx,
            armed: HashMap::new(),
            next_generation: 0,
            shut_down: false,
        }
    }

    /// Arm `kind` to fire after `delay`, replacing any pending instance.
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        if self.shut_down {
            debug!("Supervisor shut down, not scheduling {:?}", kind);
            return;
        }
        self.cancel(kind);

        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.input_tx.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionInput::TimerFired { kind, generation });
        });

        trace!("Armed {:?} for {:?} (gen {})", kind, delay, generation);
        self.armed.insert(
            kind,
            ArmedTimer {
                generation,
                task: task.abort_handle(),
            },
        );
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(timer) = self.armed.remove(&kind) {
            timer.task.abort();
            trace!("Cancelled {:?} (gen {})", kind, timer.generation);
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.armed.drain() {
            timer.task.abort();
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Claim an expiry. Returns `true` only if `generation` is the live arm
    /// of `kind`, which is then disarmed.
    pub fn claim(&mut self, kind: TimerKind, generation: u64) -> bool {
        match self.armed.get(&kind) {
            Some(timer) if timer.generation == generation => {
                self.armed.remove(&kind);
                true
            }
            _ => {
                trace!("Dropping stale expiry of {:?} (gen {})", kind, generation);
                false
            }
        }
    }

    /// Cancel everything and refuse further scheduling.
    pub fn shutdown(&mut self) {
        self.cancel_all();
        self.shut_down = true;
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
