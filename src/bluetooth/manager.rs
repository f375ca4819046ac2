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

//! Public entry point of the session engine.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::profiles::{DeviceProfile, ProfileFamily, PROFILES};
use super::session::{LifecycleState, Session, SessionInput};
use super::timers::TimeoutSupervisor;
use super::transport::{BleAdapter, EventSink};
use crate::config::{Config, Timeouts};
use crate::error::ErrorCode;
use crate::events::DeviceEvent;

/// Drives one BLE peripheral through connect, discovery and data exchange.
///
/// Every request returns immediately. Outcomes are delivered as
/// [`DeviceEvent`]s on the channel given at construction; requests refused
/// up front are additionally reported through the returned `Err`.
pub struct DeviceManager {
    inner: Arc<Mutex<Session>>,
    runtime: Handle,
}

impl DeviceManager {
    /// Create a manager on the current Tokio runtime with default settings.
    pub fn new(
        adapter: Option<Arc<dyn BleAdapter>>,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("DeviceManager requires a Tokio runtime")?;
        Ok(Self::with_runtime(runtime, adapter, events))
    }

    /// Create a manager whose timers and driver run on `runtime`.
    pub fn with_runtime(
        runtime: Handle,
        adapter: Option<Arc<dyn BleAdapter>>,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        let session = Session::new(adapter, PROFILES.to_vec(), &Config::default(), events);
        Self {
            inner: Arc::new(Mutex::new(session)),
            runtime,
        }
    }

    /// Apply timeouts and session options from `config`.
    pub fn with_config(self, config: &Config) -> Self {
        {
            let mut session = self.inner.lock();
            session.set_timeouts(config.timeouts);
            session.set_record_timestamps(config.session.record_timestamps);
        }
        self
    }

    /// Replace the profiles probed during discovery, in probe order.
    pub fn with_profiles(self, profiles: Vec<DeviceProfile>) -> Self {
        self.inner.lock().set_profiles(profiles);
        self
    }

    pub fn with_timeouts(self, timeouts: Timeouts) -> Self {
        self.set_timeouts(timeouts);
        self
    }

    /// Change timeouts. Timers already armed keep their original delay.
    pub fn set_timeouts(&self, timeouts: Timeouts) {
        debug!("Timeouts set to {:?}", timeouts);
        self.inner.lock().set_timeouts(timeouts);
    }

    pub fn timeouts(&self) -> Timeouts {
        self.inner.lock().timeouts()
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Connect to the peripheral at `address`, closing any previous session.
    pub fn connect(&self, address: &str) -> Result<(), ErrorCode> {
        let mut session = self.inner.lock();
        session.close();
        session.validate_connect(address)?;

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let epoch = session.next_epoch();
        let driver = self
            .runtime
            .spawn(drive(Arc::downgrade(&self.inner), epoch, input_rx));
        let timers = TimeoutSupervisor::new(self.runtime.clone(), input_tx.clone());

        session.start_connect(address, epoch, timers, driver, EventSink::new(input_tx))
    }

    /// Disconnect the link, dropping any in-flight operation.
    pub fn disconnect(&self) -> Result<(), ErrorCode> {
        self.inner.lock().disconnect()
    }

    /// Release the link and stop all timers. Safe to call repeatedly.
    pub fn close(&self) {
        self.inner.lock().close();
    }

    /// Disconnect, wait up to `wait` for the link to report it, then close.
    ///
    /// Events received while waiting are consumed from `events`. Returns
    /// whether [`DeviceEvent::DeviceDisconnected`] was seen.
    pub async fn shutdown(
        &self,
        events: &mut mpsc::UnboundedReceiver<DeviceEvent>,
        wait: Duration,
    ) -> bool {
        let confirmed = match self.disconnect() {
            Ok(()) => {
                let disconnected = async {
                    while let Some(event) = events.recv().await {
                        if event == DeviceEvent::DeviceDisconnected {
                            return true;
                        }
                        debug!("Dropping {:?} during shutdown", event);
                    }
                    false
                };
                match tokio::time::timeout(wait, disconnected).await {
                    Ok(confirmed) => confirmed,
                    Err(_) => {
                        warn!("No disconnection within {:?}", wait);
                        false
                    }
                }
            }
            Err(code) => {
                debug!("Nothing to disconnect: {}", code);
                false
            }
        };

        self.close();
        confirmed
    }

    // ── Data exchange ───────────────────────────────────────────

    /// Read the read characteristic once; the reply arrives as [`DeviceEvent::ReadData`].
    pub fn request_read_data(&self) -> Result<(), ErrorCode> {
        self.inner.lock().request_read()
    }

    /// Send `text` followed by the profile's write terminator.
    pub fn request_write_data(&self, text: &str) -> Result<(), ErrorCode> {
        self.inner.lock().request_write(text)
    }

    /// Write a single mode byte to the mode characteristic.
    pub fn request_set_mode(&self, mode: u8) -> Result<(), ErrorCode> {
        self.inner.lock().request_set_mode(mode)
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Whether the adapter reports a live link to `address`.
    pub fn is_connected(&self, address: &str) -> bool {
        self.inner.lock().is_connected(address)
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state()
    }

    /// Profile resolved by the last successful discovery.
    pub fn connected_profile(&self) -> Option<DeviceProfile> {
        self.inner.lock().connected_profile().cloned()
    }

    pub fn connected_family(&self) -> Option<ProfileFamily> {
        self.inner.lock().connected_family()
    }

    pub fn is_ackme(&self) -> bool {
        self.connected_family() == Some(ProfileFamily::Ackme)
    }

    pub fn is_writing(&self) -> bool {
        self.inner.lock().is_writing()
    }

    /// `(current packet, total packets)` while a write is in flight.
    pub fn write_progress(&self) -> Option<(usize, usize)> {
        self.inner.lock().write_progress()
    }

    pub fn is_setting_mode(&self) -> bool {
        self.inner.lock().is_setting_mode()
    }

    /// Whether a link object is currently held.
    pub fn has_link(&self) -> bool {
        self.inner.lock().has_link()
    }
}

/// Feed transport events and timer expiries into the session, one at a time.
async fn drive(
    session: Weak<Mutex<Session>>,
    epoch: u64,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
) {
    debug!("Session driver {} started", epoch);

    while let Some(input) = inputs.recv().await {
        let Some(session) = session.upgrade() else {
            info!("Session dropped, stopping driver {}", epoch);
            break;
        };
        session.lock().handle_input(epoch, input);
    }

    debug!("Session driver {} stopped", epoch);
}
