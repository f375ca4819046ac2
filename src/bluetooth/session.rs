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

//! Session state machine.
//!
//! A [`Session`] owns everything mutable about one connection: lifecycle
//! state, the resolved profile, the three accumulators, the write and
//! set-mode operation tokens, the timing record and the timeout supervisor.
//! It is always accessed under the manager's lock, either from a public
//! request or from the driver task that feeds it transport events and timer
//! expiries.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::accumulator::{Accumulator, DataClass};
use super::chunker::ChunkSplitter;
use super::profiles::{DeviceProfile, ProfileFamily};
use super::terminator::Terminator;
use super::timers::{TimeoutSupervisor, TimerKind};
use super::transport::{
    BleAdapter, DescriptorRef, DiscoveredCharacteristic, DiscoveredService, EventSink, GattLink,
    GattStatus, LinkState, TransportEvent, ENABLE_NOTIFICATION_VALUE,
};
use crate::config::{Config, Timeouts};
use crate::error::ErrorCode;
use crate::events::{DeviceEvent, Timestamps};

/// Input consumed by the session driver.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Transport(TransportEvent),
    TimerFired { kind: TimerKind, generation: u64 },
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing requested yet.
    Idle,
    /// Connect issued, waiting for the link.
    Connecting,
    /// Link up, waiting for service discovery.
    Discovering,
    /// A profile is resolved; data requests are accepted.
    Ready,
    Disconnected,
    Closed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Discovering => "discovering",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }
}

/// Write operation token.
#[derive(Debug)]
enum WriteOp {
    Idle,
    /// A packet is outstanding; `chunks` holds the ones not yet sent.
    Sending { text: String, chunks: ChunkSplitter },
}

/// Set-mode operation token.
#[derive(Debug, Clone, Copy)]
enum ModeOp {
    Idle,
    AwaitingConfirmation { mode: u8 },
}

/// Characteristics of one profile found in the discovered services.
#[derive(Debug)]
pub(crate) struct ResolvedProfile<'a> {
    pub read: &'a DiscoveredCharacteristic,
    pub write: &'a DiscoveredCharacteristic,
    pub event: Option<&'a DiscoveredCharacteristic>,
}

/// Match `profile` against discovered services.
///
/// The profile's service and its read and write characteristics must be
/// present, as must the mode and event characteristics when the profile
/// declares them.
pub(crate) fn resolve_profile<'a>(
    profile: &DeviceProfile,
    services: &'a [DiscoveredService],
) -> Option<ResolvedProfile<'a>> {
    let service = services.iter().find(|s| s.uuid == profile.service)?;

    let read = service.characteristic(profile.read_characteristic)?;
    let write = service.characteristic(profile.write_characteristic)?;
    if let Some(uuid) = profile.mode_characteristic {
        service.characteristic(uuid)?;
    }
    let event = match profile.event_characteristic {
        Some(uuid) => Some(service.characteristic(uuid)?),
        None => None,
    };

    Some(ResolvedProfile {
        read,
        write,
        event,
    })
}

pub(crate) struct Session {
    adapter: Option<Arc<dyn BleAdapter>>,
    profiles: Vec<DeviceProfile>,
    timeouts: Timeouts,
    record_timestamps: bool,
    events: mpsc::UnboundedSender<DeviceEvent>,

    state: LifecycleState,
    epoch: u64,
    link: Option<Box<dyn GattLink>>,
    timers: Option<TimeoutSupervisor>,
    driver: Option<JoinHandle<()>>,
    connected: Option<DeviceProfile>,
    descriptors: VecDeque<DescriptorRef>,

    read_acc: Accumulator,
    notify_acc: Accumulator,
    event_acc: Accumulator,

    write: WriteOp,
    mode: ModeOp,
    timestamps: Option<Timestamps>,
}

impl Session {
    pub(crate) fn new(
        adapter: Option<Arc<dyn BleAdapter>>,
        profiles: Vec<DeviceProfile>,
        config: &Config,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        Self {
            adapter,
            profiles,
            timeouts: config.timeouts,
            record_timestamps: config.session.record_timestamps,
            events,
            state: LifecycleState::Idle,
            epoch: 0,
            link: None,
            timers: None,
            driver: None,
            connected: None,
            descriptors: VecDeque::new(),
            read_acc: Accumulator::new(DataClass::Read),
            notify_acc: Accumulator::new(DataClass::Notify),
            event_acc: Accumulator::new(DataClass::Event),
            write: WriteOp::Idle,
            mode: ModeOp::Idle,
            timestamps: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────

    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    pub(crate) fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub(crate) fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    pub(crate) fn set_record_timestamps(&mut self, enabled: bool) {
        self.record_timestamps = enabled;
        if !enabled {
            self.timestamps = None;
        }
    }

    pub(crate) fn set_profiles(&mut self, profiles: Vec<DeviceProfile>) {
        self.profiles = profiles;
    }

    pub(crate) fn connected_profile(&self) -> Option<&DeviceProfile> {
        self.connected.as_ref()
    }

    pub(crate) fn connected_family(&self) -> Option<ProfileFamily> {
        self.connected.as_ref().map(|p| p.family)
    }

    pub(crate) fn is_writing(&self) -> bool {
        matches!(self.write, WriteOp::Sending { .. })
    }

    /// `(confirmed or outstanding packet, total packets)` of the current write.
    pub(crate) fn write_progress(&self) -> Option<(usize, usize)> {
        match &self.write {
            WriteOp::Sending { chunks, .. } => Some((chunks.emitted(), chunks.chunk_count())),
            WriteOp::Idle => None,
        }
    }

    pub(crate) fn is_setting_mode(&self) -> bool {
        matches!(self.mode, ModeOp::AwaitingConfirmation { .. })
    }

    pub(crate) fn has_link(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn is_connected(&self, address: &str) -> bool {
        self.adapter
            .as_ref()
            .map(|a| a.is_connected(address))
            .unwrap_or(false)
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn emit(&self, event: DeviceEvent) {
        trace!("Emitting {:?}", event);
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    /// Report a refused request through both the event stream and the return value.
    fn reject(&self, event: DeviceEvent) -> Result<(), ErrorCode> {
        let code = event.error_code().unwrap_or(ErrorCode::Connect);
        self.emit(event);
        Err(code)
    }

    fn arm(&mut self, kind: TimerKind, delay: std::time::Duration) {
        if let Some(timers) = self.timers.as_mut() {
            timers.schedule(kind, delay);
        }
    }

    fn disarm(&mut self, kind: TimerKind) {
        if let Some(timers) = self.timers.as_mut() {
            timers.cancel(kind);
        }
    }

    fn read_terminator(&self) -> Terminator {
        self.connected
            .as_ref()
            .map(|p| p.read_terminator)
            .unwrap_or_default()
    }

    fn link_write(&self, characteristic: Uuid, value: &[u8]) -> bool {
        self.link
            .as_ref()
            .map(|link| link.write_characteristic(characteristic, value))
            .unwrap_or(false)
    }

    /// Drop every transient: timers, buffers, operation tokens, profile.
    fn clean_state(&mut self) {
        if let Some(timers) = self.timers.as_mut() {
            timers.cancel_all();
        }
        self.write = WriteOp::Idle;
        self.mode = ModeOp::Idle;
        self.read_acc.clear();
        self.notify_acc.clear();
        self.event_acc.clear();
        self.timestamps = None;
        self.connected = None;
        self.descriptors.clear();
    }

    // ── Lifecycle requests ──────────────────────────────────────

    /// Check connect preconditions, reporting failures as connection errors.
    pub(crate) fn validate_connect(&self, address: &str) -> Result<(), ErrorCode> {
        if self.adapter.is_none() {
            warn!("Invalid Bluetooth adapter");
            return self.reject(DeviceEvent::ConnectionError(
                ErrorCode::ConnectInvalidAdapter,
            ));
        }
        if address.trim().is_empty() {
            warn!("Unspecified device address");
            return self.reject(DeviceEvent::ConnectionError(
                ErrorCode::ConnectInvalidAddress,
            ));
        }
        Ok(())
    }

    pub(crate) fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Install a fresh driver and supervisor, then start connecting.
    pub(crate) fn start_connect(
        &mut self,
        address: &str,
        epoch: u64,
        timers: TimeoutSupervisor,
        driver: JoinHandle<()>,
        sink: EventSink,
    ) -> Result<(), ErrorCode> {
        info!("Connecting to {}", address);
        self.epoch = epoch;
        self.timers = Some(timers);
        self.driver = Some(driver);
        self.arm(TimerKind::Connect, self.timeouts.connect());

        let Some(adapter) = self.adapter.clone() else {
            self.disarm(TimerKind::Connect);
            return self.reject(DeviceEvent::ConnectionError(
                ErrorCode::ConnectInvalidAdapter,
            ));
        };

        match adapter.connect_gatt(address, sink) {
            Some(link) => {
                self.link = Some(link);
                self.state = LifecycleState::Connecting;
                Ok(())
            }
            None => {
                warn!("Device not found: {}", address);
                self.disarm(TimerKind::Connect);
                self.reject(DeviceEvent::ConnectionError(
                    ErrorCode::ConnectDeviceNotFound,
                ))
            }
        }
    }

    pub(crate) fn disconnect(&mut self) -> Result<(), ErrorCode> {
        info!("Request disconnect");

        if self.adapter.is_none() {
            warn!("Bluetooth adapter not initialized");
            return self.reject(DeviceEvent::ConnectionError(
                ErrorCode::DisconnectInvalidAdapter,
            ));
        }
        if self.link.is_none() {
            warn!("GATT link not initialized");
            return self.reject(DeviceEvent::ConnectionError(
                ErrorCode::DisconnectNotInitialized,
            ));
        }

        self.clean_state();
        if let Some(link) = self.link.as_ref() {
            link.disconnect();
        }
        self.state = LifecycleState::Disconnected;
        Ok(())
    }

    /// Tear everything down. Safe to call any number of times.
    pub(crate) fn close(&mut self) {
        debug!("Request close");

        self.clean_state();
        if let Some(mut timers) = self.timers.take() {
            timers.shutdown();
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        if let Some(link) = self.link.take() {
            info!("Closing GATT link");
            link.close();
        }
        if self.state != LifecycleState::Idle {
            self.state = LifecycleState::Closed;
        }
    }

    // ── Data requests ───────────────────────────────────────────

    pub(crate) fn request_read(&mut self) -> Result<(), ErrorCode> {
        info!("Start read request");

        let characteristic = match (&self.connected, &self.link) {
            (Some(profile), Some(_)) => profile.read_characteristic,
            _ => {
                warn!("Invalid read characteristic");
                return self.reject(DeviceEvent::ReadError(
                    ErrorCode::ReadInvalidCharacteristic,
                ));
            }
        };

        let initiated = self
            .link
            .as_ref()
            .map(|link| link.read_characteristic(characteristic))
            .unwrap_or(false);
        if !initiated {
            warn!("Unable to initiate read operation");
            return self.reject(DeviceEvent::ReadError(ErrorCode::ReadDeviceError));
        }
        Ok(())
    }

    pub(crate) fn request_write(&mut self, text: &str) -> Result<(), ErrorCode> {
        info!("Start write request for data: {:?}", text);

        let (characteristic, terminator, packet_size) = match (&self.connected, &self.link) {
            (Some(profile), Some(_)) => (
                profile.write_characteristic,
                profile.write_terminator,
                profile.write_packet_size,
            ),
            _ => {
                warn!("Invalid write characteristic");
                return self.reject(DeviceEvent::WriteError(
                    ErrorCode::WriteInvalidCharacteristic,
                ));
            }
        };

        if self.is_writing() {
            warn!("Write operation already initiated, currently in progress");
            return self.reject(DeviceEvent::WriteError(ErrorCode::WriteInProgress));
        }

        let mut chunks = ChunkSplitter::new(terminator.encode(text), packet_size);
        let first = chunks.next().unwrap_or_default();
        debug!(
            "Writing {} bytes in {} packets",
            chunks.total_len(),
            chunks.chunk_count()
        );

        if !self.link_write(characteristic, &first) {
            warn!("Unable to initiate write operation");
            return self.reject(DeviceEvent::WriteError(ErrorCode::WriteDeviceError));
        }

        if self.record_timestamps {
            self.timestamps = Some(Timestamps::begin(Utc::now()));
        }
        self.write = WriteOp::Sending {
            text: text.to_string(),
            chunks,
        };
        self.arm(TimerKind::Write, self.timeouts.write());
        self.arm(TimerKind::FirstRead, self.timeouts.first_read());
        Ok(())
    }

    pub(crate) fn request_set_mode(&mut self, mode: u8) -> Result<(), ErrorCode> {
        info!("Start setMode request for operation: {}", mode);

        let characteristic = match (&self.connected, &self.link) {
            (Some(profile), Some(_)) => profile.mode_characteristic,
            _ => None,
        };
        let Some(characteristic) = characteristic else {
            warn!("Invalid setMode characteristic");
            return self.reject(DeviceEvent::SetModeError(
                ErrorCode::SetModeInvalidCharacteristic,
            ));
        };

        if self.is_setting_mode() {
            warn!("SetMode operation already initiated, currently in progress");
            return self.reject(DeviceEvent::SetModeError(ErrorCode::SetModeInProgress));
        }

        if !self.link_write(characteristic, &[mode]) {
            warn!("Unable to initiate setMode operation");
            return self.reject(DeviceEvent::SetModeError(ErrorCode::SetModeDeviceError));
        }

        self.mode = ModeOp::AwaitingConfirmation { mode };
        self.arm(TimerKind::SetMode, self.timeouts.write());
        Ok(())
    }

    // ── Driver input ────────────────────────────────────────────

    pub(crate) fn handle_input(&mut self, epoch: u64, input: SessionInput) {
        if epoch != self.epoch || self.timers.is_none() {
            debug!("Dropping input of a retired session: {:?}", input);
            return;
        }

        match input {
            SessionInput::Transport(event) => self.on_transport_event(event),
            SessionInput::TimerFired { kind, generation } => {
                let live = self
                    .timers
                    .as_mut()
                    .map(|t| t.claim(kind, generation))
                    .unwrap_or(false);
                if live {
                    self.on_timeout(kind);
                }
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionStateChanged { status, state } => {
                self.on_connection_state_changed(status, state)
            }
            TransportEvent::ServicesDiscovered { status, services } => {
                self.on_services_discovered(status, &services)
            }
            TransportEvent::CharacteristicRead {
                characteristic,
                status,
                value,
            } => self.on_characteristic_read(characteristic, status, &value),
            TransportEvent::CharacteristicWritten {
                characteristic,
                status,
            } => self.on_characteristic_written(characteristic, status),
            TransportEvent::CharacteristicChanged {
                characteristic,
                value,
            } => self.on_characteristic_changed(characteristic, &value),
            TransportEvent::DescriptorWritten { descriptor, status } => {
                debug!("Descriptor {} written: {}", descriptor.descriptor, status);
                self.write_next_descriptor();
            }
        }
    }

    fn on_connection_state_changed(&mut self, status: GattStatus, state: LinkState) {
        self.disarm(TimerKind::Connect);

        if !status.is_success() {
            warn!("Connection state change failed: {} ({:?})", status, state);
            self.emit(DeviceEvent::ConnectionError(ErrorCode::Connect));
            return;
        }

        match state {
            LinkState::Connected => {
                info!("Connected to GATT server");
                self.state = LifecycleState::Discovering;

                info!("Attempting to start service discovery");
                let started = self
                    .link
                    .as_ref()
                    .map(|link| link.discover_services())
                    .unwrap_or(false);
                if !started {
                    warn!("Unable to start service discovery");
                }
                self.emit(DeviceEvent::DeviceConnected);
            }
            LinkState::Disconnected => {
                info!("Disconnected from GATT server");
                self.clean_state();
                self.state = LifecycleState::Disconnected;
                self.emit(DeviceEvent::DeviceDisconnected);
            }
            LinkState::Connecting | LinkState::Disconnecting => {
                debug!("Transient connection state: {:?}", state);
            }
            LinkState::Other(code) => {
                warn!("Other connection state found: {}", code);
                self.emit(DeviceEvent::ConnectionError(ErrorCode::Connect));
            }
        }
    }

    fn on_services_discovered(&mut self, status: GattStatus, services: &[DiscoveredService]) {
        if !status.is_success() {
            warn!("No services discovered: {}", status);
            self.emit(DeviceEvent::ServiceNotFound);
            return;
        }

        let matched = self
            .profiles
            .iter()
            .find_map(|profile| resolve_profile(profile, services).map(|r| (profile, r)));

        let Some((profile, resolved)) = matched else {
            warn!("No known service among {} discovered", services.len());
            self.emit(DeviceEvent::ServiceNotFound);
            return;
        };

        let profile = profile.clone();
        let mut to_enable = vec![resolved.read.uuid, resolved.write.uuid];
        self.descriptors.clear();
        self.descriptors
            .extend(resolved.read.descriptors.iter().map(|&descriptor| DescriptorRef {
                characteristic: resolved.read.uuid,
                descriptor,
            }));
        if let Some(event) = resolved.event {
            to_enable.push(event.uuid);
            self.descriptors
                .extend(event.descriptors.iter().map(|&descriptor| DescriptorRef {
                    characteristic: event.uuid,
                    descriptor,
                }));
        }

        if let Some(link) = self.link.as_ref() {
            for characteristic in to_enable {
                if !link.set_characteristic_notification(characteristic, true) {
                    warn!("Unable to enable notifications on {}", characteristic);
                }
            }
        }

        info!(
            "Service {} resolved as {} profile",
            profile.service,
            profile.family.as_str()
        );
        self.connected = Some(profile);
        self.state = LifecycleState::Ready;
        self.write_next_descriptor();

        self.emit(DeviceEvent::ServiceDiscovered);
    }

    /// Write the next queued notification descriptor, skipping refused ones.
    fn write_next_descriptor(&mut self) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        while let Some(descriptor) = self.descriptors.pop_front() {
            if link.write_descriptor(descriptor, &ENABLE_NOTIFICATION_VALUE) {
                debug!(
                    "Enabling notifications through descriptor {} of {}",
                    descriptor.descriptor, descriptor.characteristic
                );
                return;
            }
            warn!("Unable to write descriptor {}", descriptor.descriptor);
        }
    }

    fn on_characteristic_read(&mut self, characteristic: Uuid, status: GattStatus, value: &[u8]) {
        debug!("Characteristic read: {}", characteristic);

        if status.is_success() {
            self.accumulate(DataClass::Read, value);
        } else {
            warn!("Unable to read: {}", status);
            if let Some(timers) = self.timers.as_mut() {
                self.read_acc.discard(timers);
            }
            self.emit(DeviceEvent::ReadError(ErrorCode::Read));
        }
    }

    fn on_characteristic_written(&mut self, characteristic: Uuid, status: GattStatus) {
        debug!("Characteristic written: {}", characteristic);

        let Some(profile) = self.connected.as_ref() else {
            debug!("Write confirmation without a connected profile");
            return;
        };

        if profile.mode_characteristic == Some(characteristic) {
            self.on_mode_written(status);
        } else {
            let write_characteristic = profile.write_characteristic;
            self.on_chunk_written(write_characteristic, status);
        }
    }

    fn on_mode_written(&mut self, status: GattStatus) {
        self.disarm(TimerKind::SetMode);

        let ModeOp::AwaitingConfirmation { mode } = std::mem::replace(&mut self.mode, ModeOp::Idle)
        else {
            debug!("Mode confirmation with no set-mode pending");
            return;
        };

        if status.is_success() {
            info!("SetMode characteristic value written: {}", mode);
            self.emit(DeviceEvent::SetMode(mode));
        } else {
            warn!("Unable to setMode: {}", status);
            self.emit(DeviceEvent::SetModeError(ErrorCode::SetMode));
        }
    }

    fn on_chunk_written(&mut self, characteristic: Uuid, status: GattStatus) {
        self.disarm(TimerKind::Write);

        let WriteOp::Sending { text, mut chunks } =
            std::mem::replace(&mut self.write, WriteOp::Idle)
        else {
            debug!("Write confirmation with no write pending");
            return;
        };

        if !status.is_success() {
            warn!("Unable to write: {}", status);
            self.emit(DeviceEvent::WriteError(ErrorCode::Write));
            return;
        }

        debug!(
            "Packet {}/{} confirmed",
            chunks.emitted(),
            chunks.chunk_count()
        );

        match chunks.next() {
            Some(next) => {
                if self.link_write(characteristic, &next) {
                    self.write = WriteOp::Sending { text, chunks };
                    self.arm(TimerKind::Write, self.timeouts.write());
                } else {
                    warn!("Unable to continue write operation");
                    self.emit(DeviceEvent::WriteError(ErrorCode::Write));
                }
            }
            None => {
                if let Some(timestamps) = self.timestamps.as_mut() {
                    timestamps.end_write = Some(Utc::now());
                }
                info!("Characteristic value write complete: {:?}", text);
                self.emit(DeviceEvent::WriteData(text));
            }
        }
    }

    fn on_characteristic_changed(&mut self, characteristic: Uuid, value: &[u8]) {
        trace!("Characteristic changed: {}", characteristic);

        let Some(profile) = self.connected.as_ref() else {
            debug!("Notification without a connected profile");
            return;
        };
        let mode = profile.mode_characteristic;
        let event = profile.event_characteristic;

        if mode == Some(characteristic) {
            debug!("Ignoring change of the mode characteristic");
            return;
        }

        if event == Some(characteristic) {
            self.accumulate(DataClass::Event, value);
            return;
        }

        if let Some(timestamps) = self.timestamps.as_mut() {
            timestamps.mark_notify(Utc::now());
        }
        self.accumulate(DataClass::Notify, value);
    }

    fn accumulate(&mut self, class: DataClass, fragment: &[u8]) {
        let quiet = self.timeouts.later_read();
        let Some(timers) = self.timers.as_mut() else {
            return;
        };
        let accumulator = match class {
            DataClass::Read => &mut self.read_acc,
            DataClass::Notify => &mut self.notify_acc,
            DataClass::Event => &mut self.event_acc,
        };
        accumulator.push(fragment, timers, quiet);
    }

    fn on_timeout(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Connect => {
                warn!("Connection failed: timeout!");
                let _ = self.disconnect();
                self.emit(DeviceEvent::ConnectionTimeout);
            }
            TimerKind::Write => {
                warn!("Write failed: timeout!");
                self.write = WriteOp::Idle;
                self.timestamps = None;
                self.emit(DeviceEvent::WriteTimeout);
            }
            TimerKind::FirstRead => {
                warn!("Read/Notify failed: timeout!");
                self.timestamps = None;
                self.emit(DeviceEvent::ReadNotifyTimeout);
            }
            TimerKind::SetMode => {
                warn!("SetMode failed: timeout!");
                self.mode = ModeOp::Idle;
                self.emit(DeviceEvent::SetModeTimeout);
            }
            TimerKind::Quiet(class) => self.complete_message(class),
        }
    }

    fn complete_message(&mut self, class: DataClass) {
        let terminator = self.read_terminator();
        match class {
            DataClass::Read => {
                let message = self.read_acc.complete(terminator);
                info!("Read complete, characteristic value is: {:?}", message);
                self.emit(DeviceEvent::ReadData(message));
            }
            DataClass::Notify => {
                let message = self.notify_acc.complete(terminator);
                info!("Notify complete, characteristic value is: {:?}", message);
                self.emit(DeviceEvent::NotifyData(message));

                if let Some(timestamps) = self.timestamps.take() {
                    self.emit(DeviceEvent::Timestamps(timestamps));
                }
            }
            DataClass::Event => {
                let message = self.event_acc.complete(terminator);
                info!("Event complete, characteristic value is: {:?}", message);
                self.emit(DeviceEvent::EventData(message));
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
