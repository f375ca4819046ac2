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

//! Boundary to the characteristic-oriented link the engine drives.
//!
//! The engine never talks to a Bluetooth stack directly. It asks a
//! [`BleAdapter`] for a [`GattLink`] and issues non-blocking primitives on
//! it; every outcome comes back later as a [`TransportEvent`] pushed into the
//! [`EventSink`] handed over at connect time.

use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::session::SessionInput;

/// Client characteristic configuration value enabling notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Completion status of a transport operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    Failure(u8),
}

impl GattStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure(code) => write!(f, "failure({:#04x})", code),
        }
    }
}

/// Link state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    /// A state the transport could not map onto the ones above.
    Other(u8),
}

/// One characteristic found during service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub uuid: Uuid,
    pub descriptors: Vec<Uuid>,
}

impl DiscoveredCharacteristic {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            descriptors: Vec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: Uuid) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

/// One primary service found during service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub uuid: Uuid,
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

impl DiscoveredService {
    pub fn new(uuid: Uuid, characteristics: Vec<DiscoveredCharacteristic>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }

    pub fn characteristic(&self, uuid: Uuid) -> Option<&DiscoveredCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// A descriptor addressed through its owning characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRef {
    pub characteristic: Uuid,
    pub descriptor: Uuid,
}

/// Events delivered by the transport on its own callback context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ConnectionStateChanged {
        status: GattStatus,
        state: LinkState,
    },
    ServicesDiscovered {
        status: GattStatus,
        services: Vec<DiscoveredService>,
    },
    CharacteristicRead {
        characteristic: Uuid,
        status: GattStatus,
        value: Vec<u8>,
    },
    CharacteristicWritten {
        characteristic: Uuid,
        status: GattStatus,
    },
    CharacteristicChanged {
        characteristic: Uuid,
        value: Vec<u8>,
    },
    DescriptorWritten {
        descriptor: DescriptorRef,
        status: GattStatus,
    },
}

/// Handle through which a transport reports events back to its session.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { tx }
    }

    /// Deliver an event. Returns `false` once the session has been closed.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send(SessionInput::Transport(event)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Entry point of a Bluetooth stack: resolves addresses into GATT links.
pub trait BleAdapter: Send + Sync {
    /// Start connecting to `address`.
    ///
    /// Returns `None` when no device is known under that address. Connection
    /// progress is reported through `events`.
    fn connect_gatt(&self, address: &str, events: EventSink) -> Option<Box<dyn GattLink>>;

    /// Whether a GATT link to `address` is currently up.
    fn is_connected(&self, _address: &str) -> bool {
        false
    }
}

/// Primitive operations on one GATT connection.
///
/// Every method only initiates the operation and returns whether the stack
/// accepted it; completion arrives as a [`TransportEvent`].
pub trait GattLink: Send + Sync {
    fn discover_services(&self) -> bool;

    fn read_characteristic(&self, characteristic: Uuid) -> bool;

    fn write_characteristic(&self, characteristic: Uuid, value: &[u8]) -> bool;

    fn set_characteristic_notification(&self, characteristic: Uuid, enable: bool) -> bool;

    fn write_descriptor(&self, descriptor: DescriptorRef, value: &[u8]) -> bool;

    fn disconnect(&self);

    /// Release the link. Called once, after which the link is dropped.
    fn close(&self);
}
