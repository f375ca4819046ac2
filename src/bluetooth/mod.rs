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

//! BLE GATT client session engine.
//!
//! Connects to a peripheral, resolves one of the known device profiles and
//! exchanges line-oriented messages over fragmenting characteristics.

mod accumulator;
#[cfg(feature = "bluez")]
mod bluez;
mod chunker;
mod manager;
mod profiles;
mod session;
mod terminator;
mod timers;
mod transport;

#[cfg(feature = "bluez")]
pub use bluez::BluezAdapter;
pub use manager::DeviceManager;
pub use profiles::{
    profile_for, DeviceProfile, ProfileFamily, ACKME_SERVICE_UUID, PROFILES, SENSOR_SERVICE_UUID,
    TXRX_SERVICE_UUID, ZEBRA_SERVICE_UUID, ZHAGA_SERVICE_UUID,
};
pub use session::LifecycleState;
pub use terminator::Terminator;
pub use transport::{
    BleAdapter, DescriptorRef, DiscoveredCharacteristic, DiscoveredService, EventSink, GattLink,
    GattStatus, LinkState, TransportEvent, ENABLE_NOTIFICATION_VALUE,
};
