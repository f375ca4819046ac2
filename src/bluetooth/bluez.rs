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

//! BlueZ transport built on `bluer`.
//!
//! BlueZ operations are async; every [`GattLink`] primitive spawns a task
//! that performs the operation and reports its outcome through the
//! session's [`EventSink`].

use anyhow::Result;
use bluer::gatt::remote::Characteristic;
use bluer::{AdapterEvent, Address, Device, DeviceEvent as BluezDeviceEvent, DeviceProperty};
use futures::{pin_mut, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::transport::{
    BleAdapter, DescriptorRef, DiscoveredCharacteristic, DiscoveredService, EventSink, GattLink,
    GattStatus, LinkState, TransportEvent,
};

/// Status reported for operations BlueZ rejected.
const GATT_ERROR: u8 = 0x85;

/// Connection state of every device BlueZ knows, kept current by property watches.
#[derive(Default)]
struct ConnectionCache {
    connected: Mutex<HashSet<Address>>,
    watched: Mutex<HashSet<Address>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionCache {
    fn set(&self, address: Address, connected: bool) {
        let mut set = self.connected.lock();
        if connected {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }

    fn contains(&self, address: &Address) -> bool {
        self.connected.lock().contains(address)
    }

    fn forget(&self, address: &Address) {
        self.connected.lock().remove(address);
        self.watched.lock().remove(address);
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|t| !t.is_finished());
        watchers.push(task);
    }

    /// Seed the state of `address` and follow its `Connected` property.
    async fn watch(self: &Arc<Self>, adapter: &bluer::Adapter, address: Address) {
        if !self.watched.lock().insert(address) {
            return;
        }
        let device = match adapter.device(address) {
            Ok(device) => device,
            Err(e) => {
                debug!("Cannot watch {}: {}", address, e);
                return;
            }
        };
        if let Ok(connected) = device.is_connected().await {
            self.set(address, connected);
        }
        let events = match device.events().await {
            Ok(events) => events,
            Err(e) => {
                debug!("Cannot watch {}: {}", address, e);
                return;
            }
        };

        let cache = self.clone();
        self.track(tokio::spawn(async move {
            pin_mut!(events);
            while let Some(event) = events.next().await {
                if let BluezDeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) =
                    event
                {
                    debug!("Device {} connected: {}", address, connected);
                    cache.set(address, connected);
                }
            }
        }));
    }
}

impl Drop for ConnectionCache {
    fn drop(&mut self) {
        for task in self.watchers.lock().drain(..) {
            task.abort();
        }
    }
}

/// Adapter backed by the default BlueZ controller.
pub struct BluezAdapter {
    adapter: bluer::Adapter,
    runtime: Handle,
    connections: Arc<ConnectionCache>,
    monitor: JoinHandle<()>,
}

impl BluezAdapter {
    /// Open a BlueZ session and power on the default adapter.
    pub async fn new() -> Result<Self> {
        info!("Initializing BlueZ adapter...");

        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        let connections = Arc::new(ConnectionCache::default());
        for address in adapter.device_addresses().await? {
            connections.watch(&adapter, address).await;
        }
        info!(
            "{} of the known devices are connected",
            connections.connected.lock().len()
        );

        let adapter_events = adapter.events().await?;
        let monitor = {
            let adapter = adapter.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                pin_mut!(adapter_events);
                while let Some(event) = adapter_events.next().await {
                    match event {
                        AdapterEvent::DeviceAdded(address) => {
                            connections.watch(&adapter, address).await
                        }
                        AdapterEvent::DeviceRemoved(address) => connections.forget(&address),
                        _ => {}
                    }
                }
            })
        };

        Ok(Self {
            adapter,
            runtime: Handle::current(),
            connections,
            monitor,
        })
    }
}

impl Drop for BluezAdapter {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

impl BleAdapter for BluezAdapter {
    fn connect_gatt(&self, address: &str, events: EventSink) -> Option<Box<dyn GattLink>> {
        let address: Address = match address.parse() {
            Ok(address) => address,
            Err(e) => {
                warn!("Invalid device address {:?}: {}", address, e);
                return None;
            }
        };
        let device = match self.adapter.device(address) {
            Ok(device) => device,
            Err(e) => {
                warn!("Device {} not available: {}", address, e);
                return None;
            }
        };

        let link = BluezLink {
            address,
            device,
            runtime: self.runtime.clone(),
            sink: events,
            connections: self.connections.clone(),
            characteristics: Arc::new(Mutex::new(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
        };
        link.start();
        Some(Box::new(link))
    }

    fn is_connected(&self, address: &str) -> bool {
        address
            .parse::<Address>()
            .map(|address| self.connections.contains(&address))
            .unwrap_or(false)
    }
}

fn status_of<T, E: std::fmt::Display>(result: &std::result::Result<T, E>, what: &str) -> GattStatus {
    match result {
        Ok(_) => GattStatus::Success,
        Err(e) => {
            warn!("{} failed: {}", what, e);
            GattStatus::Failure(GATT_ERROR)
        }
    }
}

/// One BlueZ GATT client connection.
struct BluezLink {
    address: Address,
    device: Device,
    runtime: Handle,
    sink: EventSink,
    connections: Arc<ConnectionCache>,
    characteristics: Arc<Mutex<HashMap<Uuid, Characteristic>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BluezLink {
    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(task);
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Connect and watch the connection property.
    fn start(&self) {
        let device = self.device.clone();
        let sink = self.sink.clone();
        let connections = self.connections.clone();
        let address = self.address;

        self.spawn(async move {
            let events = match device.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Unable to watch {}: {}", address, e);
                    return;
                }
            };

            let result = device.connect().await;
            let status = status_of(&result, "Connect");
            let state = if status.is_success() {
                connections.set(address, true);
                LinkState::Connected
            } else {
                LinkState::Disconnected
            };
            sink.send(TransportEvent::ConnectionStateChanged { status, state });
            if !status.is_success() {
                return;
            }

            pin_mut!(events);
            while let Some(event) = events.next().await {
                if let BluezDeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                    info!("Device {} disconnected", address);
                    connections.set(address, false);
                    sink.send(TransportEvent::ConnectionStateChanged {
                        status: GattStatus::Success,
                        state: LinkState::Disconnected,
                    });
                    break;
                }
            }
        });
    }

    fn characteristic(&self, uuid: Uuid) -> Option<Characteristic> {
        let characteristic = self.characteristics.lock().get(&uuid).cloned();
        if characteristic.is_none() {
            warn!("Characteristic {} not discovered", uuid);
        }
        characteristic
    }
}

async fn discover(
    device: &Device,
    characteristics: &Mutex<HashMap<Uuid, Characteristic>>,
) -> bluer::Result<Vec<DiscoveredService>> {
    let mut services = Vec::new();

    for service in device.services().await? {
        let mut discovered = DiscoveredService::new(service.uuid().await?, Vec::new());
        for characteristic in service.characteristics().await? {
            let uuid = characteristic.uuid().await?;
            let mut entry = DiscoveredCharacteristic::new(uuid);
            for descriptor in characteristic.descriptors().await? {
                entry = entry.with_descriptor(descriptor.uuid().await?);
            }
            characteristics.lock().insert(uuid, characteristic);
            discovered.characteristics.push(entry);
        }
        debug!(
            "Service {} with {} characteristics",
            discovered.uuid,
            discovered.characteristics.len()
        );
        services.push(discovered);
    }

    Ok(services)
}

impl GattLink for BluezLink {
    fn discover_services(&self) -> bool {
        let device = self.device.clone();
        let sink = self.sink.clone();
        let characteristics = self.characteristics.clone();

        self.spawn(async move {
            let result = discover(&device, &characteristics).await;
            let status = status_of(&result, "Service discovery");
            sink.send(TransportEvent::ServicesDiscovered {
                status,
                services: result.unwrap_or_default(),
            });
        });
        true
    }

    fn read_characteristic(&self, uuid: Uuid) -> bool {
        let Some(characteristic) = self.characteristic(uuid) else {
            return false;
        };
        let sink = self.sink.clone();

        self.spawn(async move {
            let result = characteristic.read().await;
            let status = status_of(&result, "Read");
            sink.send(TransportEvent::CharacteristicRead {
                characteristic: uuid,
                status,
                value: result.unwrap_or_default(),
            });
        });
        true
    }

    fn write_characteristic(&self, uuid: Uuid, value: &[u8]) -> bool {
        let Some(characteristic) = self.characteristic(uuid) else {
            return false;
        };
        let sink = self.sink.clone();
        let value = value.to_vec();

        self.spawn(async move {
            let result = characteristic.write(&value).await;
            let status = status_of(&result, "Write");
            sink.send(TransportEvent::CharacteristicWritten {
                characteristic: uuid,
                status,
            });
        });
        true
    }

    fn set_characteristic_notification(&self, uuid: Uuid, enable: bool) -> bool {
        if !enable {
            return true;
        }
        let Some(characteristic) = self.characteristic(uuid) else {
            return false;
        };
        let sink = self.sink.clone();

        self.spawn(async move {
            let stream = match characteristic.notify().await {
                Ok(stream) => stream,
                Err(e) => {
                    // Not every characteristic of a profile supports notify
                    debug!("No notifications on {}: {}", uuid, e);
                    return;
                }
            };
            pin_mut!(stream);
            while let Some(value) = stream.next().await {
                if !sink.send(TransportEvent::CharacteristicChanged {
                    characteristic: uuid,
                    value,
                }) {
                    break;
                }
            }
        });
        true
    }

    fn write_descriptor(&self, descriptor: DescriptorRef, _value: &[u8]) -> bool {
        // BlueZ writes the configuration descriptor itself when a notify
        // session starts.
        self.sink.send(TransportEvent::DescriptorWritten {
            descriptor,
            status: GattStatus::Success,
        })
    }

    fn disconnect(&self) {
        let device = self.device.clone();
        let address = self.address;
        // Untracked so that a close right after disconnect does not abort it
        self.runtime.spawn(async move {
            if let Err(e) = device.disconnect().await {
                warn!("Disconnect from {} failed: {}", address, e);
            }
        });
    }

    fn close(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.characteristics.lock().clear();
        debug!("Link to {} closed", self.address);
    }
}
