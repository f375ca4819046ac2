//! Recording fake transport and a small harness around `DeviceManager`.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use txrx_ble::bluetooth::{
    profile_for, BleAdapter, DescriptorRef, DiscoveredCharacteristic, DiscoveredService,
    EventSink, GattLink, GattStatus, LinkState, TransportEvent,
};
use txrx_ble::{Config, DeviceEvent, DeviceManager, DeviceProfile, ProfileFamily};

pub const CCCD: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);
pub const ADDRESS: &str = "00:11:22:33:44:55";

/// A primitive issued on the fake link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    DiscoverServices,
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    Notify(Uuid, bool),
    WriteDescriptor(DescriptorRef),
    Disconnect,
    Close,
}

/// Recorded state of the fake Bluetooth stack, shared by adapter and links.
#[derive(Default)]
pub struct FakeStack {
    calls: Mutex<Vec<Call>>,
    sink: Mutex<Option<EventSink>>,
    pub unknown_device: AtomicBool,
    pub refuse_reads: AtomicBool,
    pub refuse_writes: AtomicBool,
    pub connected: AtomicBool,
    /// Answer a disconnect with a `Disconnected` state event.
    pub report_disconnect: AtomicBool,
}

impl FakeStack {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Write(uuid, value) => Some((*uuid, value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Deliver a transport event as the stack would.
    pub fn emit(&self, event: TransportEvent) {
        let sink = self.sink.lock().clone().expect("no link was opened");
        assert!(sink.send(event), "session input closed");
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

pub struct FakeAdapter(pub Arc<FakeStack>);

impl BleAdapter for FakeAdapter {
    fn connect_gatt(&self, address: &str, events: EventSink) -> Option<Box<dyn GattLink>> {
        self.0.record(Call::Connect(address.to_string()));
        if self.0.unknown_device.load(Ordering::SeqCst) {
            return None;
        }
        *self.0.sink.lock() = Some(events);
        Some(Box::new(FakeLink(self.0.clone())))
    }

    fn is_connected(&self, address: &str) -> bool {
        address == ADDRESS && self.0.connected.load(Ordering::SeqCst)
    }
}

struct FakeLink(Arc<FakeStack>);

impl GattLink for FakeLink {
    fn discover_services(&self) -> bool {
        self.0.record(Call::DiscoverServices);
        true
    }

    fn read_characteristic(&self, characteristic: Uuid) -> bool {
        self.0.record(Call::Read(characteristic));
        !self.0.refuse_reads.load(Ordering::SeqCst)
    }

    fn write_characteristic(&self, characteristic: Uuid, value: &[u8]) -> bool {
        self.0.record(Call::Write(characteristic, value.to_vec()));
        !self.0.refuse_writes.load(Ordering::SeqCst)
    }

    fn set_characteristic_notification(&self, characteristic: Uuid, enable: bool) -> bool {
        self.0.record(Call::Notify(characteristic, enable));
        true
    }

    fn write_descriptor(&self, descriptor: DescriptorRef, _value: &[u8]) -> bool {
        self.0.record(Call::WriteDescriptor(descriptor));
        true
    }

    fn disconnect(&self) {
        self.0.record(Call::Disconnect);
        if self.0.report_disconnect.load(Ordering::SeqCst) {
            self.0.emit(TransportEvent::ConnectionStateChanged {
                status: GattStatus::Success,
                state: LinkState::Disconnected,
            });
        }
    }

    fn close(&self) {
        self.0.record(Call::Close);
    }
}

/// Services a peripheral of `profile` exposes, every characteristic with a CCCD.
pub fn services_for(profile: &DeviceProfile) -> Vec<DiscoveredService> {
    let uuids = [
        Some(profile.read_characteristic),
        Some(profile.write_characteristic),
        profile.mode_characteristic,
        profile.event_characteristic,
    ];
    let characteristics = uuids
        .into_iter()
        .flatten()
        .map(|uuid| DiscoveredCharacteristic::new(uuid).with_descriptor(CCCD))
        .collect();
    vec![DiscoveredService::new(profile.service, characteristics)]
}

pub struct Harness {
    pub fake: Arc<FakeStack>,
    pub manager: DeviceManager,
    pub events: mpsc::UnboundedReceiver<DeviceEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let fake = Arc::new(FakeStack::default());
        let (tx, events) = mpsc::unbounded_channel();
        let adapter: Arc<dyn BleAdapter> = Arc::new(FakeAdapter(fake.clone()));
        let manager = DeviceManager::new(Some(adapter), tx)
            .unwrap()
            .with_config(config);
        Self {
            fake,
            manager,
            events,
        }
    }

    /// Connect and resolve `family`, consuming the two setup events.
    pub async fn ready(family: ProfileFamily) -> Self {
        Self::ready_with(family, &Config::default()).await
    }

    pub async fn ready_with(family: ProfileFamily, config: &Config) -> Self {
        let mut harness = Self::with_config(config);
        harness.manager.connect(ADDRESS).unwrap();

        harness.fake.emit(TransportEvent::ConnectionStateChanged {
            status: GattStatus::Success,
            state: LinkState::Connected,
        });
        assert_eq!(harness.next_event().await, DeviceEvent::DeviceConnected);

        harness.fake.emit(TransportEvent::ServicesDiscovered {
            status: GattStatus::Success,
            services: services_for(profile_for(family)),
        });
        assert_eq!(harness.next_event().await, DeviceEvent::ServiceDiscovered);
        harness
    }

    pub fn profile(&self) -> DeviceProfile {
        self.manager.connected_profile().expect("no profile resolved")
    }

    /// Next event, letting paused time advance as far as needed.
    pub async fn next_event(&mut self) -> DeviceEvent {
        tokio::time::timeout(Duration::from_secs(120), self.events.recv())
            .await
            .expect("no event within two minutes")
            .expect("event channel closed")
    }

    /// Wait `window` and return nothing if no event arrived in it.
    pub async fn no_event_within(&mut self, window: Duration) -> Option<DeviceEvent> {
        tokio::time::timeout(window, self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Let the driver process everything queued so far.
    pub async fn settle(&self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    pub fn confirm_write(&self, characteristic: Uuid) {
        self.fake.emit(TransportEvent::CharacteristicWritten {
            characteristic,
            status: GattStatus::Success,
        });
    }
}
