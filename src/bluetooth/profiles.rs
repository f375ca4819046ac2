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

//! Service profiles of the supported peripheral families.

use uuid::Uuid;

use super::terminator::Terminator;

/// Peripheral family a profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileFamily {
    Sensor,
    Ackme,
    Zhaga,
    TxRx,
    Zebra,
}

impl ProfileFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Ackme => "ackme",
            Self::Zhaga => "zhaga",
            Self::TxRx => "txrx",
            Self::Zebra => "zebra",
        }
    }
}

/// Characteristic layout, terminators and packet sizes of one peripheral family.
///
/// "Read" is the direction peripheral -> host (read and notify traffic),
/// "write" is host -> peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub family: ProfileFamily,
    pub service: Uuid,
    pub read_characteristic: Uuid,
    pub write_characteristic: Uuid,
    pub mode_characteristic: Option<Uuid>,
    pub event_characteristic: Option<Uuid>,
    pub read_terminator: Terminator,
    pub write_terminator: Terminator,
    pub read_packet_size: usize,
    pub write_packet_size: usize,
}

/// Sensor service UUID.
pub const SENSOR_SERVICE_UUID: Uuid = Uuid::from_u128(0xf3770001_1164_49bc_8f22_0ac34292c217);

/// ACKme TxRx service UUID.
pub const ACKME_SERVICE_UUID: Uuid = Uuid::from_u128(0x175f8f23_a570_49bd_9627_815a6a27de2a);

/// Zhaga service UUID.
pub const ZHAGA_SERVICE_UUID: Uuid = Uuid::from_u128(0x3cc30001_cb91_4947_bd12_80d2f0535a30);

/// TxRx service UUID.
pub const TXRX_SERVICE_UUID: Uuid = Uuid::from_u128(0xd7080001_052c_46c4_9978_c0977bebf328);

/// Zebra service UUID.
pub const ZEBRA_SERVICE_UUID: Uuid = Uuid::from_u128(0xc1ff0001_c47e_424d_9495_fb504404b8f5);

/// Built-in profiles, in the order they are probed after service discovery.
pub static PROFILES: [DeviceProfile; 5] = [
    DeviceProfile {
        family: ProfileFamily::Sensor,
        service: SENSOR_SERVICE_UUID,
        write_characteristic: Uuid::from_u128(0xf3770002_1164_49bc_8f22_0ac34292c217),
        read_characteristic: Uuid::from_u128(0xf3770003_1164_49bc_8f22_0ac34292c217),
        mode_characteristic: None,
        event_characteristic: None,
        write_terminator: Terminator::CrLf,
        read_terminator: Terminator::None,
        write_packet_size: 240,
        read_packet_size: 240,
    },
    DeviceProfile {
        family: ProfileFamily::Ackme,
        service: ACKME_SERVICE_UUID,
        write_characteristic: Uuid::from_u128(0x1cce1ea8_bd34_4813_a00a_c76e028fadcb),
        read_characteristic: Uuid::from_u128(0xcacc07ff_ffff_4c48_8fae_a9ef71b75e26),
        mode_characteristic: Some(Uuid::from_u128(0x20b9794f_da1a_4d14_8014_a0fb9cefb2f7)),
        event_characteristic: None,
        write_terminator: Terminator::CrLf,
        read_terminator: Terminator::None,
        write_packet_size: 15,
        read_packet_size: 20,
    },
    DeviceProfile {
        family: ProfileFamily::Zhaga,
        service: ZHAGA_SERVICE_UUID,
        write_characteristic: Uuid::from_u128(0x3cc30002_cb91_4947_bd12_80d2f0535a30),
        read_characteristic: Uuid::from_u128(0x3cc30003_cb91_4947_bd12_80d2f0535a30),
        mode_characteristic: None,
        event_characteristic: Some(Uuid::from_u128(0x3cc30004_cb91_4947_bd12_80d2f0535a30)),
        write_terminator: Terminator::Cr,
        read_terminator: Terminator::None,
        write_packet_size: 240,
        read_packet_size: 240,
    },
    DeviceProfile {
        family: ProfileFamily::TxRx,
        service: TXRX_SERVICE_UUID,
        write_characteristic: Uuid::from_u128(0xd7080002_052c_46c4_9978_c0977bebf328),
        read_characteristic: Uuid::from_u128(0xd7080003_052c_46c4_9978_c0977bebf328),
        mode_characteristic: None,
        event_characteristic: None,
        write_terminator: Terminator::CrLf,
        read_terminator: Terminator::None,
        write_packet_size: 240,
        read_packet_size: 240,
    },
    DeviceProfile {
        family: ProfileFamily::Zebra,
        service: ZEBRA_SERVICE_UUID,
        write_characteristic: Uuid::from_u128(0xc1ff0002_c47e_424d_9495_fb504404b8f5),
        read_characteristic: Uuid::from_u128(0xc1ff0003_c47e_424d_9495_fb504404b8f5),
        mode_characteristic: None,
        event_characteristic: None,
        write_terminator: Terminator::CrLf,
        read_terminator: Terminator::None,
        write_packet_size: 240,
        read_packet_size: 240,
    },
];

/// Look up the built-in profile of a family.
pub fn profile_for(family: ProfileFamily) -> &'static DeviceProfile {
    PROFILES
        .iter()
        .find(|p| p.family == family)
        .unwrap_or(&PROFILES[0])
}
