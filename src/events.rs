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

//! Events delivered to the application.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ErrorCode;

/// Outcome notifications emitted by a [`DeviceManager`](crate::DeviceManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// GATT link established; service discovery has been requested.
    DeviceConnected,
    /// GATT link lost or closed.
    DeviceDisconnected,
    /// Connection could not be established or was refused.
    ConnectionError(ErrorCode),
    /// Connection did not come up in time; a disconnect has been issued.
    ConnectionTimeout,
    /// A supported profile was resolved and notifications were enabled.
    ServiceDiscovered,
    /// None of the known profiles matched the discovered services.
    ServiceNotFound,
    /// Assembled reply to a read request.
    ReadData(String),
    ReadError(ErrorCode),
    /// Nothing was received after a write within the first-read window.
    ReadNotifyTimeout,
    /// All packets of a write were confirmed; carries the text as requested.
    WriteData(String),
    WriteError(ErrorCode),
    WriteTimeout,
    /// Assembled notification message.
    NotifyData(String),
    /// Assembled message from the event characteristic.
    EventData(String),
    /// Mode value confirmed by the peripheral.
    SetMode(u8),
    SetModeError(ErrorCode),
    SetModeTimeout,
    /// Timing of the last write and of the notification that answered it.
    Timestamps(Timestamps),
}

impl DeviceEvent {
    /// Error code carried by the event, if any.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::ConnectionError(code)
            | Self::ReadError(code)
            | Self::WriteError(code)
            | Self::SetModeError(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout
                | Self::ReadNotifyTimeout
                | Self::WriteTimeout
                | Self::SetModeTimeout
        )
    }
}

/// Timing record of one write and the notification stream following it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    pub begin_write: Option<DateTime<Utc>>,
    pub end_write: Option<DateTime<Utc>>,
    pub begin_notify: Option<DateTime<Utc>>,
    pub end_notify: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Start a record at write initiation.
    pub fn begin(now: DateTime<Utc>) -> Self {
        Self {
            begin_write: Some(now),
            ..Default::default()
        }
    }

    /// Note a notify fragment; the first one opens the notify span.
    pub fn mark_notify(&mut self, now: DateTime<Utc>) {
        if self.begin_notify.is_none() {
            self.begin_notify = Some(now);
        }
        self.end_notify = Some(now);
    }

    /// Milliseconds between write initiation and the last notify fragment.
    pub fn round_trip_ms(&self) -> Option<i64> {
        match (self.begin_write, self.end_notify) {
            (Some(begin), Some(end)) => Some((end - begin).num_milliseconds()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
