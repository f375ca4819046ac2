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

//! Error codes reported by the session engine.

use thiserror::Error;

/// Failure reported to the caller, either synchronously when a request is
/// rejected or asynchronously through a [`DeviceEvent`](crate::DeviceEvent).
///
/// Every variant maps to a stable numeric code. Generic codes (1, 2, 3, 4)
/// are used for failures reported by the transport after the operation was
/// started; the two-digit codes identify the precise rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    #[error("connection error")]
    Connect,
    #[error("device not found")]
    ConnectDeviceNotFound,
    #[error("invalid bluetooth adapter")]
    ConnectInvalidAdapter,
    #[error("invalid device address")]
    ConnectInvalidAddress,
    #[error("disconnect requested but GATT link not initialized")]
    DisconnectNotInitialized,
    #[error("disconnect requested but bluetooth adapter not initialized")]
    DisconnectInvalidAdapter,

    #[error("read error")]
    Read,
    #[error("unable to initiate read")]
    ReadDeviceError,
    #[error("invalid read characteristic")]
    ReadInvalidCharacteristic,

    #[error("write error")]
    Write,
    #[error("unable to initiate write")]
    WriteDeviceError,
    #[error("invalid write characteristic")]
    WriteInvalidCharacteristic,
    #[error("write operation already in progress")]
    WriteInProgress,

    #[error("set mode error")]
    SetMode,
    #[error("unable to initiate set mode")]
    SetModeDeviceError,
    #[error("invalid set mode characteristic")]
    SetModeInvalidCharacteristic,
    #[error("set mode operation already in progress")]
    SetModeInProgress,
}

impl ErrorCode {
    const ALL: [ErrorCode; 17] = [
        Self::Connect,
        Self::ConnectDeviceNotFound,
        Self::ConnectInvalidAdapter,
        Self::ConnectInvalidAddress,
        Self::DisconnectNotInitialized,
        Self::DisconnectInvalidAdapter,
        Self::Read,
        Self::ReadDeviceError,
        Self::ReadInvalidCharacteristic,
        Self::Write,
        Self::WriteDeviceError,
        Self::WriteInvalidCharacteristic,
        Self::WriteInProgress,
        Self::SetMode,
        Self::SetModeDeviceError,
        Self::SetModeInvalidCharacteristic,
        Self::SetModeInProgress,
    ];

    /// Numeric code exposed to consumers.
    pub fn code(&self) -> u8 {
        match self {
            Self::Connect => 1,
            Self::ConnectDeviceNotFound => 11,
            Self::ConnectInvalidAdapter => 12,
            Self::ConnectInvalidAddress => 13,
            Self::DisconnectNotInitialized => 14,
            Self::DisconnectInvalidAdapter => 15,
            Self::Read => 2,
            Self::ReadDeviceError => 21,
            Self::ReadInvalidCharacteristic => 22,
            Self::Write => 3,
            Self::WriteDeviceError => 31,
            Self::WriteInvalidCharacteristic => 32,
            Self::WriteInProgress => 33,
            Self::SetMode => 4,
            Self::SetModeDeviceError => 41,
            Self::SetModeInvalidCharacteristic => 42,
            Self::SetModeInProgress => 43,
        }
    }

    /// Parse a numeric code back into its variant.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    /// Whether the request was refused before anything reached the transport.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ConnectInvalidAdapter
                | Self::ConnectInvalidAddress
                | Self::DisconnectNotInitialized
                | Self::DisconnectInvalidAdapter
                | Self::ReadInvalidCharacteristic
                | Self::WriteInvalidCharacteristic
                | Self::WriteInProgress
                | Self::SetModeInvalidCharacteristic
                | Self::SetModeInProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in ErrorCode::ALL.iter().enumerate() {
            for b in &ErrorCode::ALL[i + 1..] {
                assert_ne!(a.code(), b.code(), "{:?} and {:?} share a code", a, b);
            }
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(ErrorCode::from_code(33), Some(ErrorCode::WriteInProgress));
        assert_eq!(ErrorCode::from_code(1), Some(ErrorCode::Connect));
        assert_eq!(ErrorCode::from_code(99), None);
    }

    #[test]
    fn test_precondition_classification() {
        assert!(ErrorCode::WriteInProgress.is_precondition());
        assert!(!ErrorCode::WriteDeviceError.is_precondition());
        assert!(!ErrorCode::Write.is_precondition());
        assert!(!ErrorCode::ConnectDeviceNotFound.is_precondition());
    }
}
