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

//! Line terminators appended to outbound writes and assembled inbound messages.

use serde::{Deserialize, Serialize};

/// Terminator kinds understood by the supported peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    #[default]
    None,
    Cr,
    Lf,
    CrLf,
    Zero,
}

impl Terminator {
    /// Byte sequence for this terminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Cr => "\r",
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Zero => "\0",
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Append the terminator to outbound text before it is chunked.
    pub fn encode(&self, data: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(data.len() + self.as_bytes().len());
        bytes.extend_from_slice(data.as_bytes());
        bytes.extend_from_slice(self.as_bytes());
        bytes
    }

    /// Close an assembled inbound message.
    ///
    /// The peer's own bytes are never inspected: a message ends when the
    /// link goes quiet, and the local terminator is appended afterwards.
    pub fn seal(&self, mut message: String) -> String {
        message.push_str(self.as_str());
        message
    }
}
