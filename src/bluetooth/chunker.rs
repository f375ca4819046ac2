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

//! Outbound packet splitting.

/// Lazily splits an outbound buffer into packets no larger than the
/// write packet size of the connected profile.
///
/// The splitter is single pass: each packet is produced only once the
/// previous one has been confirmed by the transport, so callers check
/// [`has_next`](Self::has_next) before advancing.
#[derive(Debug, Clone)]
pub(crate) struct ChunkSplitter {
    data: Vec<u8>,
    size: usize,
    offset: usize,
}

impl ChunkSplitter {
    /// Create a splitter over `data`. A zero `size` is treated as 1.
    pub fn new(data: Vec<u8>, size: usize) -> Self {
        Self {
            data,
            size: size.max(1),
            offset: 0,
        }
    }

    /// Whether another packet remains.
    pub fn has_next(&self) -> bool {
        self.offset < self.data.len()
    }

    /// Total number of packets, `ceil(len / size)`.
    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(self.size)
    }

    /// Number of packets already handed out.
    pub fn emitted(&self) -> usize {
        self.offset.div_ceil(self.size)
    }

    /// Total payload length.
    pub fn total_len(&self) -> usize {
        self.data.len()
    }
}

impl Iterator for ChunkSplitter {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let end = (self.offset + self.size).min(self.data.len());
        let chunk = self.data[self.offset..end].to_vec();
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk_count() - self.emitted();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkSplitter {}
