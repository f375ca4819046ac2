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

//! TxRx command line client.
//!
//! Connects to the peripheral given on the command line and sends each line
//! read from stdin. Lines starting with `/` are commands:
//! `/read`, `/mode <n>`, `/quit`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txrx_ble::bluetooth::BluezAdapter;
use txrx_ble::{BleAdapter, Config, DeviceEvent, DeviceManager};

/// How long to wait for the link to report disconnection before closing.
const DISCONNECT_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("txrx_ble=info".parse()?)
                .add_directive("txrx=info".parse()?),
        )
        .init();

    info!("Starting TxRx v{}...", env!("CARGO_PKG_VERSION"));

    let address = std::env::args()
        .nth(1)
        .context("usage: txrx <DEVICE_ADDRESS>")?;

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let adapter: Arc<dyn BleAdapter> = Arc::new(BluezAdapter::new().await?);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let manager = DeviceManager::new(Some(adapter), event_tx)?.with_config(&config);

    manager.connect(&address)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                log_event(&manager, event);
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !dispatch(&manager, line.trim()) {
                            break;
                        }
                    }
                    None => {
                        info!("End of input");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if manager.shutdown(&mut event_rx, DISCONNECT_WAIT).await {
        info!("Device disconnected");
    }
    info!("TxRx stopped");
    Ok(())
}

/// Run one input line. Returns `false` when the user asked to quit.
fn dispatch(manager: &DeviceManager, line: &str) -> bool {
    let result = match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("/read", _) => manager.request_read_data(),
        ("/mode", value) => match value.trim().parse::<u8>() {
            Ok(mode) => manager.request_set_mode(mode),
            Err(e) => {
                warn!("Invalid mode {:?}: {}", value, e);
                return true;
            }
        },
        _ if line.is_empty() => return true,
        _ => manager.request_write_data(line),
    };

    if let Err(code) = result {
        if code.is_precondition() {
            warn!("Request refused: {} (code {})", code, code.code());
        } else {
            error!("Request failed: {} (code {})", code, code.code());
        }
    }
    true
}

fn log_event(manager: &DeviceManager, event: DeviceEvent) {
    match event {
        DeviceEvent::ServiceDiscovered => {
            let family = manager
                .connected_family()
                .map(|f| f.as_str())
                .unwrap_or("unknown");
            info!("Ready, {} profile", family);
        }
        DeviceEvent::ReadData(text) => println!("< {}", text.trim_end()),
        DeviceEvent::NotifyData(text) => println!("< {}", text.trim_end()),
        DeviceEvent::EventData(text) => println!("! {}", text.trim_end()),
        DeviceEvent::WriteData(text) => info!("Sent: {}", text),
        DeviceEvent::SetMode(mode) => info!("Mode set to {}", mode),
        DeviceEvent::Timestamps(timestamps) => match timestamps.to_json() {
            Ok(json) => info!("Timing: {}", json),
            Err(e) => warn!("Unable to encode timing: {}", e),
        },
        other if other.error_code().is_some() || other.is_timeout() => {
            warn!("{:?}", other);
        }
        other => info!("{:?}", other),
    }
}
