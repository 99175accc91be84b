/*
 * @file pico.rs
 * @brief Pico LED indicator over UART
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! LED indicator driven by a Raspberry Pi Pico over UART.
//!
//! Each state change is one text line: `SHINE <color>`, `PULSE <color>` or
//! `OFF`. Without a configured port the indicator is only logged.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serialport::SerialPort;
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::services::{Color, Indicator, Light};

/// Read/write timeout applied to the serial port.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Time the Pico needs after DTR/RTS go high.
const SERIAL_BOOT_DELAY: Duration = Duration::from_millis(150);

/// Gap between consecutive commands.
const SERIAL_COMMAND_DELAY: Duration = Duration::from_millis(30);

/// Steady color shown while listening.
const LISTENING_COLOR: Color = Color::Green;

/// Pulsing color shown while speaking.
const SPEAKING_COLOR: Color = Color::Red;

/// UART line for a light state, without the trailing newline.
pub fn light_command(light: Light) -> String {
    match light {
        Light::Listening => format!("SHINE {LISTENING_COLOR}"),
        Light::Speaking => format!("PULSE {SPEAKING_COLOR}"),
        Light::Shine(color) => format!("SHINE {color}"),
        Light::Off => "OFF".to_string(),
    }
}

/// Lazily opened serial connection.
struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    baud: u32,
}

impl SerialLink {
    /// Writes one command line, reopening the port on the next call if the
    /// write fails.
    fn send(&mut self, command: &str) -> Result<()> {
        let result = self.write_line(command);
        if result.is_err() {
            self.port = None;
        }
        result
    }

    fn write_line(&mut self, command: &str) -> Result<()> {
        let port = self.ensure_port()?;
        port.write_all(command.as_bytes())
            .with_context(|| "Failed to write to serial port")?;
        port.write_all(b"\n")?;
        port.flush()?;
        std::thread::sleep(SERIAL_COMMAND_DELAY);
        Ok(())
    }

    fn ensure_port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        if self.port.is_none() {
            let mut port = self.open_with_fallback()?;
            let _ = port.write_data_terminal_ready(true);
            let _ = port.write_request_to_send(true);
            std::thread::sleep(SERIAL_BOOT_DELAY);
            self.port = Some(port);
        }
        self.port
            .as_mut()
            .ok_or_else(|| anyhow!("serial port missing after initialization"))
    }

    /// Opens the configured path, falling back to the `cu.*` callout device.
    fn open_with_fallback(&mut self) -> Result<Box<dyn SerialPort>> {
        let primary_err = match open_serial_port(&self.path, self.baud) {
            Ok(port) => return Ok(port),
            Err(err) => err,
        };
        let Some(callout) = callout_variant(&self.path) else {
            return Err(primary_err);
        };
        match open_serial_port(&callout, self.baud) {
            Ok(port) => {
                info!(primary = %self.path, fallback = %callout, "switching serial port");
                self.path = callout;
                Ok(port)
            }
            Err(_) => Err(primary_err),
        }
    }
}

fn open_serial_port(path: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    serialport::new(path, baud)
        .timeout(SERIAL_TIMEOUT)
        .open()
        .with_context(|| format!("Failed to open {path}"))
}

/// Converts a macOS `/dev/tty.*` path to its `/dev/cu.*` callout variant.
fn callout_variant(path: &str) -> Option<String> {
    let suffix = path.strip_prefix("/dev/tty.")?;
    Some(format!("/dev/cu.{suffix}"))
}

/// Indicator that forwards light states to the Pico.
pub struct PicoIndicator {
    link: Arc<Mutex<SerialLink>>,
}

impl PicoIndicator {
    /// Creates the indicator; the port is opened on first use.
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            link: Arc::new(Mutex::new(SerialLink {
                port: None,
                path: path.into(),
                baud,
            })),
        }
    }
}

#[async_trait]
impl Indicator for PicoIndicator {
    async fn set(&self, light: Light) -> Result<()> {
        let command = light_command(light);
        debug!(%command, "sending to pico");
        let link = self.link.clone();
        tokio::task::spawn_blocking(move || {
            let mut link = link.lock().map_err(|_| anyhow!("serial link poisoned"))?;
            link.send(&command)
        })
        .await?
    }
}

/// Indicator used when no Pico is attached.
#[derive(Debug, Default)]
pub struct LogIndicator;

#[async_trait]
impl Indicator for LogIndicator {
    async fn set(&self, light: Light) -> Result<()> {
        debug!(command = %light_command(light), "indicator");
        Ok(())
    }
}

/// Picks the Pico indicator when a port is configured.
pub fn indicator_from_config(config: &SerialConfig) -> Arc<dyn Indicator> {
    match &config.port {
        Some(port) => {
            info!(%port, baud = config.baud, "using pico indicator");
            Arc::new(PicoIndicator::new(port.clone(), config.baud))
        }
        None => {
            info!("no serial port configured, indicator changes are only logged");
            Arc::new(LogIndicator)
        }
    }
}
