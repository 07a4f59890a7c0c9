//! # Notecard Gateway
//!
//! JSON-over-serial implementation of the [`Gateway`] trait.
//!
//! The Notecard speaks a newline-delimited request/response protocol: each
//! request is a single JSON object carrying a `req` member, and the device
//! answers with one JSON object per line. A response carrying an `err` member
//! is a failed request.

use bytes::BytesMut;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{BuoyError, Result};
use crate::transport::port::{SerialIO, TokioSerialPort};
use crate::transport::{Gateway, LocationMode, LocationRecord};

use async_trait::async_trait;

/// Gateway implementation over a serial link
pub struct NotecardGateway<P: SerialIO> {
    port: P,
    buf: BytesMut,
    response_timeout: Duration,
    device_path: String,
}

impl NotecardGateway<TokioSerialPort> {
    /// Open the serial port named in the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened; this is a fatal startup
    /// condition for the device.
    pub fn open(config: &GatewayConfig) -> Result<Self> {
        debug!("Trying to open gateway serial port: {}", config.port);

        let port = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| BuoyError::Serial(format!("Failed to open {}: {}", config.port, e)))?;

        info!("Successfully opened gateway at {}", config.port);

        Ok(Self::with_port(
            TokioSerialPort::new(port),
            config.port.clone(),
            Duration::from_millis(config.response_timeout_ms),
        ))
    }
}

impl<P: SerialIO> NotecardGateway<P> {
    /// Build a gateway over an already-open port
    pub fn with_port(port: P, device_path: String, response_timeout: Duration) -> Self {
        Self {
            port,
            buf: BytesMut::with_capacity(1024),
            response_timeout,
            device_path,
        }
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Issue one request and wait for its response line
    ///
    /// # Errors
    ///
    /// Returns error on serial failure, response timeout, unparseable
    /// response, or a response carrying an `err` member.
    async fn request(&mut self, request: Value) -> Result<Value> {
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| BuoyError::Gateway(format!("failed to encode request: {e}")))?;
        line.push(b'\n');

        self.port
            .write_all(&line)
            .await
            .map_err(|e| BuoyError::Serial(format!("failed to write request: {e}")))?;
        self.port
            .flush()
            .await
            .map_err(|e| BuoyError::Serial(format!("failed to flush serial port: {e}")))?;

        let line = timeout(self.response_timeout, self.read_line())
            .await
            .map_err(|_| BuoyError::Gateway("timed out waiting for response".to_string()))??;

        let response: Value = serde_json::from_slice(&line)
            .map_err(|e| BuoyError::Gateway(format!("invalid response JSON: {e}")))?;

        if let Some(err) = response.get("err").and_then(Value::as_str) {
            return Err(BuoyError::Gateway(err.to_string()));
        }

        debug!("Gateway response: {}", response);
        Ok(response)
    }

    /// Read bytes until a full newline-terminated response is buffered
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                return Ok(line.to_vec());
            }

            let mut chunk = [0u8; 256];
            let n = self
                .port
                .read(&mut chunk)
                .await
                .map_err(|e| BuoyError::Serial(format!("failed to read response: {e}")))?;
            if n == 0 {
                return Err(BuoyError::Serial("serial port closed".to_string()));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Provision the hub link after the port opens
    ///
    /// Issues `hub.set` with the product UID and communication intervals,
    /// forces an immediate `hub.sync`, and puts the location subsystem into
    /// its configured low-power mode. Individual provisioning failures are
    /// logged and do not abort startup.
    pub async fn provision(&mut self, config: &GatewayConfig, initial_mode: LocationMode) {
        let mut hub_set = json!({
            "req": "hub.set",
            "product": config.product_uid,
            "mode": config.hub_mode,
            "inbound": config.inbound_minutes,
            "outbound": config.outbound_minutes,
        });
        if config.product_uid.is_empty() {
            if let Some(obj) = hub_set.as_object_mut() {
                obj.remove("product");
            }
        }
        if let Err(e) = self.request(hub_set).await {
            warn!("hub.set failed: {e}");
        }

        if let Err(e) = self.request(json!({"req": "hub.sync"})).await {
            warn!("Failed to perform initial hub sync: {e}");
        }

        if let Err(e) = self.set_location_mode(initial_mode).await {
            warn!("Failed to set initial location mode: {e}");
        }
    }
}

#[async_trait]
impl<P: SerialIO> Gateway for NotecardGateway<P> {
    async fn location(&mut self) -> Result<LocationRecord> {
        let response = self.request(json!({"req": "card.location"})).await?;
        Ok(LocationRecord {
            time: response.get("time").and_then(Value::as_u64),
            lat: response.get("lat").and_then(Value::as_f64),
            lon: response.get("lon").and_then(Value::as_f64),
            stop: response.get("stop").is_some(),
        })
    }

    async fn clock_time(&mut self) -> Result<u64> {
        let response = self.request(json!({"req": "card.time"})).await?;
        response
            .get("time")
            .and_then(Value::as_u64)
            .ok_or_else(|| BuoyError::Gateway("no time in card.time response".to_string()))
    }

    async fn set_location_mode(&mut self, mode: LocationMode) -> Result<()> {
        let mut request = json!({
            "req": "card.location.mode",
            "mode": mode.as_str(),
        });
        if let LocationMode::Periodic { seconds } = mode {
            request["seconds"] = json!(seconds);
        }
        self.request(request).await?;
        Ok(())
    }

    async fn add_note(&mut self, file: &str, sync: bool, body: Value) -> Result<()> {
        let request = json!({
            "req": "note.add",
            "file": file,
            "sync": sync,
            "body": body,
        });
        self.request(request).await?;
        Ok(())
    }
}
