//! Transport parameters and ownership registry

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlaveSimError};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_tcp_port() -> u16 {
    5020
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baudrate() -> u32 {
    9600
}

fn default_bytesize() -> u8 {
    8
}

fn default_stopbits() -> u8 {
    1
}

fn default_timeout() -> f64 {
    1.0
}

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N", alias = "none", alias = "None")]
    None,
    #[serde(rename = "E", alias = "even", alias = "Even")]
    Even,
    #[serde(rename = "O", alias = "odd", alias = "Odd")]
    Odd,
    #[serde(rename = "M", alias = "mark", alias = "Mark")]
    Mark,
    #[serde(rename = "S", alias = "space", alias = "Space")]
    Space,
}

/// Serial framing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    #[default]
    #[serde(alias = "RTU")]
    Rtu,
    #[serde(alias = "ASCII")]
    Ascii,
}

/// Modbus TCP listener parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_tcp_port")]
    pub port: u16,
    /// Seconds. Kept with the document for editing and saving; the TCP
    /// listener has no timeout of its own, connections stay open until the
    /// client closes them or the slave stops.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs(1))
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_tcp_port(),
            timeout: default_timeout(),
        }
    }
}

/// Modbus serial listener parameters
///
/// `port` is the device path, as in the simulator document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(rename = "port", default = "default_device")]
    pub device: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_bytesize")]
    pub bytesize: u8,
    #[serde(default = "default_stopbits")]
    pub stopbits: u8,
    #[serde(default)]
    pub framing: Framing,
    /// Seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        secs_to_duration(self.timeout)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baudrate: default_baudrate(),
            parity: Parity::None,
            bytesize: default_bytesize(),
            stopbits: default_stopbits(),
            framing: Framing::Rtu,
            timeout: default_timeout(),
        }
    }
}

/// Transport of one slave, tagged by `type` in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Tcp(TcpConfig),
    Serial(SerialConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Tcp(TcpConfig::default())
    }
}

impl TransportConfig {
    /// Identity used for conflict detection: `host:port` or the device path
    pub fn resource_key(&self) -> String {
        match self {
            TransportConfig::Tcp(tcp) => format!("tcp://{}:{}", tcp.host, tcp.port),
            TransportConfig::Serial(serial) => format!("serial://{}", serial.device),
        }
    }

    /// Operator-facing summary (`TCP host:port`, `SERIAL dev@baud`)
    pub fn summary(&self) -> String {
        match self {
            TransportConfig::Tcp(tcp) => format!("TCP {}:{}", tcp.host, tcp.port),
            TransportConfig::Serial(serial) => {
                format!("SERIAL {}@{}", serial.device, serial.baudrate)
            },
        }
    }

    /// Static checks that need no OS resources
    pub fn validate(&self) -> Result<()> {
        match self {
            TransportConfig::Tcp(tcp) => {
                if tcp.host.trim().is_empty() {
                    return Err(SlaveSimError::config("TCP host must not be empty"));
                }
            },
            TransportConfig::Serial(serial) => {
                if serial.device.trim().is_empty() {
                    return Err(SlaveSimError::config("serial port must not be empty"));
                }
                if serial.baudrate == 0 {
                    return Err(SlaveSimError::config("baudrate must be positive"));
                }
                if !matches!(serial.bytesize, 7 | 8) {
                    return Err(SlaveSimError::config(format!(
                        "bytesize must be 7 or 8, got {}",
                        serial.bytesize
                    )));
                }
                if !matches!(serial.stopbits, 1 | 2) {
                    return Err(SlaveSimError::config(format!(
                        "stopbits must be 1 or 2, got {}",
                        serial.stopbits
                    )));
                }
            },
        }
        Ok(())
    }
}

/// Process-wide record of which slave owns which transport
///
/// Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct TransportRegistry {
    owners: Arc<Mutex<HashMap<String, String>>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `transport` for `owner`; released when the claim is dropped
    pub fn claim(&self, transport: &TransportConfig, owner: &str) -> Result<TransportClaim> {
        let key = transport.resource_key();
        let mut owners = self.owners.lock();
        if let Some(current) = owners.get(&key) {
            return Err(SlaveSimError::ResourceConflict {
                endpoint: key,
                owner: current.clone(),
            });
        }
        owners.insert(key.clone(), owner.to_string());
        Ok(TransportClaim {
            key,
            owners: Arc::clone(&self.owners),
        })
    }

    pub fn is_claimed(&self, transport: &TransportConfig) -> bool {
        self.owners.lock().contains_key(&transport.resource_key())
    }
}

/// Exclusive use of one transport resource
#[derive(Debug)]
pub struct TransportClaim {
    key: String,
    owners: Arc<Mutex<HashMap<String, String>>>,
}

impl TransportClaim {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for TransportClaim {
    fn drop(&mut self) {
        self.owners.lock().remove(&self.key);
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_claim_conflict_and_release() {
        let registry = TransportRegistry::new();
        let tcp = TransportConfig::Tcp(TcpConfig::default());

        let claim = registry.claim(&tcp, "slave1").unwrap();
        assert_eq!(claim.key(), "tcp://0.0.0.0:5020");

        let err = registry.claim(&tcp, "slave2").unwrap_err();
        assert_eq!(
            err,
            SlaveSimError::ResourceConflict {
                endpoint: "tcp://0.0.0.0:5020".into(),
                owner: "slave1".into(),
            }
        );

        drop(claim);
        assert!(!registry.is_claimed(&tcp));
        assert!(registry.claim(&tcp, "slave2").is_ok());
    }

    #[test]
    fn test_document_layout() {
        let serial: TransportConfig = serde_json::from_str(
            r#"{"type": "serial", "port": "COM3", "baudrate": 19200, "parity": "E"}"#,
        )
        .unwrap();
        match &serial {
            TransportConfig::Serial(cfg) => {
                assert_eq!(cfg.device, "COM3");
                assert_eq!(cfg.parity, Parity::Even);
                assert_eq!(cfg.bytesize, 8);
                assert_eq!(cfg.framing, Framing::Rtu);
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(serial.summary(), "SERIAL COM3@19200");

        let tcp: TransportConfig = serde_json::from_str(r#"{"type": "tcp", "port": 1502}"#).unwrap();
        assert_eq!(tcp.summary(), "TCP 0.0.0.0:1502");
    }

    #[test]
    fn test_tcp_timeout_survives_save() {
        let tcp: TransportConfig =
            serde_json::from_str(r#"{"type": "tcp", "port": 1502, "timeout": 2.5}"#).unwrap();
        let json = serde_json::to_value(&tcp).unwrap();
        assert_eq!(json["timeout"], 2.5);
        assert_eq!(serde_json::from_value::<TransportConfig>(json).unwrap(), tcp);
    }

    #[test]
    fn test_validate_serial() {
        let bad = TransportConfig::Serial(SerialConfig {
            bytesize: 6,
            ..Default::default()
        });
        assert!(bad.validate().is_err());
        assert!(TransportConfig::Serial(SerialConfig::default()).validate().is_ok());
    }
}
