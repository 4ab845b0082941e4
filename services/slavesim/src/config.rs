//! Simulator document and service settings
//!
//! Two sources of configuration:
//! - the simulator document (`.mbsim`, JSON) with slaves and their registers
//! - service settings (`slavesim.yaml` + `SLAVESIM_*` environment), loaded
//!   through figment

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use word_codec::{DataType, RegisterValue, WordOrder};

use crate::autogen::{AutoGenSpec, Generator};
use crate::error::{Result, SlaveSimError};
use crate::lifecycle::LifecycleOptions;
use crate::register::{validate_layout, RegisterClass, RegisterDef};
use crate::transport::{TcpConfig, TransportConfig};

/// Document version written by this build
pub const DOCUMENT_VERSION: &str = "2.0";
/// Document format marker
pub const DOCUMENT_FORMAT: &str = "modbus_simulator_config";
/// Environment prefix of service settings
pub const ENV_PREFIX: &str = "SLAVESIM_";

/// Unit ids a slave may use (0 is broadcast, 248..=255 reserved)
pub const UNIT_ID_RANGE: std::ops::RangeInclusive<u8> = 1..=247;

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_format() -> String {
    DOCUMENT_FORMAT.to_string()
}

fn default_unit_id() -> u8 {
    1
}

fn default_refresh_interval() -> u64 {
    1000
}

// ============================================================================
// Slave entries
// ============================================================================

/// One slave entry of the document
///
/// Transport fields sit next to `name` and `unit_id`, selected by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    #[serde(default)]
    pub registers: Vec<RegisterDef>,
}

impl SlaveConfig {
    pub fn new(name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            unit_id: default_unit_id(),
            registers: Vec::new(),
        }
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_register(mut self, register: RegisterDef) -> Self {
        self.registers.push(register);
        self
    }

    /// Validate and bring every register into canonical form
    pub fn normalize(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SlaveSimError::config("slave name must not be empty"));
        }
        if !UNIT_ID_RANGE.contains(&self.unit_id) {
            return Err(SlaveSimError::config(format!(
                "{}: unit_id {} outside {}..={}",
                self.name,
                self.unit_id,
                UNIT_ID_RANGE.start(),
                UNIT_ID_RANGE.end()
            )));
        }
        self.transport.validate()?;
        for reg in &mut self.registers {
            reg.normalize()?;
            if let Some(spec) = &reg.auto_gen {
                spec.validate(reg.data_type)?;
            }
        }
        validate_layout(&self.registers)
    }
}

// ============================================================================
// Document
// ============================================================================

/// Settings stored inside the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default)]
    pub auto_refresh: bool,
    /// Milliseconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            refresh_interval: default_refresh_interval(),
        }
    }
}

/// Persisted simulator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub slaves: Vec<SlaveConfig>,
    #[serde(default)]
    pub settings: DocumentSettings,
}

impl Default for SimulatorDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            format: default_format(),
            slaves: Vec::new(),
            settings: DocumentSettings::default(),
        }
    }
}

impl SimulatorDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: SimulatorDocument = serde_json::from_str(text)?;
        if doc.format != DOCUMENT_FORMAT {
            warn!("Unexpected document format {:?}", doc.format);
        }
        if doc.version != DOCUMENT_VERSION {
            debug!("Document version {} (current {})", doc.version, DOCUMENT_VERSION);
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SlaveSimError::IoError(format!("{}: {}", path.display(), e))
        })?;
        let doc = Self::from_json(&text)?;
        info!("Loaded {} ({} slaves)", path.display(), doc.slaves.len());
        Ok(doc)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| {
            SlaveSimError::IoError(format!("{}: {}", path.display(), e))
        })?;
        info!("Saved {} ({} slaves)", path.display(), self.slaves.len());
        Ok(())
    }

    /// Validate every slave and check names are unique
    pub fn normalize(&mut self) -> Result<()> {
        let mut names = HashSet::new();
        for slave in &mut self.slaves {
            slave.normalize()?;
            if !names.insert(slave.name.clone()) {
                return Err(SlaveSimError::SlaveExists(slave.name.clone()));
            }
        }
        Ok(())
    }

    /// Starter document written by `slavesim init`
    pub fn sample() -> Self {
        let plant = SlaveConfig::new(
            "plant",
            TransportConfig::Tcp(TcpConfig {
                port: 5020,
                ..Default::default()
            }),
        )
        .with_register(
            RegisterDef::new(RegisterClass::Holding, 0, DataType::Uint16)
                .with_name("setpoint")
                .with_value(RegisterValue::UInt(250))
                .writable(true),
        )
        .with_register(
            RegisterDef::new(RegisterClass::Input, 0, DataType::Float32)
                .with_name("temperature")
                .with_value(RegisterValue::Float(21.5))
                .with_auto_gen(AutoGenSpec::new(
                    Generator::Sine {
                        amplitude: 2.0,
                        offset: 21.5,
                        period_ms: 60_000,
                    },
                    1000,
                )),
        )
        .with_register(
            RegisterDef::new(RegisterClass::Input, 2, DataType::Uint32)
                .with_name("counter")
                .with_endian(WordOrder::Little)
                .with_auto_gen(AutoGenSpec::new(
                    Generator::Increment {
                        step: 1.0,
                        min: 0.0,
                        max: 1_000_000.0,
                    },
                    1000,
                )),
        )
        .with_register(
            RegisterDef::new(RegisterClass::Holding, 10, DataType::String)
                .with_name("model")
                .with_value("SIM-100")
                .with_string_length(8),
        )
        .with_register(
            RegisterDef::new(RegisterClass::Coil, 0, DataType::Bool)
                .with_name("pump_enable")
                .writable(true),
        )
        .with_register(
            RegisterDef::new(RegisterClass::DiscreteInput, 0, DataType::Bool)
                .with_name("alarm")
                .with_auto_gen(AutoGenSpec::new(Generator::Toggle, 5000)),
        );

        Self {
            slaves: vec![plant],
            ..Default::default()
        }
    }
}

// ============================================================================
// Service settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// Process settings, independent of any document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub logging: LoggingSettings,
    pub teardown_timeout_ms: u64,
    pub settle_delay_ms: u64,
    /// Cells pre-sized in every store
    pub initial_block_size: usize,
    pub status_channel_capacity: usize,
    /// Overrides the document's refresh interval when set
    pub refresh_interval_ms: Option<u64>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings::default(),
            teardown_timeout_ms: 2000,
            settle_delay_ms: 200,
            initial_block_size: 1000,
            status_channel_capacity: 64,
            refresh_interval_ms: None,
        }
    }
}

impl SimulatorSettings {
    /// Defaults, then `path` (YAML, optional), then `SLAVESIM_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings: SimulatorSettings = common::load_settings(path, ENV_PREFIX)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.teardown_timeout_ms == 0 {
            return Err(SlaveSimError::config("teardown_timeout_ms must be positive"));
        }
        if self.status_channel_capacity == 0 {
            return Err(SlaveSimError::config("status_channel_capacity must be positive"));
        }
        Ok(())
    }

    pub fn lifecycle_options(&self) -> LifecycleOptions {
        LifecycleOptions {
            teardown_timeout: Duration::from_millis(self.teardown_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::SerialConfig;

    const DOCUMENT: &str = r#"{
        "version": "2.0",
        "format": "modbus_simulator_config",
        "slaves": [
            {
                "name": "meter",
                "type": "tcp",
                "host": "127.0.0.1",
                "port": 1502,
                "unit_id": 3,
                "registers": [
                    {"address": 0, "table": "hr", "data_type": "float32", "endian": "little",
                     "name": "power", "value": 12.5, "writable": true},
                    {"address": 4, "table": "co", "data_type": "uint16", "name": "relay", "value": 1}
                ]
            },
            {
                "name": "drive",
                "type": "serial",
                "port": "/dev/ttyS1",
                "baudrate": 19200,
                "parity": "E"
            }
        ],
        "settings": {"auto_refresh": true, "refresh_interval": 500}
    }"#;

    #[test]
    fn test_parse_document() {
        let mut doc = SimulatorDocument::from_json(DOCUMENT).unwrap();
        doc.normalize().unwrap();

        assert_eq!(doc.slaves.len(), 2);
        let meter = &doc.slaves[0];
        assert_eq!(meter.unit_id, 3);
        assert_eq!(meter.transport.summary(), "TCP 127.0.0.1:1502");
        assert_eq!(meter.registers[0].endian, WordOrder::Little);
        // Coils are single bits whatever the document says
        assert_eq!(meter.registers[1].data_type, DataType::Bool);
        assert_eq!(meter.registers[1].value, RegisterValue::Bool(true));

        match &doc.slaves[1].transport {
            TransportConfig::Serial(SerialConfig { device, baudrate, .. }) => {
                assert_eq!(device, "/dev/ttyS1");
                assert_eq!(*baudrate, 19200);
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(doc.slaves[1].unit_id, 1);
        assert!(doc.settings.auto_refresh);
        assert_eq!(doc.settings.refresh_interval, 500);
    }

    #[test]
    fn test_document_round_trip_keeps_every_field() {
        let mut doc = SimulatorDocument::sample();
        doc.normalize().unwrap();
        let back = SimulatorDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.mbsim");
        let doc = SimulatorDocument::sample();
        doc.save(&path).unwrap();
        assert_eq!(SimulatorDocument::load(&path).unwrap(), doc);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut doc = SimulatorDocument::default();
        doc.slaves.push(SlaveConfig::new("a", TransportConfig::default()));
        doc.slaves.push(SlaveConfig::new("a", TransportConfig::default()));
        assert_eq!(doc.normalize(), Err(SlaveSimError::SlaveExists("a".into())));
    }

    #[test]
    fn test_unit_id_range() {
        let mut slave = SlaveConfig::new("a", TransportConfig::default()).with_unit_id(0);
        assert!(slave.normalize().is_err());
        slave.unit_id = 248;
        assert!(slave.normalize().is_err());
        slave.unit_id = 247;
        assert!(slave.normalize().is_ok());
    }

    #[test]
    fn test_overlap_in_document_rejected() {
        let mut slave = SlaveConfig::new("a", TransportConfig::default())
            .with_register(RegisterDef::new(RegisterClass::Holding, 10, DataType::Uint16))
            .with_register(RegisterDef::new(RegisterClass::Holding, 9, DataType::Int32));
        let err = slave.normalize().unwrap_err();
        assert!(err.to_string().contains("HR:10"), "{}", err);
    }

    #[test]
    fn test_settings_defaults_and_file() {
        let settings = SimulatorSettings::load(None).unwrap();
        assert_eq!(settings.initial_block_size, 1000);
        assert_eq!(
            settings.lifecycle_options().teardown_timeout,
            Duration::from_secs(2)
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slavesim.yaml");
        std::fs::write(
            &path,
            "settle_delay_ms: 50\ninitial_block_size: 16\nlogging:\n  level: debug\n",
        )
        .unwrap();
        let settings = SimulatorSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.settle_delay_ms, 50);
        assert_eq!(settings.initial_block_size, 16);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.teardown_timeout_ms, 2000);
    }
}
