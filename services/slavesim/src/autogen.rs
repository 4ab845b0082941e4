//! Automatic value generation for registers
//!
//! A register may carry `auto_gen` settings; while its slave is listening a
//! background task rewrites the register on a fixed interval.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use word_codec::{DataType, RegisterValue};

use crate::error::{Result, SlaveSimError};
use crate::facade::RegisterFacade;
use crate::register::RegisterDef;

fn default_interval_ms() -> u64 {
    1000
}

fn default_step() -> f64 {
    1.0
}

fn default_max() -> f64 {
    100.0
}

/// Value generator kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Generator {
    /// Add `step` each tick, wrapping within `[min, max]`
    Increment {
        #[serde(default = "default_step")]
        step: f64,
        #[serde(default)]
        min: f64,
        #[serde(default = "default_max")]
        max: f64,
    },
    /// Uniform sample from `[min, max]`
    Random {
        #[serde(default)]
        min: f64,
        #[serde(default = "default_max")]
        max: f64,
    },
    /// `offset + amplitude * sin(2π t / period)`
    Sine {
        amplitude: f64,
        #[serde(default)]
        offset: f64,
        period_ms: u64,
    },
    /// Flip between 0 and 1
    Toggle,
}

/// Auto-generation settings of one register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoGenSpec {
    #[serde(flatten)]
    pub generator: Generator,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl AutoGenSpec {
    pub fn new(generator: Generator, interval_ms: u64) -> Self {
        Self {
            generator,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject specs that could never produce a value for `data_type`
    pub fn validate(&self, data_type: DataType) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(SlaveSimError::validation("auto_gen interval_ms must be positive"));
        }
        if data_type == DataType::String {
            return Err(SlaveSimError::validation(
                "auto_gen is not available for string registers",
            ));
        }
        match &self.generator {
            Generator::Increment { min, max, .. } | Generator::Random { min, max } if min > max => {
                Err(SlaveSimError::validation(format!(
                    "auto_gen min {} exceeds max {}",
                    min, max
                )))
            },
            Generator::Sine { period_ms: 0, .. } => {
                Err(SlaveSimError::validation("auto_gen period_ms must be positive"))
            },
            _ => Ok(()),
        }
    }
}

impl Generator {
    /// Next raw value given the current one and time since start
    pub fn next_value<R: Rng>(&self, current: f64, elapsed: Duration, rng: &mut R) -> f64 {
        match *self {
            Generator::Increment { step, min, max } => {
                let next = current + step;
                if next > max {
                    min
                } else if next < min {
                    max
                } else {
                    next
                }
            },
            Generator::Random { min, max } => {
                if min >= max {
                    min
                } else {
                    rng.gen_range(min..=max)
                }
            },
            Generator::Sine {
                amplitude,
                offset,
                period_ms,
            } => {
                let phase = elapsed.as_secs_f64() * 1000.0 / period_ms.max(1) as f64;
                offset + amplitude * (TAU * phase).sin()
            },
            Generator::Toggle => {
                if current != 0.0 {
                    0.0
                } else {
                    1.0
                }
            },
        }
    }
}

/// Shape a raw sample into the register's data type
fn to_register_value(raw: f64, data_type: DataType) -> RegisterValue {
    match data_type {
        DataType::Bool => RegisterValue::Bool(raw != 0.0),
        DataType::Float32 | DataType::Double64 => RegisterValue::Float(raw),
        _ => RegisterValue::Float(raw.round()),
    }
}

/// Start one generator task per auto-generated register
///
/// Tasks stop when `cancel` fires.
pub fn spawn_generators(
    slave: &str,
    registers: &[RegisterDef],
    facade: Arc<RegisterFacade>,
    cancel: CancellationToken,
) -> JoinSet<()> {
    let mut tasks = JoinSet::new();

    for reg in registers {
        let Some(spec) = reg.auto_gen.clone() else {
            continue;
        };
        if let Err(e) = spec.validate(reg.data_type) {
            warn!("{} {}: auto_gen skipped: {}", slave, reg.location(), e);
            continue;
        }

        let reg = reg.clone();
        let facade = Arc::clone(&facade);
        let cancel = cancel.clone();
        let slave = slave.to_string();

        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(spec.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let started = Instant::now();
            let mut rng = rand::rngs::StdRng::from_entropy();

            debug!("{} {}: auto_gen every {:?}", slave, reg.location(), spec.interval());
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {},
                }

                let current = facade
                    .read_value(&reg)
                    .ok()
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                let raw = spec.generator.next_value(current, started.elapsed(), &mut rng);
                let value = to_register_value(raw, reg.data_type);

                if let Err(e) = facade.write_value(&reg, &value) {
                    warn!("{} {}: auto_gen value {} rejected: {}", slave, reg.location(), value, e);
                }
            }
        });
    }

    tasks
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::register::RegisterClass;

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_increment_wraps() {
        let g = Generator::Increment {
            step: 5.0,
            min: 0.0,
            max: 10.0,
        };
        let mut r = rng();
        assert_eq!(g.next_value(0.0, Duration::ZERO, &mut r), 5.0);
        assert_eq!(g.next_value(10.0, Duration::ZERO, &mut r), 0.0);
    }

    #[test]
    fn test_random_within_bounds() {
        let g = Generator::Random {
            min: -3.0,
            max: 3.0,
        };
        let mut r = rng();
        for _ in 0..100 {
            let v = g.next_value(0.0, Duration::ZERO, &mut r);
            assert!((-3.0..=3.0).contains(&v));
        }
    }

    #[test]
    fn test_sine_quarter_period() {
        let g = Generator::Sine {
            amplitude: 2.0,
            offset: 10.0,
            period_ms: 1000,
        };
        let v = g.next_value(0.0, Duration::from_millis(250), &mut rng());
        assert!((v - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_toggle() {
        let mut r = rng();
        assert_eq!(Generator::Toggle.next_value(0.0, Duration::ZERO, &mut r), 1.0);
        assert_eq!(Generator::Toggle.next_value(1.0, Duration::ZERO, &mut r), 0.0);
    }

    #[test]
    fn test_spec_document_layout() {
        let spec: AutoGenSpec =
            serde_json::from_str(r#"{"kind": "increment", "step": 2, "max": 50, "interval_ms": 200}"#)
                .unwrap();
        assert_eq!(
            spec,
            AutoGenSpec::new(
                Generator::Increment {
                    step: 2.0,
                    min: 0.0,
                    max: 50.0
                },
                200
            )
        );
    }

    #[test]
    fn test_validate() {
        let spec = AutoGenSpec::new(Generator::Toggle, 0);
        assert!(spec.validate(DataType::Bool).is_err());
        let spec = AutoGenSpec::new(Generator::Toggle, 100);
        assert!(spec.validate(DataType::String).is_err());
        assert!(spec.validate(DataType::Uint16).is_ok());
        let spec = AutoGenSpec::new(Generator::Random { min: 5.0, max: 1.0 }, 100);
        assert!(spec.validate(DataType::Int32).is_err());
    }

    #[tokio::test]
    async fn test_generator_task_writes_and_stops() {
        let facade = Arc::new(RegisterFacade::default());
        let reg = RegisterDef::new(RegisterClass::Holding, 0, DataType::Uint16).with_auto_gen(
            AutoGenSpec::new(
                Generator::Increment {
                    step: 1.0,
                    min: 0.0,
                    max: 100.0,
                },
                100,
            ),
        );
        let cancel = CancellationToken::new();
        let mut tasks = spawn_generators("test", &[reg], Arc::clone(&facade), cancel.clone());
        assert_eq!(tasks.len(), 1);

        // First tick fires immediately, then every 100 ms
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(facade.get("hr", 0).unwrap() >= 2);

        cancel.cancel();
        while tasks.join_next().await.is_some() {}
        assert!(tasks.is_empty());
    }
}
