//! Modbus slave simulator
//!
//! Layers, bottom up:
//! - [`store`]: growable 16-bit cell tables offset from a base address
//! - [`facade`]: the four register classes and typed access through the word codec
//! - [`server`]: Modbus request handling on top of a facade
//! - [`listener`] and [`lifecycle`]: background TCP/RTU listeners with
//!   start/stop state and status notifications
//! - [`slave`] and [`simulator`]: configured slaves and the manager around them

pub mod autogen;
pub mod cli;
pub mod config;
pub mod error;
pub mod facade;
pub mod lifecycle;
pub mod listener;
pub mod register;
pub mod server;
pub mod simulator;
pub mod slave;
pub mod store;
pub mod transport;

pub use config::{SimulatorDocument, SimulatorSettings, SlaveConfig};
pub use error::{Result, SlaveSimError};
pub use facade::RegisterFacade;
pub use lifecycle::{LifecycleState, ServerLifecycle, StatusNotification, StatusPhase};
pub use register::{RegisterClass, RegisterDef};
pub use simulator::Simulator;
pub use slave::Slave;
pub use store::RegisterStore;
pub use transport::TransportConfig;
