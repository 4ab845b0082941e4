//! One simulated slave: register list, stores, listener and generators

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use word_codec::RegisterValue;

use crate::autogen::spawn_generators;
use crate::config::SlaveConfig;
use crate::error::{Result, SlaveSimError};
use crate::facade::RegisterFacade;
use crate::lifecycle::{LifecycleContext, LifecycleState, ServerLifecycle};
use crate::register::{check_overlap, RegisterDef};

struct AutoGenRun {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

/// Runtime of one configured slave
pub struct Slave {
    config: SlaveConfig,
    facade: Arc<RegisterFacade>,
    lifecycle: ServerLifecycle,
    autogen: Option<AutoGenRun>,
}

impl std::fmt::Debug for Slave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slave")
            .field("name", &self.config.name)
            .field("state", &self.lifecycle.state())
            .field("registers", &self.config.registers.len())
            .finish()
    }
}

impl Slave {
    /// Validate `config` and prepare stores pre-sized to `initial_block`
    pub fn new(mut config: SlaveConfig, ctx: LifecycleContext, initial_block: usize) -> Result<Self> {
        config.normalize()?;
        let facade = Arc::new(RegisterFacade::new(0, initial_block));
        let lifecycle = ServerLifecycle::new(
            config.name.as_str(),
            config.unit_id,
            config.transport.clone(),
            Arc::clone(&facade),
            ctx,
        );
        Ok(Self {
            config,
            facade,
            lifecycle,
            autogen: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    pub fn registers(&self) -> &[RegisterDef] {
        &self.config.registers
    }

    pub fn facade(&self) -> &Arc<RegisterFacade> {
        &self.facade
    }

    pub fn lifecycle(&self) -> &ServerLifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// `name (running|stopped) - TCP host:port`
    pub fn status_line(&self) -> String {
        let status = if self.is_running() { "running" } else { "stopped" };
        format!(
            "{} ({}) - {}",
            self.config.name,
            status,
            self.config.transport.summary()
        )
    }

    fn ensure_stopped(&self, action: &str) -> Result<()> {
        match self.state() {
            LifecycleState::Starting | LifecycleState::Listening | LifecycleState::Stopping => {
                Err(SlaveSimError::invalid_state(format!(
                    "stop {} before you {}",
                    self.config.name, action
                )))
            },
            LifecycleState::Stopped | LifecycleState::Error => Ok(()),
        }
    }

    fn register_mut(&mut self, index: usize) -> Result<&mut RegisterDef> {
        let slave = self.config.name.clone();
        self.config
            .registers
            .get_mut(index)
            .ok_or(SlaveSimError::RegisterNotFound { slave, index })
    }

    /// Write every configured value into freshly zeroed stores
    pub fn load_registers(&self) -> Result<()> {
        self.facade.clear();
        for reg in &self.config.registers {
            self.facade.write_value(reg, &reg.value)?;
        }
        debug!(slave = %self.config.name, "Loaded {} registers", self.config.registers.len());
        Ok(())
    }

    /// Load registers, bind the transport and start value generators
    ///
    /// No-op while already starting or listening.
    pub async fn start(&mut self) -> Result<()> {
        if matches!(
            self.state(),
            LifecycleState::Starting | LifecycleState::Listening
        ) {
            return Ok(());
        }

        self.load_registers()?;
        self.lifecycle.start().await?;

        let cancel = CancellationToken::new();
        let tasks = spawn_generators(
            &self.config.name,
            &self.config.registers,
            Arc::clone(&self.facade),
            cancel.clone(),
        );
        if !tasks.is_empty() {
            info!(slave = %self.config.name, "{} value generators running", tasks.len());
        }
        self.autogen = Some(AutoGenRun { cancel, tasks });

        info!(
            slave = %self.config.name,
            unit_id = self.config.unit_id,
            "Device identity: vendor={} product={} code=SIM",
            self.config.name,
            self.config.name
        );
        Ok(())
    }

    /// Stop generators, then the listener; idempotent
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut run) = self.autogen.take() {
            run.cancel.cancel();
            while let Some(joined) = run.tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(slave = %self.config.name, "Value generator ended abnormally: {}", e);
                }
            }
        }
        self.lifecycle.stop().await
    }

    /// Replace transport, unit id and registers while stopped
    ///
    /// The name is part of `config` too; uniqueness is the caller's concern.
    pub fn reconfigure(&mut self, mut config: SlaveConfig) -> Result<()> {
        self.ensure_stopped("edit it")?;
        config.normalize()?;
        self.lifecycle
            .reconfigure(config.name.as_str(), config.unit_id, config.transport.clone())?;
        info!(slave = %config.name, "Reconfigured: {}", config.transport.summary());
        self.config = config;
        Ok(())
    }

    /// Append a register; returns its index
    pub fn add_register(&mut self, mut reg: RegisterDef) -> Result<usize> {
        self.ensure_stopped("add registers")?;
        reg.normalize()?;
        if let Some(spec) = &reg.auto_gen {
            spec.validate(reg.data_type)?;
        }
        check_overlap(&self.config.registers, &reg, None)?;
        info!(
            slave = %self.config.name,
            class = %reg.table,
            address = reg.address,
            "Register added ({})",
            reg.data_type
        );
        self.config.registers.push(reg);
        Ok(self.config.registers.len() - 1)
    }

    /// Replace the register at `index`
    pub fn edit_register(&mut self, index: usize, mut reg: RegisterDef) -> Result<()> {
        self.ensure_stopped("edit registers")?;
        if index >= self.config.registers.len() {
            return Err(SlaveSimError::RegisterNotFound {
                slave: self.config.name.clone(),
                index,
            });
        }
        reg.normalize()?;
        if let Some(spec) = &reg.auto_gen {
            spec.validate(reg.data_type)?;
        }
        check_overlap(&self.config.registers, &reg, Some(index))?;
        info!(
            slave = %self.config.name,
            class = %reg.table,
            address = reg.address,
            "Register edited"
        );
        *self.register_mut(index)? = reg;
        Ok(())
    }

    pub fn remove_register(&mut self, index: usize) -> Result<RegisterDef> {
        self.ensure_stopped("remove registers")?;
        if index >= self.config.registers.len() {
            return Err(SlaveSimError::RegisterNotFound {
                slave: self.config.name.clone(),
                index,
            });
        }
        let reg = self.config.registers.remove(index);
        info!(
            slave = %self.config.name,
            class = %reg.table,
            address = reg.address,
            "Register removed"
        );
        Ok(reg)
    }

    /// Set a register's value
    ///
    /// Stored in the definition in any state; written to the store as well
    /// while the slave is listening.
    pub fn apply_value(&mut self, index: usize, value: RegisterValue) -> Result<()> {
        let running = self.is_running();
        let facade = Arc::clone(&self.facade);
        let reg = self.register_mut(index)?;
        let value = value
            .coerce(reg.data_type)
            .map_err(|e| SlaveSimError::codec(e, reg.location()))?;
        if running {
            facade.write_value(reg, &value)?;
        }
        reg.value = value;
        Ok(())
    }

    /// Parse operator text for the register's type, then apply it
    pub fn apply_text(&mut self, index: usize, text: &str) -> Result<()> {
        let reg = self.register_mut(index)?;
        let value = RegisterValue::parse(reg.data_type, text)
            .map_err(|e| SlaveSimError::codec(e, reg.location()))?;
        self.apply_value(index, value)
    }

    /// Copy current store contents back into the definitions
    ///
    /// Does nothing unless the slave is listening.
    pub fn refresh(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        for reg in &mut self.config.registers {
            reg.value = self.facade.read_value(reg)?;
        }
        Ok(())
    }

    /// Registers whose name contains `needle`, ignoring case
    pub fn find_registers(&self, needle: &str) -> Vec<(usize, &RegisterDef)> {
        let needle = needle.to_lowercase();
        self.config
            .registers
            .iter()
            .enumerate()
            .filter(|(_, reg)| reg.name.to_lowercase().contains(&needle))
            .collect()
    }
}
