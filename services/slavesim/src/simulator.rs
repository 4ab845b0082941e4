//! Slave manager
//!
//! Owns every configured slave, keeps names unique and shares one transport
//! registry and status channel between them.

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::{DocumentSettings, SimulatorDocument, SimulatorSettings, SlaveConfig};
use crate::error::{Result, SlaveSimError};
use crate::lifecycle::{LifecycleContext, StatusNotification, StatusNotifier};
use crate::slave::Slave;
use crate::transport::TransportRegistry;

/// Collection of simulated slaves, in insertion order
#[derive(Debug)]
pub struct Simulator {
    slaves: Vec<Slave>,
    ctx: LifecycleContext,
    initial_block: usize,
    document_settings: DocumentSettings,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(&SimulatorSettings::default())
    }
}

impl Simulator {
    pub fn new(settings: &SimulatorSettings) -> Self {
        let ctx = LifecycleContext {
            registry: TransportRegistry::new(),
            notifier: StatusNotifier::new(settings.status_channel_capacity),
            options: settings.lifecycle_options(),
        };
        let mut document_settings = DocumentSettings::default();
        if let Some(ms) = settings.refresh_interval_ms {
            document_settings.refresh_interval = ms;
        }
        Self {
            slaves: Vec::new(),
            ctx,
            initial_block: settings.initial_block_size,
            document_settings,
        }
    }

    /// Status notifications of every slave
    pub fn subscribe(&self) -> broadcast::Receiver<StatusNotification> {
        self.ctx.notifier.subscribe()
    }

    pub fn document_settings(&self) -> &DocumentSettings {
        &self.document_settings
    }

    pub fn set_document_settings(&mut self, settings: DocumentSettings) {
        self.document_settings = settings;
    }

    pub fn slaves(&self) -> &[Slave] {
        &self.slaves
    }

    pub fn len(&self) -> usize {
        self.slaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.slaves
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| SlaveSimError::SlaveNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<&Slave> {
        let index = self.position(name)?;
        Ok(&self.slaves[index])
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Slave> {
        let index = self.position(name)?;
        Ok(&mut self.slaves[index])
    }

    pub fn add_slave(&mut self, config: SlaveConfig) -> Result<()> {
        if self.slaves.iter().any(|s| s.name() == config.name) {
            return Err(SlaveSimError::SlaveExists(config.name));
        }
        let slave = Slave::new(config, self.ctx.clone(), self.initial_block)?;
        info!("Slave added: {}", slave.status_line());
        self.slaves.push(slave);
        Ok(())
    }

    /// Replace the configuration of a stopped slave; the name may change
    pub fn edit_slave(&mut self, name: &str, config: SlaveConfig) -> Result<()> {
        let index = self.position(name)?;
        if config.name != name && self.slaves.iter().any(|s| s.name() == config.name) {
            return Err(SlaveSimError::SlaveExists(config.name));
        }
        self.slaves[index].reconfigure(config)
    }

    /// Stop the slave if needed, then forget it
    pub async fn remove_slave(&mut self, name: &str) -> Result<SlaveConfig> {
        let index = self.position(name)?;
        self.slaves[index].stop().await?;
        let slave = self.slaves.remove(index);
        info!("Slave removed: {}", name);
        Ok(slave.config().clone())
    }

    pub async fn start(&mut self, name: &str) -> Result<()> {
        self.get_mut(name)?.start().await
    }

    pub async fn stop(&mut self, name: &str) -> Result<()> {
        self.get_mut(name)?.stop().await
    }

    /// Start every slave; failures are logged and counted, not fatal
    ///
    /// Returns the number of slaves that failed to start.
    pub async fn start_all(&mut self) -> usize {
        let mut failed = 0;
        for slave in &mut self.slaves {
            if let Err(e) = slave.start().await {
                warn!("{} not started: {}", slave.name(), e);
                failed += 1;
            }
        }
        failed
    }

    pub async fn stop_all(&mut self) {
        for slave in &mut self.slaves {
            if let Err(e) = slave.stop().await {
                warn!("{} stop: {}", slave.name(), e);
            }
        }
    }

    /// Read live values back into every running slave's definitions
    pub fn refresh_all(&mut self) -> Result<()> {
        for slave in &mut self.slaves {
            slave.refresh()?;
        }
        Ok(())
    }

    /// One status line per slave
    pub fn status_lines(&self) -> Vec<String> {
        self.slaves.iter().map(Slave::status_line).collect()
    }

    /// Replace all slaves with the document's; running slaves are stopped first
    pub async fn load_document(&mut self, mut document: SimulatorDocument) -> Result<()> {
        document.normalize()?;
        self.stop_all().await;
        self.slaves.clear();

        for config in document.slaves {
            self.add_slave(config)?;
        }
        self.document_settings = document.settings;
        info!(
            "Document {} loaded with {} slaves",
            document.version,
            self.slaves.len()
        );
        Ok(())
    }

    /// Current state as a document, after refreshing live values
    pub fn to_document(&mut self) -> Result<SimulatorDocument> {
        self.refresh_all()?;
        Ok(SimulatorDocument {
            slaves: self.slaves.iter().map(|s| s.config().clone()).collect(),
            settings: self.document_settings.clone(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::{TcpConfig, TransportConfig};

    fn tcp(port: u16) -> TransportConfig {
        TransportConfig::Tcp(TcpConfig {
            host: "127.0.0.1".into(),
            port,
            timeout: 1.0,
        })
    }

    #[test]
    fn test_names_are_unique() {
        let mut sim = Simulator::default();
        sim.add_slave(SlaveConfig::new("a", tcp(1502))).unwrap();
        sim.add_slave(SlaveConfig::new("b", tcp(1503))).unwrap();
        assert_eq!(
            sim.add_slave(SlaveConfig::new("a", tcp(1504))),
            Err(SlaveSimError::SlaveExists("a".into()))
        );
        assert_eq!(
            sim.edit_slave("a", SlaveConfig::new("b", tcp(1502))),
            Err(SlaveSimError::SlaveExists("b".into()))
        );
        sim.edit_slave("a", SlaveConfig::new("c", tcp(1505))).unwrap();
        assert!(sim.get("c").is_ok());
        assert!(matches!(sim.get("a"), Err(SlaveSimError::SlaveNotFound(_))));
    }

    #[test]
    fn test_status_lines() {
        let mut sim = Simulator::default();
        sim.add_slave(SlaveConfig::new("a", tcp(1502))).unwrap();
        assert_eq!(sim.status_lines(), vec!["a (stopped) - TCP 127.0.0.1:1502"]);
    }

    #[tokio::test]
    async fn test_load_document_replaces_slaves() {
        let mut sim = Simulator::default();
        sim.add_slave(SlaveConfig::new("old", tcp(1502))).unwrap();

        let mut doc = SimulatorDocument::sample();
        doc.settings.auto_refresh = true;
        sim.load_document(doc).await.unwrap();

        assert_eq!(sim.len(), 1);
        assert_eq!(sim.slaves()[0].name(), "plant");
        assert!(sim.document_settings().auto_refresh);

        let saved = sim.to_document().unwrap();
        assert_eq!(saved.slaves[0].registers.len(), 6);
    }
}
