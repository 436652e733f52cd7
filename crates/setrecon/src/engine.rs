//! A closed set of engine kinds behind one type.

use async_trait::async_trait;
use setrecon_channel::{Channel, ConnectConfig, TcpChannel};
use setrecon_core::Element;
use setrecon_sync::{
    CpiSync, FullSync, IbltMultisetSync, IbltSetSync, InterCpiSync, ProtocolId, SetDifference,
    SyncMethod,
};
use tokio::net::TcpListener;

use crate::config::EngineConfig;
use crate::error::Result;

/// Any of the available engines.
#[derive(Debug, Clone)]
pub enum Engine {
    Cpi(CpiSync),
    Inter(InterCpiSync),
    Iblt(IbltSetSync),
    IbltMultiset(IbltMultisetSync),
    Full(FullSync),
}

impl Engine {
    /// Build an empty engine.
    pub fn from_config(config: &EngineConfig) -> setrecon_sync::Result<Self> {
        Ok(match config {
            EngineConfig::CpiSync(c) => Engine::Cpi(CpiSync::new(c)?),
            EngineConfig::InterCpiSync(c) => Engine::Inter(InterCpiSync::new(c)?),
            EngineConfig::IbltSync(c) => Engine::Iblt(IbltSetSync::new(c)?),
            EngineConfig::IbltMultisetSync(c) => Engine::IbltMultiset(IbltMultisetSync::new(c)?),
            EngineConfig::FullSync(_) => Engine::Full(FullSync::new()),
        })
    }

    fn inner(&self) -> &dyn SyncMethod {
        match self {
            Engine::Cpi(e) => e,
            Engine::Inter(e) => e,
            Engine::Iblt(e) => e,
            Engine::IbltMultiset(e) => e,
            Engine::Full(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SyncMethod {
        match self {
            Engine::Cpi(e) => e,
            Engine::Inter(e) => e,
            Engine::Iblt(e) => e,
            Engine::IbltMultiset(e) => e,
            Engine::Full(e) => e,
        }
    }

    /// Add every element, stopping at the first rejection.
    pub fn extend<I>(&mut self, elements: I) -> setrecon_sync::Result<()>
    where
        I: IntoIterator<Item = Element>,
    {
        for element in elements {
            self.add_elem(element)?;
        }
        Ok(())
    }

    /// Connect to `addr` and run the client role.
    pub async fn connect_and_sync(
        &mut self,
        addr: &str,
        connect: &ConnectConfig,
    ) -> Result<SetDifference> {
        let mut chan = TcpChannel::connect(addr, connect).await?;
        let mut diff = SetDifference::new();
        self.sync_client(&mut chan, &mut diff).await?;
        tracing::debug!(
            sent = chan.bytes_sent(),
            received = chan.bytes_received(),
            "client session finished"
        );
        chan.close().await?;
        Ok(diff)
    }

    /// Accept one connection and run the server role.
    pub async fn accept_and_sync(&mut self, listener: &TcpListener) -> Result<SetDifference> {
        let mut chan = TcpChannel::accept(listener).await?;
        let mut diff = SetDifference::new();
        self.sync_server(&mut chan, &mut diff).await?;
        tracing::debug!(
            peer = %chan.peer_name(),
            sent = chan.bytes_sent(),
            received = chan.bytes_received(),
            "server session finished"
        );
        chan.close().await?;
        Ok(diff)
    }
}

#[async_trait]
impl SyncMethod for Engine {
    fn add_elem(&mut self, element: Element) -> setrecon_sync::Result<()> {
        self.inner_mut().add_elem(element)
    }

    fn del_elem(&mut self, element: &Element) -> setrecon_sync::Result<()> {
        self.inner_mut().del_elem(element)
    }

    async fn sync_client(
        &mut self,
        chan: &mut dyn Channel,
        diff: &mut SetDifference,
    ) -> setrecon_sync::Result<()> {
        self.inner_mut().sync_client(chan, diff).await
    }

    async fn sync_server(
        &mut self,
        chan: &mut dyn Channel,
        diff: &mut SetDifference,
    ) -> setrecon_sync::Result<()> {
        self.inner_mut().sync_server(chan, diff).await
    }

    fn name(&self) -> String {
        self.inner().name()
    }

    fn protocol_id(&self) -> ProtocolId {
        self.inner().protocol_id()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn elements(&self) -> Vec<Element> {
        self.inner().elements()
    }
}
