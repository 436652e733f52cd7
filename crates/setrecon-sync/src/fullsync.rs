//! Baseline reconciliation that ships the whole set.

use async_trait::async_trait;
use setrecon_channel::{Channel, ChannelExt};
use setrecon_core::Element;

use crate::error::{Result, SyncError};
use crate::handshake::{recv_sync_params, send_sync_params, SyncParams};
use crate::method::{multiset_difference, ElementBag, ProtocolId, SetDifference, SyncMethod};

/// The client sends every element; the server computes the multiset
/// difference and returns both halves.
#[derive(Debug, Clone, Default)]
pub struct FullSync {
    bag: ElementBag,
}

impl FullSync {
    pub fn new() -> Self {
        Self::default()
    }

    fn sync_params() -> SyncParams {
        SyncParams::new(ProtocolId::FullSync)
    }
}

#[async_trait]
impl SyncMethod for FullSync {
    fn add_elem(&mut self, element: Element) -> Result<()> {
        self.bag.insert(element);
        Ok(())
    }

    fn del_elem(&mut self, element: &Element) -> Result<()> {
        if self.bag.remove(element) {
            Ok(())
        } else {
            Err(SyncError::NotFound(element.clone()))
        }
    }

    async fn sync_client(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference) -> Result<()> {
        send_sync_params(chan, &Self::sync_params(), false).await?;
        chan.send_elements(&self.bag.to_vec()).await?;
        let mine = chan.recv_elements().await?;
        let theirs = chan.recv_elements().await?;
        diff.mine_not_theirs.extend(mine);
        diff.theirs_not_mine.extend(theirs);
        Ok(())
    }

    async fn sync_server(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference) -> Result<()> {
        recv_sync_params(chan, &Self::sync_params(), false).await?;
        let theirs = chan.recv_elements().await?;
        let found = multiset_difference(&self.bag.to_vec(), &theirs);
        chan.send_elements(&found.theirs_not_mine).await?;
        chan.send_elements(&found.mine_not_theirs).await?;
        tracing::info!(
            mine = found.mine_not_theirs.len(),
            theirs = found.theirs_not_mine.len(),
            "full sync server reconciled"
        );
        diff.extend(found);
        Ok(())
    }

    fn name(&self) -> String {
        "FullSync".to_string()
    }

    fn protocol_id(&self) -> ProtocolId {
        ProtocolId::FullSync
    }

    fn len(&self) -> usize {
        self.bag.len()
    }

    fn elements(&self) -> Vec<Element> {
        self.bag.to_vec()
    }
}
