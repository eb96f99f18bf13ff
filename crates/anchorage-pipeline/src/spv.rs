//! Relative-depth confirmation checks
//!
//! Only compares the anchor's block height against the feed tip. Block
//! contents are not inspected.

use std::sync::Arc;

use anchorage_core::{Anchor, Result};

use crate::chain::ChainHeadFeed;

/// Decides whether anchors are confirmed by a chain feed
pub struct SpvChecker {
    feed: Arc<dyn ChainHeadFeed>,
}

impl SpvChecker {
    /// Checker over `feed`
    pub fn new(feed: Arc<dyn ChainHeadFeed>) -> Self {
        Self { feed }
    }

    /// `true` iff the anchor has a height and the tip has reached it
    pub fn is_confirmed(&self, anchor: &Anchor) -> Result<bool> {
        Ok(self.depth(anchor)?.is_some())
    }

    /// Blocks from the anchor's height to the tip, inclusive
    ///
    /// `None` while the anchor has no height or the tip is below it.
    pub fn depth(&self, anchor: &Anchor) -> Result<Option<u64>> {
        let Some(height) = anchor.block_height else {
            return Ok(None);
        };
        let tip = self.feed.tip()?;
        Ok(tip
            .filter(|tip| tip.height >= height)
            .map(|tip| tip.height - height + 1))
    }
}
