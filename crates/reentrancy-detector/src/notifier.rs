//! Polling block-change notifier.
//!
//! Asks the node for its head number every `poll_interval` and yields each
//! head that differs from the previous one. Starting from block 0 means the
//! current head is reported on the first poll.
//!
//! Blocks produced in between two polls are not reported: with a 1s interval
//! and 12s slots that is rare, but a longer interval or a slow analysis cycle
//! makes it likely.

use std::time::Duration;

use tracing::debug;

use crate::error::RpcError;
use crate::source::BlockSource;

/// Default pause between head polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct PollingBlockNotifier<B> {
    source: B,
    poll_interval: Duration,
    last_block_checked: u64,
}

impl<B: BlockSource> PollingBlockNotifier<B> {
    pub fn new(source: B, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            last_block_checked: 0,
        }
    }

    pub fn source(&self) -> &B {
        &self.source
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn last_block_checked(&self) -> u64 {
        self.last_block_checked
    }

    /// Wait until the head differs from the last reported one and return it.
    ///
    /// A head lookup error is returned immediately; calling again resumes
    /// polling from the same last-checked block.
    pub async fn wait_for_new_block(&mut self) -> Result<u64, RpcError> {
        loop {
            let current = self.source.latest_block_number().await?;
            if current != self.last_block_checked {
                if self.last_block_checked != 0 && current > self.last_block_checked + 1 {
                    debug!(
                        from = self.last_block_checked,
                        to = current,
                        "Head advanced by more than one block between polls"
                    );
                }
                self.last_block_checked = current;
                return Ok(current);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
