//! Apply context shared by the synchronizers

use crate::client::ResourceClient;
use crate::error::Result;

/// Context passed to every synchronizer step
pub struct ApplyContext<'a> {
    /// Hub client used for reads and writes
    pub client: &'a dyn ResourceClient,
    /// Whether this is a dry run (no mutating calls)
    pub dry_run: bool,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(client: &'a dyn ResourceClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    /// Issue a mutating call unless this is a dry run.
    ///
    /// All writes go through here so check mode can never reach the hub.
    pub fn mutate<F>(&self, what: &str, call: F) -> Result<()>
    where
        F: FnOnce(&dyn ResourceClient) -> Result<()>,
    {
        if self.dry_run {
            log::debug!("check mode, skipping: {what}");
            return Ok(());
        }
        log::info!("{what}");
        call(self.client)
    }
}
