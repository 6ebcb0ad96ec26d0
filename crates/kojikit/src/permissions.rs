//! Permission label resolution
//!
//! The hub only exposes the full permission catalog, so the first lookup
//! fetches it once and every later lookup is served from memory. The cache
//! is never refreshed.

use crate::client::ResourceClient;
use crate::error::{Error, Result};
use crate::types::PermissionId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Lazily built name → id mapping of the hub's permission catalog
#[derive(Debug, Default)]
pub struct PermissionResolver {
    catalog: Mutex<Option<HashMap<String, PermissionId>>>,
}

impl PermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a permission label to its hub id.
    ///
    /// Fetches the catalog on the first call only. Fails with
    /// [`Error::UnknownPermission`] if the label is not in the catalog.
    pub fn resolve(&self, client: &dyn ResourceClient, label: &str) -> Result<PermissionId> {
        let mut catalog = match self.catalog.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if catalog.is_none() {
            log::debug!("fetching permission catalog");
            let permissions = client.get_all_permissions()?;
            *catalog = Some(permissions.into_iter().map(|p| (p.name, p.id)).collect());
        }

        catalog
            .as_ref()
            .and_then(|names| names.get(label))
            .copied()
            .ok_or_else(|| Error::UnknownPermission(label.to_string()))
    }
}
