//! Client abstraction for the build-system hub.
//!
//! The [`ResourceClient`] trait is the narrow interface the reconcilers
//! call through. Every method maps to a single hub call; there are no
//! multi-call transactions.

pub mod memory;

pub use memory::{CallRecord, HubState, MemoryHub};

use crate::error::{Error, Result};
use crate::types::{
    ExternalRepoBinding, GrantOutcome, InheritanceRule, PackageEntry, Permission, RemoteTag,
    TagCreate, TagEdits, TagId,
};

/// Fault text the hub reports when a grant already exists.
pub const ALREADY_HAS_ACCESS: &str = "User already has access to content generator";

/// Hub operations used by the reconcilers.
///
/// Implementations report any failed call as [`Error::Remote`].
pub trait ResourceClient: Send + Sync {
    /// Fetch a tag by name, `None` if it does not exist.
    fn get_tag(&self, name: &str) -> Result<Option<RemoteTag>>;

    /// Create a tag and return its id.
    fn create_tag(&self, name: &str, attrs: &TagCreate) -> Result<TagId>;

    /// Apply a partial update to a tag.
    fn edit_tag(&self, name: &str, edits: &TagEdits) -> Result<()>;

    /// Delete a tag.
    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Fetch the inheritance rules of a tag, in hub order.
    fn get_inheritance(&self, name: &str) -> Result<Vec<InheritanceRule>>;

    /// Replace the inheritance rules of a tag. With `clear`, rules not in
    /// `rules` are dropped.
    fn set_inheritance(&self, name: &str, rules: &[InheritanceRule], clear: bool) -> Result<()>;

    /// Fetch the external repos bound to a tag.
    fn get_external_repos(&self, name: &str) -> Result<Vec<ExternalRepoBinding>>;

    fn add_external_repo(&self, tag: &str, repo: &str, priority: i32) -> Result<()>;

    fn edit_external_repo(&self, tag: &str, repo: &str, priority: i32) -> Result<()>;

    fn remove_external_repo(&self, tag: &str, repo: &str) -> Result<()>;

    /// List the package list of a tag by id.
    fn list_packages(&self, tag_id: TagId) -> Result<Vec<PackageEntry>>;

    fn add_package(&self, tag: &str, package: &str, owner: &str) -> Result<()>;

    fn set_package_owner(&self, tag: &str, package: &str, owner: &str) -> Result<()>;

    fn remove_package(&self, tag: &str, package: &str, owner: &str) -> Result<()>;

    /// Fetch the full permission catalog.
    fn get_all_permissions(&self) -> Result<Vec<Permission>>;

    /// Grant a user access to a content generator.
    ///
    /// An existing grant is reported as [`GrantOutcome::AlreadyGranted`];
    /// see [`classify_grant_fault`].
    fn grant_access(&self, user: &str, generator: &str, create: bool) -> Result<GrantOutcome>;

    /// Revoke a user's access to a content generator.
    fn revoke_access(&self, user: &str, generator: &str) -> Result<()>;
}

/// Turn the result of a raw grant call into a [`GrantOutcome`].
///
/// The hub protocol carries no error code for an existing grant, only the
/// fault text, so this matches [`ALREADY_HAS_ACCESS`] as a substring of the
/// fault message. Any other fault is returned unchanged.
pub fn classify_grant_fault(result: Result<()>) -> Result<GrantOutcome> {
    match result {
        Ok(()) => Ok(GrantOutcome::Granted),
        Err(Error::Remote { message, .. }) if message.contains(ALREADY_HAS_ACCESS) => {
            Ok(GrantOutcome::AlreadyGranted)
        }
        Err(e) => Err(e),
    }
}
