//! # kojikit
//!
//! Declarative reconciliation of build-system tags.
//!
//! Given the desired state of a tag and a hub to talk to, kojikit computes
//! the minimal set of hub calls needed to converge, issues them (unless in
//! check mode), and reports what changed.
//!
//! ## Core Concepts
//!
//! - **DesiredTag**: declared attributes, inheritance, external repos and
//!   package ownership of one tag
//! - **ResourceClient**: the hub operations the reconcilers call through
//! - **Reconciler**: runs tag and access reconciliations, sharing one
//!   permission cache
//! - **ChangeReport**: `changed` flag plus an ordered change log
//!
//! ## Example
//!
//! ```
//! use kojikit::{DesiredTag, HubState, MemoryHub, Reconciler, TagAttributes};
//!
//! let mut state = HubState::default();
//! state.insert_tag("f40", &TagAttributes::default()).unwrap();
//! let hub = MemoryHub::with_state(state);
//!
//! let desired = DesiredTag::new("f40-build")
//!     .with_attributes(TagAttributes {
//!         arches: Some("x86_64".into()),
//!         ..Default::default()
//!     })
//!     .with_parent("f40", 0);
//!
//! let reconciler = Reconciler::new(&hub, true);
//! let report = reconciler.reconcile_tag(&desired).unwrap();
//! assert!(report.changed);
//! assert_eq!(report.log, vec!["would create tag f40-build"]);
//! ```
//!
//! ## Partial failure
//!
//! Writes are issued one at a time in a fixed order (attributes,
//! inheritance, external repos, packages). There is no rollback: when a
//! call fails, the calls before it stay applied and the error is returned.

pub mod access;
pub mod client;
pub mod context;
pub mod error;
pub mod external_repos;
pub mod inheritance;
pub mod packages;
pub mod permissions;
pub mod report;
pub mod tag;
pub mod types;

pub use client::{HubState, MemoryHub, ResourceClient};
pub use context::ApplyContext;
pub use error::{Error, ErrorCategory, Result};
pub use permissions::PermissionResolver;
pub use report::ChangeReport;
pub use tag::Reconciler;
pub use types::{
    AccessGrant, Declared, DesiredTag, Extra, ExtraValue, ExternalRepoBinding, GrantOutcome,
    InheritanceLink, InheritanceRule, PackageEntry, PackageOwners, Permission, RemoteTag,
    TagAttributes, TagCreate, TagEdits, TargetState,
};
