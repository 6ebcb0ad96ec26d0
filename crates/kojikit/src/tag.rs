//! Tag reconciler
//!
//! Drives a tag from its current hub state to the declared one:
//!
//! 1. Create, edit or delete the tag itself
//! 2. Replace the inheritance rules if they differ
//! 3. Converge external repo bindings (when managed)
//! 4. Converge the package list (when managed)
//!
//! Steps run in this order and each write is a separate hub call. A
//! failure stops the run and leaves earlier writes in place.

use crate::access::reconcile_access;
use crate::client::ResourceClient;
use crate::context::ApplyContext;
use crate::error::Result;
use crate::external_repos::sync_external_repos;
use crate::inheritance::sync_inheritance;
use crate::packages::sync_packages;
use crate::permissions::PermissionResolver;
use crate::report::ChangeReport;
use crate::types::{AccessGrant, DesiredTag, TagAttributes, TagCreate, TagEdits, TargetState};

/// Entry point for reconciling tags and access grants against one hub.
///
/// Holds the permission cache, so one reconciler should be reused for
/// every resource in a run.
pub struct Reconciler<'a> {
    client: &'a dyn ResourceClient,
    permissions: PermissionResolver,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn ResourceClient, dry_run: bool) -> Self {
        Self {
            client,
            permissions: PermissionResolver::new(),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Switch between check mode and real writes, keeping the permission cache.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn context(&self) -> ApplyContext<'a> {
        ApplyContext::new(self.client, self.dry_run)
    }

    /// Reconcile a tag according to its declared target state.
    pub fn reconcile_tag(&self, desired: &DesiredTag) -> Result<ChangeReport> {
        match desired.state {
            TargetState::Present => self.ensure_tag(desired),
            TargetState::Absent => self.delete_tag(&desired.name),
        }
    }

    /// Reconcile a content-generator access grant.
    pub fn reconcile_access(&self, grant: &AccessGrant) -> Result<ChangeReport> {
        reconcile_access(&self.context(), grant)
    }

    /// Ensure the tag exists with the declared attributes, inheritance,
    /// external repos and packages.
    pub fn ensure_tag(&self, desired: &DesiredTag) -> Result<ChangeReport> {
        let ctx = self.context();
        let name = desired.name.as_str();
        let mut report = ChangeReport::new();

        let tag_id = match self.client.get_tag(name)? {
            None => {
                if self.dry_run {
                    report.change(format!("would create tag {name}"));
                    return Ok(report);
                }
                let payload = self.create_payload(&desired.attributes)?;
                log::info!("creating tag {name}");
                let id = self.client.create_tag(name, &payload)?;
                report.change(format!("created tag id {id}"));
                id
            }
            Some(remote) => {
                let diff = self.diff_attributes(&desired.attributes, &remote.attributes)?;
                if !diff.edits.is_empty() {
                    let message = format!("update tag {name}: {}", diff.changes.join(", "));
                    ctx.mutate(&message, |client| client.edit_tag(name, &diff.edits))?;
                    report.change(message);
                }
                remote.id
            }
        };

        report.merge(sync_inheritance(&ctx, name, tag_id, &desired.inheritance)?);
        report.merge(sync_external_repos(&ctx, name, &desired.external_repos)?);
        report.merge(sync_packages(&ctx, name, tag_id, &desired.packages)?);
        Ok(report)
    }

    /// Ensure the tag does not exist.
    pub fn delete_tag(&self, name: &str) -> Result<ChangeReport> {
        let mut report = ChangeReport::new();
        let Some(tag) = self.client.get_tag(name)? else {
            return Ok(report);
        };

        let message = format!("deleted tag {}", tag.id);
        self.context()
            .mutate(&message, |client| client.delete_tag(name))?;
        report.change(message);
        Ok(report)
    }

    fn create_payload(&self, attrs: &TagAttributes) -> Result<TagCreate> {
        let perm = match &attrs.perm {
            Some(label) => Some(self.permissions.resolve(self.client, label)?),
            None => None,
        };
        Ok(TagCreate {
            arches: attrs.arches.clone(),
            perm,
            locked: attrs.locked,
            maven_support: attrs.maven_support,
            maven_include_all: attrs.maven_include_all,
            extra: attrs.extra.clone(),
        })
    }

    /// Compare declared attributes with the hub's, key by key.
    fn diff_attributes(
        &self,
        desired: &TagAttributes,
        current: &TagAttributes,
    ) -> Result<AttributeDiff> {
        let mut diff = AttributeDiff::default();

        if desired.arches != current.arches {
            diff.changes.push(format!(
                "arches {} -> {}",
                show(current.arches.as_deref()),
                show(desired.arches.as_deref())
            ));
            diff.edits.arches = Some(desired.arches.clone());
        }

        if desired.perm != current.perm {
            let id = match &desired.perm {
                Some(label) => Some(self.permissions.resolve(self.client, label)?),
                None => None,
            };
            diff.changes.push(format!(
                "perm {} -> {}",
                show(current.perm.as_deref()),
                show(desired.perm.as_deref())
            ));
            diff.edits.perm = Some(id);
        }

        let flags = [
            ("locked", desired.locked, current.locked, &mut diff.edits.locked),
            (
                "maven_support",
                desired.maven_support,
                current.maven_support,
                &mut diff.edits.maven_support,
            ),
            (
                "maven_include_all",
                desired.maven_include_all,
                current.maven_include_all,
                &mut diff.edits.maven_include_all,
            ),
        ];
        for (key, wanted, have, edit) in flags {
            if wanted != have {
                diff.changes.push(format!("{key} {have} -> {wanted}"));
                *edit = Some(wanted);
            }
        }

        let mut extra = desired.extra.clone();
        extra.retain(|key, value| current.extra.get(key) != Some(value));
        for (key, value) in &extra {
            match current.extra.get(key) {
                Some(old) => diff.changes.push(format!("extra.{key} {old} -> {value}")),
                None => diff.changes.push(format!("extra.{key} = {value}")),
            }
        }
        if !extra.is_empty() {
            diff.edits.extra = Some(extra);
        }

        for key in current.extra.keys() {
            if !desired.extra.contains_key(key) {
                diff.changes.push(format!("remove extra.{key}"));
                diff.edits.remove_extra.push(key.clone());
            }
        }

        Ok(diff)
    }
}

/// Attribute edits plus a readable line per changed key
#[derive(Debug, Default)]
struct AttributeDiff {
    edits: TagEdits,
    changes: Vec<String>,
}

fn show(value: Option<&str>) -> String {
    value.map_or_else(|| "none".to_string(), |v| format!("{v:?}"))
}
