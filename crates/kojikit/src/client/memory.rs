//! In-process hub backend.
//!
//! [`MemoryHub`] models the hub's data and fault behavior well enough to
//! rehearse a manifest offline: its [`HubState`] can be loaded from and
//! saved to a JSON snapshot. Every call is journaled so callers can see
//! exactly which reads and writes were issued.

use crate::client::{ALREADY_HAS_ACCESS, ResourceClient, classify_grant_fault};
use crate::error::{Error, Result};
use crate::types::{
    Extra, ExternalRepoBinding, GrantOutcome, InheritanceRule, PackageEntry, Permission,
    PermissionId, RemoteTag, TagAttributes, TagCreate, TagEdits, TagId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Tag row as the hub stores it (permission by id)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredTag {
    pub id: TagId,
    pub arches: Option<String>,
    pub perm_id: Option<PermissionId>,
    pub locked: bool,
    pub maven_support: bool,
    pub maven_include_all: bool,
    pub extra: Extra,
}

/// Complete hub data, serializable as a snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubState {
    /// Last tag id handed out
    pub next_id: TagId,
    pub tags: BTreeMap<String, StoredTag>,
    /// Inheritance rules keyed by child tag name
    pub inheritance: BTreeMap<String, Vec<InheritanceRule>>,
    /// Known external repositories
    pub external_repos: BTreeSet<String>,
    /// External repo bindings keyed by tag name
    pub tag_external_repos: BTreeMap<String, Vec<ExternalRepoBinding>>,
    /// Package lists keyed by tag name
    pub packages: BTreeMap<String, Vec<PackageEntry>>,
    pub permissions: Vec<Permission>,
    pub users: BTreeSet<String>,
    /// Content generator name mapped to the users allowed to act as it
    pub content_generators: BTreeMap<String, BTreeSet<String>>,
}

impl HubState {
    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Register a permission, returning its id
    pub fn add_permission(&mut self, name: &str) -> PermissionId {
        if let Some(existing) = self.permissions.iter().find(|p| p.name == name) {
            return existing.id;
        }
        let id = self.permissions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        self.permissions.push(Permission {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_user(&mut self, name: &str) {
        self.users.insert(name.to_string());
    }

    pub fn add_external_repo(&mut self, name: &str) {
        self.external_repos.insert(name.to_string());
    }

    /// Insert a tag directly, bypassing the call journal
    pub fn insert_tag(&mut self, name: &str, attributes: &TagAttributes) -> Result<TagId> {
        let perm_id = match &attributes.perm {
            Some(label) => Some(
                self.permission_id(label)
                    .ok_or_else(|| Error::UnknownPermission(label.clone()))?,
            ),
            None => None,
        };
        self.next_id += 1;
        let id = self.next_id;
        self.tags.insert(
            name.to_string(),
            StoredTag {
                id,
                arches: attributes.arches.clone(),
                perm_id,
                locked: attributes.locked,
                maven_support: attributes.maven_support,
                maven_include_all: attributes.maven_include_all,
                extra: attributes.extra.clone(),
            },
        );
        Ok(id)
    }

    fn permission_id(&self, name: &str) -> Option<PermissionId> {
        self.permissions.iter().find(|p| p.name == name).map(|p| p.id)
    }

    fn permission_name(&self, id: PermissionId) -> Option<String> {
        self.permissions
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
    }

    fn tag(&self, operation: &'static str, name: &str) -> Result<&StoredTag> {
        self.tags
            .get(name)
            .ok_or_else(|| Error::remote(operation, format!("No such tagInfo: '{name}'")))
    }

    fn tag_mut(&mut self, operation: &'static str, name: &str) -> Result<&mut StoredTag> {
        self.tags
            .get_mut(name)
            .ok_or_else(|| Error::remote(operation, format!("No such tagInfo: '{name}'")))
    }

    fn tag_name_by_id(&self, id: TagId) -> Option<String> {
        self.tags
            .iter()
            .find(|(_, tag)| tag.id == id)
            .map(|(name, _)| name.clone())
    }

    fn check_user(&self, operation: &'static str, user: &str) -> Result<()> {
        if self.users.contains(user) {
            Ok(())
        } else {
            Err(Error::remote(operation, format!("No such user: {user}")))
        }
    }

    fn check_permission(&self, operation: &'static str, perm: Option<PermissionId>) -> Result<()> {
        match perm {
            Some(id) if self.permission_name(id).is_none() => Err(Error::remote(
                operation,
                format!("No such permission: {id}"),
            )),
            _ => Ok(()),
        }
    }

    fn grant(&mut self, user: &str, generator: &str, create: bool) -> Result<()> {
        const OP: &str = "grantCGAccess";
        self.check_user(OP, user)?;
        if !create && !self.content_generators.contains_key(generator) {
            return Err(Error::remote(
                OP,
                format!("No such content generator: {generator}"),
            ));
        }
        let users = self
            .content_generators
            .entry(generator.to_string())
            .or_default();
        if !users.insert(user.to_string()) {
            return Err(Error::remote(OP, format!("{ALREADY_HAS_ACCESS}: {generator}")));
        }
        Ok(())
    }

    fn listed_package(
        &mut self,
        operation: &'static str,
        tag: &str,
        package: &str,
    ) -> Result<&mut PackageEntry> {
        self.packages
            .get_mut(tag)
            .and_then(|list| list.iter_mut().find(|entry| entry.package == package))
            .ok_or_else(|| {
                Error::remote(
                    operation,
                    format!("package {package} is not in tag listing for {tag}"),
                )
            })
    }
}

/// A single journaled hub call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    /// Hub RPC name
    pub operation: &'static str,
    /// Whether the call mutates hub state
    pub write: bool,
}

/// In-process hub implementing [`ResourceClient`]
#[derive(Debug, Default)]
pub struct MemoryHub {
    state: Mutex<HubState>,
    journal: Mutex<Vec<CallRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hub holding the given state
    pub fn with_state(state: HubState) -> Self {
        Self {
            state: Mutex::new(state),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the current hub state
    pub fn state(&self) -> HubState {
        lock(&self.state).clone()
    }

    /// Every call issued so far, in order
    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.journal).clone()
    }

    /// Names of the mutating calls issued so far, in order
    pub fn write_calls(&self) -> Vec<&'static str> {
        lock(&self.journal)
            .iter()
            .filter(|c| c.write)
            .map(|c| c.operation)
            .collect()
    }

    /// How many times an operation was called
    pub fn count(&self, operation: &str) -> usize {
        lock(&self.journal)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Forget journaled calls
    pub fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    fn read(&self, operation: &'static str) -> MutexGuard<'_, HubState> {
        self.record(operation, false);
        lock(&self.state)
    }

    fn write(&self, operation: &'static str) -> MutexGuard<'_, HubState> {
        self.record(operation, true);
        lock(&self.state)
    }

    fn record(&self, operation: &'static str, write: bool) {
        lock(&self.journal).push(CallRecord { operation, write });
    }
}

impl ResourceClient for MemoryHub {
    fn get_tag(&self, name: &str) -> Result<Option<RemoteTag>> {
        let state = self.read("getTag");
        Ok(state.tags.get(name).map(|tag| RemoteTag {
            id: tag.id,
            name: name.to_string(),
            attributes: TagAttributes {
                arches: tag.arches.clone(),
                perm: tag.perm_id.and_then(|id| state.permission_name(id)),
                locked: tag.locked,
                maven_support: tag.maven_support,
                maven_include_all: tag.maven_include_all,
                extra: tag.extra.clone(),
            },
        }))
    }

    fn create_tag(&self, name: &str, attrs: &TagCreate) -> Result<TagId> {
        const OP: &str = "createTag";
        let mut state = self.write(OP);
        if state.tags.contains_key(name) {
            return Err(Error::remote(
                OP,
                format!("A tag with the name '{name}' already exists"),
            ));
        }
        state.check_permission(OP, attrs.perm)?;
        state.next_id += 1;
        let id = state.next_id;
        state.tags.insert(
            name.to_string(),
            StoredTag {
                id,
                arches: attrs.arches.clone(),
                perm_id: attrs.perm,
                locked: attrs.locked,
                maven_support: attrs.maven_support,
                maven_include_all: attrs.maven_include_all,
                extra: attrs.extra.clone(),
            },
        );
        Ok(id)
    }

    fn edit_tag(&self, name: &str, edits: &TagEdits) -> Result<()> {
        const OP: &str = "editTag2";
        let mut state = self.write(OP);
        if let Some(perm) = edits.perm {
            state.check_permission(OP, perm)?;
        }
        let tag = state.tag_mut(OP, name)?;
        if let Some(arches) = &edits.arches {
            tag.arches = arches.clone();
        }
        if let Some(perm) = edits.perm {
            tag.perm_id = perm;
        }
        if let Some(locked) = edits.locked {
            tag.locked = locked;
        }
        if let Some(maven_support) = edits.maven_support {
            tag.maven_support = maven_support;
        }
        if let Some(maven_include_all) = edits.maven_include_all {
            tag.maven_include_all = maven_include_all;
        }
        if let Some(extra) = &edits.extra {
            for (key, value) in extra {
                tag.extra.insert(key.clone(), value.clone());
            }
        }
        for key in &edits.remove_extra {
            tag.extra.remove(key);
        }
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        const OP: &str = "deleteTag";
        let mut state = self.write(OP);
        let id = state.tag(OP, name)?.id;
        state.tags.remove(name);
        state.inheritance.remove(name);
        state.tag_external_repos.remove(name);
        state.packages.remove(name);
        for rules in state.inheritance.values_mut() {
            rules.retain(|rule| rule.parent_id != id);
        }
        Ok(())
    }

    fn get_inheritance(&self, name: &str) -> Result<Vec<InheritanceRule>> {
        const OP: &str = "getInheritanceData";
        let state = self.read(OP);
        state.tag(OP, name)?;
        Ok(state.inheritance.get(name).cloned().unwrap_or_default())
    }

    fn set_inheritance(&self, name: &str, rules: &[InheritanceRule], clear: bool) -> Result<()> {
        const OP: &str = "setInheritanceData";
        let mut state = self.write(OP);
        let child_id = state.tag(OP, name)?.id;
        for rule in rules {
            if state.tag_name_by_id(rule.parent_id).is_none() {
                return Err(Error::remote(
                    OP,
                    format!("No such tagInfo: {}", rule.parent_id),
                ));
            }
            if rule.parent_id == child_id {
                return Err(Error::remote(OP, format!("tag {name} cannot inherit from itself")));
            }
        }
        let current = state.inheritance.entry(name.to_string()).or_default();
        if clear {
            *current = rules.to_vec();
        } else {
            for rule in rules {
                match current.iter_mut().find(|r| r.parent_id == rule.parent_id) {
                    Some(existing) => *existing = rule.clone(),
                    None => current.push(rule.clone()),
                }
            }
        }
        Ok(())
    }

    fn get_external_repos(&self, name: &str) -> Result<Vec<ExternalRepoBinding>> {
        const OP: &str = "getTagExternalRepos";
        let state = self.read(OP);
        state.tag(OP, name)?;
        Ok(state.tag_external_repos.get(name).cloned().unwrap_or_default())
    }

    fn add_external_repo(&self, tag: &str, repo: &str, priority: i32) -> Result<()> {
        const OP: &str = "addExternalRepoToTag";
        let mut state = self.write(OP);
        state.tag(OP, tag)?;
        if !state.external_repos.contains(repo) {
            return Err(Error::remote(OP, format!("No such repo: {repo}")));
        }
        let bindings = state.tag_external_repos.entry(tag.to_string()).or_default();
        if bindings.iter().any(|b| b.repo == repo) {
            return Err(Error::remote(
                OP,
                format!("tag {tag} already associated with external repo {repo}"),
            ));
        }
        bindings.push(ExternalRepoBinding::new(repo, priority));
        Ok(())
    }

    fn edit_external_repo(&self, tag: &str, repo: &str, priority: i32) -> Result<()> {
        const OP: &str = "editTagExternalRepo";
        let mut state = self.write(OP);
        state.tag(OP, tag)?;
        let binding = state
            .tag_external_repos
            .get_mut(tag)
            .and_then(|bindings| bindings.iter_mut().find(|b| b.repo == repo))
            .ok_or_else(|| {
                Error::remote(
                    OP,
                    format!("external repo {repo} not associated with tag {tag}"),
                )
            })?;
        binding.priority = priority;
        Ok(())
    }

    fn remove_external_repo(&self, tag: &str, repo: &str) -> Result<()> {
        const OP: &str = "removeExternalRepoFromTag";
        let mut state = self.write(OP);
        state.tag(OP, tag)?;
        let bindings = state.tag_external_repos.entry(tag.to_string()).or_default();
        let before = bindings.len();
        bindings.retain(|b| b.repo != repo);
        if bindings.len() == before {
            return Err(Error::remote(
                OP,
                format!("external repo {repo} not associated with tag {tag}"),
            ));
        }
        Ok(())
    }

    fn list_packages(&self, tag_id: TagId) -> Result<Vec<PackageEntry>> {
        const OP: &str = "listPackages";
        let state = self.read(OP);
        let name = state
            .tag_name_by_id(tag_id)
            .ok_or_else(|| Error::remote(OP, format!("No such tagInfo: {tag_id}")))?;
        Ok(state.packages.get(&name).cloned().unwrap_or_default())
    }

    fn add_package(&self, tag: &str, package: &str, owner: &str) -> Result<()> {
        const OP: &str = "packageListAdd";
        let mut state = self.write(OP);
        state.tag(OP, tag)?;
        state.check_user(OP, owner)?;
        let list = state.packages.entry(tag.to_string()).or_default();
        if list.iter().any(|entry| entry.package == package) {
            return Err(Error::remote(
                OP,
                format!("package {package} already listed in tag {tag}"),
            ));
        }
        list.push(PackageEntry {
            package: package.to_string(),
            owner: owner.to_string(),
        });
        Ok(())
    }

    fn set_package_owner(&self, tag: &str, package: &str, owner: &str) -> Result<()> {
        const OP: &str = "packageListSetOwner";
        let mut state = self.write(OP);
        state.tag(OP, tag)?;
        state.check_user(OP, owner)?;
        state.listed_package(OP, tag, package)?.owner = owner.to_string();
        Ok(())
    }

    fn remove_package(&self, tag: &str, package: &str, owner: &str) -> Result<()> {
        const OP: &str = "packageListRemove";
        let mut state = self.write(OP);
        state.tag(OP, tag)?;
        let entry = state.listed_package(OP, tag, package)?;
        if entry.owner != owner {
            return Err(Error::remote(
                OP,
                format!(
                    "package {package} in tag {tag} is owned by {}, not {owner}",
                    entry.owner
                ),
            ));
        }
        if let Some(list) = state.packages.get_mut(tag) {
            list.retain(|entry| entry.package != package);
        }
        Ok(())
    }

    fn get_all_permissions(&self) -> Result<Vec<Permission>> {
        Ok(self.read("getAllPerms").permissions.clone())
    }

    fn grant_access(&self, user: &str, generator: &str, create: bool) -> Result<GrantOutcome> {
        const OP: &str = "grantCGAccess";
        let raw = self.write(OP).grant(user, generator, create);
        classify_grant_fault(raw)
    }

    fn revoke_access(&self, user: &str, generator: &str) -> Result<()> {
        const OP: &str = "revokeCGAccess";
        let mut state = self.write(OP);
        state.check_user(OP, user)?;
        if let Some(users) = state.content_generators.get_mut(generator) {
            users.remove(user);
        }
        Ok(())
    }
}
