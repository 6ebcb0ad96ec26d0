//! Core types for tag reconciliation

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Hub-assigned tag identifier
pub type TagId = u64;

/// Hub-assigned permission identifier
pub type PermissionId = u64;

/// Declared target state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Resource must exist with the declared attributes
    #[default]
    Present,
    /// Resource must not exist
    Absent,
}

impl FromStr for TargetState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(Error::InvalidTargetState(other.to_string())),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// A declared collection that may be left unmanaged.
///
/// `Unset` and `Empty` are kept apart on purpose: external repos treat an
/// empty list as "bind nothing", while packages treat an empty mapping as
/// "leave the package list alone". Each synchronizer decides which states
/// it manages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Declared<T> {
    /// Nothing was declared
    #[default]
    Unset,
    /// An empty collection was declared
    Empty,
    /// A non-empty collection was declared
    NonEmpty(T),
}

impl<T> Declared<Vec<T>> {
    /// Classify an optional list.
    pub fn from_list(list: Option<Vec<T>>) -> Self {
        match list {
            None => Self::Unset,
            Some(items) if items.is_empty() => Self::Empty,
            Some(items) => Self::NonEmpty(items),
        }
    }

    /// Declared entries, or `None` when unset. `Empty` yields an empty slice.
    pub fn entries(&self) -> Option<&[T]> {
        match self {
            Self::Unset => None,
            Self::Empty => Some(&[]),
            Self::NonEmpty(items) => Some(items),
        }
    }
}

impl<K, V> From<BTreeMap<K, V>> for Declared<BTreeMap<K, V>> {
    fn from(map: BTreeMap<K, V>) -> Self {
        if map.is_empty() {
            Self::Empty
        } else {
            Self::NonEmpty(map)
        }
    }
}

impl<T> Declared<T> {
    /// The collection, only when it has entries
    pub fn non_empty(&self) -> Option<&T> {
        match self {
            Self::NonEmpty(items) => Some(items),
            _ => None,
        }
    }
}

/// Scalar value stored in a tag's `extra` bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Open-ended `extra` attribute bag, ordered by key
pub type Extra = BTreeMap<String, ExtraValue>;

/// Scalar and collection attributes of a tag
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagAttributes {
    /// Space-delimited architecture list
    pub arches: Option<String>,
    /// Permission label required to modify the tag
    pub perm: Option<String>,
    pub locked: bool,
    pub maven_support: bool,
    pub maven_include_all: bool,
    pub extra: Extra,
}

/// A declared parent relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceLink {
    pub parent: String,
    pub priority: i32,
}

impl fmt::Display for InheritanceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {})", self.parent, self.priority)
    }
}

/// Full inheritance record as the hub stores it.
///
/// Only the parent and priority are declared; the remaining fields are
/// fixed. Diffing compares whole records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceRule {
    pub child_id: TagId,
    pub parent_id: TagId,
    pub name: String,
    pub priority: i32,
    pub intransitive: bool,
    pub maxdepth: Option<u32>,
    pub noconfig: bool,
    pub pkg_filter: String,
}

impl InheritanceRule {
    /// Build a rule with the fixed non-declared fields.
    pub fn new(child_id: TagId, parent_id: TagId, name: &str, priority: i32) -> Self {
        Self {
            child_id,
            parent_id,
            name: name.to_string(),
            priority,
            intransitive: false,
            maxdepth: None,
            noconfig: false,
            pkg_filter: String::new(),
        }
    }
}

/// An external repository bound to a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRepoBinding {
    pub repo: String,
    /// Lower value means higher precedence
    pub priority: i32,
}

impl ExternalRepoBinding {
    pub fn new(repo: &str, priority: i32) -> Self {
        Self {
            repo: repo.to_string(),
            priority,
        }
    }
}

/// A package on a tag's package list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub package: String,
    pub owner: String,
}

/// An entry of the hub's permission catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
}

/// Tag as currently stored on the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: TagId,
    pub name: String,
    #[serde(flatten)]
    pub attributes: TagAttributes,
}

/// Payload for creating a tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagCreate {
    pub arches: Option<String>,
    pub perm: Option<PermissionId>,
    pub locked: bool,
    pub maven_support: bool,
    pub maven_include_all: bool,
    pub extra: Extra,
}

/// Partial update of a tag. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagEdits {
    pub arches: Option<Option<String>>,
    pub perm: Option<Option<PermissionId>>,
    pub locked: Option<bool>,
    pub maven_support: Option<bool>,
    pub maven_include_all: Option<bool>,
    pub extra: Option<Extra>,
    /// Extra keys to delete; omitting a key from `extra` does not remove it
    pub remove_extra: Vec<String>,
}

impl TagEdits {
    /// Check if the edit would change nothing
    pub fn is_empty(&self) -> bool {
        self.arches.is_none()
            && self.perm.is_none()
            && self.locked.is_none()
            && self.maven_support.is_none()
            && self.maven_include_all.is_none()
            && self.extra.is_none()
            && self.remove_extra.is_empty()
    }
}

/// Outcome of a content-generator access grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Access was granted by this call
    Granted,
    /// The user already had access
    AlreadyGranted,
}

/// Owner name mapped to the packages it owns
pub type PackageOwners = BTreeMap<String, BTreeSet<String>>;

/// Desired state of one tag, built fresh for each reconciliation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DesiredTag {
    pub name: String,
    pub state: TargetState,
    pub attributes: TagAttributes,
    pub inheritance: Vec<InheritanceLink>,
    pub external_repos: Declared<Vec<ExternalRepoBinding>>,
    pub packages: Declared<PackageOwners>,
}

impl DesiredTag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn absent(name: &str) -> Self {
        Self {
            state: TargetState::Absent,
            ..Self::new(name)
        }
    }

    pub fn with_attributes(mut self, attributes: TagAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_parent(mut self, parent: &str, priority: i32) -> Self {
        self.inheritance.push(InheritanceLink {
            parent: parent.to_string(),
            priority,
        });
        self
    }

    pub fn with_external_repos(mut self, repos: Option<Vec<ExternalRepoBinding>>) -> Self {
        self.external_repos = Declared::from_list(repos);
        self
    }

    pub fn with_packages(mut self, packages: PackageOwners) -> Self {
        self.packages = Declared::from(packages);
        self
    }
}

/// Desired content-generator access for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Content generator name
    pub generator: String,
    pub user: String,
    pub state: TargetState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_state_parse() {
        assert_eq!("present".parse::<TargetState>().unwrap(), TargetState::Present);
        assert_eq!("absent".parse::<TargetState>().unwrap(), TargetState::Absent);
        let err = "deleted".parse::<TargetState>().unwrap_err();
        assert!(matches!(err, Error::InvalidTargetState(s) if s == "deleted"));
    }

    #[test]
    fn test_declared_list_sentinels() {
        assert_eq!(Declared::<Vec<i32>>::from_list(None), Declared::Unset);
        assert_eq!(Declared::<Vec<i32>>::from_list(Some(vec![])), Declared::Empty);
        assert_eq!(
            Declared::from_list(Some(vec![1])),
            Declared::NonEmpty(vec![1])
        );

        assert!(Declared::<Vec<i32>>::Unset.entries().is_none());
        assert_eq!(Declared::<Vec<i32>>::Empty.entries(), Some(&[][..]));
    }

    #[test]
    fn test_declared_map_never_unset() {
        let empty: Declared<PackageOwners> = Declared::from(PackageOwners::new());
        assert_eq!(empty, Declared::Empty);
        assert!(empty.non_empty().is_none());
    }

    #[test]
    fn test_extra_value_from_toml_like_json() {
        let extra: Extra =
            serde_json::from_str(r#"{"a": 1, "b": "x", "c": true, "d": 1.5}"#).unwrap();
        assert_eq!(extra["a"], ExtraValue::Int(1));
        assert_eq!(extra["b"], ExtraValue::Str("x".into()));
        assert_eq!(extra["c"], ExtraValue::Bool(true));
        assert_eq!(extra["d"], ExtraValue::Float(1.5));
    }

    #[test]
    fn test_inheritance_rule_constants() {
        let rule = InheritanceRule::new(7, 3, "f40", 10);
        assert!(!rule.intransitive);
        assert!(!rule.noconfig);
        assert_eq!(rule.maxdepth, None);
        assert_eq!(rule.pkg_filter, "");
    }

    #[test]
    fn test_tag_edits_is_empty() {
        assert!(TagEdits::default().is_empty());
        let edits = TagEdits {
            remove_extra: vec!["b".into()],
            ..Default::default()
        };
        assert!(!edits.is_empty());
    }
}
