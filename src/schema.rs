//! Manifest schema
//!
//! A manifest declares tags and content-generator grants:
//!
//! ```toml
//! [[tag]]
//! name = "ceph-3.1-rhel-7"
//! arches = "x86_64"
//! perm = "admin"
//!
//! [[tag.inheritance]]
//! parent = "ceph-3.1-rhel-7-base"
//! priority = 0
//!
//! [[tag.external_repos]]
//! repo = "centos7-cr"
//! priority = 5
//!
//! [tag.packages]
//! kdreyer = ["ceph", "ceph-ansible"]
//!
//! [[cg_access]]
//! name = "atomic-reactor"
//! user = "osbs-bot"
//! ```

use anyhow::{Context, Result};
use kojikit::{
    AccessGrant, DesiredTag, Extra, ExternalRepoBinding, InheritanceLink, PackageOwners,
    TagAttributes, TargetState,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Problems found in a manifest before anything is sent to the hub
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{0} entry has an empty name")]
    EmptyName(&'static str),

    #[error("tag '{0}' is declared more than once")]
    DuplicateTag(String),

    #[error("external repo '{repo}' is bound to tag '{tag}' more than once")]
    DuplicateRepo { tag: String, repo: String },

    #[error("package '{package}' of tag '{tag}' is declared for several owners")]
    ConflictingOwners { tag: String, package: String },

    #[error("{name}: {source}")]
    State {
        name: String,
        #[source]
        source: kojikit::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub tag: Vec<TagSpec>,

    #[serde(default)]
    pub cg_access: Vec<AccessSpec>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagSpec {
    pub name: String,

    #[serde(default = "default_state")]
    pub state: String,

    #[serde(default)]
    pub arches: Option<String>,

    /// Permission label; an empty string means no permission
    #[serde(default)]
    pub perm: Option<String>,

    #[serde(default)]
    pub locked: bool,

    #[serde(default)]
    pub maven_support: bool,

    #[serde(default)]
    pub maven_include_all: bool,

    #[serde(default)]
    pub extra: Extra,

    #[serde(default)]
    pub inheritance: Vec<InheritanceLink>,

    /// Omitted leaves the tag's bindings alone; `[]` removes them all
    #[serde(default)]
    pub external_repos: Option<Vec<ExternalRepoBinding>>,

    /// Owner to package names; empty leaves the package list alone
    #[serde(default)]
    pub packages: PackageOwners,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessSpec {
    /// Content generator name
    pub name: String,

    pub user: String,

    #[serde(default = "default_state")]
    pub state: String,
}

fn default_state() -> String {
    TargetState::Present.to_string()
}

fn parse_state(name: &str, state: &str) -> Result<TargetState, ManifestError> {
    state.parse().map_err(|source| ManifestError::State {
        name: name.to_string(),
        source,
    })
}

impl Manifest {
    /// Load a manifest from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content).context("Invalid TOML format")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest for mistakes that would only surface mid-run
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut names = HashSet::new();
        for spec in &self.tag {
            if spec.name.trim().is_empty() {
                return Err(ManifestError::EmptyName("tag"));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(ManifestError::DuplicateTag(spec.name.clone()));
            }
            parse_state(&spec.name, &spec.state)?;

            let mut repos = HashSet::new();
            for binding in spec.external_repos.iter().flatten() {
                if !repos.insert(binding.repo.as_str()) {
                    return Err(ManifestError::DuplicateRepo {
                        tag: spec.name.clone(),
                        repo: binding.repo.clone(),
                    });
                }
            }

            let mut owned = BTreeMap::new();
            for (owner, packages) in &spec.packages {
                for package in packages {
                    if owned.insert(package.as_str(), owner.as_str()).is_some() {
                        return Err(ManifestError::ConflictingOwners {
                            tag: spec.name.clone(),
                            package: package.clone(),
                        });
                    }
                }
            }
        }

        for access in &self.cg_access {
            if access.name.trim().is_empty() {
                return Err(ManifestError::EmptyName("content generator"));
            }
            if access.user.trim().is_empty() {
                return Err(ManifestError::EmptyName("user"));
            }
            parse_state(&access.name, &access.state)?;
        }

        Ok(())
    }

    /// Desired state of every declared tag, in manifest order
    pub fn desired_tags(&self) -> Result<Vec<DesiredTag>, ManifestError> {
        self.tag.iter().map(TagSpec::to_desired).collect()
    }

    /// Declared content-generator grants, in manifest order
    pub fn grants(&self) -> Result<Vec<AccessGrant>, ManifestError> {
        self.cg_access.iter().map(AccessSpec::to_grant).collect()
    }
}

impl TagSpec {
    pub fn to_desired(&self) -> Result<DesiredTag, ManifestError> {
        let state = parse_state(&self.name, &self.state)?;
        if state == TargetState::Absent {
            return Ok(DesiredTag::absent(&self.name));
        }

        let attributes = TagAttributes {
            arches: self.arches.clone(),
            perm: self.perm.clone().filter(|p| !p.is_empty()),
            locked: self.locked,
            maven_support: self.maven_support,
            maven_include_all: self.maven_include_all,
            extra: self.extra.clone(),
        };

        let desired = self
            .inheritance
            .iter()
            .fold(DesiredTag::new(&self.name), |tag, link| {
                tag.with_parent(&link.parent, link.priority)
            })
            .with_attributes(attributes)
            .with_external_repos(self.external_repos.clone())
            .with_packages(self.packages.clone());
        Ok(desired)
    }
}

impl AccessSpec {
    pub fn to_grant(&self) -> Result<AccessGrant, ManifestError> {
        Ok(AccessGrant {
            generator: self.name.clone(),
            user: self.user.clone(),
            state: parse_state(&self.name, &self.state)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kojikit::{Declared, ExtraValue};
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[[tag]]
name = "ceph-3.1-rhel-7"
arches = "x86_64"
perm = "admin"
locked = true

[tag.extra]
"mock.package_manager" = "dnf"
"rpm.macro.dist" = ".el7cp"

[[tag.inheritance]]
parent = "ceph-3.1-rhel-7-base"
priority = 0

[[tag.external_repos]]
repo = "centos7-cr"
priority = 5

[tag.packages]
kdreyer = ["ceph", "ceph-ansible"]

[[tag]]
name = "ceph-2-rhel-7"
state = "absent"

[[cg_access]]
name = "atomic-reactor"
user = "osbs-bot"
"#;

    #[test]
    fn test_parse_sample() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.tag.len(), 2);
        assert_eq!(manifest.cg_access.len(), 1);

        let tags = manifest.desired_tags().unwrap();
        let tag = &tags[0];
        assert_eq!(tag.attributes.arches.as_deref(), Some("x86_64"));
        assert!(tag.attributes.locked);
        assert_eq!(
            tag.attributes.extra.get("rpm.macro.dist"),
            Some(&ExtraValue::from(".el7cp"))
        );
        assert_eq!(tag.inheritance[0].to_string(), "ceph-3.1-rhel-7-base (priority 0)");
        assert_eq!(
            tag.external_repos.entries(),
            Some(&[ExternalRepoBinding::new("centos7-cr", 5)][..])
        );
        assert!(tag.packages.non_empty().is_some());

        assert_eq!(tags[1].state, TargetState::Absent);

        let grants = manifest.grants().unwrap();
        assert_eq!(grants[0].state, TargetState::Present);
        assert_eq!(grants[0].generator, "atomic-reactor");
    }

    #[test]
    fn test_external_repos_sentinel() {
        let omitted = Manifest::parse("[[tag]]\nname = \"a\"\n").unwrap();
        assert_eq!(
            omitted.desired_tags().unwrap()[0].external_repos,
            Declared::Unset
        );

        let empty = Manifest::parse("[[tag]]\nname = \"a\"\nexternal_repos = []\n").unwrap();
        assert_eq!(
            empty.desired_tags().unwrap()[0].external_repos,
            Declared::Empty
        );
    }

    #[test]
    fn test_empty_packages_unmanaged() {
        let manifest = Manifest::parse("[[tag]]\nname = \"a\"\n[tag.packages]\n").unwrap();
        assert!(manifest.desired_tags().unwrap()[0].packages.non_empty().is_none());
    }

    #[test]
    fn test_empty_perm_is_none() {
        let manifest = Manifest::parse("[[tag]]\nname = \"a\"\nperm = \"\"\n").unwrap();
        assert_eq!(manifest.desired_tags().unwrap()[0].attributes.perm, None);
    }

    #[test]
    fn test_invalid_state() {
        let err = Manifest::parse("[[tag]]\nname = \"a\"\nstate = \"gone\"\n").unwrap_err();
        let inner = err.downcast_ref::<ManifestError>().unwrap();
        assert!(matches!(
            inner,
            ManifestError::State {
                source: kojikit::Error::InvalidTargetState(_),
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_tag() {
        let err = Manifest::parse("[[tag]]\nname = \"a\"\n[[tag]]\nname = \"a\"\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::DuplicateTag(name)) if name == "a"
        ));
    }

    #[test]
    fn test_duplicate_repo() {
        let content = r#"
[[tag]]
name = "a"
external_repos = [{ repo = "r", priority = 1 }, { repo = "r", priority = 2 }]
"#;
        let err = Manifest::parse(content).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::DuplicateRepo { .. })
        ));
    }

    #[test]
    fn test_conflicting_owners() {
        let content = r#"
[[tag]]
name = "a"
[tag.packages]
alice = ["ceph"]
bob = ["ceph"]
"#;
        let err = Manifest::parse(content).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::ConflictingOwners { package, .. }) if package == "ceph"
        ));
    }

    #[test]
    fn test_empty_names() {
        assert!(Manifest::parse("[[tag]]\nname = \" \"\n").is_err());
        assert!(Manifest::parse("[[cg_access]]\nname = \"g\"\nuser = \"\"\n").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Manifest::parse("[[tag]]\nname = \"a\"\narch = \"x86_64\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tags.toml");
        fs::write(&path, SAMPLE).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.tag[0].name, "ceph-3.1-rhel-7");

        let missing = Manifest::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("Could not read manifest"));
    }
}
