//! Package ownership synchronizer

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::report::ChangeReport;
use crate::types::{Declared, PackageOwners, TagId};
use std::collections::BTreeMap;

/// Ensure the tag's package list holds exactly the declared packages with
/// the declared owners.
///
/// Only a non-empty mapping is managed: unlike external repos, an empty
/// mapping leaves the package list alone. Calls are issued one by one with
/// no rollback.
pub fn sync_packages(
    ctx: &ApplyContext,
    tag: &str,
    tag_id: TagId,
    declared: &Declared<PackageOwners>,
) -> Result<ChangeReport> {
    let mut report = ChangeReport::new();
    let Some(owners) = declared.non_empty() else {
        return Ok(report);
    };

    let wanted = owner_by_package(owners)?;

    // package name -> current owner
    let current: BTreeMap<String, String> = ctx
        .client
        .list_packages(tag_id)?
        .into_iter()
        .map(|entry| (entry.package, entry.owner))
        .collect();

    for (owner, packages) in owners {
        for package in packages {
            match current.get(package) {
                None => {
                    let message = format!("added pkg {package}");
                    ctx.mutate(&message, |client| client.add_package(tag, package, owner))?;
                    report.change(message);
                }
                Some(current_owner) if current_owner != owner => {
                    let message = format!("set {package} owner {owner}");
                    ctx.mutate(&message, |client| {
                        client.set_package_owner(tag, package, owner)
                    })?;
                    report.change(message);
                }
                Some(_) => {}
            }
        }
    }

    for (package, owner) in current
        .iter()
        .filter(|(package, _)| !wanted.contains_key(package.as_str()))
    {
        let message = format!("remove pkg {package}");
        ctx.mutate(&message, |client| client.remove_package(tag, package, owner))?;
        report.change(message);
    }

    Ok(report)
}

/// Invert the owner mapping, rejecting packages claimed by several owners.
fn owner_by_package(owners: &PackageOwners) -> Result<BTreeMap<&str, &str>> {
    let mut claims: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (owner, packages) in owners {
        for package in packages {
            claims.entry(package.as_str()).or_default().push(owner.as_str());
        }
    }

    let mut index = BTreeMap::new();
    for (package, claimed_by) in claims {
        if let [owner] = claimed_by.as_slice() {
            index.insert(package, *owner);
        } else {
            return Err(Error::ConflictingOwners {
                package: package.to_string(),
                owners: claimed_by.iter().map(ToString::to_string).collect(),
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HubState, MemoryHub, ResourceClient};
    use crate::types::{PackageEntry, TagAttributes};
    use std::collections::BTreeSet;

    fn hub_with(entries: &[(&str, &str)]) -> (MemoryHub, TagId) {
        let mut state = HubState::default();
        for user in ["alice", "bob", "kdreyer"] {
            state.add_user(user);
        }
        let id = state
            .insert_tag("ceph-3.1-rhel-7", &TagAttributes::default())
            .unwrap();
        state.packages.insert(
            "ceph-3.1-rhel-7".into(),
            entries
                .iter()
                .map(|(package, owner)| PackageEntry {
                    package: package.to_string(),
                    owner: owner.to_string(),
                })
                .collect(),
        );
        (MemoryHub::with_state(state), id)
    }

    fn owners(pairs: &[(&str, &[&str])]) -> Declared<PackageOwners> {
        let map: PackageOwners = pairs
            .iter()
            .map(|(owner, packages)| {
                (
                    owner.to_string(),
                    packages.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
                )
            })
            .collect();
        Declared::from(map)
    }

    #[test]
    fn test_empty_mapping_is_unmanaged() {
        let (hub, id) = hub_with(&[("foo", "bob")]);
        let ctx = ApplyContext::new(&hub, false);

        let report = sync_packages(&ctx, "ceph-3.1-rhel-7", id, &owners(&[])).unwrap();
        assert!(!report.changed);
        assert!(hub.calls().is_empty());
    }

    #[test]
    fn test_reassign_owner_only() {
        let (hub, id) = hub_with(&[("foo", "bob")]);
        let ctx = ApplyContext::new(&hub, false);

        let report =
            sync_packages(&ctx, "ceph-3.1-rhel-7", id, &owners(&[("alice", &["foo"])])).unwrap();
        assert_eq!(report.log, vec!["set foo owner alice"]);
        assert_eq!(hub.write_calls(), vec!["packageListSetOwner"]);
        assert_eq!(hub.list_packages(id).unwrap()[0].owner, "alice");
    }

    #[test]
    fn test_add_and_remove() {
        // rbd-nbd is owned by someone outside the declared mapping; removal
        // must pass that owner, which the hub checks
        let (hub, id) = hub_with(&[("ansible", "kdreyer"), ("rbd-nbd", "bob")]);
        let ctx = ApplyContext::new(&hub, false);
        let wanted = owners(&[("kdreyer", &["ansible", "ceph", "ceph-ansible"])]);

        let report = sync_packages(&ctx, "ceph-3.1-rhel-7", id, &wanted).unwrap();
        assert_eq!(
            report.log,
            vec!["added pkg ceph", "added pkg ceph-ansible", "remove pkg rbd-nbd"]
        );
        assert_eq!(hub.count("packageListRemove"), 1);
        assert!(
            hub.list_packages(id)
                .unwrap()
                .iter()
                .all(|entry| entry.package != "rbd-nbd")
        );

        let again = sync_packages(&ctx, "ceph-3.1-rhel-7", id, &wanted).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_conflicting_owners_rejected_before_reads() {
        let (hub, id) = hub_with(&[]);
        let ctx = ApplyContext::new(&hub, false);
        let wanted = owners(&[("alice", &["foo"]), ("bob", &["foo"])]);

        let err = sync_packages(&ctx, "ceph-3.1-rhel-7", id, &wanted).unwrap_err();
        assert!(matches!(err, Error::ConflictingOwners { package, .. } if package == "foo"));
        assert!(hub.calls().is_empty());
    }

    #[test]
    fn test_remote_failure_propagates() {
        let (hub, id) = hub_with(&[]);
        let ctx = ApplyContext::new(&hub, false);
        let wanted = owners(&[("nobody", &["foo"])]);

        let err = sync_packages(&ctx, "ceph-3.1-rhel-7", id, &wanted).unwrap_err();
        assert!(matches!(err, Error::Remote { operation: "packageListAdd", .. }));
    }

    #[test]
    fn test_dry_run_matches_real_run() {
        let current = [("foo", "bob"), ("old", "bob")];
        let wanted = owners(&[("alice", &["foo", "new"])]);

        let (check_hub, id) = hub_with(&current);
        let check =
            sync_packages(&ApplyContext::new(&check_hub, true), "ceph-3.1-rhel-7", id, &wanted)
                .unwrap();
        assert!(check_hub.write_calls().is_empty());

        let (real_hub, id) = hub_with(&current);
        let real =
            sync_packages(&ApplyContext::new(&real_hub, false), "ceph-3.1-rhel-7", id, &wanted)
                .unwrap();
        assert_eq!(check, real);
        assert_eq!(
            real.log,
            vec!["set foo owner alice", "added pkg new", "remove pkg old"]
        );
    }
}
