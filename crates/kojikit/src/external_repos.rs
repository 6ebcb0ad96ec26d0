//! External repo synchronizer

use crate::context::ApplyContext;
use crate::error::Result;
use crate::report::ChangeReport;
use crate::types::{Declared, ExternalRepoBinding};
use std::collections::{BTreeMap, BTreeSet};

/// Ensure exactly the declared external repos are bound to the tag.
///
/// An unset declaration leaves the bindings alone; an empty one removes
/// them all. Each add, edit and removal is its own hub call, so a failure
/// part way through leaves the earlier calls applied.
pub fn sync_external_repos(
    ctx: &ApplyContext,
    tag: &str,
    declared: &Declared<Vec<ExternalRepoBinding>>,
) -> Result<ChangeReport> {
    let mut report = ChangeReport::new();
    let Some(declared) = declared.entries() else {
        return Ok(report);
    };

    let current: BTreeMap<String, i32> = ctx
        .client
        .get_external_repos(tag)?
        .into_iter()
        .map(|binding| (binding.repo, binding.priority))
        .collect();

    for binding in declared {
        match current.get(&binding.repo) {
            Some(&priority) if priority == binding.priority => {}
            Some(_) => {
                let message = format!(
                    "set {} repo priority to {}",
                    binding.repo, binding.priority
                );
                ctx.mutate(&message, |client| {
                    client.edit_external_repo(tag, &binding.repo, binding.priority)
                })?;
                report.change(message);
            }
            None => {
                let message = format!("add {} external repo to {}", binding.repo, tag);
                ctx.mutate(&message, |client| {
                    client.add_external_repo(tag, &binding.repo, binding.priority)
                })?;
                report.change(message);
            }
        }
    }

    let wanted: BTreeSet<&str> = declared.iter().map(|b| b.repo.as_str()).collect();
    for repo in current.keys().filter(|repo| !wanted.contains(repo.as_str())) {
        let message = format!("removed {repo} repo from {tag} tag");
        ctx.mutate(&message, |client| client.remove_external_repo(tag, repo))?;
        report.change(message);
    }

    Ok(report)
}
