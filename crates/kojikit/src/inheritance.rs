//! Inheritance synchronizer
//!
//! Declared parents are expanded into full hub rule records and compared
//! with the current rule set as one ordered collection. Any difference
//! replaces the whole set in a single call.

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::report::ChangeReport;
use crate::types::{InheritanceLink, InheritanceRule, TagId};

/// Resolve every declared parent and build the rule records.
///
/// Fails with [`Error::UnresolvedParent`] before anything is written if a
/// parent does not exist.
pub fn build_rules(
    ctx: &ApplyContext,
    tag: &str,
    child_id: TagId,
    links: &[InheritanceLink],
) -> Result<Vec<InheritanceRule>> {
    links
        .iter()
        .map(|link| {
            let parent = ctx
                .client
                .get_tag(&link.parent)?
                .ok_or_else(|| Error::UnresolvedParent {
                    tag: tag.to_string(),
                    parent: link.parent.clone(),
                })?;
            Ok(InheritanceRule::new(
                child_id,
                parent.id,
                &link.parent,
                link.priority,
            ))
        })
        .collect()
}

/// Ensure the tag inherits from exactly the declared parents, in order.
pub fn sync_inheritance(
    ctx: &ApplyContext,
    tag: &str,
    child_id: TagId,
    links: &[InheritanceLink],
) -> Result<ChangeReport> {
    let rules = build_rules(ctx, tag, child_id, links)?;
    let current = ctx.client.get_inheritance(tag)?;

    let mut report = ChangeReport::new();
    if current == rules {
        return Ok(report);
    }

    let message = format!("inheritance is {}", describe(links));
    ctx.mutate(&message, |client| client.set_inheritance(tag, &rules, true))?;
    report.change(message);
    Ok(report)
}

fn describe(links: &[InheritanceLink]) -> String {
    let parts: Vec<String> = links.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}
