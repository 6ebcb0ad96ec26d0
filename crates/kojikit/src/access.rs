//! Content-generator access reconciler
//!
//! The hub has no read call for content-generator access, so convergence
//! is judged from the write itself: a grant that the hub reports as
//! already held is unchanged, and a revoke always counts as a change.

use crate::context::ApplyContext;
use crate::error::Result;
use crate::report::ChangeReport;
use crate::types::{AccessGrant, GrantOutcome, TargetState};

/// Grant or revoke a user's access to a content generator.
///
/// In check mode nothing is sent, so a grant is reported as a change even
/// if the user may already hold it.
pub fn reconcile_access(ctx: &ApplyContext, grant: &AccessGrant) -> Result<ChangeReport> {
    let mut report = ChangeReport::new();

    match grant.state {
        TargetState::Present => {
            let message = format!(
                "grant {} access to content generator {}",
                grant.user, grant.generator
            );
            if ctx.dry_run {
                log::debug!("check mode, skipping: {message}");
                report.change(message);
                return Ok(report);
            }

            log::info!("{message}");
            match ctx.client.grant_access(&grant.user, &grant.generator, true)? {
                GrantOutcome::Granted => report.change(message),
                GrantOutcome::AlreadyGranted => {
                    log::debug!(
                        "{} already has access to content generator {}",
                        grant.user,
                        grant.generator
                    );
                }
            }
        }
        TargetState::Absent => {
            let message = format!(
                "revoke {} access to content generator {}",
                grant.user, grant.generator
            );
            ctx.mutate(&message, |client| {
                client.revoke_access(&grant.user, &grant.generator)
            })?;
            report.change(message);
        }
    }

    Ok(report)
}
