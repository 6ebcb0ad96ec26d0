//! Apply and diff commands

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Settings;
use crate::schema::Manifest;
use crate::ui;
use anyhow::{Context as _, Result};
use kojikit::{AccessGrant, ChangeReport, DesiredTag, HubState, MemoryHub, Reconciler};
use serde::Serialize;

/// Outcome of one declared resource
#[derive(Debug, Serialize)]
pub struct ResourceReport {
    pub resource: String,
    #[serde(flatten)]
    pub report: ChangeReport,
}

/// Aggregate outcome of a run, as printed by `--json`
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub check: bool,
    pub changed: bool,
    pub log: Vec<String>,
    pub resources: Vec<ResourceReport>,
}

impl RunReport {
    fn new(check: bool) -> Self {
        Self {
            check,
            ..Default::default()
        }
    }

    fn push(&mut self, resource: String, report: ChangeReport) {
        log::debug!("{resource}: {} changes", report.len());
        self.changed |= report.changed;
        self.log.extend(report.log.iter().cloned());
        self.resources.push(ResourceReport { resource, report });
    }

    fn changed_count(&self) -> usize {
        self.resources.iter().filter(|r| r.report.changed).count()
    }
}

/// Reconcile every tag, then every grant, in manifest order.
///
/// Stops at the first error; resources handled before it stay in `run`.
pub fn reconcile_all(
    reconciler: &Reconciler,
    tags: &[DesiredTag],
    grants: &[AccessGrant],
    run: &mut RunReport,
) -> kojikit::Result<()> {
    for tag in tags {
        log::debug!("reconciling tag {} ({})", tag.name, tag.state);
        let report = reconciler.reconcile_tag(tag)?;
        run.push(format!("tag {}", tag.name), report);
    }
    for grant in grants {
        log::debug!(
            "reconciling {} access to {} ({})",
            grant.user,
            grant.generator,
            grant.state
        );
        let report = reconciler.reconcile_access(grant)?;
        run.push(format!("cg_access {}/{}", grant.generator, grant.user), report);
    }
    Ok(())
}

/// How the check-mode preview before a real apply ended
#[derive(Debug, PartialEq, Eq)]
pub enum Preview {
    Complete,
    /// Stopped at a parent that does not exist yet
    Incomplete(String),
}

/// Run the preview shown before confirming an apply.
///
/// Check mode creates nothing, so a parent declared earlier in the same
/// manifest is still missing when its child is previewed. That stops the
/// preview without failing it; every other error fails it.
pub fn preview(
    reconciler: &Reconciler,
    tags: &[DesiredTag],
    grants: &[AccessGrant],
    run: &mut RunReport,
) -> kojikit::Result<Preview> {
    match reconcile_all(reconciler, tags, grants, run) {
        Ok(()) => Ok(Preview::Complete),
        Err(err @ kojikit::Error::UnresolvedParent { .. }) => {
            Ok(Preview::Incomplete(err.to_string()))
        }
        Err(err) => Err(err),
    }
}

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let settings = Settings::load()?;
    let check = args.check || settings.check;

    let manifest = Manifest::load(&args.manifest)?;
    let tags = manifest.desired_tags()?;
    let grants = manifest.grants()?;

    let state_path = settings.state_path(args.state.as_deref())?;
    if ctx.verbose > 0 {
        ui::info(&format!("Hub snapshot: {}", state_path.display()));
    }
    let state = HubState::load(&state_path)
        .with_context(|| format!("Could not load hub snapshot {}", state_path.display()))?;
    let hub = MemoryHub::with_state(state);
    let mut reconciler = Reconciler::new(&hub, true);

    if !check && !args.yes && !args.json {
        let mut planned = RunReport::new(reconciler.is_dry_run());
        let outcome = preview(&reconciler, &tags, &grants, &mut planned);
        render(ctx, &planned);
        match outcome {
            Err(err) => return fail(err),
            Ok(Preview::Incomplete(reason)) => {
                ui::warn(&format!("Preview stopped early: {reason}"));
                ui::dim("The parent may be created by an earlier entry of this manifest");
            }
            Ok(Preview::Complete) if !planned.changed => {
                ui::success("Nothing to change");
                return Ok(());
            }
            Ok(Preview::Complete) => {}
        }
        if !confirm_proceed()? {
            println!();
            ui::warn("Aborted");
            return Ok(());
        }
    }

    reconciler.set_dry_run(check);
    let mut run = RunReport::new(reconciler.is_dry_run());
    let outcome = reconcile_all(&reconciler, &tags, &grants, &mut run);

    if !check {
        hub.state()
            .save(&state_path)
            .with_context(|| format!("Could not save hub snapshot {}", state_path.display()))?;
        log::debug!("{} hub writes issued", hub.write_calls().len());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        render(ctx, &run);
    }

    match outcome {
        Ok(()) => Ok(()),
        Err(err) => fail(err),
    }
}

fn render(ctx: &Context, run: &RunReport) {
    ui::header(if run.check { "Planned changes" } else { "Changes" });
    for resource in &run.resources {
        if ctx.quiet && !resource.report.changed {
            continue;
        }
        ui::resource_report(&resource.resource, &resource.report);
    }
    println!();
    let line = ui::summary_line(run.changed_count(), run.resources.len(), run.check);
    if run.changed {
        ui::info(&line);
    } else {
        ui::success(&line);
    }
}

fn fail(err: kojikit::Error) -> Result<()> {
    let category = err.category();
    ui::error(category.description());
    ui::dim(category.advice());
    Err(err.into())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kojikit::TagAttributes;

    fn manifest() -> Manifest {
        Manifest::parse(
            r#"
[[tag]]
name = "ceph-3.1-rhel-7"
arches = "x86_64"

[[tag.inheritance]]
parent = "rhel-7-base"
priority = 0

[[cg_access]]
name = "atomic-reactor"
user = "osbs-bot"
"#,
        )
        .unwrap()
    }

    fn hub() -> MemoryHub {
        let mut state = HubState::default();
        state.add_user("osbs-bot");
        state
            .insert_tag("rhel-7-base", &TagAttributes::default())
            .unwrap();
        MemoryHub::with_state(state)
    }

    #[test]
    fn test_apply_then_converged() {
        let manifest = manifest();
        let tags = manifest.desired_tags().unwrap();
        let grants = manifest.grants().unwrap();
        let hub = hub();
        let reconciler = Reconciler::new(&hub, false);

        let mut first = RunReport::new(false);
        reconcile_all(&reconciler, &tags, &grants, &mut first).unwrap();
        assert!(first.changed);
        assert_eq!(first.changed_count(), 2);
        assert_eq!(first.log[0], "created tag id 2");

        let mut second = RunReport::new(false);
        reconcile_all(&reconciler, &tags, &grants, &mut second).unwrap();
        assert!(!second.changed);
        assert!(second.log.is_empty());
    }

    #[test]
    fn test_preview_then_apply_shares_catalog() {
        let manifest = Manifest::parse(
            "[[tag]]\nname = \"rhel-7-base\"\nperm = \"admin\"\n",
        )
        .unwrap();
        let tags = manifest.desired_tags().unwrap();
        let mut state = HubState::default();
        state.add_permission("admin");
        state
            .insert_tag("rhel-7-base", &TagAttributes::default())
            .unwrap();
        let hub = MemoryHub::with_state(state);
        let mut reconciler = Reconciler::new(&hub, true);

        let mut preview = RunReport::new(true);
        reconcile_all(&reconciler, &tags, &[], &mut preview).unwrap();
        assert!(preview.changed);
        assert!(hub.write_calls().is_empty());

        reconciler.set_dry_run(false);
        let mut run = RunReport::new(false);
        reconcile_all(&reconciler, &tags, &[], &mut run).unwrap();
        assert_eq!(run.log, preview.log);
        assert_eq!(hub.count("getAllPerms"), 1);
        assert_eq!(hub.write_calls(), vec!["editTag2"]);
    }

    #[test]
    fn test_preview_tolerates_parent_created_by_manifest() {
        let manifest = Manifest::parse(
            r#"
[[tag]]
name = "base"

[[tag]]
name = "child"
[[tag.inheritance]]
parent = "base"
priority = 0
"#,
        )
        .unwrap();
        let tags = manifest.desired_tags().unwrap();
        let mut state = HubState::default();
        state.insert_tag("child", &TagAttributes::default()).unwrap();
        let hub = MemoryHub::with_state(state);
        let mut reconciler = Reconciler::new(&hub, true);

        let mut planned = RunReport::new(reconciler.is_dry_run());
        let outcome = preview(&reconciler, &tags, &[], &mut planned).unwrap();
        assert_eq!(
            outcome,
            Preview::Incomplete("parent tag 'base' of 'child' not found".into())
        );
        assert!(planned.check);
        assert_eq!(planned.log, vec!["would create tag base"]);
        assert!(hub.write_calls().is_empty());

        reconciler.set_dry_run(false);
        let mut run = RunReport::new(reconciler.is_dry_run());
        reconcile_all(&reconciler, &tags, &[], &mut run).unwrap();
        assert!(!run.check);
        assert_eq!(
            run.log,
            vec!["created tag id 2", "inheritance is [base (priority 0)]"]
        );
    }

    #[test]
    fn test_preview_fails_on_other_errors() {
        let manifest = Manifest::parse(
            "[[tag]]\nname = \"rhel-7-base\"\nperm = \"superuser\"\n",
        )
        .unwrap();
        let tags = manifest.desired_tags().unwrap();
        let mut state = HubState::default();
        state
            .insert_tag("rhel-7-base", &TagAttributes::default())
            .unwrap();
        let hub = MemoryHub::with_state(state);
        let reconciler = Reconciler::new(&hub, true);

        let mut planned = RunReport::new(true);
        let err = preview(&reconciler, &tags, &[], &mut planned).unwrap_err();
        assert!(matches!(err, kojikit::Error::UnknownPermission(label) if label == "superuser"));
    }

    #[test]
    fn test_stops_at_first_error() {
        let manifest = Manifest::parse(
            r#"
[[tag]]
name = "a"

[[tag]]
name = "b"
[[tag.inheritance]]
parent = "missing"
priority = 0

[[tag]]
name = "c"
"#,
        )
        .unwrap();
        let tags = manifest.desired_tags().unwrap();
        let hub = MemoryHub::new();
        let reconciler = Reconciler::new(&hub, false);

        let mut run = RunReport::new(false);
        let err = reconcile_all(&reconciler, &tags, &[], &mut run).unwrap_err();
        assert!(matches!(err, kojikit::Error::UnresolvedParent { .. }));
        assert_eq!(run.resources.len(), 1);
        assert!(hub.state().tags.contains_key("b"));
        assert!(!hub.state().tags.contains_key("c"));
    }

    #[test]
    fn test_json_shape() {
        let mut run = RunReport::new(true);
        let mut report = ChangeReport::new();
        report.change("would create tag a");
        run.push("tag a".into(), report);

        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["changed"], true);
        assert_eq!(value["log"][0], "would create tag a");
        assert_eq!(value["resources"][0]["resource"], "tag a");
        assert_eq!(value["resources"][0]["changed"], true);
    }
}
