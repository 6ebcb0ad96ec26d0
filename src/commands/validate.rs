//! Validate command

use crate::Context;
use crate::schema::Manifest;
use crate::ui;
use anyhow::Result;
use kojikit::TargetState;
use std::path::Path;

pub fn run(ctx: &Context, manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let tags = manifest.desired_tags()?;
    let grants = manifest.grants()?;

    if !ctx.quiet {
        ui::header(&format!("{}", manifest_path.display()));
        for tag in &tags {
            match tag.state {
                TargetState::Present => ui::dim(&format!(
                    "tag {} ({} parents)",
                    tag.name,
                    tag.inheritance.len()
                )),
                TargetState::Absent => ui::dim(&format!("tag {} (absent)", tag.name)),
            }
        }
        for grant in &grants {
            ui::dim(&format!(
                "cg_access {}/{} ({})",
                grant.generator, grant.user, grant.state
            ));
        }
        println!();
    }

    ui::success(&format!(
        "Manifest is valid: {} tags, {} grants",
        tags.len(),
        grants.len()
    ));
    Ok(())
}
