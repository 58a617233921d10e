//! `quiver add`

use std::sync::Arc;

use anyhow::Result;
use quiver_core::ops::{install_all, perform_ux_checks, reject_all};
use quiver_core::recipes::{refresh_recipes, should_refresh};
use quiver_core::resolve::PlatformError;
use quiver_core::Reporter;
use quiver_schema::Platform;

use super::{ScratchGuard, Session};
use crate::SourceArgs;

/// Install every package argument; returns true iff all of them installed.
pub async fn add(
    source: &SourceArgs,
    packages: &[String],
    refresh: bool,
    switch: bool,
) -> Result<bool> {
    let session = Session::new(source)?;
    let output = &session.output;

    let platform = match Platform::current() {
        Ok(platform) => platform,
        Err(reason) => {
            output.reserve(packages.len());
            let summary = reject_all(output, packages, &PlatformError::Host(reason));
            output.finish().await;
            return Ok(summary.success());
        }
    };

    session.paths.ensure()?;
    let _scratch = ScratchGuard::new(session.paths.tmp_dir.clone());

    if !session.uses_local_recipes() && (refresh || should_refresh(&session.paths.recipe_dir)) {
        output.info("Refreshing recipes...");
        match refresh_recipes(
            &session.client,
            session.recipes_url(),
            &session.paths.recipe_dir,
            &session.paths.tmp_dir,
        )
        .await
        {
            Ok(()) => output.info("Recipes up to date."),
            Err(e) => output.warning(&format!("Recipe refresh failed, using existing recipes: {e}")),
        }
    }

    let ctx = Arc::new(session.context(session.paths.clone(), platform));
    output.reserve(packages.len());
    let result = install_all(ctx, packages, switch).await;
    output.finish().await;
    let summary = result?;

    let linked = summary.linked();
    if !linked.is_empty() {
        perform_ux_checks(&session.paths, &linked, output as &dyn Reporter);
        output.finish().await;
    }

    Ok(summary.success())
}
