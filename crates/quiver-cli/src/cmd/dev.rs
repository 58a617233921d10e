//! `quiver dev`: recipe authoring tools.

use anyhow::{Context, Result};
use quiver_core::ops::install_package;
use quiver_core::resolve::check_platform;
use quiver_core::{RecipeSource, Reporter};
use quiver_schema::{Arch, Os, PackageName, PackageRecipe, Platform, VersionSource};

use super::{ScratchGuard, Session};
use crate::SourceArgs;

/// Architectures exercised by `bintest`.
const BINTEST_ARCHES: [Arch; 2] = [Arch::Amd64, Arch::Arm64];

/// Load and validate the recipe for `name`, printing what it declares.
pub fn check(source: &SourceArgs, name: &str) -> Result<bool> {
    let session = Session::new(source)?;
    let name = PackageName::new(name);
    let recipe = session
        .recipes()
        .load(&name)
        .with_context(|| format!("recipe check failed for {name}"))?;

    for line in describe(&recipe) {
        println!("{line}");
    }
    Ok(true)
}

fn describe(recipe: &PackageRecipe) -> Vec<String> {
    let mut lines = vec![format!("{} recipe OK", recipe.title)];
    if let Some(tagline) = &recipe.tagline {
        lines.push(format!("  tagline:   {tagline}"));
    }
    let versions = match &recipe.version_source {
        VersionSource::GitHub { repo, .. } => format!("github {repo}"),
        VersionSource::Manual(list) => format!("manual ({} listed)", list.len()),
    };
    lines.push(format!(
        "  versions:  {versions}{}",
        if recipe.force_latest { ", latest only" } else { "" }
    ));
    let join = |items: Vec<&str>| items.join(", ");
    lines.push(format!(
        "  os:        {}",
        join(recipe.supported_os().map(|o| o.as_str()).collect())
    ));
    lines.push(format!(
        "  arch:      {}",
        join(recipe.supported_arch().map(|a| a.as_str()).collect())
    ));
    if !recipe.ignore.is_empty() {
        let pairs: Vec<String> = recipe
            .ignore
            .iter()
            .map(|(os, arch)| Platform::new(*os, *arch).to_string())
            .collect();
        lines.push(format!("  ignored:   {}", pairs.join(", ")));
    }
    lines
}

/// Platforms of the bintest matrix the recipe supports.
fn bintest_platforms(recipe: &PackageRecipe) -> Vec<Platform> {
    Os::ALL
        .iter()
        .flat_map(|os| BINTEST_ARCHES.iter().map(move |arch| Platform::new(*os, *arch)))
        .filter(|p| check_platform(recipe, *p).is_ok())
        .collect()
}

/// Install the latest version of `name` for every supported OS and
/// architecture into isolated homes under `<home>/test`.
///
/// The test root is removed when every platform succeeds.
pub async fn bintest(source: &SourceArgs, name: &str) -> Result<bool> {
    let session = Session::new(source)?;
    let output = &session.output;
    let package = PackageName::new(name);
    let recipe = session
        .recipes()
        .load(&package)
        .with_context(|| format!("cannot load recipe for {package}"))?;

    let platforms = bintest_platforms(&recipe);
    if platforms.is_empty() {
        output.warning(&format!("{package} supports none of the tested platforms"));
        output.finish().await;
        return Ok(false);
    }

    let mut results = Vec::with_capacity(platforms.len());

    for platform in &platforms {
        let paths = session.paths.for_test(*platform);
        paths.ensure()?;
        let _scratch = ScratchGuard::new(paths.tmp_dir.clone());
        let ctx = session.context(paths, *platform);

        output.reserve(1);
        let outcome = install_package(&ctx, 0, name, false).await;
        output.finish().await;

        match outcome {
            Ok(outcome) => {
                for binary in outcome.binaries() {
                    output.info(&binary.display().to_string());
                }
                results.push((*platform, true));
            }
            Err(e) => {
                if e.is_fatal() {
                    return Err(e.into());
                }
                results.push((*platform, false));
            }
        }
    }

    let all_ok = results.iter().all(|(_, ok)| *ok);
    for (platform, ok) in &results {
        let verdict = if *ok { "SUCCESS" } else { "FAIL" };
        output.info(&format!("{platform}: {verdict}"));
    }
    output.finish().await;

    if all_ok {
        if let Err(e) = std::fs::remove_dir_all(&session.paths.test_dir) {
            tracing::warn!("failed to remove {}: {e}", session.paths.test_dir.display());
        }
    }
    Ok(all_ok)
}
