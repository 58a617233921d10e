//! Concurrent multi-package installation.
//!
//! One worker per argument, all joined before returning. A failing worker
//! only marks the run as failed; its siblings keep going. Workers for the
//! same package name take turns through a per-package lock so they never
//! race on one package directory.

use std::collections::HashMap;
use std::sync::Arc;

use quiver_schema::{PackageName, PackageSpec};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::ops::install::{InstallOutcome, install_package};
use crate::ops::{FatalError, InstallContext, InstallError};
use crate::reporter::{Level, Reporter, Slot};
use crate::resolve::PlatformError;

/// Result of [`install_all`].
#[derive(Debug, Default)]
pub struct InstallSummary {
    /// Successful arguments, in argument order.
    pub outcomes: Vec<(Slot, InstallOutcome)>,
    /// Number of failed arguments.
    pub failures: usize,
}

impl InstallSummary {
    /// True iff every argument installed (or was already installed).
    pub fn success(&self) -> bool {
        self.failures == 0
    }

    /// Every link name created during the run.
    pub fn linked(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .flat_map(|(_, o)| o.linked().iter().cloned())
            .collect()
    }
}

type PackageLocks = HashMap<PackageName, Arc<Mutex<()>>>;

fn package_locks(args: &[String]) -> PackageLocks {
    let mut locks = PackageLocks::new();
    for arg in args {
        if let Ok(spec) = PackageSpec::parse(arg) {
            locks.entry(spec.name).or_default();
        }
    }
    locks
}

/// Install every argument concurrently.
///
/// # Errors
///
/// Only a [`FatalError`]; the remaining workers are aborted in that case.
/// Ordinary per-package failures are counted in the summary.
pub async fn install_all(
    ctx: Arc<InstallContext>,
    args: &[String],
    switch: bool,
) -> Result<InstallSummary, FatalError> {
    let locks = package_locks(args);
    let mut set: JoinSet<(Slot, Result<InstallOutcome, InstallError>)> = JoinSet::new();

    for (slot, arg) in args.iter().enumerate() {
        let ctx = ctx.clone();
        let arg = arg.clone();
        let lock = PackageSpec::parse(&arg)
            .ok()
            .and_then(|spec| locks.get(&spec.name).cloned());

        set.spawn(async move {
            let _guard = match lock {
                Some(lock) => Some(lock.lock_owned().await),
                None => None,
            };
            let result = install_package(&ctx, slot, &arg, switch).await;
            if let Err(e) = &result {
                tracing::debug!("{arg} failed: {e:?}");
                ctx.reporter.status(slot, Level::Failure, &e.to_string());
            }
            (slot, result)
        });
    }

    let mut summary = InstallSummary::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((slot, Ok(outcome))) => summary.outcomes.push((slot, outcome)),
            Ok((_, Err(InstallError::Fatal(fatal)))) => {
                set.abort_all();
                return Err(fatal);
            }
            Ok((_, Err(_))) => summary.failures += 1,
            Err(e) => {
                tracing::warn!("install worker did not finish: {e}");
                summary.failures += 1;
            }
        }
    }

    summary.outcomes.sort_by_key(|(slot, _)| *slot);
    Ok(summary)
}

/// Fail every argument with the same platform error without touching the
/// network or the filesystem.
pub fn reject_all(reporter: &dyn Reporter, args: &[String], err: &PlatformError) -> InstallSummary {
    let msg = err.to_string();
    for (slot, arg) in args.iter().enumerate() {
        reporter.set_prefix(slot, arg);
        reporter.status(slot, Level::Failure, &msg);
    }
    InstallSummary {
        outcomes: Vec::new(),
        failures: args.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_locks_are_per_name() {
        let args: Vec<String> = ["foo@1.0.0", "FOO@2.0.0", "bar", "bad@1@2"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let locks = package_locks(&args);
        assert_eq!(locks.len(), 2);
        assert!(locks.contains_key("foo"));
        assert!(locks.contains_key("bar"));
    }

    #[derive(Default)]
    struct Recorder(std::sync::Mutex<Vec<(Slot, Level, String)>>);

    impl Reporter for Recorder {
        fn set_prefix(&self, _: Slot, _: &str) {}

        fn status(&self, slot: Slot, level: Level, msg: &str) {
            self.0.lock().unwrap().push((slot, level, msg.to_string()));
        }

        fn working(&self, _: Slot, _: &str, _: tokio::sync::oneshot::Receiver<()>) {}

        fn downloading(&self, _: Slot, _: u64, _: Option<u64>) {}

        fn info(&self, _: &str) {}

        fn warning(&self, _: &str) {}
    }

    #[test]
    fn test_reject_all_fails_each_argument() {
        let reporter = Recorder::default();
        let args: Vec<String> = vec!["foo".into(), "bar@1.0.0".into()];
        let err = PlatformError::Host("Unsupported host OS: plan9".into());

        let summary = reject_all(&reporter, &args, &err);

        assert_eq!(summary.failures, 2);
        assert!(summary.outcomes.is_empty());
        let lines = reporter.0.into_inner().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(
            lines
                .iter()
                .all(|(_, level, msg)| *level == Level::Failure && msg.contains("plan9"))
        );
        assert_eq!(lines[1].0, 1);
    }

    #[test]
    fn test_summary_success_and_links() {
        let mut summary = InstallSummary::default();
        assert!(summary.success());

        summary.outcomes.push((
            0,
            InstallOutcome::Installed {
                name: PackageName::new("foo"),
                version: "1.0.0".into(),
                binaries: vec![],
                linked: vec!["foo".to_string()],
                size_bytes: 0,
            },
        ));
        assert_eq!(summary.linked(), vec!["foo".to_string()]);

        summary.failures = 1;
        assert!(!summary.success());
    }
}
