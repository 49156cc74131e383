//! Shared entry points used by the CLI and the daemon.

use std::path::Path;

use tracing::info;

use tasklink_adapters::{GeminiAdapter, HttpGeminiService, HttpPureCmService, PureCmAdapter};
use tasklink_core::{config, Options, System};

use crate::error::SyncError;
use crate::identity::JsonIdentityStore;
use crate::orchestrator::{Orchestrator, PassSummary};

/// Build an orchestrator over the HTTP services named in `options` and the
/// identity store under `home`.
///
/// Contacts Gemini to resolve creation selectors and the template project.
pub fn connect_at(home: &Path, options: &Options) -> Result<Orchestrator, SyncError> {
    let gemini = GeminiAdapter::new(HttpGeminiService::new(&options.gemini), options)?;
    let purecm = PureCmAdapter::new(HttpPureCmService::new(&options.purecm), options);
    let links = JsonIdentityStore::open_at(home)?;
    Ok(Orchestrator::new(
        Box::new(gemini),
        Box::new(purecm),
        Box::new(links),
        options,
    ))
}

/// Clear the one-shot force flags in the stored config once the forced check
/// of that system has completed. Returns whether the config was rewritten.
pub fn clear_consumed_force_flags(
    home: &Path,
    options: &mut Options,
    summary: &PassSummary,
) -> Result<bool, SyncError> {
    let consumed = |system| summary.report(system).is_some_and(|r| r.forced);
    let mut changed = false;
    if options.force_gemini_sync && consumed(System::Gemini) {
        options.force_gemini_sync = false;
        changed = true;
    }
    if options.force_purecm_sync && consumed(System::PureCm) {
        options.force_purecm_sync = false;
        changed = true;
    }
    if changed {
        config::save_at(home, options)?;
        info!("forced full sync consumed; config updated");
    }
    Ok(changed)
}

/// Load the config, run a single pass and persist consumed force flags.
/// `force` adds forced full syncs on top of the configured ones.
pub fn run_once(home: &Path, force: &[System]) -> Result<PassSummary, SyncError> {
    let mut options = config::load_at(home)?;
    let mut orchestrator = connect_at(home, &options)?;
    for &system in force {
        orchestrator.request_forced_full_sync(system);
    }
    let summary = orchestrator.run_pass();
    clear_consumed_force_flags(home, &mut options, &summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::monitor::MonitorReport;

    fn summary(forced: &[System]) -> PassSummary {
        PassSummary {
            started_at: Utc::now(),
            reports: System::ALL
                .iter()
                .map(|&s| {
                    let report = MonitorReport {
                        forced: forced.contains(&s),
                        ..MonitorReport::default()
                    };
                    (s, report)
                })
                .collect(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn consumed_flag_is_written_back() {
        let home = TempDir::new().expect("home");
        let mut options = Options {
            force_gemini_sync: true,
            force_purecm_sync: true,
            ..Options::default()
        };
        config::save_at(home.path(), &options).expect("save");

        let changed = clear_consumed_force_flags(home.path(), &mut options, &summary(&[System::Gemini]))
            .expect("clear");
        assert!(changed);

        let stored = config::load_at(home.path()).expect("load");
        assert!(!stored.force_gemini_sync);
        assert!(stored.force_purecm_sync);
    }

    #[test]
    fn nothing_written_without_flags() {
        let home = TempDir::new().expect("home");
        let mut options = Options::default();
        let changed = clear_consumed_force_flags(home.path(), &mut options, &summary(&System::ALL))
            .expect("clear");
        assert!(!changed);
        assert!(!tasklink_core::config::config_path_at(home.path()).exists());
    }

    #[test]
    fn run_once_without_config_is_a_config_error() {
        let home = TempDir::new().expect("home");
        let err = run_once(home.path(), &[]).expect_err("no config");
        assert!(matches!(err, SyncError::Config(_)), "got: {err}");
    }
}
