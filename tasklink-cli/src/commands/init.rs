//! `tasklink init`: write the default config.

use anyhow::{Context, Result};
use clap::Args;

use tasklink_core::{config, Options};

use super::home_dir;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Base URL of the Gemini web application.
    #[arg(long)]
    pub gemini_url: Option<String>,

    /// Gemini API user.
    #[arg(long)]
    pub gemini_user: Option<String>,

    /// Base URL of the PureCM REST gateway.
    #[arg(long)]
    pub purecm_url: Option<String>,

    /// PureCM repository holding the task ledger.
    #[arg(long)]
    pub repository: Option<String>,

    /// Seconds between daemon passes.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let path = config::config_path_at(&home);
        if path.exists() {
            println!("config already exists: {}", path.display());
            return Ok(());
        }

        let options = self.into_options();
        config::init_at(&home, &options)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!("✓ Wrote {}", path.display());
        if options.gemini.url.is_empty() || options.purecm.url.is_empty() {
            println!("  Fill in the Gemini and PureCM endpoints before running `tasklink sync`.");
        }
        Ok(())
    }

    fn into_options(self) -> Options {
        let mut options = Options::default();
        if let Some(url) = self.gemini_url {
            options.gemini.url = url;
        }
        if let Some(user) = self.gemini_user {
            options.gemini.user = user;
        }
        if let Some(url) = self.purecm_url {
            options.purecm.url = url;
        }
        if let Some(repository) = self.repository {
            options.purecm.repository = repository;
        }
        if let Some(interval) = self.interval {
            options.interval_secs = interval;
        }
        options
    }
}
