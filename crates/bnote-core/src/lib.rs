pub mod alert;
pub mod carousel;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod group;
pub mod note;
pub mod render;
pub mod store;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use crate::dashboard::{Dashboard, Tuning};
use crate::store::{LocalStore, SystemClock};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting bnote CLI");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.bnoterc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let store = LocalStore::open(&data_dir)
        .with_context(|| format!("failed to open local store at {}", data_dir.display()))?;

    let mut renderer = render::Renderer::new(&cfg)?;
    let inv = cli::Invocation::parse(&cfg, cli.rest)?;

    let mut dash = Dashboard::new(store, SystemClock, Tuning::from_config(&cfg));
    let result = commands::dispatch(&mut dash, &cfg, &mut renderer, inv);
    dash.close();
    result?;

    info!("done");
    Ok(())
}
