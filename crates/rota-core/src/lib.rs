pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod duration;
pub mod grid;
pub mod holidays;
pub mod model;
pub mod pending;
pub mod period;
pub mod quick_add;
pub mod render;
pub mod rows;
pub mod session;
pub mod store;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting rota CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rotarc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    store::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open store at {}",
          data_dir.display()
        )
      })?;
  let local =
    cache::LocalState::open(&data_dir)?;

  let tz = datetime::resolve_timezone(&cfg);
  let today = datetime::today(&tz);
  let mut session = session::Session::new(
    store,
    Some(local),
    cfg.country()?,
    today,
    cfg.view_mode()?
  );
  let source = session.load()?;
  debug!(?source, "session loaded");

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &mut session,
    &renderer,
    today,
    inv
  )?;

  info!("done");
  Ok(())
}
