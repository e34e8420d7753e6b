//! `proxyhost run`: drive an engine from the config file until interrupted.

use std::time::Duration;

use proxyhost_config::Mode;
use proxyhost_core::{
    Engine, HostContext, InstanceEngine, InstanceStore, ProfileEngine, ProfileStore,
    ServiceHooks, SnapshotSource,
};

use crate::cli::{GlobalOpts, RunArgs, RunMode};
use crate::commands::load_config;
use crate::error::CliError;
use crate::factory::{ListenerFactory, ProfileListenerFactory};
use crate::output::{self, Style};

/// Reports coordinator callbacks on stderr.
struct TerminalHooks;

impl ServiceHooks for TerminalHooks {
    fn start_service(&self) {
        tracing::info!("proxy service up");
    }

    fn stop_service(&self) {
        tracing::info!("proxy service down");
    }

    fn report_failure(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, path) = load_config(global)?;
    let host = cfg.host_config().map_err(|e| CliError::config(&path, e))?;
    let style = Style::new(global.output, global.color);

    let mode = match args.mode {
        Some(RunMode::Instances) => Mode::Instances,
        Some(RunMode::Profile) => Mode::Profile,
        None => cfg.mode,
    };
    tracing::info!(?mode, config = %path.display(), "starting");

    match mode {
        Mode::Instances => {
            let records = cfg
                .instance_records()
                .map_err(|e| CliError::config(&path, e))?;
            let context = HostContext::start(
                &host,
                InstanceStore::with_records(records)?,
                InstanceEngine::new(ListenerFactory),
                TerminalHooks,
            )?;
            drive(context, args, style, output::render_instances).await
        }
        Mode::Profile => {
            let set = cfg.profile_set().map_err(|e| CliError::config(&path, e))?;
            let context = HostContext::start(
                &host,
                ProfileStore::with_set(set)?,
                ProfileEngine::new(ProfileListenerFactory::default()),
                TerminalHooks,
            )?;
            drive(context, args, style, output::render_profile).await
        }
    }
}

/// Print state changes and events until Ctrl-C or `--stop-after`.
async fn drive<S, E>(
    context: HostContext<S, E>,
    args: &RunArgs,
    style: Style,
    render: fn(&Style, &E::State) -> String,
) -> Result<(), CliError>
where
    S: SnapshotSource,
    E: Engine<Snapshot = S::Snapshot>,
{
    let mut states = context.engine().stream();
    let mut batches = context.ingestion().batches();
    let show_events = !args.no_events;

    let deadline = async {
        match args.stop_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    println!("{}", render(&style, states.current()));
    let result = loop {
        tokio::select! {
            signal = &mut interrupt => {
                break signal.map_err(CliError::from);
            }
            () = &mut deadline => break Ok(()),
            view = states.changed() => {
                let Some(view) = view else { break Ok(()) };
                println!("{}", render(&style, &view));
            }
            // Cancel-safe: a window interrupted here resumes on the next turn.
            batch = batches.next_batch(), if show_events => {
                for event in batch.into_iter().flatten() {
                    println!("{}", output::render_event(&style, &event));
                }
            }
        }
    };

    context.shutdown().await;
    result
}
