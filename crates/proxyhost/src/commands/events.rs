//! `proxyhost events`: stream a feed without running an engine.

use proxyhost_core::EventIngestion;

use crate::cli::{EventsArgs, GlobalOpts};
use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{self, Style};

pub async fn handle(args: &EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.port == 0 {
        return Err(CliError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }

    let (cfg, path) = load_config(global)?;
    let mut host = cfg.host_config().map_err(|e| CliError::config(&path, e))?;
    if let Some(ms) = args.batch_ms {
        host.ingest.batch_window = std::time::Duration::from_millis(ms);
    }
    // Validate the URL up front so a bad scheme fails loudly instead of idling.
    host.ingest
        .endpoint
        .url_for(args.port)
        .map_err(|e| CliError::Feed {
            message: e.to_string(),
        })?;

    let style = Style::new(global.output, global.color);
    let ingestion = EventIngestion::fixed(host.ingest, args.port);
    let mut batches = ingestion.batches();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut seen = 0_usize;
    let result = 'outer: loop {
        tokio::select! {
            signal = &mut interrupt => break signal.map_err(CliError::from),
            batch = batches.next_batch() => {
                let Some(batch) = batch else { break Ok(()) };
                for event in batch {
                    println!("{}", output::render_event(&style, &event));
                    seen += 1;
                    if args.limit.is_some_and(|limit| seen >= limit) {
                        break 'outer Ok(());
                    }
                }
            }
        }
    };

    ingestion.shutdown().await;
    result
}
