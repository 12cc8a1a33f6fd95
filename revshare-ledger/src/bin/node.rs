//! Revenue-sharing ledger node
//!
//! Opens the persistent store, starts the sequencer and feeds it
//! transactions read from stdin, one JSON `Transaction` per line:
//!
//! ```text
//! {"caller":"ST1OWNER","operation":{"DistributeRevenue":{"project_id":1,"amount":250}}}
//! ```
//!
//! Each line gets one JSON reply on stdout, either `{"ok": <outcome>}` or
//! `{"error": {"code", "kind", "message"}}`. Logs go to stderr. The node
//! stops at end of input or on ctrl-c.
//!
//! Configuration comes from the TOML file named by the first argument (or
//! `REVSHARE_CONFIG`), overlaid with `REVSHARE_*` environment variables.

use anyhow::Context;
use revshare_ledger::{spawn_sequencer, Config, Ledger, SequencerHandle, Table, Transaction};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<Config> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REVSHARE_CONFIG").ok());

    let config = match path {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?
            .with_env_overrides()?,
        None => Config::from_env()?,
    };
    Ok(config)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn error_reply(code: u32, kind: &str, message: String) -> Value {
    json!({ "error": { "code": code, "kind": kind, "message": message } })
}

/// Run one input line through the sequencer and build its reply
async fn handle_line(sequencer: &SequencerHandle, line: &str) -> Value {
    let transaction: Transaction = match serde_json::from_str(line) {
        Ok(transaction) => transaction,
        Err(err) => {
            warn!(error = %err, "Malformed transaction");
            return error_reply(0, "malformed", err.to_string());
        }
    };

    match sequencer
        .submit(transaction.caller, transaction.operation)
        .await
    {
        Ok(outcome) => json!({ "ok": outcome }),
        Err(err) => error_reply(err.code(), err.kind().as_str(), err.to_string()),
    }
}

async fn serve_stdin(sequencer: SequencerHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = handle_line(&sequencer, line).await;
        stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("End of input");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(config.log_json);

    info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting revenue-sharing ledger node"
    );

    let ledger = Ledger::open(&config)
        .with_context(|| format!("opening ledger at {}", config.data_dir.display()))?;
    let ledger = Arc::new(ledger);
    info!(
        projects = ledger.project_count()?,
        events = ledger.store().approximate_count(Table::Events)?,
        sealed = ?ledger.chain_height()?,
        "Ledger opened"
    );

    let sequencer = spawn_sequencer(ledger.clone(), &config.sequencer)?;
    info!(height = sequencer.height().await?, "Sequencer running");

    tokio::select! {
        result = serve_stdin(sequencer.clone()) => {
            if let Err(err) = result {
                error!("Input loop failed: {}", err);
            }
        }
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received shutdown signal"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
    }

    sequencer.shutdown().await?;
    info!(height = ?ledger.chain_height()?, "Node stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revshare_ledger::config::SequencerConfig;

    #[tokio::test]
    async fn test_handle_line_replies() {
        let ledger = Arc::new(Ledger::in_memory().unwrap());
        let sequencer = spawn_sequencer(ledger, &SequencerConfig::default()).unwrap();

        let hash = serde_json::to_string(&vec![1u8; 32]).unwrap();
        let create = format!(
            r#"{{"caller":"ST1OWNER","operation":{{"CreateProject":{{"title":"Song","content_hash":{},"license_type":"MIT"}}}}}}"#,
            hash
        );
        let reply = handle_line(&sequencer, &create).await;
        assert_eq!(reply, json!({ "ok": { "ProjectCreated": 1 } }));

        let reply = handle_line(
            &sequencer,
            r#"{"caller":"ST1OTHER","operation":{"DeactivateProject":{"project_id":1}}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], 300);
        assert_eq!(reply["error"]["kind"], "unauthorized");

        let reply = handle_line(&sequencer, "not json").await;
        assert_eq!(reply["error"]["kind"], "malformed");

        sequencer.shutdown().await.unwrap();
    }
}
