//! Support Bot Console Entry Point
//!
//! Reads one utterance per line from stdin and feeds it through the turn
//! dispatcher as a single console conversation.
//!
//! Commands:
//! - `/metrics` prints the Prometheus exposition of the dialog counters
//! - `/state` prints the stored dialog stack
//! - `/reset` ends the conversation and starts over
//! - `/quit` exits

mod channel;

use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use supportbot_config::{load_settings, Settings};
use supportbot_core::Activity;
use supportbot_dialog::{DispatcherConfig, TurnDispatcher, TurnOutcome};

use channel::ConsoleChannel;

const USER_ID: &str = "console-user";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("SUPPORTBOT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting Support Bot v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if config.observability.metrics_enabled {
        init_metrics()
    } else {
        None
    };

    let classifier = supportbot_nlu::build_classifier(&config.classifier)
        .context("failed to build intent classifier")?;
    let store = supportbot_persistence::build_store(&config.persistence)
        .await
        .context("failed to open state store")?;
    let registry = supportbot_flows::build_registry_with(&config.dialog, &config.bot)
        .context("failed to build dialog registry")?;

    tracing::info!(
        dialogs = registry.len(),
        classifier = classifier.name(),
        store = store.backend(),
        "Initialized dialog engine"
    );

    let dispatcher = TurnDispatcher::new(
        Arc::new(registry),
        classifier,
        store,
        Arc::new(ConsoleChannel::new("frankie")),
        DispatcherConfig::from_settings(&config.dialog, &config.classifier),
    );

    let mut conversation_id = new_conversation_id();
    println!("Type a message to talk to the bot, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" => break,
            "/metrics" => match &metrics_handle {
                Some(handle) => println!("{}", handle.render()),
                None => println!("Metrics are disabled"),
            },
            "/state" => {
                let state = dispatcher.conversation_state(&conversation_id).await?;
                println!("{}", serde_json::to_string_pretty(&state)?);
            }
            "/reset" => {
                dispatcher.end_conversation(&conversation_id).await?;
                conversation_id = new_conversation_id();
                println!("Conversation reset");
            }
            text => {
                let activity = Activity::message(&conversation_id, USER_ID, text);
                match dispatcher.handle(&activity).await {
                    Ok(report) => {
                        tracing::debug!(
                            outcome = report.outcome.as_str(),
                            top = %report.top_dialog,
                            depth = report.depth,
                            "Turn complete"
                        );
                        if report.outcome == TurnOutcome::ConversationEnded {
                            conversation_id = new_conversation_id();
                            println!("-- conversation ended, starting a new one --");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Turn failed");
                        println!("Sorry, something went wrong. Please try again.");
                    }
                }
            }
        }
    }

    tracing::info!("Console session closed");
    Ok(())
}

fn new_conversation_id() -> String {
    format!("console-{}", uuid::Uuid::new_v4())
}

/// Initialize tracing
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("supportbot={}", level).into()
    });

    // Logs go to stderr so they don't interleave with the conversation
    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}

/// Install the Prometheus recorder and describe the dialog counters
fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            supportbot_dialog::metrics::describe();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install metrics recorder");
            None
        }
    }
}
