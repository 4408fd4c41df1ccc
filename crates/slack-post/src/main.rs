use anyhow::Context;
use clap::Parser;
use tokio::runtime::Runtime;
use tracing::info;

use slack_post::cli::Cli;
use slack_post::config::{Config, FileConfig};
use slack_post::report;
use slack_post::sink::{Sink, StdoutSink, WebhookSink};
use slack_post::telemetry::{get_subscriber, init_subscriber, level_for};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(get_subscriber(level_for(cli.verbose), cli.log_json));

    let file = FileConfig::load(cli.config.as_deref()).context("Loading configuration")?;
    let config = Config::resolve(cli.overrides(), file).context("Resolving configuration")?;

    let sink: Box<dyn Sink> = if cli.dry_run {
        Box::new(StdoutSink)
    } else {
        Box::new(WebhookSink::new(config.webhook_url()?))
    };

    let request = cli.request();
    let rt = Runtime::new()?;
    let report = rt
        .block_on(report::run(&config, &request, sink.as_ref()))
        .context("Posting to Slack")?;

    // Exit code: 0 unless asked to mirror the wrapped command
    match report.command_exit {
        Some(code) if code != 0 && cli.propagate_exit => {
            info!(code, "propagating wrapped command exit code");
            std::process::exit(code);
        }
        Some(code) if code != 0 => {
            info!(code, "wrapped command failed; exiting 0");
        }
        _ => {}
    }
    Ok(())
}
