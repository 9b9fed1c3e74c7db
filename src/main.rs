use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use bordereaux::carriers::CarrierRegistry;
use bordereaux::config::{MailboxConfig, PipelineConfig};
use bordereaux::mailbox::{ImapMailbox, Mailbox};
use bordereaux::pipeline::LabelPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mailbox_config = MailboxConfig::from_env().context("mailbox configuration")?;
    let pipeline_config = PipelineConfig::from_env().context("pipeline configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %mailbox_config.imap_host,
        output = %pipeline_config.output_root.display(),
        "Bordereaux starting"
    );

    let pipeline = LabelPipeline::new(pipeline_config, Arc::new(CarrierRegistry::standard()));

    // IMAP and PDF work are blocking.
    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut mailbox = ImapMailbox::connect(&mailbox_config).with_context(|| {
            format!(
                "connecting to {}:{}",
                mailbox_config.imap_host, mailbox_config.imap_port
            )
        })?;
        let report = pipeline.run(&mut mailbox).context("label run failed");
        if let Err(e) = mailbox.logout() {
            warn!(error = %e, "IMAP logout failed");
        }
        report
    })
    .await
    .context("label run task panicked")??;

    info!(
        folder = %report.batch.run_folder.display(),
        labels = report.merged_pages,
        identifiers = report.batch.identifiers.len(),
        failures = report.batch.failures.len(),
        "Done"
    );
    Ok(())
}
