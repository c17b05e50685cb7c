use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{fmt, EnvFilter};

use subscription_sync::config::{self, SyncConfig};
use subscription_sync::pipeline::{EntityStage, LogNotifier, Phase, Pipeline, Stage};
use subscription_sync::submission::{ClientCredentialsProvider, CredentialProvider};
use subscription_sync::{
    resolve, resolve_tenants, snapshot, Assembler, CrmLinks, StaticTemplateStore, SubmissionEngine,
    SubmissionSettings,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    // Fail fast before touching any snapshot
    let sync_config = SyncConfig::from_env().context("invalid configuration")?;
    tracing::info!(config = ?sync_config, "starting subscription sync");

    let templates = match config::TEMPLATE_DIR.as_ref() {
        Some(dir) => StaticTemplateStore::from_dir(dir)?,
        None => StaticTemplateStore::builtin()?,
    };
    let subscriptions = snapshot::load_subscriptions(&sync_config.subscriptions_path).await?;
    let packages = snapshot::load_packages(&sync_config.packages_path).await?;

    let resolved = resolve(&subscriptions);
    let tenants = resolve_tenants(&packages, &resolved);

    let provider: Arc<dyn CredentialProvider> = Arc::new(ClientCredentialsProvider::new(
        sync_config.token_url.clone(),
        sync_config.store_credential.clone(),
    )?);
    let engine = SubmissionEngine::new(
        &sync_config.store_url,
        provider,
        SubmissionSettings::from_config(),
    );
    let assembler = Assembler::new(&templates, CrmLinks::default());

    let mut stages: Vec<Box<dyn Stage + '_>> = Vec::with_capacity(Phase::ALL.len());
    for phase in Phase::ALL {
        stages.push(Box::new(EntityStage::new(
            phase, &assembler, &resolved, &tenants, &engine,
        )));
    }

    let notifier = LogNotifier;
    let pipeline = Pipeline::new(&notifier, sync_config.project_name.clone());
    let outcome = pipeline.run(&stages).await;

    match outcome.failure {
        Some(failure) => bail!(
            "run {} failed during {}: {}",
            outcome.run_id,
            failure.phase,
            failure.error
        ),
        None => {
            tracing::info!(run_id = %outcome.run_id, "subscription sync complete");
            Ok(())
        }
    }
}
