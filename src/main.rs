use candidate_store::{
    config::{get_config, init_config},
    Store,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("IDEAL_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    init_config()?;
    let config = get_config();
    info!(
        "Using data directory {:?} (hash scheme: {})",
        config.data_dir, config.hash_scheme
    );

    let store = Store::open(config).await?;

    let report = store.schema_report().await?;
    if report.is_noop() {
        info!("Schema already up to date");
    } else {
        info!("Schema upgraded: {}", report.applied.join(", "));
    }

    let candidates = store.candidate_service.count().await?;
    let applications = store.application_service.count().await?;
    info!(
        "Store ready: {} candidates, {} applications",
        candidates, applications
    );

    Ok(())
}
