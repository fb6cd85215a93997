//! Certifier Service Binary
//!
//! Runs the HTTP API and, when configured, the framed TCP listener.

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use certifier_core::{Certifier, KeyPair, PolicyIndex};
use certifier_service::{
    create_router,
    keys::{load_policy_file, load_policy_key},
    serve_framed, AppState, EventLog, FileEventLog, MemoryEventLog, PolicyAuthority,
    ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let key_pair = match &config.policy_key_file {
        Some(path) => load_policy_key(path, &config.policy_key_name)?,
        None => {
            warn!("CERTIFIER_POLICY_KEY_FILE not set; using an ephemeral policy key");
            KeyPair::generate(&config.policy_key_name)
        }
    };

    let statements = match &config.policy_file {
        Some(path) => load_policy_file(path)?,
        None => {
            warn!("CERTIFIER_POLICY_FILE not set; every request will fail for lack of policy");
            Vec::new()
        }
    };

    let index = PolicyIndex::build(statements);
    let certifier = Certifier::new(key_pair.entity(), index);
    let authority = PolicyAuthority::new(key_pair, config.credential_duration);

    let events: Arc<dyn EventLog> = match &config.event_log_dir {
        Some(dir) => Arc::new(FileEventLog::open(dir.clone()).await?),
        None => Arc::new(MemoryEventLog::with_capacity(config.event_log_capacity)),
    };

    info!(
        policy_kid = %authority.kid(),
        policy_statements = certifier.index().len(),
        measurement_policies = certifier.index().measurement_count(),
        platform_key_policies = certifier.index().platform_key_count(),
        credential_duration_secs = config.credential_duration.num_seconds(),
        "Starting certifier service"
    );

    let state = Arc::new(AppState::new(certifier, authority, events));

    if let Some(addr) = config.framed_addr() {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = serve_framed(listener, state).await {
                error!(error = %e, "Framed transport stopped");
            }
        });
    }

    let app = create_router(state);
    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Certifier HTTP API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
