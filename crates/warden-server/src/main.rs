//! Warden server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use warden_core::clock::SystemClock;
use warden_core::registry::SchemaSet;
use warden_event_store::pg_event_store::PgEventStore;
use warden_event_store::pg_locker::PgLocker;
use warden_event_store::pg_watermark_store::PgWatermarkStore;
use warden_event_store::schema::MIGRATOR;
use warden_iam::application::projections::IamMemberProjection;
use warden_iam::infrastructure::pg_views::PgIamMemberViews;
use warden_policy::application::projections::{
    LockoutPolicyProjection, MailTextProjection, OrgIamPolicyProjection,
};
use warden_policy::infrastructure::pg_views::{
    PgLockoutPolicyViews, PgMailTextViews, PgOrgIamPolicyViews,
};
use warden_server::config::ServerConfig;
use warden_server::error::AppError;
use warden_server::setup::ensure_default_policies;
use warden_server::state::AppState;
use warden_spooler::{Spooler, SpoolerConfig};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(instance = %config.instance_id, "starting Warden server");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let schema = SchemaSet::new()
        .with(Arc::new(warden_policy::domain::events::registry()))
        .with(Arc::new(warden_iam::domain::events::registry()));
    let store = Arc::new(PgEventStore::new(pool.clone()).with_schema(Arc::new(schema)));
    ensure_default_policies(&config.iam_id, &SystemClock, store.as_ref()).await?;

    let lockout_policies = Arc::new(PgLockoutPolicyViews::new(pool.clone()));
    let org_iam_policies = Arc::new(PgOrgIamPolicyViews::new(pool.clone()));
    let mail_texts = Arc::new(PgMailTextViews::new(pool.clone()));
    let iam_members = Arc::new(PgIamMemberViews::new(pool.clone()));
    let watermarks = Arc::new(PgWatermarkStore::new(pool.clone()));

    let spooler_config = SpoolerConfig::new(config.instance_id.clone())
        .with_lock_wait(config.lock_wait)
        .with_batch_size(config.batch_size);
    let spooler = Spooler::new(
        spooler_config,
        store,
        Arc::new(PgLocker::new(pool.clone())),
        watermarks.clone(),
    )
    .register(Arc::new(LockoutPolicyProjection::new(lockout_policies.clone())))
    .register(Arc::new(OrgIamPolicyProjection::new(org_iam_policies.clone())))
    .register(Arc::new(MailTextProjection::new(mail_texts.clone())))
    .register(Arc::new(IamMemberProjection::new(iam_members.clone())));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let spooler = spooler.start(shutdown_rx.clone()).await;

    let app_state = AppState {
        iam_id: config.iam_id.clone(),
        status: spooler.status(),
        resets: spooler.resets(),
        watermarks,
        lockout_policies,
        org_iam_policies,
        mail_texts,
        iam_members,
    };
    let app = warden_server::app(app_state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    spooler.join().await;
    tracing::info!("stopped");
    Ok(())
}
