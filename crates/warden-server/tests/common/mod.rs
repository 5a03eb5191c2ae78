//! Shared test helpers for server integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt;
use warden_core::clock::Clock;
use warden_core::projection::ProjectionHandler;
use warden_event_store::memory_event_store::InMemoryEventStore;
use warden_event_store::memory_locker::InMemoryLocker;
use warden_event_store::memory_watermark_store::InMemoryWatermarkStore;
use warden_iam::application::projections::IamMemberProjection;
use warden_iam::infrastructure::memory_views::InMemoryIamMemberViews;
use warden_policy::application::projections::{
    LockoutPolicyProjection, MailTextProjection, OrgIamPolicyProjection,
};
use warden_policy::domain::events::{LockoutSettings, OrgIamSettings};
use warden_policy::infrastructure::memory_views::{InMemoryMailTextViews, InMemoryPolicyViews};
use warden_spooler::{Spooler, SpoolerConfig, SpoolerHandle};
use warden_test_support::FixedClock;

use warden_server::state::AppState;

/// Fixed timestamp used across all integration tests.
pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// In-memory wiring of every store and projection the binary runs.
pub struct TestApp {
    pub store: Arc<InMemoryEventStore>,
    pub watermarks: Arc<InMemoryWatermarkStore>,
    pub lockout_policies: Arc<InMemoryPolicyViews<LockoutSettings>>,
    pub org_iam_policies: Arc<InMemoryPolicyViews<OrgIamSettings>>,
    pub mail_texts: Arc<InMemoryMailTextViews>,
    pub iam_members: Arc<InMemoryIamMemberViews>,
    pub spooler: SpoolerHandle,
    shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// Starts a spooler over empty in-memory stores. Loops cycle every 10ms.
    pub async fn start() -> Self {
        let clock = fixed_clock();
        let store = Arc::new(InMemoryEventStore::new());
        let watermarks = Arc::new(InMemoryWatermarkStore::new(clock.clone()));
        let lockout_policies = Arc::new(InMemoryPolicyViews::<LockoutSettings>::new());
        let org_iam_policies = Arc::new(InMemoryPolicyViews::<OrgIamSettings>::new());
        let mail_texts = Arc::new(InMemoryMailTextViews::new());
        let iam_members = Arc::new(InMemoryIamMemberViews::new());
        let cycle = Duration::from_millis(10);

        let handlers: Vec<Arc<dyn ProjectionHandler>> = vec![
            Arc::new(LockoutPolicyProjection::new(lockout_policies.clone()).with_cycle(cycle)),
            Arc::new(OrgIamPolicyProjection::new(org_iam_policies.clone()).with_cycle(cycle)),
            Arc::new(MailTextProjection::new(mail_texts.clone()).with_cycle(cycle)),
            Arc::new(IamMemberProjection::new(iam_members.clone()).with_cycle(cycle)),
        ];
        let spooler = handlers.into_iter().fold(
            Spooler::new(
                SpoolerConfig::new("test-instance"),
                store.clone(),
                Arc::new(InMemoryLocker::new(Arc::new(warden_core::clock::SystemClock))),
                watermarks.clone(),
            )
            .with_clock(clock),
            Spooler::register,
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let spooler = spooler.start(shutdown_rx).await;

        Self {
            store,
            watermarks,
            lockout_policies,
            org_iam_policies,
            mail_texts,
            iam_members,
            spooler,
            shutdown,
        }
    }

    /// The router over this wiring.
    pub fn router(&self) -> Router {
        warden_server::app(AppState {
            iam_id: "iam".to_owned(),
            status: self.spooler.status(),
            resets: self.spooler.resets(),
            watermarks: self.watermarks.clone(),
            lockout_policies: self.lockout_policies.clone(),
            org_iam_policies: self.org_iam_policies.clone(),
            mail_texts: self.mail_texts.clone(),
            iam_members: self.iam_members.clone(),
        })
    }

    /// Polls until `view` reports a finished cycle at `watermark` or later.
    pub async fn wait_for_watermark(&self, view: &str, watermark: i64) {
        for _ in 0..200 {
            if let Some(status) = self.spooler.status().get(view).await {
                if status.watermark >= watermark {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{view} never reached watermark {watermark}");
    }

    /// Signals shutdown and waits for the loops.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        self.spooler.join().await;
    }
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri).await
}

/// Send a body-less POST request and return the status.
pub async fn post_empty(app: Router, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap().status()
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
