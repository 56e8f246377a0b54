//! Integration tests for Stampcard.
//!
//! Each test spawns the real router on an ephemeral port, backed by the
//! in-memory document store and identity provider, next to a fake loyalty
//! service that can succeed, fail, or hold stamp requests.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stampcard-integration-tests
//! ```
//!
//! Login posts are rate limited per client IP (burst of 5), so a single
//! test should sign in at most five times against one [`TestApp`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use stampcard_core::{Business, BusinessId, CustomerId, NewBusiness, PassTypeIdentifier, Role, UserId, UserRecord};
use stampcard_web::config::AppConfig;
use stampcard_web::db::{BusinessRepository, UserRepository};
use stampcard_web::services::backend::{HttpBackend, LoyaltyBackend};
use stampcard_web::services::identity::{IdentityProvider, MemoryIdentity};
use stampcard_web::services::store::{DocumentStore, FieldValue, Fields, MemoryStore, Query};
use stampcard_web::state::AppState;

/// Password used for every seeded account.
pub const PASSWORD: &str = "correct-horse-battery";

// =============================================================================
// Fake loyalty service
// =============================================================================

/// A `createBusinessUser` call as received.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusinessUser {
    pub business_id: String,
    pub email: String,
    pub password: String,
}

/// Stand-in for the loyalty service.
///
/// Successful stamps increment the customer document the way the real
/// service does; created logins become real accounts in the shared
/// identity provider.
pub struct FakeLoyalty {
    store: Arc<MemoryStore>,
    identity: Arc<MemoryIdentity>,
    fail_stamps: AtomicBool,
    fail_logins: AtomicBool,
    hold_stamps: AtomicBool,
    release: Notify,
    received: Notify,
    stamps: Mutex<Vec<(String, String)>>,
    logins: Mutex<Vec<CreateBusinessUser>>,
}

impl FakeLoyalty {
    fn new(store: Arc<MemoryStore>, identity: Arc<MemoryIdentity>) -> Self {
        Self {
            store,
            identity,
            fail_stamps: AtomicBool::new(false),
            fail_logins: AtomicBool::new(false),
            hold_stamps: AtomicBool::new(false),
            release: Notify::new(),
            received: Notify::new(),
            stamps: Mutex::new(Vec::new()),
            logins: Mutex::new(Vec::new()),
        }
    }

    /// Answer stamp requests with `500`.
    pub fn fail_stamps(&self, fail: bool) {
        self.fail_stamps.store(fail, Ordering::SeqCst);
    }

    /// Answer `createBusinessUser` with `409`.
    pub fn fail_logins(&self, fail: bool) {
        self.fail_logins.store(fail, Ordering::SeqCst);
    }

    /// Keep stamp requests open until [`FakeLoyalty::release_stamp`].
    pub fn hold_stamps(&self, hold: bool) {
        self.hold_stamps.store(hold, Ordering::SeqCst);
    }

    /// Let one held stamp request finish.
    pub fn release_stamp(&self) {
        self.release.notify_one();
    }

    /// Wait until a stamp request has arrived.
    pub async fn stamp_received(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.received.notified())
            .await
            .expect("stamp request never reached the loyalty service");
    }

    /// `(business_id, email)` of every stamp request.
    pub fn stamp_calls(&self) -> Vec<(String, String)> {
        self.stamps.lock().expect("stamps lock").clone()
    }

    /// Every `createBusinessUser` request.
    pub fn login_calls(&self) -> Vec<CreateBusinessUser> {
        self.logins.lock().expect("logins lock").clone()
    }

    async fn increment(&self, business_id: &str, email: &str) {
        let query = Query::collection("customers").filter_eq("businessId", business_id);
        let docs = self.store.query(&query).await.expect("query customers");
        let Some(doc) = docs
            .into_iter()
            .find(|d| d.str("email").is_some_and(|e| e.eq_ignore_ascii_case(email)))
        else {
            return;
        };
        let mut fields = doc.fields.clone();
        let stamps = doc.int("stamps").unwrap_or(0) + 1;
        fields.insert("stamps".into(), FieldValue::Integer(stamps));
        fields.insert("lastStampAt".into(), FieldValue::Timestamp(Utc::now()));
        self.store
            .set_document("customers", &doc.id, fields)
            .await
            .expect("write customer");
    }
}

async fn fake_stamp(
    State(fake): State<Arc<FakeLoyalty>>,
    Path((business_id, email)): Path<(String, String)>,
) -> StatusCode {
    fake.stamps
        .lock()
        .expect("stamps lock")
        .push((business_id.clone(), email.clone()));
    fake.received.notify_one();

    if fake.hold_stamps.load(Ordering::SeqCst) {
        fake.release.notified().await;
    }
    if fake.fail_stamps.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    fake.increment(&business_id, &email).await;
    StatusCode::OK
}

async fn fake_create_business_user(
    State(fake): State<Arc<FakeLoyalty>>,
    Json(request): Json<CreateBusinessUser>,
) -> StatusCode {
    fake.logins.lock().expect("logins lock").push(request.clone());
    if fake.fail_logins.load(Ordering::SeqCst) {
        return StatusCode::CONFLICT;
    }
    let uid = fake.identity.add_account(&request.email, &request.password);
    UserRepository::new(fake.store.as_ref())
        .put(&UserRecord {
            uid,
            email: Some(request.email),
            role: Role::Business,
            business_id: Some(BusinessId::new(request.business_id)),
        })
        .await
        .expect("write user record");
    StatusCode::OK
}

fn serve(router: Router, listener: TcpListener) {
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server");
    });
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{addr}"))
}

// =============================================================================
// Test application
// =============================================================================

/// A running app and handles on everything behind it.
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<MemoryIdentity>,
    pub loyalty: Option<Arc<FakeLoyalty>>,
    pub loyalty_url: Option<String>,
}

impl TestApp {
    /// App with a loyalty service.
    pub async fn spawn() -> Self {
        Self::start(true).await
    }

    /// App with no loyalty service configured.
    pub async fn spawn_without_backend() -> Self {
        Self::start(false).await
    }

    async fn start(with_backend: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(MemoryIdentity::new());

        let (loyalty, loyalty_url) = if with_backend {
            let fake = Arc::new(FakeLoyalty::new(Arc::clone(&store), Arc::clone(&identity)));
            let router = Router::new()
                .route("/api/stamp/{business_id}/{email}", post(fake_stamp))
                .route("/api/admin/createBusinessUser", post(fake_create_business_user))
                .with_state(Arc::clone(&fake));
            let (listener, url) = bind().await;
            serve(router, listener);
            (Some(fake), Some(url))
        } else {
            (None, None)
        };

        let (listener, base_url) = bind().await;
        let mut config = AppConfig::memory(base_url.clone(), loyalty_url.clone());
        config.live_poll_interval = Duration::from_millis(200);
        let backend = loyalty_url.as_deref().map(|url| {
            Arc::new(HttpBackend::new(url).expect("backend client")) as Arc<dyn LoyaltyBackend>
        });
        let state = AppState::from_parts(
            config,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::clone(&identity) as Arc<dyn IdentityProvider>,
            backend,
        );
        serve(stampcard_web::app(state), listener);

        Self {
            base_url,
            store,
            identity,
            loyalty,
            loyalty_url,
        }
    }

    /// The fake loyalty service. Panics for an app spawned without one.
    pub fn loyalty(&self) -> &FakeLoyalty {
        self.loyalty.as_deref().expect("app has no loyalty service")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Browser-like client: keeps cookies, does not follow redirects.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("client")
    }

    /// Create an account with a role record.
    pub async fn add_user(&self, email: &str, role: Role, business_id: Option<&BusinessId>) -> UserId {
        let uid = self.identity.add_account(email, PASSWORD);
        UserRepository::new(self.store.as_ref())
            .put(&UserRecord {
                uid: uid.clone(),
                email: Some(email.to_owned()),
                role,
                business_id: business_id.cloned(),
            })
            .await
            .expect("write user record");
        uid
    }

    /// Create an account with no role record.
    pub fn add_account_without_role(&self, email: &str) -> UserId {
        self.identity.add_account(email, PASSWORD)
    }

    /// Write a business.
    pub async fn seed_business(&self, name: &str, promo: Option<&str>) -> BusinessId {
        BusinessRepository::new(self.store.as_ref())
            .create(&NewBusiness {
                name: name.to_owned(),
                color: "#2196f3".to_owned(),
                goal_stamps: 10,
                promo_message: promo.map(str::to_owned),
                logo_url: None,
                pass_type_identifier: PassTypeIdentifier::parse("pass.com.example.loyalty")
                    .expect("pass type"),
                team_identifier: "TEAM123".to_owned(),
            })
            .await
            .expect("write business")
    }

    /// Read a business back.
    pub async fn business(&self, id: &BusinessId) -> Option<Business> {
        BusinessRepository::new(self.store.as_ref())
            .get(id)
            .await
            .expect("read business")
    }

    /// Write a customer with `stamps` stamps.
    pub async fn seed_customer(
        &self,
        business_id: &BusinessId,
        name: &str,
        email: &str,
        stamps: i64,
    ) -> CustomerId {
        let mut fields = Fields::new();
        fields.insert("name".into(), name.into());
        fields.insert("email".into(), email.into());
        fields.insert("phone".into(), "555-0100".into());
        fields.insert("birthday".into(), "1990-01-01".into());
        fields.insert("businessId".into(), business_id.as_str().into());
        fields.insert("stamps".into(), FieldValue::Integer(stamps));
        let id = self
            .store
            .create_document("customers", fields)
            .await
            .expect("write customer");
        CustomerId::new(id)
    }

    /// Post a login form to `login_path` (`/admin` or `/business`).
    pub async fn login(&self, client: &reqwest::Client, login_path: &str, email: &str) -> reqwest::Response {
        self.login_with(client, login_path, email, PASSWORD).await
    }

    pub async fn login_with(
        &self,
        client: &reqwest::Client,
        login_path: &str,
        email: &str,
        password: &str,
    ) -> reqwest::Response {
        client
            .post(self.url(login_path))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("login request")
    }

    /// A client signed in as the owner of `business_id`.
    pub async fn business_client(&self, business_id: &BusinessId) -> reqwest::Client {
        let email = format!("owner-{}@example.com", business_id.as_str().to_lowercase());
        self.add_user(&email, Role::Business, Some(business_id)).await;
        let client = self.client();
        let response = self.login(&client, "/business", &email).await;
        assert_eq!(response.status(), 303, "business login failed");
        client
    }

    /// A client signed in as an admin.
    pub async fn admin_client(&self) -> reqwest::Client {
        self.add_user("admin@example.com", Role::Admin, None).await;
        let client = self.client();
        let response = self.login(&client, "/admin", "admin@example.com").await;
        assert_eq!(response.status(), 303, "admin login failed");
        client
    }

    /// GET a page and return its status and body.
    pub async fn page(&self, client: &reqwest::Client, path: &str) -> (reqwest::StatusCode, String) {
        let response = client.get(self.url(path)).send().await.expect("request");
        let status = response.status();
        (status, response.text().await.expect("body"))
    }
}

/// `Location` header of a redirect.
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Poll `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// The roster row (`<tr>...</tr>`) for `email` in a rendered dashboard.
pub fn customer_row<'a>(html: &'a str, email: &str) -> Option<&'a str> {
    let needle = format!("name=\"email\" value=\"{email}\"");
    html.split("<tr").find(|row| row.contains(&needle))
}

/// Stamp count shown in a roster row.
pub fn stamps_in_row(row: &str) -> Option<u32> {
    let start = row.find("data-stamps>")? + "data-stamps>".len();
    let digits: String = row
        .get(start..)?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Read a server-sent event stream until a chunk satisfies `check`.
pub async fn read_stream_until<F>(response: &mut reqwest::Response, mut check: F) -> bool
where
    F: FnMut(&str) -> bool,
{
    let mut seen = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while let Ok(Ok(Some(chunk))) =
        tokio::time::timeout_at(deadline, response.chunk()).await
    {
        seen.push_str(&String::from_utf8_lossy(&chunk));
        if check(&seen) {
            return true;
        }
    }
    false
}
