//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.
//!
//! [`MockBackend`] is a small in-process stand-in for the habit tracker
//! REST API. It issues numbered token pairs, counts every request it
//! receives, and can hold `POST /entries` and `POST /auth/refresh` calls
//! until a test answers them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Request, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

use crate::api::RequestGateway;
use crate::config::{ApiConfig, Config, StorageConfig};
use crate::models::{EntryRequest, Habit, HabitDraft, HabitUpdate};
use crate::storage::{Database, MemoryStore, TokenPair};
use crate::sync::{HabitCompletionView, HabitEntryView};
use crate::tokens::SessionManager;
use crate::AppState;

pub const TEST_EMAIL: &str = "user@example.com";
pub const TEST_PASSWORD: &str = "correct-horse";

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard; the caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A minimal `Config` pointing at `base_url`.
pub fn test_config(base_url: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        },
        storage: StorageConfig {
            data_dir: "/tmp/test".to_string(),
        },
    }
}

/// Build a view from `(habit_id, completed, is_physical)` rows with
/// consistent aggregates.
pub fn make_view(rows: &[(&str, bool, bool)]) -> HabitCompletionView {
    let entries = rows
        .iter()
        .map(|&(id, completed, is_physical)| HabitEntryView {
            category: if is_physical { "physical" } else { "general" }.to_string(),
            completed,
            entry_id: None,
            habit_id: id.to_string(),
            is_physical,
            name: format!("Habit {id}"),
            notes: None,
        })
        .collect::<Vec<_>>();

    let mut view = HabitCompletionView {
        completion_count: 0,
        completion_rate: 0.0,
        date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        total_habits: entries.len() as u32,
        entries,
        physical_completed: false,
    };
    view.recompute();
    view
}

/// HTTP client with proxy disabled (avoids macOS system-configuration
/// panics in sandboxed tests).
fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

// ============================================================================
// Clients
// ============================================================================

pub struct TestClient {
    pub gateway: Arc<RequestGateway>,
    pub session: Arc<SessionManager>,
    pub store: Arc<MemoryStore>,
}

fn client_with(backend: &MockBackend, store: Arc<MemoryStore>) -> TestClient {
    let http = http_client();
    let session = Arc::new(SessionManager::new(
        &backend.base_url,
        http.clone(),
        store.clone(),
    ));
    let gateway = Arc::new(RequestGateway::new(
        &backend.base_url,
        http,
        Arc::clone(&session),
    ));
    TestClient {
        gateway,
        session,
        store,
    }
}

/// Client holding no tokens.
pub fn signed_out_client(backend: &MockBackend) -> TestClient {
    client_with(backend, Arc::new(MemoryStore::new()))
}

/// Client resuming the pair the backend currently accepts.
pub async fn authed_client(backend: &MockBackend) -> TestClient {
    let client = client_with(
        backend,
        Arc::new(MemoryStore::with_pair(backend.state.current_pair())),
    );
    assert!(client.session.is_authenticated().await);
    client
}

/// Full application state, signed in against `backend`.
pub async fn test_app(backend: &MockBackend) -> Arc<AppState> {
    let store = Arc::new(MemoryStore::with_pair(backend.state.current_pair()));
    let app = AppState::with_client(test_config(&backend.base_url), store, http_client());
    assert!(app.session.is_authenticated().await);
    Arc::new(app)
}

// ============================================================================
// Mock backend
// ============================================================================

pub struct MockBackend {
    /// Root of the mocked API, e.g. `http://127.0.0.1:41234/api`
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/habits", get(list_habits).post(create_habit))
            .route("/habits/:id", put(update_habit).delete(delete_habit))
            .route("/entries", post(create_entry))
            .route("/entries/today", get(today_entries))
            .route("/entries/date/:date", get(date_entries))
            .route("/entries/week/:week_start", get(week_entries))
            .route("/analytics/today", get(today_stats))
            .route("/analytics/week", get(week_analytics))
            .route("/analytics/week/:week_start", get(week_analytics))
            .route("/analytics/month", get(month_analytics))
            .route("/analytics/month/:year/:month", get(month_analytics))
            .route("/analytics/trends", get(trends));

        let app = Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }
}

/// A held `POST /entries` call waiting for the test to answer it.
pub struct PendingEntry {
    pub request: EntryRequest,
    reply: oneshot::Sender<bool>,
}

impl PendingEntry {
    /// Let the entry through: it is stored and answered with 201.
    pub fn confirm(self) {
        let _ = self.reply.send(true);
    }

    /// Reject the entry with a 400.
    pub fn fail(self) {
        let _ = self.reply.send(false);
    }
}

/// A held `POST /auth/refresh` call. The token it presented was already
/// accepted; the new pair is issued once it is released.
pub struct PendingRefresh {
    release: oneshot::Sender<()>,
}

impl PendingRefresh {
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

pub struct MockState {
    /// Every access token issued and not yet expired
    active_access: Mutex<HashSet<String>>,
    completed: Mutex<HashSet<String>>,
    entry_hold: Mutex<Option<mpsc::UnboundedSender<PendingEntry>>>,
    fail_today: AtomicBool,
    habits: Mutex<Vec<Habit>>,
    hits: Mutex<Vec<String>>,
    issued: AtomicUsize,
    malformed_refresh: AtomicBool,
    next_habit: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_hold: Mutex<Option<mpsc::UnboundedSender<PendingRefresh>>>,
    reject_all: AtomicBool,
    tokens: Mutex<TokenPair>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

fn seed_habit(id: &str, name: &str, category: &str, is_physical: bool) -> Habit {
    Habit {
        category: category.to_string(),
        created_at: None,
        display_order: 0,
        goal_threshold: 80,
        id: id.to_string(),
        is_active: true,
        is_physical,
        name: name.to_string(),
        target_per_week: 7,
        weight: 5,
    }
}

impl MockState {
    fn new() -> Self {
        let state = Self {
            active_access: Mutex::new(HashSet::new()),
            completed: Mutex::new(HashSet::new()),
            entry_hold: Mutex::new(None),
            fail_today: AtomicBool::new(false),
            habits: Mutex::new(vec![
                seed_habit("h1", "Meditate", "mindfulness", false),
                seed_habit("h2", "Run", "physical", true),
                seed_habit("h3", "Read", "learning", false),
            ]),
            hits: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
            malformed_refresh: AtomicBool::new(false),
            next_habit: AtomicUsize::new(4),
            refresh_calls: AtomicUsize::new(0),
            refresh_hold: Mutex::new(None),
            reject_all: AtomicBool::new(false),
            tokens: Mutex::new(TokenPair::new("", "")),
        };
        state.issue();
        state
    }

    fn issue(&self) -> TokenPair {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let pair = TokenPair::new(format!("access-{n}"), format!("refresh-{n}"));
        lock(&self.active_access).insert(pair.access_token.clone());
        *lock(&self.tokens) = pair.clone();
        pair
    }

    /// The pair most recently issued. Only its refresh token is accepted.
    pub fn current_pair(&self) -> TokenPair {
        lock(&self.tokens).clone()
    }

    /// Number of requests received for `"METHOD /path?query"`, with the
    /// `/api` prefix stripped.
    pub fn hits(&self, key: &str) -> usize {
        lock(&self.hits).iter().filter(|k| *k == key).count()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Invalidate every access token issued so far; the latest refresh
    /// token stays valid.
    pub fn expire_access_token(&self) {
        lock(&self.active_access).clear();
    }

    pub fn revoke_refresh_token(&self) {
        lock(&self.tokens).refresh_token = "revoked-refresh".to_string();
    }

    /// Answer every authenticated request with 401.
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Answer refreshes with a 200 whose body is not JSON.
    pub fn set_malformed_refresh(&self, malformed: bool) {
        self.malformed_refresh.store(malformed, Ordering::SeqCst);
    }

    /// Answer `GET /entries/today` with a 500.
    pub fn set_fail_today(&self, fail: bool) {
        self.fail_today.store(fail, Ordering::SeqCst);
    }

    /// Hold every later `POST /entries` until the returned receiver's
    /// items are answered.
    pub fn hold_entries(&self) -> mpsc::UnboundedReceiver<PendingEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.entry_hold) = Some(tx);
        rx
    }

    /// Hold every later `POST /auth/refresh` until released.
    pub fn hold_refreshes(&self) -> mpsc::UnboundedReceiver<PendingRefresh> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.refresh_hold) = Some(tx);
        rx
    }

    /// Change a habit's status for today behind the client's back.
    pub fn set_completed(&self, habit_id: &str, completed: bool) {
        let mut done = lock(&self.completed);
        if completed {
            done.insert(habit_id.to_string());
        } else {
            done.remove(habit_id);
        }
    }

    pub fn is_completed(&self, habit_id: &str) -> bool {
        lock(&self.completed).contains(habit_id)
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let accepted = !self.reject_all.load(Ordering::SeqCst)
            && presented.is_some_and(|token| lock(&self.active_access).contains(token));

        if accepted {
            Ok(())
        } else {
            Err(error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
        }
    }

    fn today_view(&self) -> Value {
        self.day_view(self.today())
    }

    /// Completions are only tracked for today; other days read as empty.
    fn day_view(&self, date: NaiveDate) -> Value {
        let habits = lock(&self.habits).clone();
        let done = if date == self.today() {
            lock(&self.completed).clone()
        } else {
            HashSet::new()
        };

        let entries = habits
            .iter()
            .filter(|h| h.is_active)
            .map(|h| {
                let completed = done.contains(&h.id);
                json!({
                    "habit_id": h.id,
                    "habit_name": h.name,
                    "category": h.category,
                    "is_physical": h.is_physical,
                    "completed": completed,
                    "entry_id": completed.then(|| format!("e-{}", h.id)),
                    "notes": null,
                })
            })
            .collect::<Vec<_>>();

        let total = entries.len();
        let count = entries.iter().filter(|e| e["completed"] == true).count();
        let physical_completed = entries
            .iter()
            .any(|e| e["completed"] == true && e["is_physical"] == true);
        // The backend rounds to one decimal
        let rate = (1000.0 * count as f64 / total.max(1) as f64).round() / 10.0;

        json!({
            "date": date,
            "habits": entries,
            "completion_count": count,
            "total_habits": total,
            "completion_rate": rate,
            "physical_completed": physical_completed,
        })
    }
}

type Shared = Arc<MockState>;

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": "HTTP_ERROR", "message": message })),
    )
        .into_response()
}

fn pair_body(pair: &TokenPair) -> Value {
    json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "token_type": "bearer",
        "expires_in": 1800,
    })
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    let key = format!(
        "{} {}",
        request.method(),
        path.strip_prefix("/api").unwrap_or(path)
    );
    lock(&state.hits).push(key);
    next.run(request).await
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["email"] == TEST_EMAIL && body["password"] == TEST_PASSWORD {
        Json(pair_body(&state.issue())).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["email"].as_str().map_or(true, str::is_empty) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Email is required");
    }
    (StatusCode::CREATED, Json(pair_body(&state.issue()))).into_response()
}

async fn refresh(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if state.malformed_refresh.load(Ordering::SeqCst) {
        return (StatusCode::OK, "not json").into_response();
    }

    let current = state.current_pair();
    if body["refresh_token"] != current.refresh_token.as_str() {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }

    let hold = lock(&state.refresh_hold).clone();
    if let Some(tx) = hold {
        let (release, released) = oneshot::channel();
        if tx.send(PendingRefresh { release }).is_ok() {
            let _ = released.await;
        }
    }
    Json(pair_body(&state.issue())).into_response()
}

async fn list_habits(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(lock(&state.habits).clone()).into_response()
}

async fn create_habit(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(draft): Json<HabitDraft>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let n = state.next_habit.fetch_add(1, Ordering::SeqCst);
    let habit = Habit {
        goal_threshold: draft.goal_threshold,
        target_per_week: draft.target_per_week,
        weight: draft.weight,
        ..seed_habit(
            &format!("h{n}"),
            &draft.name,
            &draft.category,
            draft.is_physical,
        )
    };
    lock(&state.habits).push(habit.clone());
    (StatusCode::CREATED, Json(habit)).into_response()
}

async fn update_habit(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(changes): Json<HabitUpdate>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let mut habits = lock(&state.habits);
    let Some(habit) = habits.iter_mut().find(|h| h.id == id) else {
        return error(StatusCode::NOT_FOUND, "Habit not found");
    };

    if let Some(name) = changes.name {
        habit.name = name;
    }
    if let Some(category) = changes.category {
        habit.category = category;
    }
    if let Some(is_physical) = changes.is_physical {
        habit.is_physical = is_physical;
    }
    if let Some(is_active) = changes.is_active {
        habit.is_active = is_active;
    }
    Json(habit.clone()).into_response()
}

async fn delete_habit(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let mut habits = lock(&state.habits);
    let before = habits.len();
    habits.retain(|h| h.id != id);
    if habits.len() == before {
        return error(StatusCode::NOT_FOUND, "Habit not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn create_entry(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<EntryRequest>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }

    let hold = lock(&state.entry_hold).clone();
    let accepted = match hold {
        Some(tx) => {
            let (reply, rx) = oneshot::channel();
            let pending = PendingEntry {
                request: request.clone(),
                reply,
            };
            match tx.send(pending) {
                Ok(()) => rx.await.unwrap_or(false),
                Err(_) => true,
            }
        }
        None => true,
    };

    if !accepted {
        return error(StatusCode::BAD_REQUEST, "Entry rejected");
    }

    if request.entry_date == state.today() {
        state.set_completed(&request.habit_id, request.completed);
    }

    let entry = json!({
        "id": format!("e-{}", request.habit_id),
        "habit_id": request.habit_id,
        "entry_date": request.entry_date,
        "completed": request.completed,
        "notes": request.notes,
    });
    (StatusCode::CREATED, Json(entry)).into_response()
}

async fn today_entries(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if state.fail_today.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }
    Json(state.today_view()).into_response()
}

async fn today_stats(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let view = state.today_view();
    Json(json!({
        "date": view["date"],
        "total_habits": view["total_habits"],
        "completion_count": view["completion_count"],
        "completion_rate": view["completion_rate"],
    }))
    .into_response()
}

async fn date_entries(
    State(state): State<Shared>,
    Path(date): Path<NaiveDate>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(state.day_view(date)).into_response()
}

async fn week_entries(
    State(state): State<Shared>,
    Path(week_start): Path<NaiveDate>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let days = week_start
        .iter_days()
        .take(7)
        .map(|day| state.day_view(day))
        .collect::<Vec<_>>();
    Json(days).into_response()
}

async fn week_analytics(
    State(state): State<Shared>,
    week_start: Option<Path<NaiveDate>>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let today = state.today();
    let start = week_start.map_or(today, |Path(start)| start);
    Json(json!({ "week_start": start, "total_habits": lock(&state.habits).len() })).into_response()
}

async fn month_analytics(
    State(state): State<Shared>,
    year_month: Option<Path<(i32, u32)>>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let today = state.today();
    let (year, month) = year_month.map_or((today.year(), today.month()), |Path(ym)| ym);
    Json(json!({ "year": year, "month": month, "days": [] })).into_response()
}

async fn trends(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({ "data": [] })).into_response()
}
