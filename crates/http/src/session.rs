//! Cookie-keyed, in-process session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use uuid::{Timestamp, Uuid};

pub const SESSION_COOKIE: &str = "libris_session";

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(14 * 24 * 60 * 60);
const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct SessionEntry {
    data: HashMap<String, serde_json::Value>,
    last_seen: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            data: HashMap::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Sessions that have stored at least one value, shared across requests.
///
/// A session is only persisted on its first write. Entries idle for longer
/// than `idle_timeout` are dropped, and at `capacity` the least recently seen
/// entry makes room for a new one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    idle_timeout: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_IDLE_TIMEOUT, DEFAULT_CAPACITY)
    }

    pub fn with_limits(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
            capacity: capacity.max(1),
        }
    }

    /// Resume a live session or hand out a fresh, unpersisted id. The flag is
    /// true for a fresh id.
    pub async fn open(&self, presented: Option<Uuid>) -> (Session, bool) {
        if let Some(id) = presented {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(&id) {
                Some(entry) if entry.last_seen.elapsed() <= self.idle_timeout => {
                    entry.last_seen = Instant::now();
                    return (self.handle(id), false);
                }
                Some(_) => {
                    sessions.remove(&id);
                    tracing::debug!(session_id = %id, "session expired");
                }
                None => {}
            }
        }

        let id = Uuid::new_v7(Timestamp::now(uuid::NoContext));
        (self.handle(id), true)
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn handle(&self, id: Uuid) -> Session {
        Session {
            id,
            store: self.clone(),
        }
    }

    /// Drop expired entries, then the least recently seen ones until a new
    /// entry fits.
    fn make_room(&self, sessions: &mut HashMap<Uuid, SessionEntry>) {
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= idle_timeout);

        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::debug!(session_id = %oldest, "session evicted");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One caller's session, handed to handlers through request extensions.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    store: SessionStore,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read a value; missing keys and undecodable values are `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let sessions = self.store.sessions.read().await;
        sessions
            .get(&self.id)
            .and_then(|entry| entry.data.get(key))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Store a value, persisting the session on its first write.
    pub async fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut sessions = self.store.sessions.write().await;
        if !sessions.contains_key(&self.id) {
            self.store.make_room(&mut sessions);
            tracing::debug!(session_id = %self.id, "session created");
        }

        let entry = sessions.entry(self.id).or_insert_with(SessionEntry::new);
        entry.last_seen = Instant::now();
        entry.data.insert(key.to_string(), value);
        Ok(())
    }
}

/// Attach a [`Session`] to every request. The cookie is only set once a
/// fresh session has been written to.
pub async fn session_middleware(
    State(store): State<SessionStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = session_id_from_cookies(request.headers());
    let (session, created) = store.open(presented).await;
    let id = session.id();
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if created && store.contains(id).await {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "failed to encode session cookie"),
        }
    }

    response
}

fn session_id_from_cookies(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(store: &SessionStore) -> Router {
        Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .route(
                "/visit",
                get(|session: Session| async move {
                    session.insert("seen", true).await.unwrap();
                    "seen"
                }),
            )
            .layer(middleware::from_fn_with_state(
                store.clone(),
                session_middleware,
            ))
    }

    fn get_request(uri: &str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn open_persists_nothing_until_a_write() {
        let store = SessionStore::new();
        let (first, created) = store.open(None).await;
        assert!(created);
        assert!(store.is_empty().await);

        let (unknown, created) = store.open(Some(first.id())).await;
        assert!(created);
        assert_ne!(unknown.id(), first.id());

        first.insert("num_visits", 2u64).await.unwrap();
        let (again, created) = store.open(Some(first.id())).await;
        assert!(!created);
        assert_eq!(again.id(), first.id());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn values_are_scoped_to_one_session() {
        let store = SessionStore::new();
        let (a, _) = store.open(None).await;
        let (b, _) = store.open(None).await;

        a.insert("num_visits", 3u64).await.unwrap();
        assert_eq!(a.get::<u64>("num_visits").await, Some(3));
        assert_eq!(b.get::<u64>("num_visits").await, None);
        assert_eq!(a.get::<String>("num_visits").await, None);
    }

    #[tokio::test]
    async fn cookieless_requests_that_never_write_leave_no_session() {
        let store = SessionStore::new();
        let app = app(&store);

        for _ in 0..200 {
            let response = app.clone().oneshot(get_request("/healthz")).await.unwrap();
            assert!(response.headers().get(SET_COOKIE).is_none());
        }
        assert_eq!(store.len().await, 0);

        let response = app.oneshot(get_request("/visit")).await.unwrap();
        assert!(response.headers().get(SET_COOKIE).is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn capacity_evicts_the_least_recently_seen_session() {
        let store = SessionStore::with_limits(DEFAULT_IDLE_TIMEOUT, 2);
        let (oldest, _) = store.open(None).await;
        let (middle, _) = store.open(None).await;
        let (newest, _) = store.open(None).await;

        for (n, session) in [&oldest, &middle, &newest].into_iter().enumerate() {
            session.insert("n", n).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(store.len().await, 2);
        assert!(!store.contains(oldest.id()).await);
        assert!(store.contains(middle.id()).await);
        assert!(store.contains(newest.id()).await);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = SessionStore::with_limits(Duration::ZERO, 10);
        let (session, _) = store.open(None).await;
        session.insert("n", 1u64).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (reopened, created) = store.open(Some(session.id())).await;
        assert!(created);
        assert_ne!(reopened.id(), session.id());
        assert!(store.is_empty().await);
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}; lang=en")).unwrap(),
        );
        assert_eq!(session_id_from_cookies(&headers), Some(id));

        let mut garbled = HeaderMap::new();
        garbled.insert(COOKIE, HeaderValue::from_static("libris_session=not-a-uuid"));
        assert_eq!(session_id_from_cookies(&garbled), None);
    }
}
