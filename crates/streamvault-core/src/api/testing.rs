//! In-process backend used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::auth::{REFRESH_PATH, TOKEN_COOKIE};
use crate::notify::{Notice, Notifier};

#[derive(Debug, Clone)]
pub(crate) enum Event {
    Request(ApiRequest),
    RefreshStarted,
    RefreshFinished,
}

/// Protected routes accept exactly `valid_token`; `/auth/refresh` swaps it
/// for `next_token`. Fixed routes return canned responses.
pub(crate) struct FakeBackend {
    valid_token: Mutex<Option<String>>,
    next_token: Mutex<String>,
    refresh_status: Mutex<u16>,
    refresh_gate: Option<Arc<Semaphore>>,
    cookie: Mutex<Option<String>>,
    routes: Mutex<HashMap<String, (u16, String)>>,
    always_unauthorized: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
    log: Mutex<Vec<Event>>,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new(valid_token: &str, next_token: &str) -> Self {
        Self {
            valid_token: Mutex::new(Some(valid_token.to_string())),
            next_token: Mutex::new(next_token.to_string()),
            refresh_status: Mutex::new(200),
            refresh_gate: None,
            cookie: Mutex::new(None),
            routes: Mutex::new(HashMap::new()),
            always_unauthorized: Mutex::new(HashSet::new()),
            unreachable: Mutex::new(HashSet::new()),
            log: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
        }
    }

    /// Hold every refresh until the semaphore hands out a permit.
    pub(crate) fn with_refresh_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    pub(crate) fn fail_refresh_with(&self, status: u16) {
        *self.refresh_status.lock().unwrap() = status;
    }

    pub(crate) fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub(crate) fn reject_always(&self, path: &str) {
        self.always_unauthorized.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn unreachable(&self, path: &str) {
        self.unreachable.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn set_cookie(&self, value: &str) {
        *self.cookie.lock().unwrap() = Some(value.to_string());
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn unauthorized_count(&self) -> usize {
        self.unauthorized.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    /// Requests sent to `path`, in order.
    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Request(r) if r.path == path => Some(r),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }

    async fn refresh(&self) -> ApiResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.record(Event::RefreshStarted);
        if let Some(ref gate) = self.refresh_gate {
            let _permit = gate.acquire().await;
        }

        let status = *self.refresh_status.lock().unwrap();
        let response = if status == 200 {
            let next = self.next_token.lock().unwrap().clone();
            *self.valid_token.lock().unwrap() = Some(next.clone());
            ApiResponse::new(200, serde_json::json!({ "token": next }).to_string())
        } else {
            ApiResponse::new(status, r#"{"message":"Refresh token expired"}"#)
        };
        self.record(Event::RefreshFinished);
        response
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.record(Event::Request(request.clone()));

        let unreachable = self.unreachable.lock().unwrap().contains(&request.path);
        if unreachable {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if request.path == REFRESH_PATH {
            return Ok(self.refresh().await);
        }
        let canned = self.routes.lock().unwrap().get(&request.path).cloned();
        if let Some((status, body)) = canned {
            return Ok(ApiResponse::new(status, body));
        }

        let accepted = {
            let valid = self.valid_token.lock().unwrap();
            valid.is_some() && valid.as_deref() == request.bearer_token()
        };
        let rejected = self.always_unauthorized.lock().unwrap().contains(&request.path);
        if accepted && !rejected {
            let body = serde_json::json!({ "path": request.path, "ok": true });
            Ok(ApiResponse::new(200, body.to_string()))
        } else {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
            Ok(ApiResponse::new(401, r#"{"message":"Full authentication is required"}"#))
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        if name == TOKEN_COOKIE {
            self.cookie.lock().unwrap().clone()
        } else {
            None
        }
    }
}

/// Collects notices for assertions.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub(crate) fn errors(&self) -> Vec<Notice> {
        self.notices().into_iter().filter(Notice::is_error).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
