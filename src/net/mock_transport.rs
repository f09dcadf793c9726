//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;

use super::error::ApiError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

type Scripted = Result<HttpResponse, ApiError>;

#[derive(Default)]
struct RouteScript {
    queue: VecDeque<Scripted>,
    /// The sticky tail has been served at least once.
    tail_served: bool,
}

/// Answers requests by `(method, path)` from per-route queues.
///
/// The last queued answer for a route is sticky, so a poller can hit the
/// same status endpoint repeatedly. Scripting a route whose sticky answer
/// was already served replaces it. Unscripted routes answer 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<(Method, String), RouteScript>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let body = if body.is_null() { String::new() } else { body.to_string() };
        self.push(method, path, Ok(HttpResponse { status, body }))
    }

    pub(crate) fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, Ok(HttpResponse { status, body: body.to_owned() }))
    }

    pub(crate) fn fail(&self, method: Method, path: &str, err: ApiError) -> &Self {
        self.push(method, path, Err(err))
    }

    fn push(&self, method: Method, path: &str, answer: Scripted) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        let script = routes.entry((method, path.to_owned())).or_default();
        if script.tail_served {
            script.queue.clear();
            script.tail_served = false;
        }
        script.queue.push_back(answer);
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url.ends_with(path))
            .collect()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let key = routes
            .keys()
            .filter(|(method, path)| *method == request.method && request.url.ends_with(path.as_str()))
            .max_by_key(|(_, path)| path.len())
            .cloned();
        let Some(script) = key.and_then(|k| routes.get_mut(&k)) else {
            return Ok(HttpResponse { status: 404, body: r#"{"message":"not scripted"}"#.to_owned() });
        };
        if script.queue.len() > 1 {
            return script.queue.pop_front().unwrap_or_else(|| Err(ApiError::Network("empty script".into())));
        }
        script.tail_served = true;
        script
            .queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err(ApiError::Network("empty script".into())))
    }
}
