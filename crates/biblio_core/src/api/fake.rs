//! Scripted in-memory transport for store tests
#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Test double, a poisoned lock means the test already failed"
)]
use crate::api::errors::ApiError;
use crate::api::request::{ApiRequest, Transport};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

type Reply = Result<Value, ApiError>;

enum Scripted {
    Ready(Reply),
    Held(oneshot::Receiver<Reply>),
}

/// Replies are queued per `(method, path)` and consumed in order. Every executed request is
/// recorded so tests can assert on what went over the wire.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Scripted) {
        self.replies
            .lock()
            .unwrap()
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(reply);
    }

    pub fn respond(&self, method: Method, path: &str, body: Value) {
        self.push(method, path, Scripted::Ready(Ok(body)));
    }

    pub fn fail(&self, method: Method, path: &str, status: u16) {
        let error = ApiError::Status {
            path: path.to_owned(),
            status,
            body: String::new(),
        };
        self.push(method, path, Scripted::Ready(Err(error)));
    }

    /// Queues a reply that only resolves once the returned sender is used
    pub fn hold(&self, method: Method, path: &str) -> oneshot::Sender<Reply> {
        let (sender, receiver) = oneshot::channel();
        self.push(method, path, Scripted::Held(receiver));
        sender
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let key = (request.method.clone(), request.path.clone());
        self.requests.lock().unwrap().push(request);

        let scripted = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Held(receiver)) => receiver.await.unwrap(),
            None => Err(ApiError::Status {
                path: key.1,
                status: 404,
                body: "no scripted reply".to_owned(),
            }),
        }
    }
}
