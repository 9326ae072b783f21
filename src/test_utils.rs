//! Scripted transport for controller tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::api::ConsoleApi;
use crate::transport::{Method, Payload, Transport, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Scripted {
    delay: Option<Duration>,
    result: Result<Payload, TransportError>,
}

#[derive(Debug, Default)]
struct Route {
    queue: VecDeque<Scripted>,
    last: Option<Scripted>,
}

/// Replies are queued per route; once drained, the last reply keeps answering.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<(Method, String), Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        self.replies
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .queue
            .push_back(scripted);
    }

    pub fn reply(&self, method: Method, path: &str, result: Result<Payload, TransportError>) {
        self.push(method, path, Scripted { delay: None, result });
    }

    pub fn reply_json(&self, method: Method, path: &str, value: Value) {
        self.reply(method, path, Ok(Payload::Json(value)));
    }

    pub fn reply_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        result: Result<Payload, TransportError>,
    ) {
        self.push(
            method,
            path,
            Scripted {
                delay: Some(delay),
                result,
            },
        );
    }

    pub fn fail(&self, method: Method, path: &str, status: u16, message: &str) {
        self.reply(
            method,
            path,
            Err(TransportError::Rejected {
                status,
                message: message.to_string(),
            }),
        );
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Payload, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });

        let scripted = {
            let mut replies = self.replies.lock().unwrap();
            replies
                .get_mut(&(method, path.to_string()))
                .and_then(|route| {
                    if let Some(next) = route.queue.pop_front() {
                        route.last = Some(next);
                    }
                    route.last.clone()
                })
        };

        let Some(scripted) = scripted else {
            return Err(TransportError::Rejected {
                status: 404,
                message: format!("no scripted reply for {} {}", method, path),
            });
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.result
    }
}

pub fn mock_api() -> (std::sync::Arc<MockTransport>, ConsoleApi) {
    let transport = std::sync::Arc::new(MockTransport::new());
    let api = ConsoleApi::new(transport.clone());
    (transport, api)
}
