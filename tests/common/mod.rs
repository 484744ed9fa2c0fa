//! Shared test harness: a scripted transport and a synchronous driver for
//! the engine's async commands.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;

use restform::client::{HttpMethod, MultipartField, Transport, TransportResponse};
use restform::form::{FormEngine, FormMsg};
use restform::ui::Command;

/// A request the mock saw, in arrival order.
#[derive(Debug, Clone)]
pub enum Recorded {
    Options {
        url: String,
    },
    Get {
        url: String,
        query: Vec<(String, String)>,
    },
    Json {
        method: HttpMethod,
        url: String,
        body: Value,
    },
    Multipart {
        method: HttpMethod,
        url: String,
        parts: Vec<MultipartField>,
    },
}

/// Transport with canned responses keyed by a rendered request line.
///
/// Keys look like `OPTIONS /parts/`, `GET /parts/?search=bol&limit=25` or
/// `POST /parts/`. Multiple responses under one key are consumed in order;
/// the last one repeats.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<TransportResponse>>>,
    recorded: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, key: &str, status: u16, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(TransportResponse { status, body });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    /// Requests whose rendered line starts with `prefix`.
    pub fn requests_matching(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| render_line(r).starts_with(prefix))
            .count()
    }

    fn take(&self, key: &str) -> Result<TransportResponse> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(key)
            .ok_or_else(|| anyhow!("No scripted response for '{}'", key))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| anyhow!("Responses for '{}' exhausted", key))
        }
    }
}

fn render_query(query: &[(String, String)]) -> String {
    if query.is_empty() {
        String::new()
    } else {
        let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("?{}", rendered.join("&"))
    }
}

fn render_line(recorded: &Recorded) -> String {
    match recorded {
        Recorded::Options { url } => format!("OPTIONS {}", url),
        Recorded::Get { url, query } => format!("GET {}{}", url, render_query(query)),
        Recorded::Json { method, url, .. } => format!("{} {}", method, url),
        Recorded::Multipart { method, url, .. } => format!("{} {}", method, url),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn options(&self, url: &str) -> Result<TransportResponse> {
        self.recorded.lock().unwrap().push(Recorded::Options {
            url: url.to_string(),
        });
        self.take(&format!("OPTIONS {}", url))
    }

    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportResponse> {
        self.recorded.lock().unwrap().push(Recorded::Get {
            url: url.to_string(),
            query: query.to_vec(),
        });
        self.take(&format!("GET {}{}", url, render_query(query)))
    }

    async fn send_json(
        &self,
        method: HttpMethod,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse> {
        self.recorded.lock().unwrap().push(Recorded::Json {
            method,
            url: url.to_string(),
            body: body.clone(),
        });
        self.take(&format!("{} {}", method, url))
    }

    async fn send_multipart(
        &self,
        method: HttpMethod,
        url: &str,
        parts: Vec<MultipartField>,
    ) -> Result<TransportResponse> {
        self.recorded.lock().unwrap().push(Recorded::Multipart {
            method,
            url: url.to_string(),
            parts: parts.clone(),
        });
        self.take(&format!("{} {}", method, url))
    }
}

/// Run a command to quiescence: await every `Perform`, feed the message back
/// into the engine, repeat until nothing async remains.
pub async fn drive(engine: &mut FormEngine, command: Command<FormMsg>) {
    let mut queue: VecDeque<Command<FormMsg>> = command.into_leaves().into();
    while let Some(leaf) = queue.pop_front() {
        if let Command::Perform(future) = leaf {
            let msg = future.await;
            queue.extend(engine.update(msg).into_leaves());
        }
    }
}

/// Feed one message and run its async fallout.
pub async fn step(engine: &mut FormEngine, msg: FormMsg) {
    let command = engine.update(msg);
    drive(engine, command).await;
}

/// Minimal create schema: required string `name`, choice `color`, optional
/// integer `qty`.
pub fn part_schema() -> Value {
    serde_json::json!({
        "actions": {
            "POST": {
                "name": { "type": "string", "required": true, "label": "Name" },
                "color": {
                    "type": "choice",
                    "required": true,
                    "choices": [
                        { "value": "red", "display_name": "Red" },
                        { "value": "blue", "display_name": "Blue" }
                    ]
                },
                "qty": { "type": "integer", "min_value": 0.0 }
            }
        },
        "context": { "model": "part" }
    })
}
