use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::error::ApiError;
use super::transport::{ApiRequest, ApiResponse, Transport};

/// Transport that replays queued responses per path and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<ApiResponse, ApiError>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, path: &str, body: Value) -> &Self {
        self.push(path, Ok(ApiResponse::ok(body)))
    }

    pub(crate) fn fail(&self, path: &str, err: ApiError) -> &Self {
        self.push(path, Err(err))
    }

    fn push(&self, path: &str, response: Result<ApiResponse, ApiError>) -> &Self {
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let path = request.path.clone();
        self.requests.lock().push(request);
        self.responses
            .lock()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ApiError::Transport(format!("no scripted response for {path}"))))
    }
}
