//! Mock command agent for testing
//!
//! Answers `POST /command/execute` the way the host agent does, without a real agent running.

use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use fleetops::exec::AgentExecutor;

pub const TEST_API_KEY: &str = "test-api-key";

/// Mock agent server that simulates agent HTTP responses
pub struct MockAgentServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockAgentServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Executor pointed at this server
    pub fn executor(&self, host: &str) -> AgentExecutor {
        AgentExecutor::with_base_url(host, &self.base_url, TEST_API_KEY, Duration::from_secs(5))
            .expect("client builds")
    }

    /// Commands containing `needle` succeed with `output`
    pub async fn mock_command_output(&self, needle: &str, output: &str) {
        Mock::given(method("POST"))
            .and(path("/command/execute"))
            .and(header("Authorization", format!("Bearer {}", TEST_API_KEY).as_str()))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "output": output
            })))
            .mount(&self.server)
            .await;
    }

    /// Commands containing `needle` exit non-zero with `error`
    pub async fn mock_command_failure(&self, needle: &str, error: &str) {
        Mock::given(method("POST"))
            .and(path("/command/execute"))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "output": "",
                "error": error
            })))
            .mount(&self.server)
            .await;
    }

    /// Every request is rejected as unauthorized
    pub async fn mock_unauthorized(&self) {
        Mock::given(method("POST"))
            .and(path("/command/execute"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far, as body strings
    pub async fn received_commands(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| String::from_utf8_lossy(&r.body).to_string())
            .collect()
    }
}
