//! Mock search-index server

use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockIndexServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockIndexServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// `_cat/indices` answers with these names
    pub async fn mock_indices(&self, names: &[&str]) {
        let body: Vec<Value> = names.iter().map(|n| json!({ "index": n })).collect();
        Mock::given(method("GET"))
            .and(path("/_cat/indices"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_force_merge(&self, index: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/_forcemerge", index)))
            .and(query_param("max_num_segments", "2"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "_shards": { "total": 2, "successful": 2, "failed": 0 }
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_delete(&self, index: &str, status: u16) {
        Mock::given(method("DELETE"))
            .and(path(format!("/{}", index)))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "acknowledged": status == 200 })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Paths of every request received, with method
    pub async fn requests(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }
}
