//! Common test utilities for E2E tests

#![allow(dead_code)]

use agora::{AppState, config};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ADMIN_ID: &str = "admin-1";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    ///
    /// `ADMIN_ID` is granted the admin flag.
    pub async fn new() -> Self {
        agora::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-that-is-32-bytes-long".to_string(),
                session_max_age: 604800,
                admin_user_ids: vec![ADMIN_ID.to_string()],
            },
            feed: config::FeedConfig {
                default_limit: 20,
                max_limit: 100,
                admin_default_limit: 50,
                search_limit: 20,
            },
            relay: config::RelayConfig {
                max_message_bytes: 4096,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = agora::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// WebSocket URL for the relay
    pub fn ws_url(&self) -> String {
        format!("{}/ws", self.addr.replacen("http://", "ws://", 1))
    }

    /// Mint a session token for `user_id`
    ///
    /// The user row is created on first authenticated request.
    pub fn token_for(&self, user_id: &str) -> String {
        use agora::auth::{Session, create_session_token};
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let session = Session {
            user_id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
            first_name: Some(user_id.to_string()),
            last_name: Some("Tester".to_string()),
            profile_image_url: None,
            created_at: now,
            expires_at: now + Duration::days(1),
        };

        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Authenticate once so the user row exists, returning its token
    pub async fn login(&self, user_id: &str) -> String {
        let token = self.token_for(user_id);
        let response = self
            .client
            .get(self.url("/api/auth/user"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        token
    }

    /// Create a post and return its id
    pub async fn create_post(&self, token: &str, content: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/api/posts"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let json: Value = response.json().await.unwrap();
        json["id"].as_i64().unwrap()
    }

    /// GET `path` with an optional bearer token and decode the JSON body
    pub async fn get_json(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let json = response.json().await.unwrap_or(Value::Null);
        (status, json)
    }
}
