//! Shared fixtures for the API tests: a real server on an ephemeral port,
//! backed by a temporary database and blob directory, driven over HTTP.

use crate::config::{
    AuthConfig, BlobsConfig, Config, DatabaseConfig, Listener, LimitsConfig, RateLimitConfig,
    ThumbnailsConfig,
};
use crate::{AppState, build_router};
use easel_store::{BlobStore, Database, FilesystemBlobStore};
use std::net::SocketAddr;
use std::sync::Arc;

pub(crate) struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");

        let mut config = Config {
            listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 1, // unused; the test binds an ephemeral port itself
            },
            database: DatabaseConfig {
                path: dir.path().join("easel.db"),
            },
            blobs: BlobsConfig {
                path: dir.path().join("blobs"),
            },
            auth: AuthConfig {
                jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
                token_ttl_secs: 3600,
                min_password_len: 8,
                // Hashing cost is irrelevant to what these tests exercise.
                pbkdf2_iterations: 2,
            },
            limits: LimitsConfig {
                max_payload_bytes: 64 * 1024,
                rate_limit: RateLimitConfig {
                    window_secs: 60,
                    max_requests: 10_000,
                },
            },
            thumbnails: ThumbnailsConfig {
                max_total_bytes: 1024 * 1024,
            },
        };
        tweak(&mut config);

        let database = Database::open(&config.database.path).expect("open database");
        let blobs: Arc<dyn BlobStore> =
            Arc::new(FilesystemBlobStore::new(config.blobs.path.clone()).expect("open blob store"));
        let state = AppState::build(&config, database, blobs);
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("serve");
        });

        TestServer {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("request")
    }

    pub async fn signup(&self, email: &str, password: &str) {
        let response = self
            .post_json(
                "/api/v1/auth/signup",
                &serde_json::json!({"email": email, "password": password}),
            )
            .await;
        assert!(response.status().is_success(), "signup failed: {response:?}");
    }

    /// Create an account and log in, returning a bearer session.
    pub async fn signup_and_login(&self, email: &str) -> Session {
        self.signup(email, "correct horse").await;

        let login: serde_json::Value = self
            .post_json(
                "/api/v1/auth/login",
                &serde_json::json!({"email": email, "password": "correct horse"}),
            )
            .await
            .json()
            .await
            .expect("login response");

        Session {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            token: login["token"].as_str().expect("token").to_string(),
            csrf_token: login["csrf_token"].as_str().expect("csrf token").to_string(),
        }
    }
}

/// An authenticated client: every request carries the bearer token.
pub(crate) struct Session {
    base_url: String,
    client: reqwest::Client,
    pub token: String,
    pub csrf_token: String,
}

impl Session {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("request")
    }

    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        let response = self.get(path).await;
        assert!(response.status().is_success(), "GET {path}: {response:?}");
        response.json().await.expect("json body")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .expect("request")
    }

    pub async fn put_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .expect("request")
    }

    pub async fn put_bytes(&self, path: &str, body: Vec<u8>) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&self.token)
            .header("content-type", "image/png")
            .body(body)
            .send()
            .await
            .expect("request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("request")
    }

    pub async fn create_project(&self, name: &str) -> String {
        let created: serde_json::Value = self
            .post_json("/api/v1/projects", &serde_json::json!({"name": name}))
            .await
            .json()
            .await
            .expect("project response");
        created["id"].as_str().expect("project id").to_string()
    }

    pub async fn create_drawing(
        &self,
        project_id: &str,
        name: &str,
        payload: &serde_json::Value,
    ) -> String {
        let created: serde_json::Value = self
            .post_json(
                &format!("/api/v1/projects/{project_id}/drawings"),
                &serde_json::json!({"name": name, "payload": payload}),
            )
            .await
            .json()
            .await
            .expect("drawing response");
        created["id"].as_str().expect("drawing id").to_string()
    }
}
