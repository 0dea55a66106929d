//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use serde_json::{json, Value};
use transit_indicators::config::ServiceConfig;
use transit_indicators::http::HttpServer;
use transit_indicators::lifecycle::Shutdown;

pub const ADMIN_PASSWORD: &str = "integration-secret";

/// A server running on an ephemeral port. Dropping it stops the server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Exchange credentials for a token, panicking on failure.
    pub async fn token(&self, username: &str, password: &str) -> String {
        let res = self
            .client
            .post(self.url("/api-token-auth/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("server unreachable");
        assert_eq!(res.status(), 200, "token request failed");
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.token("admin", ADMIN_PASSWORD).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Default configuration with a known admin password.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.admin_password = ADMIN_PASSWORD.into();
    config
}

/// Start a server with `config` and a client that does not follow redirects.
pub async fn spawn_server(config: ServiceConfig) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).expect("server config");
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        client,
        shutdown,
    }
}
