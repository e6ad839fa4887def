//! Shared helpers for the integration tests.

#![allow(dead_code)]

use reqwest::Client;
use stubby::{Config, StartOptions, Stubby};

pub struct TestServer {
    pub stubby: Stubby,
    pub config: Config,
    pub client: Client,
}

impl TestServer {
    /// Start an instance on ephemeral loopback ports.
    pub async fn start(options: StartOptions) -> Self {
        let stubby = Stubby::new();
        let config = stubby
            .start(StartOptions {
                stubs: Some(0),
                admin: Some(0),
                location: Some("127.0.0.1".to_string()),
                ..options
            })
            .await
            .expect("Failed to start stubby");
        Self {
            stubby,
            config,
            client: Client::new(),
        }
    }

    pub fn stub_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.config.stubs, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!(
            "http://127.0.0.1:{}{}{}",
            self.config.admin, self.config.admin_prefix, path
        )
    }

    pub async fn shutdown(self) {
        self.stubby.stop().await;
    }
}
