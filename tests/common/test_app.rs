use chatflows::{AppState, Config, build_router};
use reqwest::{Client, redirect::Policy};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use super::helpers::Harness;

/// Test app configuration options
#[derive(Default)]
pub struct TestAppOptions {
    /// HMAC secret for webhook signatures. Empty disables verification.
    pub app_secret: String,
    pub verify_token: String,
}

/// HTTP test application wrapper
///
/// Manages an Axum server running on a random port for HTTP testing.
/// Each test gets its own server instance to allow parallel test execution.
pub struct TestApp {
    /// Server base URL (e.g., "http://127.0.0.1:54321")
    pub address: String,
    /// HTTP client for making requests
    pub client: Client,
    /// Dispatcher harness behind the server
    pub harness: Harness,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestAppOptions::default()).await
    }

    /// Create a new HTTP test app with server on random port
    ///
    /// # How it works:
    /// 1. Builds the application router over an in-memory harness
    /// 2. Binds to port 0 (OS assigns random available port)
    /// 3. Starts server in background task
    /// 4. Waits 100ms for server to be ready
    pub async fn with_options(options: TestAppOptions) -> Self {
        let mut config = Config::default();
        config.whatsapp.app_secret = options.app_secret.into();
        config.whatsapp.verify_token = options.verify_token.into();

        let harness = Harness::new();
        let app = build_router(AppState::new(config, harness.dispatcher.clone()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{port}");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            address,
            client,
            harness,
        }
    }

    /// Get the full URL for an API endpoint
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}
