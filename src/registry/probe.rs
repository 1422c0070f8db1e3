//! Registry readiness probe

use crate::error::{Result, TransferError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Answers whether the registry behind the tunnel is serving requests
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self) -> bool;

    fn endpoint(&self) -> String;
}

/// `GET http://localhost:<port>/v2/`; ready means exactly HTTP 200
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    pub fn new(port: u16, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&format!("http://localhost:{}/v2/", port))
            .map_err(|e| TransferError::Config(format!("Invalid probe URL: {}", e)))?;
        Self::for_url(url, timeout)
    }

    pub fn for_url(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn is_ready(&self) -> bool {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }
}
