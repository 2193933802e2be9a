//! Wallet API client over mutually-authenticated TLS.

use reqwest::{Client, Identity};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// HTTP client for the wallet backend, presenting the configured client
/// certificate. Built per call so missing certificate material fails the
/// specific request that needed it, not the process.
pub struct WalletClient {
    client: Client,
    base_url: String,
}

impl WalletClient {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let pem = config.mtls.load_pem()?;
        let identity = Identity::from_pem(&pem)?;
        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            // the wallet backend serves a self-signed certificate in dev setups
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("https://{}:{}", config.wallet_api_host, config.wallet_api_port),
        })
    }

    /// Register a webhook. The response is decorated with proxy status fields.
    pub async fn register_webhook<B: Serialize>(&self, body: &B) -> AppResult<Value> {
        let (status, mut data) = self.post("/register_webhook", body).await?;
        decorate(
            &mut data,
            format!("Connected to webhook server successfully (HTTP {})", status),
        );
        Ok(data)
    }

    /// Unregister a webhook. The response is decorated with proxy status fields.
    pub async fn unregister_webhook<B: Serialize>(&self, body: &B) -> AppResult<Value> {
        let (status, mut data) = self.post("/unregister_webhook", body).await?;
        decorate(
            &mut data,
            format!("Disconnected from webhook server successfully (HTTP {})", status),
        );
        Ok(data)
    }

    /// Fetch transaction details by id; upstream JSON is passed through.
    pub async fn get_transaction_by_id(&self, transaction_id: &str) -> AppResult<Value> {
        let body = serde_json::json!({ "transaction_id": transaction_id });
        let (_status, data) = self.post("/get_transaction_by_id", &body).await?;
        Ok(data)
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> AppResult<(u16, Value)> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "wallet api request");
        let res = self.client.post(&url).json(body).send().await?;
        let status = res.status().as_u16();
        let data = res.json::<Value>().await?;
        Ok((status, data))
    }
}

fn decorate(data: &mut Value, message: String) {
    if let Some(obj) = data.as_object_mut() {
        obj.insert("proxy_status".to_string(), Value::from("success"));
        obj.insert("proxy_message".to_string(), Value::from(message));
    }
}
