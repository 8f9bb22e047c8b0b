use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::MutationSender;
use crate::domain::entities::{ActivoModelo, ActivoUnidad, MutationKind, QueuedMutation};
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;

/// REST collaborator: delivers individual mutations and serves the full
/// snapshot re-fetch used to catch up after a channel reconnect.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn fetch_activos(&self) -> Result<Vec<ActivoModelo>, AppError> {
        let response = self
            .authorize(self.http.get(self.url("/activos")))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn fetch_unidades(&self) -> Result<Vec<ActivoUnidad>, AppError> {
        let response = self
            .authorize(self.http.get(self.url("/unidades")))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MutationSender for RestClient {
    async fn send(&self, mutation: &QueuedMutation) -> Result<(), AppError> {
        let id = mutation.target_id().ok_or_else(|| {
            AppError::InvalidInput("Mutation payload must carry a numeric entity id".to_string())
        })?;

        let request = match mutation.kind {
            MutationKind::Create => self.http.post(self.url("/activos")).json(&mutation.data),
            MutationKind::Update => self
                .http
                .put(self.url(&format!("/activos/{id}")))
                .json(&mutation.data),
            MutationKind::Delete => self.http.delete(self.url(&format!("/activos/{id}"))),
        };

        self.authorize(request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::NetworkSend(e.to_string()))?;

        Ok(())
    }
}
