use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardResult {
    Granted { points: u32 },
    Failed { reason: String },
}

impl RewardResult {
    pub fn message(&self) -> String {
        match self {
            RewardResult::Granted { points } => format!("you got yourself {points} points"),
            RewardResult::Failed { reason } => reason.clone(),
        }
    }
}

/// Body of the points endpoint. Field names are fixed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GivePointsRequest {
    #[serde(rename = "UserEmail")]
    pub user_email: String,
    #[serde(rename = "Points")]
    pub points: u32,
}

#[async_trait]
pub trait RewardService: Send + Sync {
    async fn give_points(&self, user_email: &str, points: u32) -> Result<(), ServiceError>;
}

pub struct HttpRewardService {
    client: Client,
    endpoint: String,
}

impl HttpRewardService {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RewardService for HttpRewardService {
    async fn give_points(&self, user_email: &str, points: u32) -> Result<(), ServiceError> {
        let body = GivePointsRequest {
            user_email: user_email.to_string(),
            points,
        };
        log::info!("Rewarding {} with {} points", user_email, points);

        // Success is decided by status alone; the body is not inspected.
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status { status });
        }
        Ok(())
    }
}
