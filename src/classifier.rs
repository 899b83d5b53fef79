use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::capture::PendingItem;
use crate::error::ServiceError;

/// Label the vision service returns when it cannot place the item.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Multipart field the vision service reads the image from.
pub const IMAGE_FIELD: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationOutcome {
    Accepted { label: String },
    Rejected,
    Failed { reason: String },
}

impl ClassificationOutcome {
    pub fn from_label(label: &str) -> Self {
        if label == UNKNOWN_LABEL {
            ClassificationOutcome::Rejected
        } else {
            ClassificationOutcome::Accepted {
                label: label.to_string(),
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ClassificationOutcome::Accepted { .. })
    }

    pub fn message(&self) -> String {
        match self {
            ClassificationOutcome::Accepted { label } => format!("Item accepted: {label}"),
            ClassificationOutcome::Rejected => "Item rejected: Unknown item.".to_string(),
            ClassificationOutcome::Failed { reason } => reason.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    classification: String,
}

#[async_trait]
pub trait ItemClassifier: Send + Sync {
    /// Never retries; every failure comes back as `ClassificationOutcome::Failed`.
    async fn classify(&self, item: &PendingItem) -> ClassificationOutcome;
}

/// Talks to the remote vision endpoint.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn request_label(&self, item: &PendingItem) -> Result<String, ServiceError> {
        let part = Part::bytes(item.bytes.clone())
            .file_name(item.file_name.clone())
            .mime_str(&item.mime_type)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status { status });
        }

        let body = response.bytes().await?;
        let parsed: ClassifyResponse = serde_json::from_slice(&body)
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(parsed.classification)
    }
}

#[async_trait]
impl ItemClassifier for HttpClassifier {
    async fn classify(&self, item: &PendingItem) -> ClassificationOutcome {
        log::info!("Classifying {} ({} bytes)", item.file_name, item.len());
        match self.request_label(item).await {
            Ok(label) => {
                log::info!("Classification label: {}", label);
                ClassificationOutcome::from_label(&label)
            }
            Err(e) => {
                log::warn!("Classification request failed: {}", e);
                ClassificationOutcome::Failed {
                    reason: format!("Failed to classify the item: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/classify")
    }

    fn sample_item() -> PendingItem {
        PendingItem::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0], "bottle.jpg")
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert_eq!(
            ClassificationOutcome::from_label("Unknown"),
            ClassificationOutcome::Rejected
        );
        assert_eq!(
            ClassificationOutcome::from_label("plastic-bottle"),
            ClassificationOutcome::Accepted {
                label: "plastic-bottle".to_string()
            }
        );
        // only the exact sentinel is rejected
        assert!(ClassificationOutcome::from_label("unknown").is_accepted());
    }

    #[test]
    fn test_outcome_messages() {
        let accepted = ClassificationOutcome::from_label("can");
        assert_eq!(accepted.message(), "Item accepted: can");
        assert_eq!(
            ClassificationOutcome::Rejected.message(),
            "Item rejected: Unknown item."
        );
    }

    #[tokio::test]
    async fn test_sends_image_under_file_field() {
        async fn handler(mut multipart: Multipart) -> Json<Value> {
            let mut seen = Vec::new();
            while let Some(field) = multipart.next_field().await.unwrap() {
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field.file_name().unwrap_or_default().to_string();
                let len = field.bytes().await.unwrap().len();
                seen.push(format!("{name}:{file_name}:{len}"));
            }
            Json(json!({ "classification": seen.join(",") }))
        }

        let url = serve(Router::new().route("/classify", post(handler))).await;
        let classifier = HttpClassifier::new(Client::new(), url);

        let outcome = classifier.classify(&sample_item()).await;
        assert_eq!(
            outcome,
            ClassificationOutcome::Accepted {
                label: "file:bottle.jpg:4".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_response_maps_to_rejected() {
        let url = serve(Router::new().route(
            "/classify",
            post(|| async { Json(json!({ "classification": "Unknown" })) }),
        ))
        .await;
        let classifier = HttpClassifier::new(Client::new(), url);

        assert_eq!(
            classifier.classify(&sample_item()).await,
            ClassificationOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn test_server_error_maps_to_failed() {
        let url = serve(Router::new().route(
            "/classify",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let classifier = HttpClassifier::new(Client::new(), url);

        match classifier.classify(&sample_item()).await {
            ClassificationOutcome::Failed { reason } => assert!(reason.contains("500")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_failed() {
        let url = serve(Router::new().route(
            "/classify",
            post(|| async { Json(json!({ "label": "can" })) }),
        ))
        .await;
        let classifier = HttpClassifier::new(Client::new(), url);

        assert!(matches!(
            classifier.classify(&sample_item()).await,
            ClassificationOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_maps_to_failed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let classifier = HttpClassifier::new(Client::new(), format!("http://{addr}/classify"));
        assert!(matches!(
            classifier.classify(&sample_item()).await,
            ClassificationOutcome::Failed { .. }
        ));
    }
}
