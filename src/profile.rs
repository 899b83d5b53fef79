use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub points: i64,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("User not found.")]
    NotFound,

    #[error("Failed to fetch user details: {0}")]
    Transport(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("All fields are required.")]
    MissingFields,

    #[error("Registration failed. Please try again.")]
    Failed(#[source] ServiceError),
}

/// Role every account created at the kiosk gets.
pub const MEMBER_ROLE: &str = "disposalMember";

/// New account details as typed into the kiosk form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

impl Registration {
    fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.password, &self.phone_number]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
struct CreateUserRequest<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    email: &'a str,
    password: &'a str,
    #[serde(rename = "phoneNumber")]
    phone_number: &'a str,
    #[serde(rename = "Role")]
    role: &'a str,
}

/// The users endpoint only lists everyone, so the lookup happens client side.
pub fn find_user<'a>(users: &'a [UserProfile], email: &str) -> Option<&'a UserProfile> {
    users.iter().find(|user| user.email == email)
}

pub struct ProfileClient {
    client: Client,
    users_url: String,
}

impl ProfileClient {
    pub fn new(client: Client, users_url: impl Into<String>) -> Self {
        Self {
            client,
            users_url: users_url.into(),
        }
    }

    pub async fn fetch_profile(&self, email: &str) -> Result<UserProfile, ProfileError> {
        let users = self.fetch_users().await?;
        find_user(&users, email).cloned().ok_or(ProfileError::NotFound)
    }

    /// Create an account; the user logs in separately afterwards.
    pub async fn register(&self, registration: &Registration) -> Result<(), RegistrationError> {
        if !registration.is_complete() {
            return Err(RegistrationError::MissingFields);
        }

        let request = CreateUserRequest {
            name: registration.name.trim(),
            email: registration.email.trim(),
            password: &registration.password,
            phone_number: registration.phone_number.trim(),
            role: MEMBER_ROLE,
        };
        match self.create_user(&request).await {
            Ok(()) => {
                log::info!("Registered {}", request.email);
                Ok(())
            }
            Err(e) => {
                log::warn!("Registration for {} failed: {}", request.email, e);
                Err(RegistrationError::Failed(e))
            }
        }
    }

    async fn create_user(&self, request: &CreateUserRequest<'_>) -> Result<(), ServiceError> {
        let response = self.client.post(&self.users_url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status { status });
        }
        Ok(())
    }

    async fn fetch_users(&self) -> Result<Vec<UserProfile>, ServiceError> {
        let response = self.client.get(&self.users_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status { status });
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/AppUsers")
    }

    fn registration() -> Registration {
        Registration {
            name: "Ada".to_string(),
            email: " ada@example.com ".to_string(),
            password: "hunter2".to_string(),
            phone_number: "0123".to_string(),
        }
    }

    fn users() -> Vec<UserProfile> {
        serde_json::from_value(json!([
            { "name": "Ada", "email": "ada@example.com", "phoneNumber": "0123", "points": 40 },
            { "name": "Bob", "email": "bob@example.com", "points": 0 }
        ]))
        .unwrap()
    }

    #[test]
    fn test_find_user_by_email() {
        let users = users();
        let ada = find_user(&users, "ada@example.com").unwrap();
        assert_eq!(ada.points, 40);
        assert_eq!(ada.phone_number, "0123");
        assert_eq!(find_user(&users, "bob@example.com").unwrap().phone_number, "");
        assert!(find_user(&users, "eve@example.com").is_none());
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let app = Router::new().route(
            "/api/AppUsers",
            get(|| async {
                Json(json!([
                    { "name": "Ada", "email": "ada@example.com", "phoneNumber": "0123", "points": 50 }
                ]))
            }),
        );
        let client = ProfileClient::new(Client::new(), serve(app).await);

        let profile = client.fetch_profile("ada@example.com").await.unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.points, 50);

        let err = client.fetch_profile("eve@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "User not found.");
    }

    #[tokio::test]
    async fn test_register_posts_new_member() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/api/AppUsers",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    StatusCode::CREATED
                }
            }),
        );
        let client = ProfileClient::new(Client::new(), serve(app).await);

        client.register(&registration()).await.unwrap();

        let bodies = received.lock().unwrap().clone();
        assert_eq!(
            bodies,
            vec![json!({
                "Name": "Ada",
                "email": "ada@example.com",
                "password": "hunter2",
                "phoneNumber": "0123",
                "Role": "disposalMember"
            })]
        );
    }

    #[tokio::test]
    async fn test_register_requires_every_field() {
        // nothing listens here; a request would fail with a transport error
        let client = ProfileClient::new(Client::new(), "http://127.0.0.1:9/api/AppUsers");

        for blank in 0..4 {
            let mut form = registration();
            let field = match blank {
                0 => &mut form.name,
                1 => &mut form.email,
                2 => &mut form.password,
                _ => &mut form.phone_number,
            };
            *field = "  ".to_string();

            let err = client.register(&form).await.unwrap_err();
            assert!(matches!(err, RegistrationError::MissingFields));
            assert_eq!(err.to_string(), "All fields are required.");
        }
    }

    #[tokio::test]
    async fn test_register_rejected_by_service() {
        let app = Router::new().route("/api/AppUsers", post(|| async { StatusCode::CONFLICT }));
        let client = ProfileClient::new(Client::new(), serve(app).await);

        let err = client.register(&registration()).await.unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Failed(ServiceError::Status { status }) if status == reqwest::StatusCode::CONFLICT
        ));
        assert_eq!(err.to_string(), "Registration failed. Please try again.");
    }
}
