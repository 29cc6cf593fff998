//! # User-Management Client
//!
//! Login, registration and session handling against the user-management
//! service. The bearer token lives in the local store under `foodAppToken`.
//!
//! ## Session Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  login(email, pw) ──► POST /auth/login ──► { token, user }              │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                  foodAppToken = token (stored)          │
//! │                                                                         │
//! │  restore_session() ──► GET /user/profile (Bearer token)                 │
//! │        │                    │                                           │
//! │        │ no token           ├── 2xx ──► Some(user)                      │
//! │        ▼                    └── rejected ──► token cleared, None        │
//! │      None                                                               │
//! │                                                                         │
//! │  register(..) ──► POST /auth/register                                   │
//! │        customer ──────► Active (token stored when returned)             │
//! │        any other role ► PendingApproval (an admin must approve)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use menu_core::ValidationError;
use menu_store::SessionRepository;

use crate::config::{MenuConfig, TimeoutSettings};
use crate::error::{SyncError, SyncResult};

/// Margin before token expiry at which a new login is suggested (5 minutes).
const REFRESH_MARGIN_SECS: i64 = 300;

// =============================================================================
// Roles and Users
// =============================================================================

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    RestaurantManager,
    #[default]
    Customer,
    DeliveryPerson,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::RestaurantManager => "restaurantManager",
            Role::Customer => "customer",
            Role::DeliveryPerson => "deliveryPerson",
        }
    }

    /// Customers are approved on registration; every other role waits for
    /// an admin.
    pub fn requires_approval(&self) -> bool {
        !matches!(self, Role::Customer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "restaurantManager" => Ok(Role::RestaurantManager),
            "customer" => Ok(Role::Customer),
            "deliveryPerson" => Ok(Role::DeliveryPerson),
            other => Err(ValidationError::InvalidFormat {
                field: "role".to_string(),
                reason: format!(
                    "unknown role '{}', expected admin, restaurantManager, customer or deliveryPerson",
                    other
                ),
            }),
        }
    }
}

/// Restaurant details a restaurant manager registers with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestaurantInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

/// Account as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,

    #[serde(default)]
    pub full_name: String,

    pub email: String,

    #[serde(default)]
    pub contact_number: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_info: Option<RestaurantInfo>,

    #[serde(default)]
    pub is_approved: bool,
}

/// Input to [`AuthClient::register`].
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub contact_number: String,
    pub role: Role,
    pub restaurant: Option<RestaurantInfo>,
}

impl Registration {
    /// Checks the fields the service would reject anyway.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("fullName", &self.full_name),
            ("email", &self.email),
            ("password", &self.password),
            ("contactNumber", &self.contact_number),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: field.to_string(),
                });
            }
        }

        if self.role == Role::RestaurantManager {
            let complete = self
                .restaurant
                .as_ref()
                .is_some_and(|r| !r.name.trim().is_empty() && !r.address.trim().is_empty());
            if !complete {
                return Err(ValidationError::Required {
                    field: "restaurantInfo".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    full_name: &'a str,
    email: &'a str,
    password: &'a str,
    contact_number: &'a str,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    restaurant_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restaurant_address: Option<&'a str>,
}

#[derive(Deserialize)]
struct SessionBody {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// What a registration produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Account usable now. The session is stored when a token came back.
    Active { user: Option<UserProfile> },

    /// Account created but waiting for an admin.
    PendingApproval,
}

// =============================================================================
// Token Info
// =============================================================================

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// What can be read from a bearer token without the signing key.
///
/// The signature is not checked; the service does that on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub subject: Option<String>,
    pub role: Option<Role>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenInfo {
    pub fn from_jwt(token: &str) -> SyncResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| SyncError::Unauthorized(format!("Unreadable token: {}", e)))?;
        let claims = data.claims;

        Ok(TokenInfo {
            subject: claims.id.or(claims.sub),
            role: claims.role.and_then(|r| r.parse().ok()),
            expires_at: claims.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single()),
        })
    }

    /// True when expired or within five minutes of expiring.
    pub fn needs_refresh(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + ChronoDuration::seconds(REFRESH_MARGIN_SECS) >= exp)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() >= exp)
    }

    /// Seconds until expiry; `None` when the token carries no `exp`.
    pub fn remaining_secs(&self) -> Option<u64> {
        self.expires_at
            .map(|exp| (exp - Utc::now()).num_seconds().max(0) as u64)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the user-management service.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    session: SessionRepository,
}

impl AuthClient {
    pub fn new(
        base_url: impl Into<String>,
        timeouts: &TimeoutSettings,
        session: SessionRepository,
    ) -> SyncResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;

        let client = Client::builder()
            .timeout(timeouts.write())
            .connect_timeout(timeouts.read())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(AuthClient {
            client,
            base_url,
            session,
        })
    }

    pub fn from_config(config: &MenuConfig, session: SessionRepository) -> SyncResult<Self> {
        Self::new(config.auth_url(), &config.timeouts, session)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn failure(response: reqwest::Response) -> SyncError {
        let status = response.status();
        let message = response
            .json::<MessageBody>()
            .await
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized(message),
            StatusCode::NOT_FOUND => SyncError::NotFound(message),
            _ => SyncError::Remote {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Logs in and stores the session token.
    pub async fn login(&self, email: &str, password: &str) -> SyncResult<UserProfile> {
        if email.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "email".to_string(),
            }
            .into());
        }
        if password.is_empty() {
            return Err(ValidationError::Required {
                field: "password".to_string(),
            }
            .into());
        }

        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body: SessionBody = response.json().await?;
        let token = body
            .token
            .ok_or_else(|| SyncError::InvalidResponse("login response has no token".into()))?;
        let user = body
            .user
            .ok_or_else(|| SyncError::InvalidResponse("login response has no user".into()))?;

        self.session.set_token(&token).await?;
        info!(email = %user.email, role = %user.role, "Logged in");
        Ok(user)
    }

    /// Creates an account.
    pub async fn register(&self, registration: &Registration) -> SyncResult<RegistrationOutcome> {
        registration.validate()?;

        let restaurant = registration
            .restaurant
            .as_ref()
            .filter(|_| registration.role == Role::RestaurantManager);
        let body = RegisterBody {
            full_name: &registration.full_name,
            email: &registration.email,
            password: &registration.password,
            contact_number: &registration.contact_number,
            role: registration.role,
            restaurant_name: restaurant.map(|r| r.name.as_str()),
            restaurant_address: restaurant.map(|r| r.address.as_str()),
        };

        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        if registration.role.requires_approval() {
            info!(email = %registration.email, role = %registration.role, "Registered, awaiting approval");
            return Ok(RegistrationOutcome::PendingApproval);
        }

        let body: SessionBody = response.json().await.unwrap_or(SessionBody {
            token: None,
            user: None,
        });
        if let Some(token) = &body.token {
            self.session.set_token(token).await?;
        }
        info!(email = %registration.email, "Registered");
        Ok(RegistrationOutcome::Active { user: body.user })
    }

    /// Fetches the profile for the stored token.
    pub async fn profile(&self) -> SyncResult<UserProfile> {
        let token = self
            .session
            .token()
            .await?
            .ok_or_else(|| SyncError::Unauthorized("Not logged in".into()))?;

        let response = self
            .client
            .get(self.url("/user/profile"))
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ProfileBody {
            Wrapped { user: UserProfile },
            Bare(UserProfile),
        }

        Ok(match response.json::<ProfileBody>().await? {
            ProfileBody::Wrapped { user } | ProfileBody::Bare(user) => user,
        })
    }

    /// Verifies a stored token.
    ///
    /// A token the service rejects is cleared. Transport failures leave it
    /// in place and are returned.
    pub async fn restore_session(&self) -> SyncResult<Option<UserProfile>> {
        if self.session.token().await?.is_none() {
            debug!("No stored session");
            return Ok(None);
        }

        match self.profile().await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_connectivity() => Err(e),
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing");
                self.session.clear().await?;
                Ok(None)
            }
        }
    }

    pub async fn logout(&self) -> SyncResult<()> {
        self.session.clear().await?;
        info!("Logged out");
        Ok(())
    }

    /// Claims of the stored token, if any.
    pub async fn token_info(&self) -> SyncResult<Option<TokenInfo>> {
        match self.session.token().await? {
            Some(token) => TokenInfo::from_jwt(&token).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use menu_store::LocalStore;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(role: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &serde_json::json!({ "id": "u1", "role": role, "exp": exp }),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    fn client(uri: &str, store: &LocalStore) -> AuthClient {
        AuthClient::new(uri, &TimeoutSettings::default(), store.session()).unwrap()
    }

    fn user_json(role: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": "u1",
            "fullName": "Ada Admin",
            "email": "ada@example.com",
            "contactNumber": "0123",
            "role": role,
            "isApproved": true
        })
    }

    #[test]
    fn test_token_info() {
        let exp = Utc::now().timestamp() + 3600;
        let info = TokenInfo::from_jwt(&token("admin", exp)).unwrap();
        assert_eq!(info.subject.as_deref(), Some("u1"));
        assert_eq!(info.role, Some(Role::Admin));
        assert!(!info.is_expired());
        assert!(!info.needs_refresh());
        assert!(info.remaining_secs().unwrap() > 3500);

        let soon = TokenInfo::from_jwt(&token("customer", Utc::now().timestamp() + 60)).unwrap();
        assert!(soon.needs_refresh());
        assert!(!soon.is_expired());

        let old = TokenInfo::from_jwt(&token("customer", Utc::now().timestamp() - 10)).unwrap();
        assert!(old.is_expired());
        assert_eq!(old.remaining_secs(), Some(0));

        assert!(TokenInfo::from_jwt("not-a-token").is_err());
    }

    #[test]
    fn test_registration_validation() {
        let mut reg = Registration {
            full_name: "Rita".into(),
            email: "rita@example.com".into(),
            password: "pw".into(),
            contact_number: "0123".into(),
            role: Role::RestaurantManager,
            restaurant: None,
        };
        assert!(reg.validate().is_err());

        reg.restaurant = Some(RestaurantInfo {
            name: "Rita's".into(),
            address: "1 Main St".into(),
        });
        assert!(reg.validate().is_ok());

        reg.email = "  ".into();
        assert!(reg.validate().is_err());

        assert_eq!("deliveryPerson".parse::<Role>().unwrap(), Role::DeliveryPerson);
        assert!("chef".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let server = MockServer::start().await;
        let jwt = token("admin", Utc::now().timestamp() + 3600);
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_string_contains("ada@example.com"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "token": jwt, "user": user_json("admin") })),
            )
            .mount(&server)
            .await;

        let store = LocalStore::in_memory();
        let auth = client(&server.uri(), &store);

        let user = auth.login("ada@example.com", "pw").await.unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(store.session().token().await.unwrap(), Some(jwt));
        assert_eq!(
            auth.token_info().await.unwrap().unwrap().role,
            Some(Role::Admin)
        );
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "message": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let store = LocalStore::in_memory();
        let err = client(&server.uri(), &store)
            .login("ada@example.com", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Unauthorized(ref m) if m == "Invalid credentials"));
        assert!(store.session().token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_roles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .and(body_string_contains("restaurantManager"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "message": "ok" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .and(body_string_contains("\"customer\""))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "token": "tok", "user": user_json("customer") })),
            )
            .mount(&server)
            .await;

        let store = LocalStore::in_memory();
        let auth = client(&server.uri(), &store);

        let manager = Registration {
            full_name: "Rita".into(),
            email: "rita@example.com".into(),
            password: "pw".into(),
            contact_number: "0123".into(),
            role: Role::RestaurantManager,
            restaurant: Some(RestaurantInfo {
                name: "Rita's".into(),
                address: "1 Main St".into(),
            }),
        };
        assert_eq!(
            auth.register(&manager).await.unwrap(),
            RegistrationOutcome::PendingApproval
        );
        assert!(store.session().token().await.unwrap().is_none());

        let customer = Registration {
            role: Role::Customer,
            restaurant: None,
            ..manager
        };
        assert!(matches!(
            auth.register(&customer).await.unwrap(),
            RegistrationOutcome::Active { user: Some(_) }
        ));
        assert_eq!(store.session().token().await.unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_restore_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/profile"))
            .and(header("authorization", "Bearer good"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "user": user_json("customer") })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/profile"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({ "message": "Invalid Token" })))
            .mount(&server)
            .await;

        let store = LocalStore::in_memory();
        let auth = client(&server.uri(), &store);
        assert_eq!(auth.restore_session().await.unwrap(), None);

        store.session().set_token("good").await.unwrap();
        let user = auth.restore_session().await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");

        store.session().set_token("stale").await.unwrap();
        assert_eq!(auth.restore_session().await.unwrap(), None);
        assert!(store.session().token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_session_keeps_token_when_unreachable() {
        let store = LocalStore::in_memory();
        store.session().set_token("good").await.unwrap();

        let auth = client("http://127.0.0.1:9", &store);
        assert!(auth.restore_session().await.unwrap_err().is_connectivity());
        assert!(store.session().token().await.unwrap().is_some());

        auth.logout().await.unwrap();
        assert!(store.session().token().await.unwrap().is_none());
    }
}
