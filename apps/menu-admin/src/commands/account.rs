//! Account commands against the user-management service.

use std::fmt::Write as _;

use serde::Serialize;

use menu_sync::{RegistrationOutcome, TokenInfo, UserProfile};

use super::CommandOutput;
use crate::args::RegistrationArgs;
use crate::error::{AppError, AppResult, ErrorCode};
use crate::state::AppState;

fn describe(user: &UserProfile) -> String {
    let mut line = format!("{} <{}> ({})", user.full_name, user.email, user.role);
    if let Some(restaurant) = &user.restaurant_info {
        let _ = write!(line, ", {}", restaurant.name);
    }
    if !user.is_approved {
        line.push_str(", awaiting approval");
    }
    line
}

pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<CommandOutput> {
    let user = state.auth.login(email, password).await?;
    CommandOutput::new(format!("Signed in as {}", describe(&user)), &user)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterView<'a> {
    pending_approval: bool,
    user: Option<&'a UserProfile>,
}

pub async fn register(state: &AppState, args: &RegistrationArgs) -> AppResult<CommandOutput> {
    let outcome = state.auth.register(&args.to_registration()).await?;

    match &outcome {
        RegistrationOutcome::PendingApproval => CommandOutput::new(
            format!(
                "Registered {} as {}. An administrator must approve the account before you can sign in",
                args.email, args.role
            ),
            &RegisterView {
                pending_approval: true,
                user: None,
            },
        ),
        RegistrationOutcome::Active { user } => {
            let text = match user {
                Some(user) => format!("Registered and signed in as {}", describe(user)),
                None => format!("Registered {}. Sign in with `login`", args.email),
            };
            CommandOutput::new(
                text,
                &RegisterView {
                    pending_approval: false,
                    user: user.as_ref(),
                },
            )
        }
    }
}

pub async fn logout(state: &AppState) -> AppResult<CommandOutput> {
    state.auth.logout().await?;
    Ok(CommandOutput::message("Signed out"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoamiView {
    user: Option<UserProfile>,
    verified: bool,
    expires_in_secs: Option<u64>,
    needs_refresh: bool,
}

/// `whoami`: verifies the stored session.
///
/// When the service is unreachable the token's own claims are shown instead.
pub async fn whoami(state: &AppState) -> AppResult<CommandOutput> {
    let info: Option<TokenInfo> = state.auth.token_info().await.unwrap_or(None);

    match state.auth.restore_session().await {
        Ok(Some(user)) => {
            let mut text = format!("Signed in as {}", describe(&user));
            if let Some(secs) = info.as_ref().and_then(TokenInfo::remaining_secs) {
                let _ = write!(text, "\nSession expires in {}m", secs / 60);
            }
            if info.as_ref().is_some_and(TokenInfo::needs_refresh) {
                text.push_str("\nSession expires soon, sign in again to renew it");
            }
            CommandOutput::new(
                text,
                &WhoamiView {
                    verified: true,
                    expires_in_secs: info.as_ref().and_then(TokenInfo::remaining_secs),
                    needs_refresh: info.as_ref().is_some_and(TokenInfo::needs_refresh),
                    user: Some(user),
                },
            )
        }
        Ok(None) => Err(AppError::new(ErrorCode::Unauthorized, "Not signed in")),
        Err(e) if e.is_connectivity() => {
            let Some(info) = info else {
                return Err(e.into());
            };
            let text = format!(
                "User service unreachable; stored session for {} ({}), not verified",
                info.subject.as_deref().unwrap_or("unknown user"),
                info.role.map(|r| r.to_string()).unwrap_or_else(|| "no role".into())
            );
            CommandOutput::new(
                text,
                &WhoamiView {
                    user: None,
                    verified: false,
                    expires_in_secs: info.remaining_secs(),
                    needs_refresh: info.needs_refresh(),
                },
            )
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use menu_sync::{MenuConfig, Role};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jwt(role: &str) -> String {
        encode(
            &Header::default(),
            &serde_json::json!({ "id": "u1", "role": role, "exp": Utc::now().timestamp() + 7200 }),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    fn user_json(role: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": "u1",
            "fullName": "Mario Rossi",
            "email": "mario@example.com",
            "contactNumber": "0123",
            "role": role,
            "isApproved": true,
            "restaurantInfo": { "name": "Napoli", "address": "1 Via Roma" }
        })
    }

    fn state_for(auth_url: String) -> AppState {
        let mut config = MenuConfig::default();
        config.api.catalog_url = "http://127.0.0.1:9".to_string();
        config.api.auth_url = auth_url;
        AppState::in_memory(config).unwrap()
    }

    #[tokio::test]
    async fn test_login_then_whoami() {
        let server = MockServer::start().await;
        let token = jwt("restaurantManager");
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "token": token, "user": user_json("restaurantManager") }),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "user": user_json("restaurantManager") })),
            )
            .mount(&server)
            .await;

        let state = state_for(format!("{}/api", server.uri()));

        let out = login(&state, "mario@example.com", "pw").await.unwrap();
        assert_eq!(
            out.text,
            "Signed in as Mario Rossi <mario@example.com> (restaurantManager), Napoli"
        );

        let out = whoami(&state).await.unwrap();
        assert_eq!(out.json["verified"], true);
        assert_eq!(out.json["needsRefresh"], false);
        assert!(out.text.contains("Session expires in"));
    }

    #[tokio::test]
    async fn test_whoami_offline_uses_claims() {
        let state = state_for("http://127.0.0.1:9/api".to_string());
        state.store.session().set_token(&jwt("admin")).await.unwrap();

        let out = whoami(&state).await.unwrap();
        assert_eq!(out.json["verified"], false);
        assert!(out.text.contains("stored session for u1 (admin)"));
    }

    #[tokio::test]
    async fn test_whoami_signed_out() {
        let state = state_for("http://127.0.0.1:9/api".to_string());
        let err = whoami(&state).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_register_manager_awaits_approval() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(
                serde_json::json!({ "message": "Registration submitted for approval" }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let state = state_for(format!("{}/api", server.uri()));
        let args = RegistrationArgs {
            full_name: "Mario Rossi".into(),
            email: "mario@example.com".into(),
            password: "pw".into(),
            contact_number: "0123".into(),
            role: Role::RestaurantManager,
            restaurant_name: Some("Napoli".into()),
            restaurant_address: Some("1 Via Roma".into()),
        };

        let out = register(&state, &args).await.unwrap();
        assert_eq!(out.json["pendingApproval"], true);
        assert!(state.store.session().token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let state = state_for("http://127.0.0.1:9/api".to_string());
        state.store.session().set_token(&jwt("admin")).await.unwrap();

        logout(&state).await.unwrap();
        assert!(state.store.session().token().await.unwrap().is_none());
    }
}
