use crate::error::{AppError, AppResult};
use crate::factors::FactorKind;
use crate::session::{PENDING_USER_KEY, USER_KEY};
use crate::state::AppState;
use crate::webauthn::challenge::store_challenge;
use crate::webauthn::types::CredentialRequestOptions;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

#[derive(Debug, Deserialize)]
pub struct WebAuthnRequest {
    /// The assertion as produced by `navigator.credentials.get()`, JSON encoded
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct BackupCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct TotpRequest {
    pub token: String,
}

async fn pending_user(session: &Session) -> AppResult<String> {
    session
        .get::<String>(PENDING_USER_KEY)
        .await?
        .ok_or_else(|| AppError::Unauthorized("No login in progress".to_string()))
}

/// Run the verifier for `kind` and, on success, promote the pending user to
/// a logged-in user.
async fn complete(
    state: &AppState,
    session: &Session,
    kind: FactorKind,
    submission: &str,
) -> AppResult<Json<Value>> {
    let user_id = pending_user(session).await?;

    state.verifier(kind).verify(&user_id, session, submission).await?;

    session.remove::<String>(PENDING_USER_KEY).await?;
    session.cycle_id().await?;
    session.insert(USER_KEY, &user_id).await?;

    tracing::info!(user_id = %user_id, factor = %kind, "Second factor verified");

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "factor": kind
    })))
}

/// Issue a fresh challenge for the pending user's security keys.
///
/// Replaces any challenge already in the session.
pub async fn webauthn_challenge(
    session: Session,
    State(state): State<AppState>,
) -> AppResult<Json<CredentialRequestOptions>> {
    let user_id = pending_user(&session).await?;

    let challenge = state.challenges.generate(&user_id).await?;
    store_challenge(&session, &challenge).await?;

    tracing::debug!(
        user_id = %user_id,
        allowed = challenge.allowed_credentials.len(),
        "WebAuthn challenge issued"
    );

    Ok(Json(challenge.request_options()))
}

pub async fn webauthn_verify(
    session: Session,
    State(state): State<AppState>,
    Json(req): Json<WebAuthnRequest>,
) -> AppResult<Json<Value>> {
    complete(&state, &session, FactorKind::WebAuthn, &req.response).await
}

pub async fn backup_code_verify(
    session: Session,
    State(state): State<AppState>,
    Json(req): Json<BackupCodeRequest>,
) -> AppResult<Json<Value>> {
    complete(&state, &session, FactorKind::BackupCode, &req.code).await
}

pub async fn totp_verify(
    session: Session,
    State(state): State<AppState>,
    Json(req): Json<TotpRequest>,
) -> AppResult<Json<Value>> {
    complete(&state, &session, FactorKind::Totp, &req.token).await
}

/// Where the session stands in the two-step login
pub async fn status(session: Session) -> AppResult<Json<Value>> {
    let pending: Option<String> = session.get(PENDING_USER_KEY).await?;
    let user_id: Option<String> = session.get(USER_KEY).await?;

    Ok(Json(json!({
        "authenticated": user_id.is_some(),
        "user_id": user_id,
        "second_factor_pending": pending.is_some()
    })))
}
