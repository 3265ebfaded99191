use crate::error::AppError;
use crate::session::PENDING_USER_KEY;
use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

/// Only lets a request through while a login is waiting for its second factor.
pub async fn require_pending_user(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id: Option<String> = session.get(PENDING_USER_KEY).await?;

    match user_id {
        Some(_) => Ok(next.run(request).await),
        None => Err(AppError::Unauthorized("No login in progress".to_string())),
    }
}
