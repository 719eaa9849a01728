use axum::Json;

use crate::{middleware::MaybeSession, models::Session};

/// Who is calling; never redirects
pub async fn current_session(MaybeSession(session): MaybeSession) -> Json<Session> {
    Json(session)
}
