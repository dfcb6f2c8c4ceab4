//! Phone verification endpoints.

use axum::{Json, Router, extract::State, routing::post};
use gifted_common::AppResult;
use gifted_core::{ConfirmCodeInput, SendCodeInput};
use serde::Serialize;

use crate::{extractors::AuthUser, middleware::AppState};

/// Plain message response.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Store a phone number and text a verification code to it.
async fn send(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendCodeInput>,
) -> AppResult<Json<MessageResponse>> {
    state
        .verification_service
        .send_code(user, &req.phone_number)
        .await?;

    Ok(Json(MessageResponse {
        message: "Verification code sent to your phone",
    }))
}

/// Confirm the code sent by [`send`].
async fn confirm(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ConfirmCodeInput>,
) -> AppResult<Json<MessageResponse>> {
    state.verification_service.confirm(user, &req.code).await?;

    Ok(Json(MessageResponse {
        message: "Phone verified successfully!",
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .route("/confirm", post(confirm))
}
