use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use cadenza_core::WorldError;

/// Client error codes of the score protocol.
fn error_code(error: &WorldError) -> i32 {
    match error {
        WorldError::Input(_) => 108,
        WorldError::MapLocked => 1001,
        WorldError::NoData(_) => 401,
        WorldError::ItemUnavailable => 501,
        WorldError::TokenInvalid => 923,
        WorldError::StaminaShortage => 905,
        WorldError::WorldModeLocked(_) => 1205,
        WorldError::Content(_) | WorldError::Store(_) => 999,
    }
}

pub enum Error {
    World(WorldError),
    Unauthorized,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::World(error) => {
                let code = error_code(&error);

                let status = match &error {
                    WorldError::Content(_) | WorldError::Store(_) => {
                        tracing::error!(%error, "internal failure serving a score request");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::OK,
                };

                (
                    status,
                    Json(serde_json::json!({
                        "success": false,
                        "error_code": code,
                    })),
                )
                    .into_response()
            }
            Error::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "success": false,
                    "error_code": 403,
                })),
            )
                .into_response(),
        }
    }
}

impl From<WorldError> for Error {
    fn from(value: WorldError) -> Self {
        Self::World(value)
    }
}

/// The protocol's success envelope.
pub fn success(value: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "value": value,
    }))
}
