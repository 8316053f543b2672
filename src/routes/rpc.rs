//! Procedure envelope shared by the `/api/trpc/<namespace>.<procedure>` routes.
//!
//! Queries are `GET` with a JSON-encoded `input` query parameter, mutations
//! are `POST` with a JSON body. Successful results are wrapped as
//! `{ "result": { "data": ... } }`.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::collections::HashMap;

use crate::services::error::AppError;

/// Successful procedure result
pub struct Rpc<T>(pub T);

impl<T: Serialize> IntoResponse for Rpc<T> {
    fn into_response(self) -> Response {
        Json(json!({ "result": { "data": self.0 } })).into_response()
    }
}

/// Query procedure input taken from `?input=<json>`
pub struct QueryInput<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryInput<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let raw = params.get("input").map(String::as_str).unwrap_or("{}");
        serde_json::from_str(raw)
            .map(QueryInput)
            .map_err(|e| AppError::BadRequest(format!("Invalid input: {}", e)))
    }
}

/// Mutation procedure input taken from the JSON body
pub struct MutationInput<T>(pub T);

impl<S, T> FromRequest<S> for MutationInput<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid input: {}", e.body_text())))?;
        Ok(MutationInput(value))
    }
}

/// `{ "success": true }`
#[derive(Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Rpc<Self> {
        Rpc(Self { success: true })
    }
}
