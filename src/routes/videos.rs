//! videos.* - history of the caller's videos

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthUser;
use super::rpc::{MutationInput, QueryInput, Rpc, Success};
use crate::AppState;
use crate::models::{Video, VideoPatch};
use crate::services::error::{AppError, AppResult};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trpc/videos.list", get(list))
        .route("/api/trpc/videos.get", get(get_video))
        .route("/api/trpc/videos.delete", post(delete))
        .route("/api/trpc/videos.updateDetails", post(update_details))
}

#[derive(Debug, Deserialize)]
struct IdInput {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDetailsInput {
    id: i64,
    product_name: String,
    product_price: String,
    product_description: String,
}

fn required(field: &'static str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Rpc<Vec<Video>>> {
    Ok(Rpc(state.store.list_videos(user.id).await?))
}

async fn get_video(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    QueryInput(input): QueryInput<IdInput>,
) -> AppResult<Rpc<Video>> {
    let video = state
        .store
        .get_video(user.id, input.id)
        .await?
        .ok_or(AppError::NotFound("Video"))?;
    Ok(Rpc(video))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<IdInput>,
) -> AppResult<Rpc<Success>> {
    if !state.store.delete_video(user.id, input.id).await? {
        return Err(AppError::NotFound("Video"));
    }
    tracing::info!(user_id = user.id, video_id = input.id, "[videos] deleted");
    Ok(Success::ok())
}

async fn update_details(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<UpdateDetailsInput>,
) -> AppResult<Rpc<Success>> {
    let patch = VideoPatch {
        product_name: Some(required("productName", input.product_name)?),
        product_price: Some(required("productPrice", input.product_price)?),
        product_description: Some(required("productDescription", input.product_description)?),
        ..Default::default()
    };

    state
        .store
        .update_video(user.id, input.id, patch)
        .await?
        .ok_or(AppError::NotFound("Video"))?;
    Ok(Success::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::models::NewVideo;
    use crate::test_support::{body_json, mutation, query, signed_in, test_state};

    async fn seed(state: &AppState, user_id: i64, name: &str) -> i64 {
        state
            .store
            .create_video(NewVideo {
                user_id,
                product_url: "https://shop.example.com/p/1".into(),
                product_name: name.into(),
                product_price: "$1".into(),
                product_description: "desc".into(),
                product_image: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn list_is_scoped_to_caller() {
        let state = test_state();
        let (alice, alice_token) = signed_in(&state, "alice").await;
        let (bob, _) = signed_in(&state, "bob").await;
        seed(&state, alice.id, "Lamp").await;
        seed(&state, bob.id, "Mug").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(query("/api/trpc/videos.list", &alice_token, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        let videos = body["result"]["data"].as_array().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0]["productName"], "Lamp");
    }

    #[tokio::test]
    async fn get_other_users_video_is_not_found() {
        let state = test_state();
        let (_, alice_token) = signed_in(&state, "alice").await;
        let (bob, _) = signed_in(&state, "bob").await;
        let bob_video = seed(&state, bob.id, "Mug").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(query(
                "/api/trpc/videos.get",
                &alice_token,
                Some(json!({ "id": bob_video })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_details_then_delete() {
        let state = test_state();
        let (user, token) = signed_in(&state, "alice").await;
        let id = seed(&state, user.id, "Lamp").await;
        let app = routes().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(mutation(
                "/api/trpc/videos.updateDetails",
                &token,
                json!({
                    "id": id,
                    "productName": "Glow Lamp",
                    "productPrice": "$20",
                    "productDescription": "Brighter",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let video = state.store.get_video(user.id, id).await.unwrap().unwrap();
        assert_eq!(video.product_name.as_deref(), Some("Glow Lamp"));

        let response = app
            .clone()
            .oneshot(mutation("/api/trpc/videos.delete", &token, json!({ "id": id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(mutation("/api/trpc/videos.delete", &token, json!({ "id": id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_details_are_rejected() {
        let state = test_state();
        let (user, token) = signed_in(&state, "alice").await;
        let id = seed(&state, user.id, "Lamp").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/videos.updateDetails",
                &token,
                json!({
                    "id": id,
                    "productName": " ",
                    "productPrice": "$20",
                    "productDescription": "Brighter",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
