use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use parley_shared::types::{AttachmentKind, PairStatus, RequestId, UserId};
use parley_store::{ChatRequest, Message, User};

use crate::auth::AuthUser;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway;
use crate::media::LocalMediaHost;
use crate::service::{AttachmentUpload, ChatService, MessageDraft};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub media: Arc<LocalMediaHost>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(gateway::ws_handler))
        .route("/users", get(list_users))
        .route("/requests", post(send_request).get(list_pending_requests))
        .route("/requests/accepted-users", get(accepted_users))
        .route("/requests/status/:user_id", get(request_status))
        .route("/requests/:request_id/accept", put(accept_request))
        .route("/requests/:request_id/reject", put(reject_request))
        .route("/messages/:user_id", get(get_messages).post(send_message))
        .route("/media/:id", get(fetch_media))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct SendRequestBody {
    receiver_id: String,
}

#[derive(Deserialize)]
struct SendMessageBody {
    text: Option<String>,
    attachment: Option<AttachmentBody>,
}

#[derive(Deserialize)]
struct AttachmentBody {
    /// Base64-encoded file bytes.
    data: String,
    kind: AttachmentKind,
    name: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: PairStatus,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    max_attachment_size: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        max_attachment_size: state.config.max_attachment_size,
    })
}

async fn send_request(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    Json(body): Json<SendRequestBody>,
) -> Result<(StatusCode, Json<ChatRequest>), ServerError> {
    let receiver_id = body.receiver_id.trim();
    if receiver_id.is_empty() {
        return Err(ServerError::BadRequest("receiver_id is required".to_string()));
    }

    let request = state
        .service
        .send_request(sender, UserId::new(receiver_id))
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_pending_requests(
    State(state): State<AppState>,
    AuthUser(receiver): AuthUser,
) -> Result<Json<Vec<ChatRequest>>, ServerError> {
    let requests = state.service.pending_requests(&receiver).await?;
    Ok(Json(requests))
}

async fn accepted_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<User>>, ServerError> {
    let peers = state.service.accepted_peers(&user).await?;
    Ok(Json(peers))
}

async fn request_status(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    let status = state
        .service
        .pair_status(&me, &UserId::new(user_id))
        .await?;
    Ok(Json(StatusResponse { status }))
}

async fn accept_request(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ChatRequest>, ServerError> {
    let updated = state.service.accept_request(RequestId(request_id)).await?;
    Ok(Json(updated))
}

async fn reject_request(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ChatRequest>, ServerError> {
    let updated = state.service.reject_request(RequestId(request_id)).await?;
    Ok(Json(updated))
}

async fn list_users(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> Result<Json<Vec<User>>, ServerError> {
    let users = state.service.list_users(&viewer).await?;
    Ok(Json(users))
}

async fn get_messages(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let messages = state
        .service
        .transcript(&me, &UserId::new(user_id))
        .await?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let attachment = body
        .attachment
        .map(|a| {
            let data = BASE64.decode(a.data).map_err(|e| {
                ServerError::BadRequest(format!("invalid attachment encoding: {e}"))
            })?;
            Ok::<_, ServerError>(AttachmentUpload {
                data,
                kind: a.kind,
                name: a.name,
            })
        })
        .transpose()?;

    let draft = MessageDraft {
        text: body.text,
        attachment,
    };
    let message = state
        .service
        .submit_message(sender, UserId::new(user_id), draft)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn fetch_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Vec<u8>, ServerError> {
    state.media.fetch(id).await
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parley_store::Database;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let media = Arc::new(
            LocalMediaHost::new(dir.path().to_path_buf(), 1024 * 1024)
                .await
                .unwrap(),
        );
        let service = Arc::new(ChatService::new(
            Database::open_in_memory().unwrap(),
            media.clone(),
        ));
        let state = AppState {
            service,
            media,
            config: Arc::new(ServerConfig::default()),
        };
        (state, dir)
    }

    fn json_request(method: &str, uri: &str, user: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-user-id", user)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_open() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_an_identity() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/requests").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_request_is_a_conflict() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let body = r#"{"receiver_id":"b1"}"#;
        let response = app
            .clone()
            .oneshot(json_request("POST", "/requests", "a1", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(json_request("POST", "/requests", "a1", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn accept_flow_updates_the_pair_status() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/requests", "a1", r#"{"receiver_id":"b1"}"#))
            .await
            .unwrap();
        let created = body_json(response).await;
        let request_id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/requests/{request_id}/accept"),
                "b1",
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The derived status is accepted from both directions.
        for (viewer, other) in [("a1", "b1"), ("b1", "a1")] {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/requests/status/{other}"))
                        .header("x-user-id", viewer)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let status = body_json(response).await;
            assert_eq!(status["status"], "accepted");
        }
    }

    #[tokio::test]
    async fn accepting_an_unknown_request_is_not_found() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/requests/{}/accept", Uuid::new_v4()),
                "b1",
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn messaging_is_gated_on_acceptance() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let message_body = r#"{"text":"hi"}"#;
        let response = app
            .clone()
            .oneshot(json_request("POST", "/messages/b1", "a1", message_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/requests", "a1", r#"{"receiver_id":"b1"}"#))
            .await
            .unwrap();
        let request_id = body_json(response).await["id"].as_str().unwrap().to_string();
        app.clone()
            .oneshot(json_request(
                "PUT",
                &format!("/requests/{request_id}/accept"),
                "b1",
                "",
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/messages/b1", "a1", message_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::get("/messages/a1")
                    .header("x-user-id", "b1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let transcript = body_json(response).await;
        assert_eq!(transcript.as_array().unwrap().len(), 1);
        assert_eq!(transcript[0]["text"], "hi");
    }

    #[tokio::test]
    async fn missing_media_is_not_found() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::get(format!("/media/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
