// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! HTTP API of the simulator.
//!
//! Handlers are thin: check the session preconditions, issue or forward one
//! vendor call, and update the session only after the vendor accepted it.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::history::{
    ConversationHistory, channel_address, establish_request, history_request, now_millis,
};
use crate::session::SessionStatus;
use crate::state::AppState;
use crate::vendor::{FileUpload, VendorResponse};
use sim_auth::{FailureReason, IssuanceResult};

/// Largest file accepted by the send-file endpoint.
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

// room for the multipart envelope and the caption on top of the file
const SEND_FILE_BODY_LIMIT: usize = MAX_FILE_SIZE + 1024 * 1024;

const TYPING_STARTED: &str = "TypingStartedIndicator";
const TYPING_STOPPED: &str = "TypingStoppedIndicator";

const OAUTH_TOKEN_HEADER: &str = "x-oauth-token";

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/generate-token", post(generate_token))
        .route(
            "/api/generate-token-unauthenticated",
            post(generate_token_unauthenticated),
        )
        .route("/api/generate-oauth-token", post(generate_oauth_token))
        .route("/api/create-conversation", post(create_conversation))
        .route("/api/send-typing-indicator", post(send_typing_indicator))
        .route("/api/send-message", post(send_message))
        .route(
            "/api/send-file",
            post(send_file).layer(DefaultBodyLimit::max(SEND_FILE_BODY_LIMIT)),
        )
        .route("/api/close-conversation", post(close_conversation))
        .route("/api/end-session", post(end_session))
        .route("/api/list-conversations", get(list_conversations))
        .route(
            "/api/list-conversation-entries/{conversation_id}",
            get(list_conversation_entries),
        )
        .route("/api/sse-config", get(sse_config))
        .route(
            "/api/send-conversation-history",
            post(send_conversation_history),
        )
        .route("/api/status", get(status))
        .route("/api/load-dummy-conversation", get(load_dummy_conversation))
        .with_state(state)
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Parse a JSON body that may be omitted entirely.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

fn require_token(state: &AppState) -> Result<String, ApiError> {
    state
        .session
        .access_token()
        .ok_or_else(ApiError::no_access_token)
}

/// Token and conversation id, in that order of precedence for errors.
fn require_conversation(state: &AppState) -> Result<(String, String), ApiError> {
    let snapshot = state.session.snapshot();
    let token = snapshot
        .access_token
        .ok_or_else(ApiError::no_access_token)?;
    let conversation_id = snapshot
        .conversation_id
        .ok_or_else(ApiError::no_conversation)?;
    Ok((token, conversation_id))
}

fn accepted(response: VendorResponse) -> Result<VendorResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        warn!(status = response.status, "vendor rejected the request");
        Err(ApiError::vendor(response.status, response.body))
    }
}

fn response_data(response: &VendorResponse) -> Value {
    response.json().unwrap_or_else(|| json!({}))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    subject: Option<String>,
}

fn assertion_preview(assertion: &str) -> String {
    format!("{}...", assertion.chars().take(50).collect::<String>())
}

async fn generate_token(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let request: TokenRequest = optional_json(&body)?;

    match state
        .issuer
        .issue_authenticated(request.subject.as_deref())
        .await
    {
        IssuanceResult::Success {
            token,
            raw_response,
            assertion,
        } => {
            state.session.store_token(&token);
            info!("authenticated access token stored");

            Ok(Json(json!({
                "success": true,
                "data": raw_response,
                "jwt_generated": assertion.as_deref().map(assertion_preview),
            })))
        }
        IssuanceResult::Failure(failure) => {
            warn!(reason = %failure.reason, "authenticated token issuance failed");
            Err(failure.into())
        }
    }
}

async fn generate_token_unauthenticated(State(state): State<Arc<AppState>>) -> ApiResult {
    match state.issuer.issue_unauthenticated().await {
        IssuanceResult::Success {
            token,
            raw_response,
            ..
        } => {
            state.session.store_token(&token);
            info!("unauthenticated access token stored");

            Ok(Json(json!({"success": true, "data": raw_response})))
        }
        IssuanceResult::Failure(failure) => {
            warn!(reason = %failure.reason, "unauthenticated token issuance failed");
            Err(failure.into())
        }
    }
}

async fn generate_oauth_token(State(state): State<Arc<AppState>>) -> ApiResult {
    match state.issuer.issue_client_credentials().await {
        IssuanceResult::Success { token, .. } => Ok(Json(json!({
            "success": true,
            "access_token": token.secret(),
            "token_type": token.token_type,
            "instance_url": token.instance_url,
            "scope": token.scope,
        }))),
        IssuanceResult::Failure(failure) => {
            warn!(reason = %failure.reason, "OAuth token issuance failed");
            match (failure.reason, failure.status) {
                (FailureReason::VendorExchangeFailure, Some(status)) => Err(ApiError::relay(
                    status,
                    format!("OAuth failed with status {}", status),
                    failure.body.unwrap_or_default(),
                )),
                _ => Err(failure.into()),
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationRequest {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    routing_attributes: Option<Value>,
}

async fn create_conversation(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let token = require_token(&state)?;
    let request: CreateConversationRequest = optional_json(&body)?;

    let conversation_id = Uuid::new_v4().to_string();
    let language = request.language.as_deref().filter(|l| !l.is_empty());
    let routing_attributes = request.routing_attributes.as_ref().filter(|v| !is_blank(v));

    let response = accepted(
        state
            .vendor
            .create_conversation(&token, &conversation_id, language, routing_attributes)
            .await?,
    )?;

    let channel_address = response
        .json()
        .and_then(|body| {
            body.get("channelAddressIdentifier")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
    state
        .session
        .store_conversation(&conversation_id, channel_address);
    info!(%conversation_id, "conversation created");

    let raw = if response.body.is_empty() {
        "Created".to_string()
    } else {
        response.body.clone()
    };

    Ok(Json(json!({
        "success": true,
        "conversationId": conversation_id,
        "message": "Conversation created successfully",
        "status_code": response.status,
        "response": raw,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingRequest {
    #[serde(default)]
    entry_type: Option<String>,
}

async fn send_typing_indicator(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let (token, conversation_id) = require_conversation(&state)?;
    let request: TypingRequest = optional_json(&body)?;

    let entry_type = match request.entry_type.as_deref() {
        Some(t @ (TYPING_STARTED | TYPING_STOPPED)) => t,
        _ => {
            return Err(ApiError::bad_request(
                "Invalid entryType. Must be 'TypingStartedIndicator' or 'TypingStoppedIndicator'.",
            ));
        }
    };

    let indicator_id = Uuid::new_v4().to_string();
    accepted(
        state
            .vendor
            .send_typing_indicator(&token, &conversation_id, entry_type, &indicator_id)
            .await?,
    )?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Typing indicator sent: {}", entry_type),
        "entryType": entry_type,
        "indicatorId": indicator_id,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct MessageRequest {
    #[serde(default)]
    text: String,
}

async fn send_message(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let (token, conversation_id) = require_conversation(&state)?;
    let request: MessageRequest = optional_json(&body)?;

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("Message text cannot be empty."));
    }

    let message_id = Uuid::new_v4().to_string();
    let response = accepted(
        state
            .vendor
            .send_message(&token, &conversation_id, &message_id, text)
            .await?,
    )?;

    Ok(Json(json!({
        "success": true,
        "message": "Message sent successfully",
        "messageId": message_id,
        "responseData": response_data(&response),
    })))
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    data: Bytes,
}

/// Pull the `file` and `caption` fields out of the form.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), ApiError> {
    let mut file = None;
    let mut caption = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("caption") => {
                caption = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?,
                );
            }
            _ => {}
        }
    }

    Ok((file, caption))
}

async fn send_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let (token, conversation_id) = require_conversation(&state)?;

    let (file, caption) = match multipart {
        Ok(multipart) => read_upload(multipart).await?,
        Err(rejection) => {
            debug!(error = %rejection, "request is not a multipart form");
            (None, None)
        }
    };

    let file = file.ok_or_else(|| ApiError::bad_request("No file uploaded."))?;
    if file.file_name.is_empty() {
        return Err(ApiError::bad_request("No file selected."));
    }

    let file_size = file.data.len();
    if file_size > MAX_FILE_SIZE {
        return Err(ApiError::bad_request(format!(
            "File too large. Maximum size is 5MB. Your file is {:.2}MB.",
            file_size as f64 / 1024.0 / 1024.0
        )));
    }

    let upload = FileUpload {
        message_id: Uuid::new_v4().to_string(),
        file_id: Uuid::new_v4().to_string(),
        caption,
        file_name: file.file_name.clone(),
        content_type: file.content_type,
        data: file.data.to_vec(),
    };
    let message_id = upload.message_id.clone();
    let file_id = upload.file_id.clone();

    let response = accepted(
        state
            .vendor
            .send_file(&token, &conversation_id, upload)
            .await?,
    )?;

    Ok(Json(json!({
        "success": true,
        "message": "File sent successfully",
        "messageId": message_id,
        "fileId": file_id,
        "filename": file.file_name,
        "fileSize": file_size,
        "responseData": response_data(&response),
    })))
}

async fn close_conversation(State(state): State<Arc<AppState>>) -> ApiResult {
    let (token, conversation_id) = require_conversation(&state)?;

    accepted(
        state
            .vendor
            .close_conversation(&token, &conversation_id)
            .await?,
    )?;
    state.session.clear_conversation();
    info!(%conversation_id, "conversation closed");

    Ok(Json(json!({
        "success": true,
        "message": "Conversation closed successfully",
    })))
}

async fn end_session(State(state): State<Arc<AppState>>) -> ApiResult {
    let (token, conversation_id) = require_conversation(&state)?;

    accepted(state.vendor.end_session(&token, &conversation_id).await?)?;
    info!(%conversation_id, "messaging session ended");

    Ok(Json(json!({
        "success": true,
        "message": "Messaging session ended successfully. Conversation remains open.",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListConversationsQuery {
    #[serde(default)]
    incl_closed_convs: Option<String>,
    #[serde(default)]
    limit: Option<String>,
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResult {
    let token = require_token(&state)?;

    let include_closed = query
        .incl_closed_convs
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let limit = query.limit.unwrap_or_else(|| "20".to_string());

    let response = accepted(
        state
            .vendor
            .list_conversations(&token, include_closed, &limit)
            .await?,
    )?;

    Ok(Json(json!({"success": true, "data": response_data(&response)})))
}

#[derive(Debug, Deserialize)]
struct ListEntriesQuery {
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    direction: Option<String>,
}

async fn list_conversation_entries(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<ListEntriesQuery>,
) -> ApiResult {
    let token = require_token(&state)?;

    let limit = query.limit.unwrap_or_else(|| "20".to_string());
    let direction = query.direction.unwrap_or_else(|| "FromEnd".to_string());

    let response = accepted(
        state
            .vendor
            .list_entries(&token, &conversation_id, &limit, &direction)
            .await?,
    )?;

    Ok(Json(json!({"success": true, "data": response_data(&response)})))
}

async fn sse_config(State(state): State<Arc<AppState>>) -> ApiResult {
    let snapshot = state.session.snapshot();
    let token = snapshot
        .access_token
        .clone()
        .ok_or_else(ApiError::no_access_token)?;
    let conversation_id = snapshot
        .conversation_id
        .as_deref()
        .map(str::to_lowercase)
        .ok_or_else(ApiError::no_conversation)?;

    let settings = &state.settings;
    Ok(Json(json!({
        "success": true,
        "sse_url": format!("{}/eventrouter/v1/sse", settings.scrt_url),
        "access_token": token,
        "org_id": settings.org_id,
        "query_params": {
            "channelType": "embedded_messaging",
            "channelAddressIdentifier": channel_address(&snapshot),
            "conversationId": conversation_id,
            "channelPlatformKey": settings.channel_platform_key,
        },
    })))
}

async fn send_conversation_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let snapshot = state.session.snapshot();
    let header_token = headers
        .get(OAUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let token = match (&header_token, &snapshot.access_token) {
        (Some(token), _) | (None, Some(token)) => token.clone(),
        (None, None) => return Err(ApiError::no_access_token()),
    };
    if header_token.is_none() && snapshot.conversation_id.is_none() {
        return Err(ApiError::no_conversation());
    }

    let value: Value = optional_json(&body)?;
    if is_blank(&value) {
        return Err(ApiError::bad_request("No conversation history data provided"));
    }
    let history: ConversationHistory = serde_json::from_value(value)
        .map_err(|e| ApiError::bad_request(format!("Invalid conversation history: {}", e)))?;
    if history.participants.is_empty() {
        return Err(ApiError::bad_request(
            "No participants provided in conversation data",
        ));
    }

    let address = channel_address(&snapshot);
    debug!(channel_address = %address, "replaying conversation history");

    let established = state
        .vendor
        .establish_conversation(&token, &establish_request(&address, &history))
        .await?;
    if !established.is_success() {
        warn!(status = established.status, "establish conversation rejected");
        return Err(ApiError::bad_request(format!(
            "Failed to establish conversation: Establish conversation failed with status {}: {}",
            established.status, established.body
        )));
    }
    let established = established.json().unwrap_or(Value::Null);

    let request = history_request(&address, &history, now_millis());
    let entries_sent = request.conversation_entries.len();
    let response = accepted(
        state
            .vendor
            .send_conversation_history(&token, &request)
            .await?,
    )?;
    let response = response_data(&response);
    info!(entries_sent, "conversation history sent");

    Ok(Json(json!({
        "success": true,
        "messagingSessionId": response.get("messagingSessionId"),
        "message": format!("Successfully sent {} conversation entries", entries_sent),
        "entriesSent": entries_sent,
        "response": response,
        "conversationIdentifier": established.get("conversationIdentifier"),
        "establishedMessagingSessionId": established.get("messagingSessionId"),
    })))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(state.session.status())
}

async fn load_dummy_conversation(State(state): State<Arc<AppState>>) -> ApiResult {
    let path = &state.settings.dummy_conversation;
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "dummy conversation file missing");
            return Err(ApiError::not_found("Dummy conversation file not found"));
        }
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };

    let conversation: Value =
        serde_json::from_str(&content).map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({"success": true, "conversation": conversation})))
}
