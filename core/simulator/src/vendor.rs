// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the messaging and interaction service endpoints.
//!
//! Every call is forwarded once with the caller's bearer token. The client
//! does not judge the outcome: it hands the status and raw body back so
//! handlers can relay vendor errors verbatim.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::VendorConfiguration;
use crate::history::{EstablishRequest, HistoryRequest, StaticContent};

const CONVERSATION_PATH: &str = "/iamessage/api/v2/conversation";
const ESTABLISH_PATH: &str = "/api/v1/conversation";
const HISTORY_PATH: &str = "/api/v1/conversationHistory";
const DEFAULT_LANGUAGE: &str = "en_US";

#[derive(Error, Debug)]
pub enum VendorError {
    #[error("vendor request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Status and raw body of a vendor response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorResponse {
    pub status: u16,
    pub body: String,
}

impl VendorResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as JSON; `None` when empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        if self.body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

/// File attached to a conversation message.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub message_id: String,
    pub file_id: String,
    pub caption: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversation<'a> {
    conversation_id: &'a str,
    es_developer_name: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    routing_attributes: Option<&'a Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TypingEntry<'a> {
    entry_type: &'a str,
    id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextMessage<'a> {
    message: StaticContentMessage<'a>,
    es_developer_name: &'a str,
    language: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StaticContentMessage<'a> {
    id: &'a str,
    message_type: &'a str,
    static_content: StaticContent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMessageEntry<'a> {
    es_developer_name: &'a str,
    message: FileMessage<'a>,
    language: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMessage<'a> {
    id: &'a str,
    file_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct VendorClient {
    base_url: String,
    org_id: String,
    es_developer_name: String,
    authorization_context: String,
    client: ReqwestClient,
}

impl VendorClient {
    pub fn new(config: &VendorConfiguration) -> Result<Self, VendorError> {
        Self::with_timeout(config, config.request_timeout)
    }

    pub fn with_timeout(
        config: &VendorConfiguration,
        timeout: Duration,
    ) -> Result<Self, VendorError> {
        let client = ReqwestClient::builder()
            .user_agent("Enhanced Chat Simulator")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: config.scrt_url.trim_end_matches('/').to_string(),
            org_id: config.channel.org_id.clone(),
            es_developer_name: config.channel.es_developer_name.clone(),
            authorization_context: config.authorization_context.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Conversation ids are lower-cased in every vendor path.
    fn conversation_url(&self, conversation_id: &str, suffix: &str) -> String {
        format!(
            "{}{}/{}{}",
            self.base_url,
            CONVERSATION_PATH,
            conversation_id.to_lowercase(),
            suffix
        )
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<VendorResponse, VendorError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        info!(operation, status, "vendor call completed");
        debug!(operation, %body, "vendor response body");

        Ok(VendorResponse { status, body })
    }

    pub async fn create_conversation(
        &self,
        token: &str,
        conversation_id: &str,
        language: Option<&str>,
        routing_attributes: Option<&Value>,
    ) -> Result<VendorResponse, VendorError> {
        let url = format!("{}{}", self.base_url, CONVERSATION_PATH);
        let body = CreateConversation {
            conversation_id,
            es_developer_name: &self.es_developer_name,
            language: language.unwrap_or(DEFAULT_LANGUAGE),
            routing_attributes,
        };

        debug!(%url, %conversation_id, "creating conversation");
        self.send(
            "create_conversation",
            self.client.post(url).bearer_auth(token).json(&body),
        )
        .await
    }

    pub async fn send_typing_indicator(
        &self,
        token: &str,
        conversation_id: &str,
        entry_type: &str,
        indicator_id: &str,
    ) -> Result<VendorResponse, VendorError> {
        let url = self.conversation_url(conversation_id, "/entry");
        let body = TypingEntry {
            entry_type,
            id: indicator_id,
        };

        debug!(%url, %entry_type, "sending typing indicator");
        self.send(
            "send_typing_indicator",
            self.client.post(url).bearer_auth(token).json(&body),
        )
        .await
    }

    pub async fn send_message(
        &self,
        token: &str,
        conversation_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<VendorResponse, VendorError> {
        let url = self.conversation_url(conversation_id, "/message");
        let body = TextMessage {
            message: StaticContentMessage {
                id: message_id,
                message_type: "StaticContentMessage",
                static_content: StaticContent::text(text),
            },
            es_developer_name: &self.es_developer_name,
            language: DEFAULT_LANGUAGE,
        };

        debug!(%url, %message_id, "sending text message");
        self.send(
            "send_message",
            self.client.post(url).bearer_auth(token).json(&body),
        )
        .await
    }

    pub async fn send_file(
        &self,
        token: &str,
        conversation_id: &str,
        upload: FileUpload,
    ) -> Result<VendorResponse, VendorError> {
        let url = self.conversation_url(conversation_id, "/file");
        let entry = FileMessageEntry {
            es_developer_name: &self.es_developer_name,
            message: FileMessage {
                id: &upload.message_id,
                file_id: &upload.file_id,
                text: upload.caption.as_deref().filter(|c| !c.is_empty()),
            },
            language: DEFAULT_LANGUAGE,
        };

        // serializing string-keyed structs cannot fail
        let entry_json = serde_json::to_string(&entry).unwrap_or_default();
        let size = upload.data.len();

        let form = Form::new()
            .part(
                "messageEntry",
                Part::text(entry_json).mime_str("application/json")?,
            )
            .part(
                "fileData",
                Part::bytes(upload.data)
                    .file_name(upload.file_name.clone())
                    .mime_str(&upload.content_type)?,
            );

        debug!(%url, file_name = %upload.file_name, size, "sending file");
        self.send(
            "send_file",
            self.client.post(url).bearer_auth(token).multipart(form),
        )
        .await
    }

    pub async fn close_conversation(
        &self,
        token: &str,
        conversation_id: &str,
    ) -> Result<VendorResponse, VendorError> {
        let url = self.conversation_url(conversation_id, "");

        debug!(%url, "closing conversation");
        self.send(
            "close_conversation",
            self.client
                .delete(url)
                .bearer_auth(token)
                .query(&[("esDeveloperName", self.es_developer_name.as_str())]),
        )
        .await
    }

    pub async fn end_session(
        &self,
        token: &str,
        conversation_id: &str,
    ) -> Result<VendorResponse, VendorError> {
        let url = self.conversation_url(conversation_id, "/session");

        debug!(%url, "ending messaging session");
        self.send(
            "end_session",
            self.client
                .delete(url)
                .bearer_auth(token)
                .query(&[("esDeveloperName", self.es_developer_name.as_str())]),
        )
        .await
    }

    pub async fn list_conversations(
        &self,
        token: &str,
        include_closed: bool,
        limit: &str,
    ) -> Result<VendorResponse, VendorError> {
        let url = format!("{}{}/list", self.base_url, CONVERSATION_PATH);
        let include_closed = if include_closed { "true" } else { "false" };

        self.send(
            "list_conversations",
            self.client
                .get(url)
                .bearer_auth(token)
                .query(&[("inclClosedConvs", include_closed), ("limit", limit)]),
        )
        .await
    }

    pub async fn list_entries(
        &self,
        token: &str,
        conversation_id: &str,
        limit: &str,
        direction: &str,
    ) -> Result<VendorResponse, VendorError> {
        let url = self.conversation_url(conversation_id, "/entries");

        self.send(
            "list_entries",
            self.client
                .get(url)
                .bearer_auth(token)
                .query(&[("limit", limit), ("direction", direction)]),
        )
        .await
    }

    /// Headers shared by the interaction service calls.
    fn interaction_request(&self, url: String, token: &str) -> RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(token)
            .header("OrgId", &self.org_id)
            .header("RequestId", Uuid::new_v4().to_string())
            .header("AuthorizationContext", &self.authorization_context)
    }

    pub async fn establish_conversation(
        &self,
        token: &str,
        request: &EstablishRequest,
    ) -> Result<VendorResponse, VendorError> {
        let url = format!("{}{}", self.base_url, ESTABLISH_PATH);

        debug!(
            %url,
            channel_address = %request.channel_address_identifier,
            participants = request.participants.len(),
            "establishing conversation"
        );
        self.send(
            "establish_conversation",
            self.interaction_request(url, token).json(request),
        )
        .await
    }

    pub async fn send_conversation_history(
        &self,
        token: &str,
        request: &HistoryRequest,
    ) -> Result<VendorResponse, VendorError> {
        let url = format!("{}{}", self.base_url, HISTORY_PATH);

        debug!(
            %url,
            entries = request.conversation_entries.len(),
            "sending conversation history"
        );
        self.send(
            "send_conversation_history",
            self.interaction_request(url, token)
                .header("AuthorizationContextType", "EmbeddedMessagingChannel")
                .json(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ConversationHistory, establish_request, history_request};
    use serde_json::json;
    use sim_auth::exchange::ChannelConfig;
    use wiremock::matchers::{
        body_json, body_string_contains, header, header_exists, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server_uri: &str) -> VendorClient {
        let config = VendorConfiguration::new(
            server_uri,
            ChannelConfig::new("00D000000000001", "Simulator_Deployment"),
        );
        VendorClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_create_conversation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iamessage/api/v2/conversation"))
            .and(header("authorization", "Bearer token-1"))
            .and(body_json(json!({
                "conversationId": "ABC",
                "esDeveloperName": "Simulator_Deployment",
                "language": "en_US"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "channelAddressIdentifier": "channel-1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = client(&mock_server.uri())
            .create_conversation("token-1", "ABC", None, None)
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.status, 201);
        assert_eq!(
            response.json().unwrap()["channelAddressIdentifier"],
            "channel-1"
        );
    }

    #[tokio::test]
    async fn test_conversation_paths_are_lower_cased() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iamessage/api/v2/conversation/abc-def/message"))
            .and(body_json(json!({
                "message": {
                    "id": "msg-1",
                    "messageType": "StaticContentMessage",
                    "staticContent": {"formatType": "Text", "text": "hello"}
                },
                "esDeveloperName": "Simulator_Deployment",
                "language": "en_US"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = client(&mock_server.uri())
            .send_message("token-1", "ABC-DEF", "msg-1", "hello")
            .await
            .unwrap();

        assert_eq!(response.status, 202);
        assert!(response.json().is_none());
    }

    #[tokio::test]
    async fn test_close_and_end_session_queries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/iamessage/api/v2/conversation/abc"))
            .and(query_param("esDeveloperName", "Simulator_Deployment"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/iamessage/api/v2/conversation/abc/session"))
            .and(query_param("esDeveloperName", "Simulator_Deployment"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        assert_eq!(client.close_conversation("t", "ABC").await.unwrap().status, 204);
        assert_eq!(client.end_session("t", "ABC").await.unwrap().status, 204);
    }

    #[tokio::test]
    async fn test_list_calls() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/iamessage/api/v2/conversation/list"))
            .and(query_param("inclClosedConvs", "true"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversations": []})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/iamessage/api/v2/conversation/abc/entries"))
            .and(query_param("limit", "20"))
            .and(query_param("direction", "FromEnd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversationEntries": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let list = client.list_conversations("t", true, "5").await.unwrap();
        assert_eq!(list.json().unwrap(), json!({"conversations": []}));

        let entries = client.list_entries("t", "ABC", "20", "FromEnd").await.unwrap();
        assert!(entries.is_success());
    }

    #[tokio::test]
    async fn test_send_file_multipart() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iamessage/api/v2/conversation/abc/file"))
            .and(header("authorization", "Bearer t"))
            .and(body_string_contains("name=\"messageEntry\""))
            .and(body_string_contains("\"fileId\":\"file-1\""))
            .and(body_string_contains("\"text\":\"a caption\""))
            .and(body_string_contains("name=\"fileData\"; filename=\"notes.txt\""))
            .and(body_string_contains("file contents"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "entry-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let upload = FileUpload {
            message_id: "msg-1".to_string(),
            file_id: "file-1".to_string(),
            caption: Some("a caption".to_string()),
            file_name: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"file contents".to_vec(),
        };

        let response = client(&mock_server.uri())
            .send_file("t", "ABC", upload)
            .await
            .unwrap();
        assert_eq!(response.status, 202);
    }

    #[tokio::test]
    async fn test_interaction_service_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/conversation"))
            .and(header("orgid", "00D000000000001"))
            .and(header("authorizationcontext", "Infobip_Chatbot"))
            .and(header_exists("requestid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversationIdentifier": "conv-1",
                "messagingSessionId": "session-1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/conversationHistory"))
            .and(header("authorizationcontexttype", "EmbeddedMessagingChannel"))
            .and(header_exists("requestid"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "messagingSessionId": "session-2"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let history: ConversationHistory = serde_json::from_value(json!({
            "participants": [{"subject": "u", "role": "EndUser"}],
            "messages": [{"sender": "user", "text": "hi"}]
        }))
        .unwrap();

        let client = client(&mock_server.uri());
        let established = client
            .establish_conversation("t", &establish_request("channel-1", &history))
            .await
            .unwrap();
        assert!(established.is_success());

        let sent = client
            .send_conversation_history("t", &history_request("channel-1", &history, 1))
            .await
            .unwrap();
        assert_eq!(sent.status, 201);
    }

    #[tokio::test]
    async fn test_unreachable_vendor() {
        // nothing listens on the discard port
        let client = client("http://127.0.0.1:9");
        let result = client.list_conversations("t", false, "20").await;
        assert!(matches!(result, Err(VendorError::Request(_))));
    }
}
