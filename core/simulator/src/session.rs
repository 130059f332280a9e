// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-memory state shared by the HTTP handlers.
//!
//! The simulator drives a single end user, so the state is one slot per
//! value: the current access token, the last event id reported with it, the
//! open conversation and its channel address. Handlers take a snapshot,
//! call the vendor, and write back only after a successful call.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use sim_auth::BearerToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub access_token: Option<String>,
    pub last_event_id: Option<String>,
    pub conversation_id: Option<String>,
    pub channel_address_identifier: Option<String>,
}

/// Summary returned by the status endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub has_access_token: bool,
    pub has_conversation: bool,
    pub conversation_id: Option<String>,
}

/// Cloneable handle on the session slot.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.state.read().conversation_id.clone()
    }

    /// Replace the stored token with a freshly issued one.
    pub fn store_token(&self, token: &BearerToken) {
        let mut state = self.state.write();
        state.access_token = Some(token.secret().to_string());
        state.last_event_id = token.last_event_id.clone();
    }

    /// Record a newly created conversation together with the channel
    /// address the vendor reported for it, if any.
    pub fn store_conversation(&self, conversation_id: &str, channel_address: Option<String>) {
        let mut state = self.state.write();
        state.conversation_id = Some(conversation_id.to_string());
        state.channel_address_identifier = channel_address;
    }

    /// Forget the conversation and its channel address.
    pub fn clear_conversation(&self) {
        let mut state = self.state.write();
        state.conversation_id = None;
        state.channel_address_identifier = None;
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.read();
        SessionStatus {
            has_access_token: state.access_token.is_some(),
            has_conversation: state.conversation_id.is_some(),
            conversation_id: state.conversation_id.clone(),
        }
    }
}
