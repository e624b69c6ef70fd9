//! The client's mirrored view of server-side state.
//!
//! Holds the online set, the pending-request inbox, the per-peer consent
//! status, and the transcript of the currently selected conversation.
//! [`ClientState::apply`] performs exactly one bounded mutation per event;
//! the `set_*` methods replace mirrored state wholesale from HTTP query
//! results, which is how a client reconciles after a reconnect.

use std::collections::{HashMap, HashSet};

use parley_shared::protocol::{ChatRequestEvent, MessagePayload, ServerEvent};
use parley_shared::types::{PairStatus, UserId};
use tracing::debug;

pub struct ClientState {
    /// The local user's identity.
    me: UserId,
    /// Users currently reachable over a live connection.
    online_users: HashSet<UserId>,
    /// Pending requests addressed to this user, in arrival order.
    chat_requests: Vec<ChatRequestEvent>,
    /// Last known consent status per peer.
    peer_status: HashMap<UserId, PairStatus>,
    /// The peer whose conversation is open, if any.
    selected_peer: Option<UserId>,
    /// Transcript of the selected conversation, oldest first.
    messages: Vec<MessagePayload>,
}

impl ClientState {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            online_users: HashSet::new(),
            chat_requests: Vec::new(),
            peer_status: HashMap::new(),
            selected_peer: None,
            messages: Vec::new(),
        }
    }

    /// Apply one pushed event to the mirrored state.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::NewChatRequest(request) => {
                debug!(request = %request.request_id, sender = %request.sender_id, "chat request received");
                self.peer_status
                    .insert(request.sender_id.clone(), PairStatus::Pending);
                self.chat_requests.push(request.clone());
            }
            ServerEvent::ChatRequestAccepted(request) => {
                self.chat_requests
                    .retain(|r| r.request_id != request.request_id);
                self.peer_status
                    .insert(self.other_party(request), PairStatus::Accepted);
            }
            ServerEvent::ChatRequestRejected(request) => {
                self.chat_requests
                    .retain(|r| r.request_id != request.request_id);
                self.peer_status
                    .insert(self.other_party(request), PairStatus::Rejected);
            }
            ServerEvent::NewMessage(message) => {
                // Only the open conversation is mirrored; other transcripts
                // are fetched when their peer is selected.
                if self.selected_peer.as_ref() == Some(&message.sender_id) {
                    self.messages.push(message.clone());
                }
            }
            ServerEvent::OnlineUsersChanged(payload) => {
                self.online_users = payload.ids.iter().cloned().collect();
            }
        }
    }

    /// The counterpart of a request event, from this user's perspective.
    fn other_party(&self, request: &ChatRequestEvent) -> UserId {
        if request.sender_id == self.me {
            request.receiver_id.clone()
        } else {
            request.sender_id.clone()
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Open a conversation. The transcript resets until `set_messages`
    /// loads it from the API.
    pub fn select_peer(&mut self, peer: Option<UserId>) {
        self.selected_peer = peer;
        self.messages.clear();
    }

    pub fn selected_peer(&self) -> Option<&UserId> {
        self.selected_peer.as_ref()
    }

    // ------------------------------------------------------------------
    // Reconciliation from query results
    // ------------------------------------------------------------------

    pub fn set_online_users(&mut self, ids: Vec<UserId>) {
        self.online_users = ids.into_iter().collect();
    }

    pub fn set_pending_requests(&mut self, requests: Vec<ChatRequestEvent>) {
        for request in &requests {
            self.peer_status
                .insert(request.sender_id.clone(), PairStatus::Pending);
        }
        self.chat_requests = requests;
    }

    pub fn set_messages(&mut self, messages: Vec<MessagePayload>) {
        self.messages = messages;
    }

    pub fn set_peer_status(&mut self, peer: UserId, status: PairStatus) {
        self.peer_status.insert(peer, status);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_online(&self, user: &UserId) -> bool {
        self.online_users.contains(user)
    }

    pub fn online_users(&self) -> &HashSet<UserId> {
        &self.online_users
    }

    /// Whether the consent gate allows messaging this peer.
    pub fn can_message(&self, peer: &UserId) -> bool {
        self.peer_status(peer) == PairStatus::Accepted
    }

    pub fn peer_status(&self, peer: &UserId) -> PairStatus {
        self.peer_status.get(peer).copied().unwrap_or_default()
    }

    pub fn pending_requests(&self) -> &[ChatRequestEvent] {
        &self.chat_requests
    }

    pub fn messages(&self) -> &[MessagePayload] {
        &self.messages
    }
}
