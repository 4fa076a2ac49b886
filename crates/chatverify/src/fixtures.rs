//! Fixture library for the mocked chat backend.
//!
//! Typed payloads for the routes the chat UI calls on load, the auth token
//! it reads from `localStorage`, and [`ChatBackend`], which turns a set of
//! payloads into route mocks.

use crate::network::{HttpMethod, MockResponse, RouteMock};
use crate::result::{VerifyError, VerifyResult};
use crate::step::Step;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// `localStorage` key the client reads its token from
pub const TOKEN_STORAGE_KEY: &str = "token";

/// Conversation list route
pub const CONVERSATIONS_ROUTE: &str = "**/api/chat/conversations*";
/// Unread counter route
pub const UNREAD_COUNT_ROUTE: &str = "**/api/chat/unread-count";
/// Admin user list route
pub const ADMIN_USERS_ROUTE: &str = "**/api/admin";

/// Route for one conversation's messages
#[must_use]
pub fn messages_route(conversation_id: &str) -> String {
    format!("**/api/chat/conversations/{conversation_id}/messages*")
}

/// Entry of `GET /api/chat/conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id
    pub id: String,
    /// Email of the client user; shown to admins in place of the title
    pub user_email: String,
    /// Conversation title
    pub title: String,
    /// Preview of the newest message
    pub last_message: Option<String>,
    /// Timestamp of the newest message (RFC 3339)
    pub last_message_at: Option<String>,
    /// Messages not yet read by the viewer
    pub unread_count: u32,
}

impl Conversation {
    /// Create a conversation with no messages
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        user_email: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_email: user_email.into(),
            title: title.into(),
            last_message: None,
            last_message_at: None,
            unread_count: 0,
        }
    }

    /// Set the newest message preview
    #[must_use]
    pub fn with_last_message(mut self, content: impl Into<String>, at: impl Into<String>) -> Self {
        self.last_message = Some(content.into());
        self.last_message_at = Some(at.into());
        self
    }

    /// Set the unread counter
    #[must_use]
    pub const fn with_unread(mut self, unread_count: u32) -> Self {
        self.unread_count = unread_count;
        self
    }

    /// `conv-1` with one unread message from `user@example.com`
    #[must_use]
    pub fn sample() -> Self {
        Self::new("conv-1", "user@example.com", "Conversa 1")
            .with_last_message("Olá", "2023-10-27T10:00:00Z")
            .with_unread(1)
    }
}

/// Body of `GET /api/chat/unread-count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Total unread messages
    pub count: u32,
}

/// Entry of `GET /api/chat/conversations/<id>/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id
    pub id: String,
    /// Owning conversation
    pub conversation_id: String,
    /// Author
    pub sender_id: String,
    /// Message text
    pub content: String,
    /// Timestamp (RFC 3339)
    pub created_at: String,
    /// Read flag
    pub is_read: bool,
}

impl Message {
    /// Unread `msg-1` in `conv-1` from another user
    #[must_use]
    pub fn sample() -> Self {
        Self {
            id: "msg-1".to_string(),
            conversation_id: "conv-1".to_string(),
            sender_id: "other-user".to_string(),
            content: "Olá".to_string(),
            created_at: "2023-10-27T10:00:00Z".to_string(),
            is_read: false,
        }
    }
}

/// Entry of `GET /api/admin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    /// User id
    pub id: String,
    /// Login email
    pub email: String,
    /// Granted roles
    pub roles: Vec<String>,
}

impl AdminUser {
    /// Plain client account `client@example.com`
    #[must_use]
    pub fn client() -> Self {
        Self {
            id: "user-2".to_string(),
            email: "client@example.com".to_string(),
            roles: Vec::new(),
        }
    }
}

/// Unsigned token the client decodes to learn who is logged in.
///
/// Only the payload segment carries data; header and signature are fixed
/// placeholders because the mocked backend never verifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// User id
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Role names, `admin` unlocks the admin chat view
    pub roles: Vec<String>,
    /// Expiry as Unix seconds
    pub exp: i64,
}

impl AuthToken {
    /// Create a token payload
    #[must_use]
    pub fn new(user_id: impl Into<String>, roles: Vec<String>, exp: i64) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
            exp,
        }
    }

    /// Admin user valid until 2050-01-01
    #[must_use]
    pub fn admin() -> Self {
        Self::new(
            "12345678-1234-1234-1234-123456789012",
            vec!["admin".to_string()],
            2_524_608_000,
        )
    }

    /// Encode as `header.<payload>.signature`
    pub fn encode(&self) -> VerifyResult<String> {
        let payload = serde_json::to_vec(self)?;
        Ok(format!("header.{}.signature", URL_SAFE_NO_PAD.encode(payload)))
    }

    /// Decode the payload segment of an encoded token
    pub fn decode(token: &str) -> VerifyResult<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| VerifyError::Parse("token has no payload segment".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| VerifyError::Parse(format!("token payload is not base64url: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Step that stores this token where the client looks for it
    pub fn storage_step(&self) -> VerifyResult<Step> {
        Ok(Step::set_storage(TOKEN_STORAGE_KEY, self.encode()?))
    }
}

/// Canned state of the chat backend.
///
/// Every payload that is set becomes one `GET` route mock; unset payloads
/// produce no route.
#[derive(Debug, Clone, Default)]
pub struct ChatBackend {
    conversations: Option<Vec<Conversation>>,
    unread: Option<UnreadCount>,
    messages: Vec<(String, Vec<Message>)>,
    admin_users: Option<Vec<AdminUser>>,
}

impl ChatBackend {
    /// Backend with no routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this conversation list
    #[must_use]
    pub fn conversations(mut self, conversations: Vec<Conversation>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    /// Serve this unread counter
    #[must_use]
    pub const fn unread_count(mut self, count: u32) -> Self {
        self.unread = Some(UnreadCount { count });
        self
    }

    /// Serve these messages for one conversation
    #[must_use]
    pub fn messages(mut self, conversation_id: impl Into<String>, messages: Vec<Message>) -> Self {
        self.messages.push((conversation_id.into(), messages));
        self
    }

    /// Serve this admin user list
    #[must_use]
    pub fn admin_users(mut self, users: Vec<AdminUser>) -> Self {
        self.admin_users = Some(users);
        self
    }

    /// Build the route mocks
    pub fn into_routes(self) -> VerifyResult<Vec<RouteMock>> {
        let mut routes = Vec::new();
        let mut add = |pattern: &str, response: MockResponse| -> VerifyResult<()> {
            routes.push(RouteMock::new(pattern, response)?.with_method(HttpMethod::Get));
            Ok(())
        };

        if let Some(conversations) = &self.conversations {
            add(CONVERSATIONS_ROUTE, MockResponse::json(conversations)?)?;
        }
        if let Some(unread) = &self.unread {
            add(UNREAD_COUNT_ROUTE, MockResponse::json(unread)?)?;
        }
        for (conversation_id, messages) in &self.messages {
            add(&messages_route(conversation_id), MockResponse::json(messages)?)?;
        }
        if let Some(users) = &self.admin_users {
            add(ADMIN_USERS_ROUTE, MockResponse::json(users)?)?;
        }
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{InterceptedRequest, Resolution, RouteTable};

    const ADMIN_TOKEN: &str = "header.eyJ1c2VySWQiOiIxMjM0NTY3OC0xMjM0LTEyMzQtMTIzNC0xMjM0NTY3ODkwMTIiLCJyb2xlcyI6WyJhZG1pbiJdLCJleHAiOjI1MjQ2MDgwMDB9.signature";

    mod token_tests {
        use super::*;

        #[test]
        fn test_admin_token_encoding_is_stable() {
            assert_eq!(AuthToken::admin().encode().unwrap(), ADMIN_TOKEN);
        }

        #[test]
        fn test_decode_admin_token() {
            let token = AuthToken::decode(ADMIN_TOKEN).unwrap();
            assert_eq!(token, AuthToken::admin());
            assert_eq!(token.roles, vec!["admin"]);
        }

        #[test]
        fn test_decode_rejects_garbage() {
            assert!(AuthToken::decode("no-dots").is_err());
            assert!(AuthToken::decode("a.!!!.c").is_err());
        }

        #[test]
        fn test_storage_step() {
            let step = AuthToken::admin().storage_step().unwrap();
            assert_eq!(step, Step::set_storage("token", ADMIN_TOKEN));
        }
    }

    mod payload_tests {
        use super::*;

        #[test]
        fn test_conversation_json_shape() {
            let json = serde_json::to_value(Conversation::sample()).unwrap();
            assert_eq!(json["id"], "conv-1");
            assert_eq!(json["user_email"], "user@example.com");
            assert_eq!(json["unread_count"], 1);
            assert_eq!(json["last_message_at"], "2023-10-27T10:00:00Z");
        }

        #[test]
        fn test_new_conversation_has_null_preview() {
            let json = serde_json::to_value(Conversation::new("c", "e", "t")).unwrap();
            assert!(json["last_message"].is_null());
        }

        #[test]
        fn test_message_and_admin_user() {
            let msg = serde_json::to_value(Message::sample()).unwrap();
            assert_eq!(msg["is_read"], false);
            let user = serde_json::to_value(AdminUser::client()).unwrap();
            assert_eq!(user["roles"], serde_json::json!([]));
        }
    }

    mod backend_tests {
        use super::*;

        fn table(backend: ChatBackend) -> RouteTable {
            let mut table = RouteTable::new();
            for route in backend.into_routes().unwrap() {
                table.register_route(route);
            }
            table
        }

        fn get(url: &str) -> InterceptedRequest {
            InterceptedRequest::new(url, HttpMethod::Get)
        }

        #[test]
        fn test_empty_backend_has_no_routes() {
            assert!(ChatBackend::new().into_routes().unwrap().is_empty());
        }

        #[test]
        fn test_conversation_and_message_routes_do_not_overlap() {
            let table = table(
                ChatBackend::new()
                    .conversations(vec![Conversation::sample()])
                    .unread_count(1)
                    .messages("conv-1", vec![Message::sample()])
                    .admin_users(vec![AdminUser::client()]),
            );
            assert_eq!(table.route_count(), 4);

            let list = table
                .resolve(&get("http://localhost:3000/api/chat/conversations?filter=all"))
                .unwrap();
            let Resolution::Fulfill(list) = list else {
                panic!("conversation list not mocked");
            };
            let list: Vec<Conversation> = serde_json::from_slice(&list.body).unwrap();
            assert_eq!(list, vec![Conversation::sample()]);

            let msgs = table
                .resolve(&get(
                    "http://localhost:3000/api/chat/conversations/conv-1/messages",
                ))
                .unwrap();
            let Resolution::Fulfill(msgs) = msgs else {
                panic!("messages not mocked");
            };
            let msgs: Vec<Message> = serde_json::from_slice(&msgs.body).unwrap();
            assert_eq!(msgs[0].id, "msg-1");
        }

        #[test]
        fn test_unread_count_body() {
            let table = table(ChatBackend::new().unread_count(0));
            let Resolution::Fulfill(resp) = table
                .resolve(&get("http://localhost:3000/api/chat/unread-count"))
                .unwrap()
            else {
                panic!("unread count not mocked");
            };
            assert_eq!(resp.body_string(), r#"{"count":0}"#);
            assert_eq!(resp.status, 200);
        }

        #[test]
        fn test_routes_are_get_only() {
            let table = table(ChatBackend::new().conversations(Vec::new()));
            let post = InterceptedRequest::new(
                "http://localhost:3000/api/chat/conversations",
                HttpMethod::Post,
            );
            assert!(matches!(
                table.resolve(&post).unwrap(),
                Resolution::PassThrough
            ));
        }
    }
}
