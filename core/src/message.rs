//! The on-wire [`Message`] shape, its [`Code`]/[`ResponseStatus`] taxonomy,
//! and the helpers that build responses and replication envelopes.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::Node;

/// Message codes, in the exact order the wire protocol assigns them
/// (`None` is 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum Code {
    None = 0,
    Response = 1,
    GetInfo = 2,
    Update = 3,
    Ping = 4,
    Nodes = 5,
    Directory = 6,
    CreateFile = 7,
    ReadFile = 8,
    UpdateFile = 9,
    DeleteFile = 10,
    Register = 11,
    Drop = 12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResponseStatus {
    Ok,
    NodeNotAuthorized,
    BadFormat,
    InternalError,
    NodeNotOnline,
    NodeExist,
    FileExist,
    FileNotFound,
    FileUpdateOld,
    /// Default/unset value; never itself transmitted as a meaningful status
    /// (mirrors the original's empty `ResponseStatus("")`).
    #[serde(other)]
    None,
}

impl Default for ResponseStatus {
    fn default() -> Self {
        ResponseStatus::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Wire key is `oauth`, not `node` — the original duplicates its own
    /// `Node.oauth` key name one level up and `spec.md` §6 requires the
    /// shape be preserved for wire compatibility.
    #[serde(rename = "oauth")]
    pub node: Node,
    #[serde(default)]
    pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Wire key is `action`, matching the original's `MessageBody.Code`
    /// json tag (`spec.md` §6's example payload).
    #[serde(rename = "action")]
    pub code: Code,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub content: String,
}

impl Default for Code {
    fn default() -> Self {
        Code::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl MessageBody {
    pub fn new(code: Code, status: ResponseStatus, content: impl Into<String>) -> Self {
        MessageBody {
            code,
            status,
            content: content.into(),
        }
    }
}

impl Message {
    /// Build a reply to `incoming`, destined for its sender. When
    /// `include_self_password` is false the replier's password is scrubbed
    /// before transmission — used for unauthenticated rejections so a
    /// password is never leaked to a stranger.
    pub fn response_of(
        self_node: &Node,
        incoming: &Message,
        status: ResponseStatus,
        include_self_password: bool,
        content: impl Into<String>,
    ) -> Message {
        let node = if include_self_password {
            self_node.clone()
        } else {
            self_node.without_password()
        };
        Message {
            header: MessageHeader {
                node,
                destination: incoming.header.node.oauth.user_name.clone(),
            },
            body: MessageBody::new(Code::Response, status, content),
        }
    }
}
