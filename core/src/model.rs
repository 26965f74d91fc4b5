//! Replicated state: nodes, files, and the freshness markers that let
//! independent copies converge (last-writer-wins on [`UpdateTime::at`]).

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::message::Code;

/// A peer identity: a reachable address plus the credentials it presents on
/// every message it sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub address: String,
    pub oauth: Oauth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Oauth {
    pub user_name: String,
    pub password: String,
}

impl Node {
    /// A copy of this node with the password scrubbed, for replies sent to
    /// senders that haven't proven they know it.
    pub fn without_password(&self) -> Node {
        Node {
            address: self.address.clone(),
            oauth: Oauth {
                user_name: self.oauth.user_name.clone(),
                password: String::new(),
            },
        }
    }
}

/// Causal marker attached to every write; also doubles as the broadcast
/// envelope carrying the serialized payload of a replicated change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTime {
    pub at: SystemTime,
    pub by: String,
    pub code: Code,
    #[serde(default)]
    pub content: String,
}

impl UpdateTime {
    pub fn now(code: Code, by: impl Into<String>, content: impl Into<String>) -> Self {
        UpdateTime {
            at: SystemTime::now(),
            by: by.into(),
            code,
            content: content.into(),
        }
    }
}

/// A logical shared file. Byte content lives only on `owner`'s local store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub owner: String,
    pub name: String,
    pub created_at: SystemTime,
    pub recent_update: UpdateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineNodes {
    pub nodes_list: HashMap<String, Node>,
    pub recent_update: UpdateTime,
}

impl Default for OnlineNodes {
    fn default() -> Self {
        OnlineNodes {
            nodes_list: HashMap::new(),
            recent_update: UpdateTime::now(Code::None, "", ""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    pub files_list: HashMap<String, File>,
    pub recent_update: UpdateTime,
}

impl Default for Directory {
    fn default() -> Self {
        Directory {
            files_list: HashMap::new(),
            recent_update: UpdateTime::now(Code::None, "", ""),
        }
    }
}

/// The full replicated state held by a node: the online-nodes map and the
/// file directory, each with its own freshness stamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub online_nodes: OnlineNodes,
    pub directory: Directory,
}

/// Used internally as the payload of an `UpdateFile`/`ClientUpdateFile`
/// message (mirrors the original's `UpdateFileContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFileContent {
    pub name: String,
    pub content: String,
}

/// Used internally as the payload of a `GetInfo` request (mirrors the
/// original's `CodeInfoContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeInfoContent {
    pub code: Code,
    pub content: String,
}
