//! Translates local operator requests into either local handler calls (if
//! this node owns the target) or remote sends to the owner (§4.4).

use crate::message::{Code, Message, MessageBody, MessageHeader, ResponseStatus};
use crate::model::{CodeInfoContent, File, OnlineNodes, UpdateFileContent, UpdateTime};
use crate::node::NodeContext;

pub async fn create_file(ctx: &NodeContext, name: &str) -> MessageBody {
    if let Some(existing) = ctx.record.get_file(name) {
        return MessageBody::new(Code::CreateFile, ResponseStatus::FileExist, existing.owner);
    }

    if let Err(e) = ctx.store.create(name) {
        tracing::warn!(error = %e, file = name, "ClientCreateFile local create failed");
        return MessageBody::new(Code::CreateFile, ResponseStatus::InternalError, e.to_string());
    }

    let update = UpdateTime::now(Code::CreateFile, ctx.self_node.oauth.user_name.clone(), "");
    let file = File {
        owner: ctx.self_node.oauth.user_name.clone(),
        name: name.to_string(),
        created_at: update.at,
        recent_update: update.clone(),
    };
    ctx.record.create_file(file.clone());
    broadcast_file_update(ctx, &file, update).await;

    MessageBody::new(Code::CreateFile, ResponseStatus::Ok, name)
}

pub async fn update_file(ctx: &NodeContext, name: &str, content: &str) -> MessageBody {
    let file = match ctx.record.get_file(name) {
        Some(f) => f,
        None => return MessageBody::new(Code::UpdateFile, ResponseStatus::FileNotFound, name),
    };

    if file.owner == ctx.self_node.oauth.user_name {
        if let Err(e) = ctx.store.write(name, content.as_bytes()) {
            return MessageBody::new(Code::UpdateFile, ResponseStatus::InternalError, e.to_string());
        }
        let update = UpdateTime::now(Code::UpdateFile, ctx.self_node.oauth.user_name.clone(), "");
        let mut updated = file;
        updated.recent_update = update.clone();
        ctx.record.create_file(updated.clone());
        broadcast_file_update(ctx, &updated, update).await;
        return MessageBody::new(Code::UpdateFile, ResponseStatus::Ok, name);
    }

    let owner_node = match ctx.record.get_node(&file.owner) {
        Some(n) => n,
        None => return MessageBody::new(Code::UpdateFile, ResponseStatus::NodeNotOnline, file.owner),
    };

    let payload = UpdateFileContent {
        name: name.to_string(),
        content: content.to_string(),
    };
    let request = Message {
        header: MessageHeader {
            node: ctx.self_node.clone(),
            destination: file.owner.clone(),
        },
        body: MessageBody::new(
            Code::UpdateFile,
            ResponseStatus::None,
            serde_json::to_string(&payload).unwrap_or_default(),
        ),
    };
    forward(ctx, &owner_node.address, request, Code::UpdateFile).await
}

pub async fn read_file(ctx: &NodeContext, name: &str) -> MessageBody {
    let file = match ctx.record.get_file(name) {
        Some(f) => f,
        None => return MessageBody::new(Code::ReadFile, ResponseStatus::FileNotFound, name),
    };

    if file.owner == ctx.self_node.oauth.user_name {
        return match ctx.store.read(name) {
            Ok(bytes) => MessageBody::new(
                Code::ReadFile,
                ResponseStatus::Ok,
                String::from_utf8_lossy(&bytes).into_owned(),
            ),
            Err(e) => MessageBody::new(Code::ReadFile, ResponseStatus::InternalError, e.to_string()),
        };
    }

    let owner_node = match ctx.record.get_node(&file.owner) {
        Some(n) => n,
        None => return MessageBody::new(Code::ReadFile, ResponseStatus::NodeNotOnline, file.owner),
    };

    let payload = CodeInfoContent {
        code: Code::ReadFile,
        content: name.to_string(),
    };
    let request = Message {
        header: MessageHeader {
            node: ctx.self_node.clone(),
            destination: file.owner.clone(),
        },
        body: MessageBody::new(
            Code::GetInfo,
            ResponseStatus::None,
            serde_json::to_string(&payload).unwrap_or_default(),
        ),
    };
    forward(ctx, &owner_node.address, request, Code::ReadFile).await
}

pub async fn delete_file(ctx: &NodeContext, name: &str) -> MessageBody {
    let file = match ctx.record.get_file(name) {
        Some(f) => f,
        None => return MessageBody::new(Code::DeleteFile, ResponseStatus::FileNotFound, name),
    };

    if file.owner == ctx.self_node.oauth.user_name {
        if let Err(e) = ctx.store.delete(name) {
            return MessageBody::new(Code::DeleteFile, ResponseStatus::InternalError, e.to_string());
        }
        let update = UpdateTime::now(Code::DeleteFile, ctx.self_node.oauth.user_name.clone(), "");
        ctx.record.delete_file(name, update.clone());
        broadcast_file_update(ctx, &file, update).await;
        return MessageBody::new(Code::DeleteFile, ResponseStatus::Ok, name);
    }

    let owner_node = match ctx.record.get_node(&file.owner) {
        Some(n) => n,
        None => return MessageBody::new(Code::DeleteFile, ResponseStatus::NodeNotOnline, file.owner),
    };

    let request = Message {
        header: MessageHeader {
            node: ctx.self_node.clone(),
            destination: file.owner.clone(),
        },
        body: MessageBody::new(Code::DeleteFile, ResponseStatus::None, name.to_string()),
    };
    forward(ctx, &owner_node.address, request, Code::DeleteFile).await
}

/// Full Record as JSON text, passwords masked — defense-in-depth for
/// operator-facing endpoints (§4.4).
pub fn record(ctx: &NodeContext) -> MessageBody {
    let mut snapshot = ctx.record.snapshot_record();
    mask_passwords(&mut snapshot.online_nodes);
    MessageBody::new(
        Code::None,
        ResponseStatus::Ok,
        serde_json::to_string(&snapshot).unwrap_or_default(),
    )
}

pub fn directory(ctx: &NodeContext) -> MessageBody {
    let snapshot = ctx.record.snapshot_directory();
    MessageBody::new(
        Code::None,
        ResponseStatus::Ok,
        serde_json::to_string(&snapshot).unwrap_or_default(),
    )
}

pub fn nodes(ctx: &NodeContext) -> MessageBody {
    let mut snapshot = ctx.record.snapshot_nodes();
    mask_passwords(&mut snapshot);
    MessageBody::new(
        Code::None,
        ResponseStatus::Ok,
        serde_json::to_string(&snapshot).unwrap_or_default(),
    )
}

/// Inbound peer request arriving through the transport — forwarded
/// unchanged to the dispatcher.
pub async fn web_dir(ctx: &NodeContext, msg: &Message) -> Message {
    crate::dispatch::node_authorized(ctx, msg).await
}

fn mask_passwords(nodes: &mut OnlineNodes) {
    for node in nodes.nodes_list.values_mut() {
        node.oauth.password = "******".to_string();
    }
}

async fn broadcast_file_update(ctx: &NodeContext, file: &File, mut update: UpdateTime) {
    update.content = serde_json::to_string(file).unwrap_or_default();
    let code = update.code;
    if ctx.updates_tx.send(update).await.is_err() {
        tracing::warn!(?code, "update queue closed, broadcast dropped");
    }
}

async fn forward(ctx: &NodeContext, addr: &str, request: Message, code: Code) -> MessageBody {
    match ctx.transport.send(addr, request).await {
        Ok(reply) => reply.body,
        Err(e) => MessageBody::new(code, ResponseStatus::InternalError, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Oauth, Record};
    use crate::record::RecordStore;
    use crate::store::LocalStore;
    use crate::transport::{Transport, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct EchoOk;
    #[async_trait]
    impl Transport for EchoOk {
        async fn send(&self, _addr: &str, msg: Message) -> Result<Message, TransportError> {
            Ok(Message {
                header: MessageHeader {
                    node: msg.header.node.clone(),
                    destination: msg.header.node.oauth.user_name.clone(),
                },
                body: MessageBody::new(Code::Response, ResponseStatus::Ok, "from-owner"),
            })
        }
    }

    struct NeverCalled;
    #[async_trait]
    impl Transport for NeverCalled {
        async fn send(&self, _addr: &str, _msg: Message) -> Result<Message, TransportError> {
            panic!("transport should not be used for locally-owned files");
        }
    }

    fn ctx_with_transport(username: &str, dir: &std::path::Path, transport: Arc<dyn Transport>) -> NodeContext {
        let (tx, mut rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY_TEST);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let self_node = Node {
            address: format!("{username}:0"),
            oauth: Oauth {
                user_name: username.to_string(),
                password: "secret".to_string(),
            },
        };
        let ctx = NodeContext {
            self_node: self_node.clone(),
            record: RecordStore::new(Record::default()),
            store: LocalStore::new(dir).unwrap(),
            transport,
            updates_tx: tx,
            initiator: std::sync::RwLock::new(None),
            cancel: CancellationToken::new(),
        };
        ctx.record.create_node(self_node, UpdateTime::now(Code::Register, username, ""));
        ctx
    }

    const UPDATE_QUEUE_CAPACITY_TEST: usize = 16;

    #[tokio::test]
    async fn create_then_create_again_is_file_exist() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with_transport("a", dir.path(), Arc::new(NeverCalled));
        let first = create_file(&ctx, "doc").await;
        assert_eq!(first.status, ResponseStatus::Ok);
        let second = create_file(&ctx, "doc").await;
        assert_eq!(second.status, ResponseStatus::FileExist);
        assert_eq!(second.content, "a");
    }

    #[tokio::test]
    async fn local_update_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with_transport("a", dir.path(), Arc::new(NeverCalled));
        create_file(&ctx, "doc").await;
        let updated = update_file(&ctx, "doc", "hello").await;
        assert_eq!(updated.status, ResponseStatus::Ok);
        let read = read_file(&ctx, "doc").await;
        assert_eq!(read.status, ResponseStatus::Ok);
        assert_eq!(read.content, "hello");
    }

    #[tokio::test]
    async fn read_of_remote_file_forwards_to_owner() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with_transport("a", dir.path(), Arc::new(EchoOk));
        let owner = Node {
            address: "owner:9".into(),
            oauth: Oauth {
                user_name: "owner".into(),
                password: "x".into(),
            },
        };
        ctx.record.create_node(owner.clone(), UpdateTime::now(Code::Register, "owner", ""));
        let update = UpdateTime::now(Code::CreateFile, "owner", "");
        ctx.record.create_file(File {
            owner: "owner".into(),
            name: "remote.txt".into(),
            created_at: update.at,
            recent_update: update,
        });

        let reply = read_file(&ctx, "remote.txt").await;
        assert_eq!(reply.status, ResponseStatus::Ok);
        assert_eq!(reply.content, "from-owner");
    }

    #[tokio::test]
    async fn owner_offline_is_node_not_online() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with_transport("a", dir.path(), Arc::new(NeverCalled));
        let update = UpdateTime::now(Code::CreateFile, "ghost", "");
        ctx.record.create_file(File {
            owner: "ghost".into(),
            name: "orphan.txt".into(),
            created_at: update.at,
            recent_update: update,
        });
        let reply = read_file(&ctx, "orphan.txt").await;
        assert_eq!(reply.status, ResponseStatus::NodeNotOnline);
    }

    #[tokio::test]
    async fn nodes_snapshot_masks_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_with_transport("a", dir.path(), Arc::new(NeverCalled));
        let body = nodes(&ctx);
        assert_eq!(body.status, ResponseStatus::Ok);
        assert!(body.content.contains("******"));
        assert!(!body.content.contains("secret"));
    }
}
