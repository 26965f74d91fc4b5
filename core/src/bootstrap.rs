//! Initialization path: allocate identity, create the base directory,
//! either declare self mesh initiator or join through an existing member,
//! seed local state, enumerate owned files, and start background workers
//! (§4.7).

use std::sync::{Arc, RwLock};

use rand::RngCore;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::client;
use crate::message::{Code, Message, MessageBody, MessageHeader, ResponseStatus};
use crate::model::{Node, Oauth, Record, UpdateTime};
use crate::node::{NodeConfig, NodeContext, NodeHandle, UPDATE_QUEUE_CAPACITY};
use crate::record::RecordStore;
use crate::store::{LocalStore, StoreError};
use crate::transport::{Transport, TransportError};
use crate::{broadcast, pinger};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("public address is required")]
    MissingPublicAddress,
    #[error("failed to prepare local store: {0}")]
    Store(#[from] StoreError),
    #[error("mesh initiator unreachable: {0}")]
    Transport(#[from] TransportError),
    #[error("mesh initiator responded with {0:?}")]
    Rejected(ResponseStatus),
    #[error("failed to decode mesh initiator reply: {0}")]
    Decode(#[from] serde_json::Error),
}

pub async fn bootstrap(
    mut config: NodeConfig,
    transport: Arc<dyn Transport>,
) -> Result<NodeHandle, BootstrapError> {
    if config.public_addr.is_empty() {
        return Err(BootstrapError::MissingPublicAddress);
    }

    let base_path = config
        .base_path
        .take()
        .unwrap_or_else(default_base_path);
    let store = LocalStore::new(&base_path)?;

    if config.username.is_empty() {
        config.username = random_token();
    }
    if config.password.is_empty() {
        config.password = random_token();
    }

    let self_node = Node {
        address: config.public_addr.clone(),
        oauth: Oauth {
            user_name: config.username.clone(),
            password: config.password.clone(),
        },
    };

    let record_store = RecordStore::new(Record::default());
    record_store.create_node(
        self_node.clone(),
        UpdateTime::now(Code::Register, self_node.oauth.user_name.clone(), ""),
    );

    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);

    let ctx = Arc::new(NodeContext {
        self_node: self_node.clone(),
        record: record_store,
        store,
        transport: transport.clone(),
        updates_tx,
        initiator: RwLock::new(None),
        cancel: tokio_util::sync::CancellationToken::new(),
    });

    if let Some(initiator_addr) = config.mesh_initiator_addr.clone() {
        join_mesh(&ctx, &initiator_addr).await?;
    } else {
        tracing::info!(node = %self_node.oauth.user_name, address = %self_node.address, "node is mesh initiator");
    }

    register_owned_files(&ctx).await;

    let broadcaster = tokio::spawn(broadcast::run(ctx.clone(), updates_rx));
    let pinger_handle = tokio::spawn(pinger::run(ctx.clone()));

    Ok(NodeHandle::new(ctx, broadcaster, pinger_handle))
}

/// Join the mesh through `initiator_addr` by sending a `Register`. On
/// success, the reply's full Record replaces local state and the replying
/// node becomes our recorded mesh initiator.
async fn join_mesh(ctx: &NodeContext, initiator_addr: &str) -> Result<(), BootstrapError> {
    tracing::info!(initiator = initiator_addr, "registering through mesh initiator");
    let message = Message {
        header: MessageHeader {
            node: ctx.self_node.clone(),
            destination: String::new(),
        },
        body: MessageBody::new(Code::Register, ResponseStatus::None, ""),
    };

    let reply = ctx.transport.send(initiator_addr, message).await?;
    if reply.body.status != ResponseStatus::Ok {
        return Err(BootstrapError::Rejected(reply.body.status));
    }

    let record: Record = serde_json::from_str(&reply.body.content)?;
    ctx.record.replace_online_nodes(record.online_nodes);
    ctx.record.replace_directory(record.directory);
    ctx.set_mesh_initiator(reply.header.node);
    Ok(())
}

/// Walk the base directory (files only, one level, no recursion) and
/// register each as owned so it appears in the directory and replicates.
async fn register_owned_files(ctx: &NodeContext) {
    let names = match ctx.store.list_top_level_files() {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "failed to walk base directory for owned files");
            return;
        }
    };

    for name in names {
        tracing::debug!(file = %name, "adding to owned files");
        let body = client::create_file(ctx, &name).await;
        if body.status != ResponseStatus::Ok {
            tracing::warn!(file = %name, status = ?body.status, "failed to register owned file");
        }
    }
}

fn default_base_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    std::path::Path::new(&home).join("webdir")
}

fn random_token() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
