//! Single background consumer of the in-process update queue, fanning each
//! drained update out to every other known node (§4.5).

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::message::{Code, Message, MessageBody, MessageHeader, ResponseStatus};
use crate::model::UpdateTime;
use crate::node::NodeContext;

/// Drains `updates_rx` until the node's cancellation token fires. A
/// transport error or non-`Ok` reply is logged and not retried —
/// replication is best-effort; convergence is restored on the next write to
/// the same entity (LWW) or, for dropped peers, on the next ping cycle.
pub async fn run(ctx: Arc<NodeContext>, mut updates_rx: mpsc::Receiver<UpdateTime>) {
    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                tracing::info!("update broadcaster stopping");
                return;
            }
            next = updates_rx.recv() => {
                match next {
                    Some(update) => broadcast_one(&ctx, update).await,
                    None => return,
                }
            }
        }
    }
}

/// Per-peer delivery is sequential within the consumer — there is no
/// per-peer fan-out parallelism, so update ordering seen by any given peer
/// matches this node's enqueue order.
async fn broadcast_one(ctx: &NodeContext, update: UpdateTime) {
    tracing::debug!(code = ?update.code, "sending new update");
    let payload = serde_json::to_string(&update).unwrap_or_default();

    for peer in ctx.record.peers_excluding(&ctx.self_node.oauth.user_name) {
        let msg = Message {
            header: MessageHeader {
                node: ctx.self_node.clone(),
                destination: String::new(),
            },
            body: MessageBody::new(Code::Update, ResponseStatus::None, payload.clone()),
        };
        match ctx.transport.send(&peer.address, msg).await {
            Ok(reply) if reply.body.status == ResponseStatus::Ok => {}
            Ok(reply) => tracing::warn!(
                peer = %peer.oauth.user_name,
                status = ?reply.body.status,
                "peer responded with unexpected status to update"
            ),
            Err(e) => tracing::warn!(
                peer = %peer.oauth.user_name,
                error = %e,
                "failed to deliver update, not retrying"
            ),
        }
    }
}
