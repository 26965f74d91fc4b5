//! Lifecycle: the shared state a running node passes through every call,
//! plus the handle that starts/stops its background workers.

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::model::{Node, Record, UpdateTime};
use crate::record::RecordStore;
use crate::store::LocalStore;
use crate::transport::Transport;

/// Capacity of the update broadcast queue (§4.5): enqueues block once full,
/// which is the system's only backpressure mechanism.
pub const UPDATE_QUEUE_CAPACITY: usize = 100;

/// Everything a running node needs, owned by exactly one process and passed
/// by reference through dispatcher, broadcaster, and pinger — never a
/// module-level singleton (§9 Design notes).
pub struct NodeContext {
    pub self_node: Node,
    pub record: RecordStore,
    pub store: LocalStore,
    pub transport: Arc<dyn Transport>,
    pub updates_tx: mpsc::Sender<UpdateTime>,
    /// Empty (`None`) iff this node IS the mesh initiator.
    pub initiator: RwLock<Option<Node>>,
    pub cancel: CancellationToken,
}

impl NodeContext {
    pub fn is_mesh_initiator(&self) -> bool {
        self.initiator.read().unwrap().is_none()
    }

    pub fn mesh_initiator(&self) -> Option<Node> {
        self.initiator.read().unwrap().clone()
    }

    pub fn set_mesh_initiator(&self, node: Node) {
        *self.initiator.write().unwrap() = Some(node);
    }
}

/// Construction parameters for a node, supplied by the host before it joins
/// the mesh (§4.7).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Base directory for owned files. Defaults to `~/webdir` when absent.
    pub base_path: Option<std::path::PathBuf>,
    /// This node's reachable endpoint string, as the transport understands
    /// it. Mandatory — the host resolves it (e.g. after binding its HTTP
    /// listener) before constructing the node.
    pub public_addr: String,
    /// Username; a random 16-hex-character token is generated if empty.
    pub username: String,
    /// Password; a random 16-hex-character token is generated if empty.
    pub password: String,
    /// Address of an existing mesh member to register with. `None` means
    /// this node declares itself the mesh initiator.
    pub mesh_initiator_addr: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            base_path: None,
            public_addr: String::new(),
            username: String::new(),
            password: String::new(),
            mesh_initiator_addr: None,
        }
    }
}

/// A live node: shared state plus the join handles of its background
/// workers (broadcaster, pinger).
pub struct NodeHandle {
    pub ctx: Arc<NodeContext>,
    broadcaster: JoinHandle<()>,
    pinger: JoinHandle<()>,
}

impl NodeHandle {
    pub(crate) fn new(
        ctx: Arc<NodeContext>,
        broadcaster: JoinHandle<()>,
        pinger: JoinHandle<()>,
    ) -> Self {
        NodeHandle {
            ctx,
            broadcaster,
            pinger,
        }
    }

    pub fn record_snapshot(&self) -> Record {
        self.ctx.record.snapshot_record()
    }

    /// Signal every background loop to stop and wait for them to exit.
    /// Pending inbound handlers (owned by the host's request-handling
    /// tasks) complete on their own and are not awaited here.
    pub async fn stop(self) {
        self.ctx.cancel.cancel();
        let _ = self.broadcaster.await;
        let _ = self.pinger.await;
    }
}
