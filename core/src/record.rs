//! In-memory, concurrency-safe container holding the [`OnlineNodes`] map,
//! the [`Directory`] map, and their per-collection freshness stamps.
//!
//! Two independent reader-writer locks guard the two collections; a
//! whole-record snapshot acquires both in the fixed order nodes-before-
//! directory so no call path can deadlock against the reverse order.

use std::sync::RwLock;

use crate::model::{Directory, File, Node, OnlineNodes, Record, UpdateTime};

pub struct RecordStore {
    nodes: RwLock<OnlineNodes>,
    directory: RwLock<Directory>,
}

impl RecordStore {
    pub fn new(record: Record) -> Self {
        RecordStore {
            nodes: RwLock::new(record.online_nodes),
            directory: RwLock::new(record.directory),
        }
    }

    // --- nodes ---

    pub fn get_node(&self, username: &str) -> Option<Node> {
        self.nodes.read().unwrap().nodes_list.get(username).cloned()
    }

    /// Upsert a node and stamp the collection's `recent_update`. Covers
    /// both first-join and address changes.
    pub fn create_node(&self, node: Node, update: UpdateTime) {
        let mut nodes = self.nodes.write().unwrap();
        nodes.nodes_list.insert(node.oauth.user_name.clone(), node);
        nodes.recent_update = update;
    }

    /// A no-op if `username` is unknown, but still advances the
    /// collection's `recent_update`.
    pub fn delete_node(&self, username: &str, update: UpdateTime) {
        let mut nodes = self.nodes.write().unwrap();
        nodes.nodes_list.remove(username);
        nodes.recent_update = update;
    }

    pub fn replace_online_nodes(&self, nodes: OnlineNodes) {
        *self.nodes.write().unwrap() = nodes;
    }

    pub fn recent_update_nodes(&self) -> UpdateTime {
        self.nodes.read().unwrap().recent_update.clone()
    }

    pub fn snapshot_nodes(&self) -> OnlineNodes {
        self.nodes.read().unwrap().clone()
    }

    /// Every known node except `exclude` — used by the broadcaster and the
    /// pinger, both of which must never target self.
    pub fn peers_excluding(&self, exclude: &str) -> Vec<Node> {
        self.nodes
            .read()
            .unwrap()
            .nodes_list
            .values()
            .filter(|n| n.oauth.user_name != exclude)
            .cloned()
            .collect()
    }

    // --- directory ---

    pub fn get_file(&self, name: &str) -> Option<File> {
        self.directory.read().unwrap().files_list.get(name).cloned()
    }

    /// Upsert a file verbatim; its own `recent_update` becomes the
    /// directory's `recent_update` and must not be weakened.
    pub fn create_file(&self, file: File) {
        let mut dir = self.directory.write().unwrap();
        let stamp = file.recent_update.clone();
        dir.files_list.insert(file.name.clone(), file);
        dir.recent_update = stamp;
    }

    /// A no-op if `name` is unknown, but still advances the directory's
    /// `recent_update`.
    pub fn delete_file(&self, name: &str, update: UpdateTime) {
        let mut dir = self.directory.write().unwrap();
        dir.files_list.remove(name);
        dir.recent_update = update;
    }

    pub fn replace_directory(&self, dir: Directory) {
        *self.directory.write().unwrap() = dir;
    }

    pub fn recent_update_directory(&self) -> UpdateTime {
        self.directory.read().unwrap().recent_update.clone()
    }

    pub fn snapshot_directory(&self) -> Directory {
        self.directory.read().unwrap().clone()
    }

    // --- whole record ---

    /// Takes both locks in the fixed order nodes-before-directory.
    pub fn snapshot_record(&self) -> Record {
        let nodes = self.nodes.read().unwrap();
        let directory = self.directory.read().unwrap();
        Record {
            online_nodes: nodes.clone(),
            directory: directory.clone(),
        }
    }
}
