pub mod bootstrap;
pub mod broadcast;
pub mod client;
pub mod dispatch;
pub mod message;
pub mod model;
pub mod node;
pub mod pinger;
pub mod record;
pub mod store;
pub mod transport;

pub use message::{Code, Message, MessageBody, MessageHeader, ResponseStatus};
pub use model::{Directory, File, Node, Oauth, OnlineNodes, Record, UpdateTime};
pub use node::{NodeConfig, NodeHandle};
pub use record::RecordStore;
pub use store::{LocalStore, StoreError};
pub use transport::{Transport, TransportError};
