//! rootmesh core library
//!
//! Self-organizing root selection for nodes that share only a lossy
//! datagram radio. Nodes find each other through advertisements, ask their
//! neighbors for an already settled root, and elect the node with the best
//! local signal quality when nobody knows one.

pub mod types;
pub mod error;
pub mod codec;
pub mod config;
pub mod transport;
pub mod quality;
pub mod peers;
pub mod state;
pub mod discovery;
pub mod election;
pub mod dispatch;
pub mod advertise;
pub mod node;
pub mod sim;

pub use types::*;
pub use error::{ConfigError, DecodeError, MeshError, TransportError};
pub use config::MeshConfig;
pub use transport::{Callbacks, InboundFrame, SendStatus, Transport};
pub use quality::{FixedQuality, QualitySource};
pub use peers::PeerRegistry;
pub use state::RootState;
pub use node::{Node, NodeStatus};
pub use sim::{SimMedium, SimRadio};
