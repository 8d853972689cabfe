//! Patchbay Graph
//! ==============
//! Value layer of the patchbay audio processor graph: node identities, the
//! id-ordered node registry, the connection set with its legality and
//! reachability queries, and the preparation-state tracker that keeps every
//! node's sample-rate/block-size/precision in step with the graph's.
//!
//! Everything here is mutated from the topology thread only; the render
//! pipeline in `patchbay-engine` consumes immutable snapshots of it.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod connections;
pub mod nodes;
pub mod prepare;

pub use connections::Connections;
pub use nodes::{Node, Nodes};
pub use prepare::{NodeStates, PrepareSettings};

/// Channel index reserved for a node's single MIDI port. Audio channels are
/// the non-negative indices below this value.
pub const MIDI_CHANNEL: i32 = 0x1000;

/// Unique identifier for nodes stored inside the graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

/// One endpoint of a connection: a node plus either an audio channel index
/// or the reserved MIDI port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeAndChannel {
    pub node: NodeId,
    pub channel: i32,
}

impl NodeAndChannel {
    pub fn audio(node: NodeId, channel: i32) -> Self {
        Self { node, channel }
    }

    pub fn midi(node: NodeId) -> Self {
        Self {
            node,
            channel: MIDI_CHANNEL,
        }
    }

    pub fn is_midi(&self) -> bool {
        self.channel == MIDI_CHANNEL
    }
}

/// Directed edge from a source endpoint to a destination endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeAndChannel,
    pub destination: NodeAndChannel,
}

impl Connection {
    pub fn new(source: NodeAndChannel, destination: NodeAndChannel) -> Self {
        Self {
            source,
            destination,
        }
    }
}

impl PartialOrd for Connection {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Connection {
    fn cmp(&self, other: &Self) -> Ordering {
        let key = |c: &Connection| {
            (
                c.source.node,
                c.destination.node,
                c.source.channel,
                c.destination.channel,
            )
        };
        key(self).cmp(&key(other))
    }
}

/// Error produced by graph manipulation operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The node id is already taken by another node.
    #[error("node id {0:?} is already present in the graph")]
    DuplicateNodeId(NodeId),
    /// A referenced node is not in the registry.
    #[error("connection references a node that is not in the graph")]
    MissingNode,
    /// Source and destination are on the same node.
    #[error("a node cannot be connected to itself")]
    SelfLoop,
    /// Audio endpoints connected to MIDI endpoints.
    #[error("audio and MIDI endpoints cannot be mixed in one connection")]
    KindMismatch,
    /// The referenced channel (or MIDI port) does not exist on the
    /// endpoint's processor.
    #[error("the referenced channel does not exist on the processor")]
    ChannelOutOfRange,
    /// The connection is already present.
    #[error("the connection already exists")]
    DuplicateConnection,
}
