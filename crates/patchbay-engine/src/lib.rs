//! Patchbay Engine
//! ===============
//! Executable layer of the patchbay audio processor graph: compiles a node
//! topology into a linear render sequence of buffer ops (with per-channel
//! latency compensation and a reusable work-buffer pool), hands sequences to
//! the audio thread through a wait-free exchange, and exposes the
//! [`ProcessorGraph`]/[`GraphRenderer`] pair the host drives.
//!
//! The topology thread edits the graph and compiles; the audio thread only
//! swaps in the newest sequence and executes it. Neither side ever blocks
//! the other: at worst the audio thread renders one more block with the
//! previous sequence.

pub mod exchange;
pub mod graph;
pub mod io;
pub mod render;

pub use exchange::SequenceExchange;
pub use graph::{GraphConfig, GraphRenderer, ProcessorGraph, UpdateKind};
pub use io::IoProcessor;
pub use render::RenderSequence;

pub use patchbay_core::{
    AudioBuffer, AudioViewMut, IoRole, MidiBuffer, MidiEvent, PlayHead, Precision,
    ProcessContext, Processor, Sample,
};
pub use patchbay_graph::{
    Connection, Connections, GraphError, Node, NodeAndChannel, NodeId, NodeStates, Nodes,
    PrepareSettings, MIDI_CHANNEL,
};
