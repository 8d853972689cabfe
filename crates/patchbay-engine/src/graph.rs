use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use patchbay_core::{AudioBuffer, IoRole, MidiBuffer, PlayHead, Precision, Processor};
use patchbay_graph::{
    Connection, Connections, GraphError, Node, NodeId, NodeStates, Nodes, PrepareSettings,
};
use serde::{Deserialize, Serialize};

use crate::exchange::SequenceExchange;
use crate::io::IoProcessor;
use crate::render::{RenderSequence, SampleOps};

/// Host-facing channel configuration forwarded to the I/O endpoint nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub input_channels: usize,
    pub output_channels: usize,
}

impl GraphConfig {
    pub fn new(input_channels: usize, output_channels: usize) -> Self {
        Self {
            input_channels,
            output_channels,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            input_channels: 2,
            output_channels: 2,
        }
    }
}

/// How a topology edit propagates to the audio thread.
///
/// `Sync` recompiles and publishes before the call returns. `Async` only
/// marks the graph dirty; edits coalesce until the host drives
/// [`ProcessorGraph::rebuild_if_dirty`] from its event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Sync,
    Async,
}

/// Topology-thread surface of the graph: owns the registry, the connection
/// set and the preparation state, compiles render sequences and publishes
/// them to the paired [`GraphRenderer`].
pub struct ProcessorGraph {
    config: GraphConfig,
    nodes: Nodes,
    connections: Connections,
    states: Arc<NodeStates>,
    exchange: Arc<SequenceExchange>,
    non_realtime: Arc<AtomicBool>,
    precision: Precision,
    last_node_id: u32,
    generation: u64,
    dirty: bool,
    latency_samples: usize,
}

impl ProcessorGraph {
    /// Creates the graph together with its audio-thread counterpart.
    pub fn new(config: GraphConfig) -> (Self, GraphRenderer) {
        let states = Arc::new(NodeStates::new());
        let exchange = Arc::new(SequenceExchange::new());
        let non_realtime = Arc::new(AtomicBool::new(false));

        let renderer = GraphRenderer {
            states: Arc::clone(&states),
            exchange: Arc::clone(&exchange),
            non_realtime: Arc::clone(&non_realtime),
            live: None,
        };

        let graph = Self {
            config,
            nodes: Nodes::new(),
            connections: Connections::new(),
            states,
            exchange,
            non_realtime,
            precision: Precision::Single,
            last_node_id: 0,
            generation: 0,
            dirty: false,
            latency_samples: 0,
        };

        (graph, renderer)
    }

    pub fn config(&self) -> GraphConfig {
        self.config
    }

    /// Adds a node wrapping `processor`. With `id` of `None` the graph
    /// assigns the next monotonically increasing id.
    pub fn add_node(
        &mut self,
        processor: Box<dyn Processor>,
        id: Option<NodeId>,
        update: UpdateKind,
    ) -> Result<Arc<Node>, GraphError> {
        let id = id.unwrap_or_else(|| {
            self.last_node_id += 1;
            NodeId(self.last_node_id)
        });
        let node = self.nodes.add(processor, id)?;
        if id.0 > self.last_node_id {
            self.last_node_id = id.0;
        }
        self.topology_changed(update);
        Ok(node)
    }

    /// Adds a built-in endpoint node, sized from the graph configuration.
    pub fn add_io_node(
        &mut self,
        role: IoRole,
        update: UpdateKind,
    ) -> Result<Arc<Node>, GraphError> {
        let channels = match role {
            IoRole::AudioIn => self.config.input_channels,
            IoRole::AudioOut => self.config.output_channels,
            IoRole::MidiIn | IoRole::MidiOut => 0,
        };
        self.add_node(Box::new(IoProcessor::new(role, channels)), None, update)
    }

    /// Disconnects and removes the node. The returned handle (and any live
    /// render sequence) keeps the processor alive until dropped.
    pub fn remove_node(&mut self, id: NodeId, update: UpdateKind) -> Option<Arc<Node>> {
        self.connections.disconnect_node(id);
        let removed = self.nodes.remove(id);
        self.topology_changed(update);
        removed
    }

    /// Drops every node and connection.
    pub fn clear(&mut self, update: UpdateKind) {
        if self.nodes.is_empty() {
            return;
        }
        self.nodes = Nodes::new();
        self.connections = Connections::new();
        self.topology_changed(update);
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().cloned().collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_connection(
        &mut self,
        connection: &Connection,
        update: UpdateKind,
    ) -> Result<(), GraphError> {
        self.connections.add(&self.nodes, connection)?;
        self.topology_changed(update);
        Ok(())
    }

    pub fn remove_connection(&mut self, connection: &Connection, update: UpdateKind) -> bool {
        if !self.connections.remove(connection) {
            return false;
        }
        self.topology_changed(update);
        true
    }

    pub fn disconnect_node(&mut self, id: NodeId, update: UpdateKind) -> bool {
        if !self.connections.disconnect_node(id) {
            return false;
        }
        self.topology_changed(update);
        true
    }

    /// Prunes connections referencing vanished nodes or invalid channels.
    pub fn remove_illegal_connections(&mut self, update: UpdateKind) -> bool {
        let removed = self.connections.remove_illegal(&self.nodes);
        self.topology_changed(update);
        removed
    }

    pub fn get_connections(&self) -> Vec<Connection> {
        self.connections.connections()
    }

    pub fn is_connected(&self, connection: &Connection) -> bool {
        self.connections.is_connected(connection)
    }

    pub fn is_connected_between(&self, source: NodeId, destination: NodeId) -> bool {
        self.connections.is_connected_between(source, destination)
    }

    pub fn is_connection_legal(&self, connection: &Connection) -> bool {
        Connections::is_connection_legal(&self.nodes, connection)
    }

    pub fn can_connect(&self, connection: &Connection) -> bool {
        self.connections.can_connect(&self.nodes, connection)
    }

    pub fn is_an_input_to(&self, source: NodeId, destination: NodeId) -> bool {
        self.connections.is_an_input_to(source, destination)
    }

    /// Selects the precision applied at the next [`prepare_to_play`].
    pub fn set_processing_precision(&mut self, precision: Precision) {
        self.precision = precision;
    }

    pub fn processing_precision(&self) -> Precision {
        self.precision
    }

    /// Records the settings every node should be prepared with and, for
    /// `Sync`, prepares the nodes and publishes a fresh sequence before
    /// returning.
    pub fn prepare_to_play(&mut self, sample_rate: f64, block_size: usize, update: UpdateKind) {
        self.states.set_state(Some(PrepareSettings {
            precision: self.precision,
            sample_rate,
            block_size,
        }));
        self.topology_changed(update);
    }

    /// Releases every node and retires the published sequence.
    pub fn release_resources(&mut self) {
        self.states.set_state(None);
        self.topology_changed(UpdateKind::Sync);
    }

    /// Forwards a reset to every node's processor.
    pub fn reset(&self) {
        for node in self.nodes.iter() {
            node.processor().reset();
        }
    }

    /// Switches every processor (and the paired renderer) between realtime
    /// and offline behaviour.
    pub fn set_non_realtime(&self, non_realtime: bool) {
        self.non_realtime.store(non_realtime, Ordering::Relaxed);
        for node in self.nodes.iter() {
            node.processor().set_non_realtime(non_realtime);
        }
    }

    pub fn is_non_realtime(&self) -> bool {
        self.non_realtime.load(Ordering::Relaxed)
    }

    /// Latency of the most recently compiled sequence.
    pub fn latency_samples(&self) -> usize {
        self.latency_samples
    }

    /// Edge-triggered coalescing point for `Async` edits: recompiles once
    /// no matter how many edits marked the graph dirty.
    pub fn rebuild_if_dirty(&mut self) {
        if self.dirty {
            self.rebuild();
        }
    }

    fn topology_changed(&mut self, update: UpdateKind) {
        match update {
            UpdateKind::Sync => self.rebuild(),
            UpdateKind::Async => self.dirty = true,
        }
    }

    fn rebuild(&mut self) {
        self.dirty = false;
        match self.states.apply_settings(&self.nodes) {
            Some(settings) => {
                let mut sequence =
                    RenderSequence::compile(settings, &self.nodes, &self.connections);
                self.generation += 1;
                sequence.set_generation(self.generation);
                self.latency_samples = sequence.latency_samples();
                tracing::debug!(
                    generation = self.generation,
                    nodes = self.nodes.len(),
                    latency = self.latency_samples,
                    audio_buffers = sequence.num_audio_buffers(),
                    midi_buffers = sequence.num_midi_buffers(),
                    "compiled render sequence"
                );
                self.exchange.publish(Some(Box::new(sequence)));
            }
            None => {
                tracing::debug!("no prepare settings; retiring published sequence");
                self.exchange.publish(None);
            }
        }
    }
}

impl Drop for ProcessorGraph {
    fn drop(&mut self) {
        // retire the published sequence so the janitor can reclaim it even
        // if the renderer never swaps again
        self.exchange.publish(None);
    }
}

/// Audio-thread counterpart of [`ProcessorGraph`].
///
/// Owns the live sequence slot. `process_block` never blocks beyond the
/// exchange try-lock and the per-node callback locks, and never allocates
/// once a sequence has warmed up.
pub struct GraphRenderer {
    states: Arc<NodeStates>,
    exchange: Arc<SequenceExchange>,
    non_realtime: Arc<AtomicBool>,
    live: Option<Box<RenderSequence>>,
}

impl GraphRenderer {
    pub fn process_block(
        &mut self,
        audio: &mut AudioBuffer<f32>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        self.process_impl(audio, midi, play_head);
    }

    pub fn process_block_f64(
        &mut self,
        audio: &mut AudioBuffer<f64>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        self.process_impl(audio, midi, play_head);
    }

    /// Generation of the sequence currently installed, if any.
    pub fn current_generation(&self) -> Option<u64> {
        self.live.as_ref().map(|sequence| sequence.generation())
    }

    /// Latency of the sequence currently installed.
    pub fn current_latency(&self) -> Option<usize> {
        self.live
            .as_ref()
            .map(|sequence| sequence.latency_samples())
    }

    fn process_impl<S: SampleOps>(
        &mut self,
        audio: &mut AudioBuffer<S>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        self.exchange.try_install(&mut self.live);

        // offline rendering waits for a sequence instead of going silent
        if self.non_realtime.load(Ordering::Relaxed) {
            while self.live.is_none() {
                thread::sleep(Duration::from_millis(1));
                self.exchange.try_install(&mut self.live);
            }
        }

        let requested = self.states.last_requested();
        match (&mut self.live, requested) {
            (Some(sequence), Some(requested)) if sequence.settings() == requested => {
                sequence.perform_as(audio, midi, play_head);
            }
            // no sequence, or settings drift: one block of silence beats
            // processing at the wrong rate
            _ => {
                audio.clear();
                midi.clear();
            }
        }
    }
}
