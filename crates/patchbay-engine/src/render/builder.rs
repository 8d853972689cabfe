use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use patchbay_core::IoRole;
use patchbay_graph::{
    Connection, Connections, Node, NodeAndChannel, NodeId, Nodes, MIDI_CHANNEL,
};

use super::ops::{DelayOp, Op, ProcessOp};
use super::program::RenderProgram;
use super::SampleOps;

/// Index of the shared read-only zero buffer in both pools.
const ZERO_BUFFER: usize = 0;

/// State of one work-pool slot during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferTag {
    /// The read-only zero slot.
    Zero,
    /// Available for reuse.
    Free,
    /// Holds a merge accumulator with no tracked producer.
    Anon,
    /// Holds the latest output of this producer channel.
    Assigned(NodeAndChannel),
}

struct Entry {
    node: Arc<Node>,
    id: NodeId,
    inputs: usize,
    outputs: usize,
    accepts_midi: bool,
    produces_midi: bool,
    latency: usize,
    io_role: Option<IoRole>,
    uses_double: bool,
}

/// One consistent view of the topology, taken at the start of a rebuild:
/// the ordered node list plus the per-node facts the emitter needs, read
/// under each processor's lock exactly once.
pub(crate) struct TopologySnapshot {
    entries: Vec<Entry>,
}

impl TopologySnapshot {
    pub(crate) fn capture(nodes: &Nodes, connections: &Connections) -> Self {
        let ordered = ordered_node_list(nodes, connections);
        let entries = ordered
            .into_iter()
            .map(|node| {
                let facts = node.processor();
                let entry = Entry {
                    id: node.id(),
                    inputs: facts.input_channels(),
                    outputs: facts.output_channels(),
                    accepts_midi: facts.accepts_midi(),
                    produces_midi: facts.produces_midi(),
                    latency: facts.latency_samples(),
                    io_role: facts.io_role(),
                    uses_double: facts.is_using_double_precision(),
                    node: Arc::clone(&node),
                };
                drop(facts);
                entry
            })
            .collect();
        Self { entries }
    }

    #[cfg(test)]
    pub(crate) fn node_ids(&self) -> Vec<NodeId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Emits the op program for one precision twin. Returns the program and
    /// the whole-graph latency in samples.
    pub(crate) fn compile<S: SampleOps>(
        &self,
        connections: &Connections,
    ) -> (RenderProgram<S>, usize) {
        let mut emit = Emit {
            snapshot: self,
            connections,
            ops: Vec::new(),
            audio_buffers: vec![BufferTag::Zero],
            midi_buffers: vec![BufferTag::Zero],
            delays: BTreeMap::new(),
            total_latency: 0,
        };

        for step in 0..self.entries.len() {
            emit.emit_node(step);
            emit.release_unused(step);
        }

        let num_buffers = emit.audio_buffers.len();
        let num_midi_buffers = emit.midi_buffers.len();
        (
            RenderProgram::new(emit.ops, num_buffers, num_midi_buffers),
            emit.total_latency,
        )
    }
}

/// Orders nodes so that, where feasible, producers appear before their
/// consumers: each node is inserted at the leftmost position already
/// depending on it, which yields a topological order on acyclic regions and
/// a deterministic (registry-driven) order inside strongly-connected ones.
fn ordered_node_list(nodes: &Nodes, connections: &Connections) -> Vec<Arc<Node>> {
    let mut ordered: Vec<Arc<Node>> = Vec::new();
    let mut parents: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();

    for node in nodes.iter() {
        let id = node.id();

        let insertion = ordered
            .iter()
            .position(|placed| {
                parents
                    .get(&placed.id())
                    .is_some_and(|set| set.contains(&id))
            })
            .unwrap_or(ordered.len());
        ordered.insert(insertion, Arc::clone(node));

        let mut transitive = BTreeSet::new();
        collect_parents(id, &mut transitive, &parents, connections);
        parents.insert(id, transitive);
    }

    ordered
}

/// Transitively walks source edges of `child`, reusing already-computed
/// parent sets where present. The insertion guard terminates cycles.
fn collect_parents(
    child: NodeId,
    parents: &mut BTreeSet<NodeId>,
    known: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    connections: &Connections,
) {
    for parent in connections.source_nodes_of(child) {
        if parent == child {
            continue;
        }
        if parents.insert(parent) {
            if let Some(precomputed) = known.get(&parent) {
                parents.extend(precomputed.iter().copied());
                continue;
            }
            collect_parents(parent, parents, known, connections);
        }
    }
}

struct Emit<'a, S: SampleOps> {
    snapshot: &'a TopologySnapshot,
    connections: &'a Connections,
    ops: Vec<Op<S>>,
    audio_buffers: Vec<BufferTag>,
    midi_buffers: Vec<BufferTag>,
    delays: BTreeMap<NodeId, usize>,
    total_latency: usize,
}

impl<'a, S: SampleOps> Emit<'a, S> {
    fn emit_node(&mut self, step: usize) {
        let entry = &self.snapshot.entries[step];
        let id = entry.id;
        let num_ins = entry.inputs;
        let num_outs = entry.outputs;
        let produces_midi = entry.produces_midi;
        let latency = entry.latency;
        let io_role = entry.io_role;
        let uses_double = entry.uses_double;
        let node = Arc::clone(&entry.node);

        let total_channels = num_ins.max(num_outs);
        let max_latency = self.input_latency(id);

        let mut channel_map = Vec::with_capacity(total_channels);

        for input_chan in 0..num_ins {
            let index = self.find_input_audio_buffer(step, input_chan, max_latency);
            channel_map.push(index);
            if input_chan < num_outs {
                debug_assert_ne!(index, ZERO_BUFFER);
                self.audio_buffers[index] =
                    BufferTag::Assigned(NodeAndChannel::audio(id, input_chan as i32));
            }
        }

        for output_chan in num_ins..num_outs {
            let index = self.free_audio_buffer();
            debug_assert_ne!(index, ZERO_BUFFER);
            channel_map.push(index);
            self.audio_buffers[index] =
                BufferTag::Assigned(NodeAndChannel::audio(id, output_chan as i32));
        }

        let midi_index = self.find_input_midi_buffer(step);
        if produces_midi {
            self.midi_buffers[midi_index] = BufferTag::Assigned(NodeAndChannel::midi(id));
        }

        self.delays.insert(id, max_latency + latency);

        // a node with no outputs is a sink; it defines the graph's latency
        if num_outs == 0 {
            self.total_latency = self.total_latency.max(max_latency);
        }

        self.ops.push(Op::Process(ProcessOp::new(
            node,
            channel_map,
            total_channels,
            midi_index,
            io_role,
            uses_double,
        )));
    }

    fn find_input_audio_buffer(
        &mut self,
        step: usize,
        input_chan: usize,
        max_latency: usize,
    ) -> usize {
        let entry = &self.snapshot.entries[step];
        let num_outs = entry.outputs;
        let destination = NodeAndChannel::audio(entry.id, input_chan as i32);
        let sources: Vec<NodeAndChannel> = self.connections.sources_of(destination).collect();

        // Unconnected input.
        if sources.is_empty() {
            if input_chan >= num_outs {
                return ZERO_BUFFER;
            }
            let index = self.free_audio_buffer();
            self.ops.push(Op::ClearChannel { channel: index });
            return index;
        }

        // A single straightforward source.
        if sources.len() == 1 {
            let source = sources[0];
            let found = self.audio_buffer_containing(source);
            let mut index = match found {
                Some(index) => index,
                // Feedback edge: the producer has not run yet, so this
                // input reads silence. When the channel doubles as an
                // output we clear a private buffer instead of binding the
                // shared zero slot, so the node can still write to it.
                None => {
                    if input_chan >= num_outs {
                        return ZERO_BUFFER;
                    }
                    let index = self.free_audio_buffer();
                    self.ops.push(Op::ClearChannel { channel: index });
                    return index;
                }
            };

            if input_chan < num_outs
                && self.is_buffer_needed_later(step, Some(input_chan as i32), source)
            {
                // another consumer still needs this producer's output, so
                // process from a copy we are free to overwrite
                let fresh = self.free_audio_buffer();
                self.ops.push(Op::CopyChannel {
                    source: index,
                    dest: fresh,
                });
                index = fresh;
            }

            let delay = self.delay_of(source.node);
            if delay < max_latency {
                self.push_delay(index, max_latency - delay);
            }
            return index;
        }

        // Several sources mix into this input: pick (or make) an
        // accumulator, then sum the rest into it.
        let mut accumulator = ZERO_BUFFER;
        let mut reusable = None;

        for (position, source) in sources.iter().enumerate() {
            if let Some(index) = self.audio_buffer_containing(*source) {
                if !self.is_buffer_needed_later(step, Some(input_chan as i32), *source) {
                    reusable = Some(position);
                    accumulator = index;
                    let delay = self.delay_of(source.node);
                    if delay < max_latency {
                        self.push_delay(accumulator, max_latency - delay);
                    }
                    break;
                }
            }
        }

        let reusable_position = match reusable {
            Some(position) => position,
            None => {
                // no input buffer may be overwritten; accumulate into a
                // fresh anonymous buffer seeded from the first source
                accumulator = self.free_audio_buffer();
                debug_assert_ne!(accumulator, ZERO_BUFFER);
                self.audio_buffers[accumulator] = BufferTag::Anon;

                match self.audio_buffer_containing(sources[0]) {
                    Some(first) => {
                        self.ops.push(Op::CopyChannel {
                            source: first,
                            dest: accumulator,
                        });
                        let delay = self.delay_of(sources[0].node);
                        if delay < max_latency {
                            self.push_delay(accumulator, max_latency - delay);
                        }
                    }
                    // feedback edge, seed with silence
                    None => self.ops.push(Op::ClearChannel {
                        channel: accumulator,
                    }),
                }
                0
            }
        };

        for (position, source) in sources.iter().enumerate() {
            if position == reusable_position {
                continue;
            }
            let Some(mut index) = self.audio_buffer_containing(*source) else {
                continue;
            };

            let delay = self.delay_of(source.node);
            if delay < max_latency {
                if self.is_buffer_needed_later(step, Some(input_chan as i32), *source) {
                    // delayed copy; the original is still read elsewhere
                    let fresh = self.free_audio_buffer();
                    self.ops.push(Op::CopyChannel {
                        source: index,
                        dest: fresh,
                    });
                    index = fresh;
                }
                self.push_delay(index, max_latency - delay);
            }

            self.ops.push(Op::AddChannel {
                source: index,
                dest: accumulator,
            });
        }

        accumulator
    }

    fn find_input_midi_buffer(&mut self, step: usize) -> usize {
        let entry = &self.snapshot.entries[step];
        let uses_midi = entry.accepts_midi || entry.produces_midi;
        let destination = NodeAndChannel::midi(entry.id);
        let sources: Vec<NodeAndChannel> = self.connections.sources_of(destination).collect();

        // A buffer is bound even when the node does not speak MIDI; it is
        // only cleared when someone will read or write it.
        if sources.is_empty() {
            let index = self.free_midi_buffer();
            if uses_midi {
                self.ops.push(Op::ClearMidi { index });
            }
            return index;
        }

        if sources.len() == 1 {
            let source = sources[0];
            return match self.midi_buffer_containing(source) {
                Some(index) => {
                    if self.is_buffer_needed_later(step, Some(MIDI_CHANNEL), source) {
                        let fresh = self.free_midi_buffer();
                        self.ops.push(Op::CopyMidi {
                            source: index,
                            dest: fresh,
                        });
                        fresh
                    } else {
                        index
                    }
                }
                // feedback edge: start the block with an empty buffer
                None => {
                    let index = self.free_midi_buffer();
                    self.ops.push(Op::ClearMidi { index });
                    index
                }
            };
        }

        let mut accumulator = ZERO_BUFFER;
        let mut reusable = None;

        for (position, source) in sources.iter().enumerate() {
            if let Some(index) = self.midi_buffer_containing(*source) {
                if !self.is_buffer_needed_later(step, Some(MIDI_CHANNEL), *source) {
                    reusable = Some(position);
                    accumulator = index;
                    break;
                }
            }
        }

        let reusable_position = match reusable {
            Some(position) => position,
            None => {
                accumulator = self.free_midi_buffer();
                match self.midi_buffer_containing(sources[0]) {
                    Some(first) => self.ops.push(Op::CopyMidi {
                        source: first,
                        dest: accumulator,
                    }),
                    None => self.ops.push(Op::ClearMidi {
                        index: accumulator,
                    }),
                }
                0
            }
        };

        for (position, source) in sources.iter().enumerate() {
            if position == reusable_position {
                continue;
            }
            if let Some(index) = self.midi_buffer_containing(*source) {
                self.ops.push(Op::AddMidi {
                    source: index,
                    dest: accumulator,
                });
            }
        }

        accumulator
    }

    /// Frees every assigned slot whose producer channel no later step reads.
    fn release_unused(&mut self, step: usize) {
        for index in 0..self.audio_buffers.len() {
            if let BufferTag::Assigned(channel) = self.audio_buffers[index] {
                if !self.is_buffer_needed_later(step, None, channel) {
                    self.audio_buffers[index] = BufferTag::Free;
                }
            }
        }
        for index in 0..self.midi_buffers.len() {
            if let BufferTag::Assigned(channel) = self.midi_buffers[index] {
                if !self.is_buffer_needed_later(step, None, channel) {
                    self.midi_buffers[index] = BufferTag::Free;
                }
            }
        }
    }

    /// Forward scan: will any step at or after `from_step` still read
    /// `output`? `ignore_input` masks one input channel of the first
    /// scanned step (the channel currently being resolved).
    fn is_buffer_needed_later(
        &self,
        from_step: usize,
        ignore_input: Option<i32>,
        output: NodeAndChannel,
    ) -> bool {
        let mut ignore = ignore_input;
        for step in from_step..self.snapshot.entries.len() {
            let entry = &self.snapshot.entries[step];
            if output.is_midi() {
                if ignore != Some(MIDI_CHANNEL)
                    && self.connections.is_connected(&Connection::new(
                        NodeAndChannel::midi(output.node),
                        NodeAndChannel::midi(entry.id),
                    ))
                {
                    return true;
                }
            } else {
                for channel in 0..entry.inputs as i32 {
                    if Some(channel) != ignore
                        && self.connections.is_connected(&Connection::new(
                            output,
                            NodeAndChannel::audio(entry.id, channel),
                        ))
                    {
                        return true;
                    }
                }
            }
            ignore = None;
        }
        false
    }

    fn input_latency(&self, id: NodeId) -> usize {
        self.connections
            .source_nodes_of(id)
            .iter()
            .map(|source| self.delay_of(*source))
            .max()
            .unwrap_or(0)
    }

    fn delay_of(&self, id: NodeId) -> usize {
        self.delays.get(&id).copied().unwrap_or(0)
    }

    fn push_delay(&mut self, channel: usize, delay: usize) {
        self.ops.push(Op::Delay(DelayOp::new(channel, delay)));
    }

    fn audio_buffer_containing(&self, output: NodeAndChannel) -> Option<usize> {
        buffer_containing(&self.audio_buffers, output)
    }

    fn midi_buffer_containing(&self, output: NodeAndChannel) -> Option<usize> {
        buffer_containing(&self.midi_buffers, output)
    }

    fn free_audio_buffer(&mut self) -> usize {
        free_buffer(&mut self.audio_buffers)
    }

    fn free_midi_buffer(&mut self) -> usize {
        free_buffer(&mut self.midi_buffers)
    }
}

fn buffer_containing(pool: &[BufferTag], output: NodeAndChannel) -> Option<usize> {
    pool.iter()
        .position(|tag| matches!(tag, BufferTag::Assigned(channel) if *channel == output))
}

/// First free slot, growing the pool when none is available. Never returns
/// the zero slot.
fn free_buffer(pool: &mut Vec<BufferTag>) -> usize {
    for (index, tag) in pool.iter().enumerate().skip(1) {
        if *tag == BufferTag::Free {
            return index;
        }
    }
    pool.push(BufferTag::Free);
    pool.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_core::{AudioViewMut, MidiBuffer, ProcessContext, Processor};

    struct TestProcessor {
        ins: usize,
        outs: usize,
        midi_in: bool,
        midi_out: bool,
        latency: usize,
    }

    impl TestProcessor {
        fn audio(ins: usize, outs: usize) -> Box<Self> {
            Box::new(Self {
                ins,
                outs,
                midi_in: false,
                midi_out: false,
                latency: 0,
            })
        }

        fn with_latency(ins: usize, outs: usize, latency: usize) -> Box<Self> {
            Box::new(Self {
                ins,
                outs,
                midi_in: false,
                midi_out: false,
                latency,
            })
        }

        fn midi() -> Box<Self> {
            Box::new(Self {
                ins: 0,
                outs: 0,
                midi_in: true,
                midi_out: true,
                latency: 0,
            })
        }
    }

    impl Processor for TestProcessor {
        fn name(&self) -> &str {
            "test"
        }

        fn input_channels(&self) -> usize {
            self.ins
        }

        fn output_channels(&self) -> usize {
            self.outs
        }

        fn accepts_midi(&self) -> bool {
            self.midi_in
        }

        fn produces_midi(&self) -> bool {
            self.midi_out
        }

        fn latency_samples(&self) -> usize {
            self.latency
        }

        fn prepare_to_play(&mut self, _sample_rate: f64, _block_size: usize) {}

        fn release_resources(&mut self) {}

        fn process_block(
            &mut self,
            _audio: &mut AudioViewMut<'_, f32>,
            _midi: &mut MidiBuffer,
            _ctx: &ProcessContext,
        ) {
        }
    }

    fn connect(
        connections: &mut Connections,
        nodes: &Nodes,
        from: (NodeId, i32),
        to: (NodeId, i32),
    ) {
        connections
            .add(
                nodes,
                &Connection::new(
                    NodeAndChannel::audio(from.0, from.1),
                    NodeAndChannel::audio(to.0, to.1),
                ),
            )
            .unwrap();
    }

    #[test]
    fn ordering_places_producers_before_consumers() {
        let mut nodes = Nodes::new();
        // registry order is reversed relative to the edges
        let sink = nodes.add(TestProcessor::audio(1, 0), NodeId(1)).unwrap();
        let middle = nodes.add(TestProcessor::audio(1, 1), NodeId(2)).unwrap();
        let source = nodes.add(TestProcessor::audio(0, 1), NodeId(3)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (source.id(), 0), (middle.id(), 0));
        connect(&mut connections, &nodes, (middle.id(), 0), (sink.id(), 0));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        assert_eq!(snapshot.node_ids(), vec![NodeId(3), NodeId(2), NodeId(1)]);
    }

    #[test]
    fn independent_nodes_keep_registry_order() {
        let mut nodes = Nodes::new();
        for id in 1..=4u32 {
            nodes.add(TestProcessor::audio(0, 1), NodeId(id)).unwrap();
        }
        let connections = Connections::new();
        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        assert_eq!(
            snapshot.node_ids(),
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
        );
    }

    #[test]
    fn diamond_is_latency_compensated() {
        let mut nodes = Nodes::new();
        let src = nodes.add(TestProcessor::audio(0, 1), NodeId(1)).unwrap();
        let long = nodes
            .add(TestProcessor::with_latency(1, 1, 100), NodeId(2))
            .unwrap();
        let short = nodes
            .add(TestProcessor::with_latency(1, 1, 40), NodeId(3))
            .unwrap();
        let sink = nodes.add(TestProcessor::audio(2, 0), NodeId(4)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (src.id(), 0), (long.id(), 0));
        connect(&mut connections, &nodes, (src.id(), 0), (short.id(), 0));
        connect(&mut connections, &nodes, (long.id(), 0), (sink.id(), 0));
        connect(&mut connections, &nodes, (short.id(), 0), (sink.id(), 1));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (program, latency) = snapshot.compile::<f32>(&connections);

        assert_eq!(latency, 100);

        let delays: Vec<usize> = program
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Delay(delay) => Some(delay.delay()),
                _ => None,
            })
            .collect();
        assert_eq!(delays, vec![60], "short branch is padded up to the long one");
    }

    #[test]
    fn chain_reuses_a_single_work_buffer() {
        let mut nodes = Nodes::new();
        let a = nodes.add(TestProcessor::audio(0, 1), NodeId(1)).unwrap();
        let b = nodes.add(TestProcessor::audio(1, 1), NodeId(2)).unwrap();
        let c = nodes.add(TestProcessor::audio(1, 0), NodeId(3)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (a.id(), 0), (b.id(), 0));
        connect(&mut connections, &nodes, (b.id(), 0), (c.id(), 0));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (program, _) = snapshot.compile::<f32>(&connections);

        // zero slot plus one work buffer that flows A→B and is reused B→C
        assert_eq!(program.num_buffers, 2);
        assert!(!program
            .ops
            .iter()
            .any(|op| matches!(op, Op::CopyChannel { .. })));
    }

    #[test]
    fn fan_out_copies_before_overwriting() {
        let mut nodes = Nodes::new();
        let a = nodes.add(TestProcessor::audio(0, 1), NodeId(1)).unwrap();
        let b = nodes.add(TestProcessor::audio(1, 1), NodeId(2)).unwrap();
        let c = nodes.add(TestProcessor::audio(1, 1), NodeId(3)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (a.id(), 0), (b.id(), 0));
        connect(&mut connections, &nodes, (a.id(), 0), (c.id(), 0));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (program, _) = snapshot.compile::<f32>(&connections);

        // B must process a copy, because C still reads A's output afterwards
        assert!(program
            .ops
            .iter()
            .any(|op| matches!(op, Op::CopyChannel { .. })));
        assert_eq!(program.num_buffers, 3);
    }

    #[test]
    fn merge_with_busy_sources_uses_anonymous_accumulator() {
        let mut nodes = Nodes::new();
        let a = nodes.add(TestProcessor::audio(0, 1), NodeId(1)).unwrap();
        let b = nodes.add(TestProcessor::audio(0, 1), NodeId(2)).unwrap();
        let merge = nodes.add(TestProcessor::audio(1, 1), NodeId(3)).unwrap();
        let tail = nodes.add(TestProcessor::audio(2, 0), NodeId(4)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (a.id(), 0), (merge.id(), 0));
        connect(&mut connections, &nodes, (b.id(), 0), (merge.id(), 0));
        // both producers stay live for the later sink
        connect(&mut connections, &nodes, (a.id(), 0), (tail.id(), 0));
        connect(&mut connections, &nodes, (b.id(), 0), (tail.id(), 1));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (program, _) = snapshot.compile::<f32>(&connections);

        let copies = program
            .ops
            .iter()
            .filter(|op| matches!(op, Op::CopyChannel { .. }))
            .count();
        let adds = program
            .ops
            .iter()
            .filter(|op| matches!(op, Op::AddChannel { .. }))
            .count();
        assert!(copies >= 1, "accumulator is seeded from a copy");
        assert_eq!(adds, 1, "the remaining source is summed in");
    }

    #[test]
    fn feedback_input_reads_silence_not_the_zero_slot() {
        let mut nodes = Nodes::new();
        let a = nodes.add(TestProcessor::audio(1, 1), NodeId(1)).unwrap();
        let b = nodes.add(TestProcessor::audio(1, 1), NodeId(2)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (a.id(), 0), (b.id(), 0));
        connect(&mut connections, &nodes, (b.id(), 0), (a.id(), 0));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (program, latency) = snapshot.compile::<f32>(&connections);
        assert_eq!(latency, 0);

        // whichever node runs first gets a cleared private buffer, never the
        // shared zero slot, because it writes its output in place
        let mut process_maps = program.ops.iter().filter_map(|op| match op {
            Op::Process(process) => Some(process.channel_map().to_vec()),
            _ => None,
        });
        let first = process_maps.next().unwrap();
        assert_ne!(first[0], 0);
        assert!(program
            .ops
            .iter()
            .any(|op| matches!(op, Op::ClearChannel { .. })));
    }

    #[test]
    fn midi_buffers_follow_producers() {
        let mut nodes = Nodes::new();
        let a = nodes.add(TestProcessor::midi(), NodeId(1)).unwrap();
        let b = nodes.add(TestProcessor::midi(), NodeId(2)).unwrap();

        let mut connections = Connections::new();
        connections
            .add(
                &nodes,
                &Connection::new(NodeAndChannel::midi(a.id()), NodeAndChannel::midi(b.id())),
            )
            .unwrap();

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (program, _) = snapshot.compile::<f32>(&connections);

        // one shared zero slot plus one live buffer handed from A to B
        assert_eq!(program.num_midi_buffers, 2);
        let midi_indices: Vec<usize> = program
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Process(process) => Some(process.midi_index()),
                _ => None,
            })
            .collect();
        assert_eq!(midi_indices, vec![1, 1]);
    }

    #[test]
    fn both_twins_report_the_same_latency() {
        let mut nodes = Nodes::new();
        let src = nodes.add(TestProcessor::audio(0, 1), NodeId(1)).unwrap();
        let fx = nodes
            .add(TestProcessor::with_latency(1, 1, 64), NodeId(2))
            .unwrap();
        let sink = nodes.add(TestProcessor::audio(1, 0), NodeId(3)).unwrap();

        let mut connections = Connections::new();
        connect(&mut connections, &nodes, (src.id(), 0), (fx.id(), 0));
        connect(&mut connections, &nodes, (fx.id(), 0), (sink.id(), 0));

        let snapshot = TopologySnapshot::capture(&nodes, &connections);
        let (_, latency_single) = snapshot.compile::<f32>(&connections);
        let (_, latency_double) = snapshot.compile::<f64>(&connections);
        assert_eq!(latency_single, 64);
        assert_eq!(latency_single, latency_double);
    }
}
