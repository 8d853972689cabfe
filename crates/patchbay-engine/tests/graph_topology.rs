use patchbay_engine::{
    AudioViewMut, Connection, GraphConfig, GraphError, MidiBuffer, NodeAndChannel, NodeId,
    ProcessContext, Processor, ProcessorGraph, UpdateKind,
};

struct Stereo {
    midi: bool,
}

impl Processor for Stereo {
    fn name(&self) -> &str {
        "stereo"
    }

    fn input_channels(&self) -> usize {
        2
    }

    fn output_channels(&self) -> usize {
        2
    }

    fn accepts_midi(&self) -> bool {
        self.midi
    }

    fn produces_midi(&self) -> bool {
        self.midi
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

struct MidiOnly {
    input: bool,
}

impl Processor for MidiOnly {
    fn name(&self) -> &str {
        "midi-only"
    }

    fn input_channels(&self) -> usize {
        0
    }

    fn output_channels(&self) -> usize {
        0
    }

    fn accepts_midi(&self) -> bool {
        self.input
    }

    fn produces_midi(&self) -> bool {
        !self.input
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

#[test]
fn midi_pair_connect_and_disconnect() {
    let (mut graph, _renderer) = ProcessorGraph::new(GraphConfig::default());

    let a = graph
        .add_node(Box::new(MidiOnly { input: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();
    let b = graph
        .add_node(Box::new(MidiOnly { input: true }), None, UpdateKind::Sync)
        .unwrap()
        .id();

    let forward = Connection::new(NodeAndChannel::midi(a), NodeAndChannel::midi(b));
    let reverse = Connection::new(NodeAndChannel::midi(b), NodeAndChannel::midi(a));
    let self_a = Connection::new(NodeAndChannel::midi(a), NodeAndChannel::midi(a));
    let self_b = Connection::new(NodeAndChannel::midi(b), NodeAndChannel::midi(b));

    assert!(graph.can_connect(&forward));
    assert!(!graph.can_connect(&reverse));
    assert!(!graph.can_connect(&self_a));
    assert!(!graph.can_connect(&self_b));

    assert!(graph.get_connections().is_empty());
    assert!(!graph.is_connected(&forward));
    assert!(!graph.is_connected_between(a, b));

    graph.add_connection(&forward, UpdateKind::Sync).unwrap();

    assert_eq!(graph.get_connections().len(), 1);
    assert!(graph.is_connected(&forward));
    assert!(graph.is_connected_between(a, b));

    assert!(graph.disconnect_node(a, UpdateKind::Sync));
    assert!(graph.get_connections().is_empty());
    assert!(!graph.is_connected(&forward));
    assert!(!graph.is_connected_between(a, b));
}

#[test]
fn hundred_node_chain_lookups_and_cycles() {
    let (mut graph, _renderer) = ProcessorGraph::new(GraphConfig::default());

    let ids: Vec<NodeId> = (0..100)
        .map(|_| {
            graph
                .add_node(Box::new(Stereo { midi: true }), None, UpdateKind::Async)
                .unwrap()
                .id()
        })
        .collect();

    for pair in ids.windows(2) {
        for channel in 0..2 {
            graph
                .add_connection(
                    &Connection::new(
                        NodeAndChannel::audio(pair[0], channel),
                        NodeAndChannel::audio(pair[1], channel),
                    ),
                    UpdateKind::Async,
                )
                .unwrap();
        }
    }

    for pair in ids.windows(2) {
        for channel in 0..2 {
            assert!(graph.is_connected(&Connection::new(
                NodeAndChannel::audio(pair[0], channel),
                NodeAndChannel::audio(pair[1], channel),
            )));
        }
        assert!(graph.is_connected_between(pair[0], pair[1]));
    }

    assert!(!graph.is_an_input_to(ids[0], ids[0]));
    for k in 1..100 {
        assert!(!graph.is_an_input_to(ids[k], ids[k]));
        assert!(graph.is_an_input_to(ids[0], ids[k]));
        assert!(!graph.is_an_input_to(ids[k], ids[0]));
        assert!(graph.is_an_input_to(ids[k], ids[99]) || k == 99);
        assert!(!graph.is_an_input_to(ids[99], ids[k]));
    }

    // wrap around to make the graph cyclic
    for channel in 0..2 {
        graph
            .add_connection(
                &Connection::new(
                    NodeAndChannel::audio(ids[99], channel),
                    NodeAndChannel::audio(ids[0], channel),
                ),
                UpdateKind::Async,
            )
            .unwrap();
    }

    for id in &ids {
        assert!(graph.is_an_input_to(*id, *id));
        assert!(graph.is_an_input_to(ids[0], *id));
        assert!(graph.is_an_input_to(*id, ids[0]));
    }
}

#[test]
fn connections_listing_matches_is_connected() {
    let (mut graph, _renderer) = ProcessorGraph::new(GraphConfig::default());
    let a = graph
        .add_node(Box::new(Stereo { midi: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();
    let b = graph
        .add_node(Box::new(Stereo { midi: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();

    let left = Connection::new(NodeAndChannel::audio(a, 0), NodeAndChannel::audio(b, 0));
    let right = Connection::new(NodeAndChannel::audio(a, 1), NodeAndChannel::audio(b, 1));
    graph.add_connection(&left, UpdateKind::Sync).unwrap();
    graph.add_connection(&right, UpdateKind::Sync).unwrap();

    let listed = graph.get_connections();
    assert_eq!(listed.len(), 2);
    for connection in &listed {
        assert!(graph.is_connected(connection));
    }

    assert!(graph.remove_connection(&left, UpdateKind::Sync));
    assert!(!graph.is_connected(&left));
    assert!(!graph.remove_connection(&left, UpdateKind::Sync));
    assert_eq!(graph.get_connections(), vec![right]);
}

#[test]
fn explicit_ids_and_duplicates() {
    let (mut graph, _renderer) = ProcessorGraph::new(GraphConfig::default());

    let chosen = graph
        .add_node(
            Box::new(Stereo { midi: false }),
            Some(NodeId(40)),
            UpdateKind::Sync,
        )
        .unwrap()
        .id();
    assert_eq!(chosen, NodeId(40));

    assert_eq!(
        graph
            .add_node(
                Box::new(Stereo { midi: false }),
                Some(NodeId(40)),
                UpdateKind::Sync,
            )
            .unwrap_err(),
        GraphError::DuplicateNodeId(NodeId(40))
    );

    // auto-assigned ids continue past explicit ones
    let next = graph
        .add_node(Box::new(Stereo { midi: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();
    assert_eq!(next, NodeId(41));
}

#[test]
fn removing_a_node_detaches_its_edges() {
    let (mut graph, _renderer) = ProcessorGraph::new(GraphConfig::default());
    let a = graph
        .add_node(Box::new(Stereo { midi: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();
    let b = graph
        .add_node(Box::new(Stereo { midi: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();
    let c = graph
        .add_node(Box::new(Stereo { midi: false }), None, UpdateKind::Sync)
        .unwrap()
        .id();

    graph
        .add_connection(
            &Connection::new(NodeAndChannel::audio(a, 0), NodeAndChannel::audio(b, 0)),
            UpdateKind::Sync,
        )
        .unwrap();
    graph
        .add_connection(
            &Connection::new(NodeAndChannel::audio(b, 0), NodeAndChannel::audio(c, 0)),
            UpdateKind::Sync,
        )
        .unwrap();

    // removal detaches the node's own edges
    assert!(graph.remove_node(b, UpdateKind::Sync).is_some());
    assert!(graph.get_connections().is_empty());
    assert!(!graph.remove_illegal_connections(UpdateKind::Sync));

    // every remaining connection is legal
    for connection in graph.get_connections() {
        assert!(graph.is_connection_legal(&connection));
    }
}
