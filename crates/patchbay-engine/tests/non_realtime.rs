use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use patchbay_engine::{
    AudioBuffer, AudioViewMut, Connection, GraphConfig, IoRole, MidiBuffer, NodeAndChannel,
    ProcessContext, Processor, ProcessorGraph, UpdateKind,
};

struct Dc {
    offline: Arc<AtomicBool>,
}

impl Processor for Dc {
    fn name(&self) -> &str {
        "dc"
    }

    fn input_channels(&self) -> usize {
        0
    }

    fn output_channels(&self) -> usize {
        1
    }

    fn set_non_realtime(&mut self, non_realtime: bool) {
        self.offline.store(non_realtime, Ordering::Relaxed);
    }

    fn prepare_to_play(&mut self, _sample_rate: f64, _block_size: usize) {}

    fn release_resources(&mut self) {}

    fn process_block(
        &mut self,
        audio: &mut AudioViewMut<'_, f32>,
        _midi: &mut MidiBuffer,
        _ctx: &ProcessContext,
    ) {
        if let Some(plane) = audio.plane_mut(0) {
            plane.fill(1.0);
        }
    }
}

#[test]
fn offline_processing_waits_for_a_sequence() {
    let (mut graph, mut renderer) = ProcessorGraph::new(GraphConfig::new(0, 1));
    let offline_flag = Arc::new(AtomicBool::new(false));

    let source = graph
        .add_node(
            Box::new(Dc {
                offline: Arc::clone(&offline_flag),
            }),
            None,
            UpdateKind::Async,
        )
        .unwrap()
        .id();
    let output = graph
        .add_io_node(IoRole::AudioOut, UpdateKind::Async)
        .unwrap()
        .id();
    graph
        .add_connection(
            &Connection::new(
                NodeAndChannel::audio(source, 0),
                NodeAndChannel::audio(output, 0),
            ),
            UpdateKind::Async,
        )
        .unwrap();

    graph.set_non_realtime(true);
    assert!(graph.is_non_realtime());
    assert!(offline_flag.load(Ordering::Relaxed));

    // the renderer blocks until a sequence is published
    let render_thread = thread::spawn(move || {
        let mut audio: AudioBuffer<f32> = AudioBuffer::new(1, 64);
        let mut midi = MidiBuffer::new();
        renderer.process_block(&mut audio, &mut midi, None);
        audio
    });

    thread::sleep(Duration::from_millis(50));
    graph.prepare_to_play(48_000.0, 64, UpdateKind::Sync);

    let audio = render_thread.join().unwrap();
    assert!(
        audio.channel(0).iter().all(|s| (s - 1.0).abs() < 1e-6),
        "offline render waited for the published sequence"
    );
}
