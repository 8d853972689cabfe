//! Minimal end-to-end demo: host input → gain node → host output.
//!
//! Run with `cargo run -p patchbay-engine --example passthrough`.

use anyhow::Result;
use patchbay_engine::{
    AudioBuffer, AudioViewMut, Connection, GraphConfig, IoRole, MidiBuffer, NodeAndChannel,
    ProcessContext, Processor, ProcessorGraph, UpdateKind,
};

struct Gain {
    factor: f32,
}

impl Processor for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn input_channels(&self) -> usize {
        2
    }

    fn output_channels(&self) -> usize {
        2
    }

    fn prepare_to_play(&mut self, _sample_rate: f64, _block_size: usize) {}

    fn release_resources(&mut self) {}

    fn process_block(
        &mut self,
        audio: &mut AudioViewMut<'_, f32>,
        _midi: &mut MidiBuffer,
        _ctx: &ProcessContext,
    ) {
        for channel in 0..audio.channels() {
            if let Some(plane) = audio.plane_mut(channel) {
                for sample in plane {
                    *sample *= self.factor;
                }
            }
        }
    }
}

fn main() -> Result<()> {
    let (mut graph, mut renderer) = ProcessorGraph::new(GraphConfig::new(2, 2));

    let input = graph.add_io_node(IoRole::AudioIn, UpdateKind::Async)?.id();
    let gain = graph
        .add_node(Box::new(Gain { factor: 0.5 }), None, UpdateKind::Async)?
        .id();
    let output = graph.add_io_node(IoRole::AudioOut, UpdateKind::Async)?.id();

    for channel in 0..2 {
        graph.add_connection(
            &Connection::new(
                NodeAndChannel::audio(input, channel),
                NodeAndChannel::audio(gain, channel),
            ),
            UpdateKind::Async,
        )?;
        graph.add_connection(
            &Connection::new(
                NodeAndChannel::audio(gain, channel),
                NodeAndChannel::audio(output, channel),
            ),
            UpdateKind::Async,
        )?;
    }

    graph.prepare_to_play(48_000.0, 256, UpdateKind::Sync);

    let mut audio: AudioBuffer<f32> = AudioBuffer::new(2, 256);
    for (index, sample) in audio.channel_mut(0).iter_mut().enumerate() {
        *sample = (index as f32 * 0.05).sin();
    }
    let mut midi = MidiBuffer::new();
    renderer.process_block(&mut audio, &mut midi, None);

    let rms = (audio.channel(0).iter().map(|s| s * s).sum::<f32>() / 256.0).sqrt();
    println!("rendered one block: rms = {rms:.4}, latency = {} samples", graph.latency_samples());

    Ok(())
}
