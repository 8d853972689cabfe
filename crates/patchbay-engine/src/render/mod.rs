//! Compiled render sequences: the executable form of a graph topology.
//!
//! A [`RenderSequence`] owns two precision twins of the same compiled
//! program — one for `f32`, one for `f64` — so the host can switch
//! precision without a recompile. Compilation itself lives in
//! [`builder`]; op execution in [`ops`] and [`program`].

mod builder;
mod ops;
mod program;

use patchbay_core::{AudioBuffer, AudioViewMut, MidiBuffer, PlayHead, ProcessContext, Processor, Sample};
use patchbay_graph::{Connections, Nodes, PrepareSettings};

use builder::TopologySnapshot;
use program::RenderProgram;

/// Crate-internal bridge from a sample type to its `Processor` entry points
/// and its precision twin inside a [`RenderSequence`].
pub(crate) trait SampleOps: Sample {
    fn call_process(
        processor: &mut dyn Processor,
        audio: &mut AudioViewMut<'_, Self>,
        midi: &mut MidiBuffer,
        ctx: &ProcessContext,
        bypassed: bool,
    );

    fn program(sequence: &mut RenderSequence) -> &mut RenderProgram<Self>
    where
        Self: Sized;
}

impl SampleOps for f32 {
    fn call_process(
        processor: &mut dyn Processor,
        audio: &mut AudioViewMut<'_, f32>,
        midi: &mut MidiBuffer,
        ctx: &ProcessContext,
        bypassed: bool,
    ) {
        if bypassed {
            processor.process_block_bypassed(audio, midi, ctx);
        } else {
            processor.process_block(audio, midi, ctx);
        }
    }

    fn program(sequence: &mut RenderSequence) -> &mut RenderProgram<f32> {
        &mut sequence.program_single
    }
}

impl SampleOps for f64 {
    fn call_process(
        processor: &mut dyn Processor,
        audio: &mut AudioViewMut<'_, f64>,
        midi: &mut MidiBuffer,
        ctx: &ProcessContext,
        bypassed: bool,
    ) {
        if bypassed {
            processor.process_block_bypassed_f64(audio, midi, ctx);
        } else {
            processor.process_block_f64(audio, midi, ctx);
        }
    }

    fn program(sequence: &mut RenderSequence) -> &mut RenderProgram<f64> {
        &mut sequence.program_double
    }
}

/// A graph compiled against one set of prepare settings, ready to execute
/// on the audio thread.
///
/// Built on the topology thread and handed over through the exchange; the
/// audio thread only ever calls [`process`](Self::process) or
/// [`process_f64`](Self::process_f64) on it.
pub struct RenderSequence {
    settings: PrepareSettings,
    latency_samples: usize,
    generation: u64,
    program_single: RenderProgram<f32>,
    program_double: RenderProgram<f64>,
}

impl RenderSequence {
    /// Compiles the topology into both precision twins and sizes their
    /// buffers for `settings.block_size`.
    pub fn compile(settings: PrepareSettings, nodes: &Nodes, connections: &Connections) -> Self {
        let snapshot = TopologySnapshot::capture(nodes, connections);

        let (mut program_single, latency_single) = snapshot.compile::<f32>(connections);
        let (mut program_double, latency_double) = snapshot.compile::<f64>(connections);
        debug_assert_eq!(
            latency_single, latency_double,
            "precision twins disagree on latency"
        );

        program_single.prepare_buffers(settings.block_size);
        program_double.prepare_buffers(settings.block_size);

        Self {
            settings,
            latency_samples: latency_single,
            generation: 0,
            program_single,
            program_double,
        }
    }

    pub fn settings(&self) -> PrepareSettings {
        self.settings
    }

    /// Whole-graph latency: the maximum cumulative input latency reaching
    /// any sink.
    pub fn latency_samples(&self) -> usize {
        self.latency_samples
    }

    /// Monotonic publish counter stamped by the coordinator.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Size of the audio work pool, including the shared zero slot.
    pub fn num_audio_buffers(&self) -> usize {
        self.program_single.num_buffers
    }

    /// Size of the MIDI work pool, including the shared zero slot.
    pub fn num_midi_buffers(&self) -> usize {
        self.program_single.num_midi_buffers
    }

    pub fn process(
        &mut self,
        audio: &mut AudioBuffer<f32>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        self.program_single.perform(audio, midi, play_head);
    }

    pub fn process_f64(
        &mut self,
        audio: &mut AudioBuffer<f64>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        self.program_double.perform(audio, midi, play_head);
    }

    pub(crate) fn perform_as<S: SampleOps>(
        &mut self,
        audio: &mut AudioBuffer<S>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        S::program(self).perform(audio, midi, play_head);
    }
}
