use patchbay_core::{AudioViewMut, IoRole, MidiBuffer, ProcessContext, Processor};

/// Built-in endpoint node bridging the graph to its host's buffers.
///
/// The processor itself is inert: the render sequence recognises the role
/// and moves data between the caller's buffers and the work pool directly,
/// so the process entry points below are never reached in a compiled
/// sequence. Channel counts mirror the host configuration — an audio input
/// endpoint *outputs* the host's input channels into the graph, and an
/// audio output endpoint *consumes* the host's output channel count.
pub struct IoProcessor {
    role: IoRole,
    channels: usize,
}

impl IoProcessor {
    /// `channels` is the host-facing channel count for the audio roles and
    /// ignored for the MIDI ones.
    pub fn new(role: IoRole, channels: usize) -> Self {
        let channels = match role {
            IoRole::AudioIn | IoRole::AudioOut => channels,
            IoRole::MidiIn | IoRole::MidiOut => 0,
        };
        Self { role, channels }
    }

    pub fn role(&self) -> IoRole {
        self.role
    }
}

impl Processor for IoProcessor {
    fn name(&self) -> &str {
        match self.role {
            IoRole::AudioIn => "Audio Input",
            IoRole::AudioOut => "Audio Output",
            IoRole::MidiIn => "MIDI Input",
            IoRole::MidiOut => "MIDI Output",
        }
    }

    fn input_channels(&self) -> usize {
        match self.role {
            IoRole::AudioOut => self.channels,
            _ => 0,
        }
    }

    fn output_channels(&self) -> usize {
        match self.role {
            IoRole::AudioIn => self.channels,
            _ => 0,
        }
    }

    fn accepts_midi(&self) -> bool {
        self.role == IoRole::MidiOut
    }

    fn produces_midi(&self) -> bool {
        self.role == IoRole::MidiIn
    }

    fn supports_double_precision(&self) -> bool {
        true
    }

    fn io_role(&self) -> Option<IoRole> {
        Some(self.role)
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

    fn process_block_f64(
        &mut self,
        _audio: &mut AudioViewMut<'_, f64>,
        _midi: &mut MidiBuffer,
        _ctx: &ProcessContext,
    ) {
    }
}
