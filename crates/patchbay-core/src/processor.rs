use serde::{Deserialize, Serialize};

use crate::block::AudioViewMut;
use crate::midi::MidiBuffer;

/// Sample precision a processor (or the whole graph) runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    Single,
    Double,
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Single
    }
}

/// Role of a built-in endpoint node that bridges the graph to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoRole {
    AudioIn,
    AudioOut,
    MidiIn,
    MidiOut,
}

/// Host transport position for the block being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayHead {
    pub sample_position: u64,
    pub is_playing: bool,
}

/// Per-call context handed to [`Processor::process_block`].
///
/// `play_head` is `None` when no transport information is valid for the
/// block — in particular for every chunk after the first when the host
/// renders a block larger than the prepared size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessContext {
    pub play_head: Option<PlayHead>,
}

/// Contract every signal unit placed in the graph satisfies.
///
/// The graph treats processors as black boxes: it only reads the static
/// facts below when compiling a render sequence, drives the preparation
/// lifecycle from the topology thread, and calls one of the process entry
/// points per block from the audio thread (under the owning node's callback
/// lock). Preparation and processing are never invoked concurrently; the
/// render pipeline refuses to run a sequence whose settings no longer match
/// the graph's, which is what makes that exclusion hold without a shared
/// lock.
pub trait Processor: Send {
    fn name(&self) -> &str;

    /// Total number of audio input channels.
    fn input_channels(&self) -> usize;

    /// Total number of audio output channels.
    fn output_channels(&self) -> usize;

    fn accepts_midi(&self) -> bool {
        false
    }

    fn produces_midi(&self) -> bool {
        false
    }

    fn supports_double_precision(&self) -> bool {
        false
    }

    /// Latency this processor introduces, in samples, used for delay
    /// compensation when parallel paths merge.
    fn latency_samples(&self) -> usize {
        0
    }

    /// Whether bypassing is handled by one of the processor's own
    /// parameters. When true, the graph keeps calling the normal process
    /// entry point even while the node is bypassed.
    fn has_bypass_parameter(&self) -> bool {
        false
    }

    /// Marks built-in endpoint processors; everything else returns `None`.
    fn io_role(&self) -> Option<IoRole> {
        None
    }

    fn set_processing_precision(&mut self, _precision: Precision) {}

    fn is_using_double_precision(&self) -> bool {
        false
    }

    /// Pushes the rate and block size ahead of [`prepare_to_play`]; some
    /// processors size internal state from these before preparation runs.
    fn set_rate_and_block_size(&mut self, _sample_rate: f64, _block_size: usize) {}

    fn prepare_to_play(&mut self, sample_rate: f64, block_size: usize);

    fn release_resources(&mut self);

    fn reset(&mut self) {}

    fn set_non_realtime(&mut self, _non_realtime: bool) {}

    /// A suspended processor is skipped; the render sequence clears its
    /// buffers instead of calling it.
    fn is_suspended(&self) -> bool {
        false
    }

    fn process_block(
        &mut self,
        audio: &mut AudioViewMut<'_, f32>,
        midi: &mut MidiBuffer,
        ctx: &ProcessContext,
    );

    /// Double-precision entry point; only reached when
    /// [`supports_double_precision`](Self::supports_double_precision) holds
    /// and the processor was prepared for double precision.
    fn process_block_f64(
        &mut self,
        audio: &mut AudioViewMut<'_, f64>,
        _midi: &mut MidiBuffer,
        _ctx: &ProcessContext,
    ) {
        debug_assert!(
            false,
            "{}: double-precision processing requested but not implemented",
            self.name()
        );
        audio.clear();
    }

    /// Called while the node is bypassed and no bypass parameter exists.
    /// The default passes inputs through in place and silences any output
    /// channels beyond the input count.
    fn process_block_bypassed(
        &mut self,
        audio: &mut AudioViewMut<'_, f32>,
        _midi: &mut MidiBuffer,
        _ctx: &ProcessContext,
    ) {
        clear_extra_outputs(audio, self.input_channels());
    }

    fn process_block_bypassed_f64(
        &mut self,
        audio: &mut AudioViewMut<'_, f64>,
        _midi: &mut MidiBuffer,
        _ctx: &ProcessContext,
    ) {
        clear_extra_outputs(audio, self.input_channels());
    }
}

fn clear_extra_outputs<S: crate::sample::Sample>(audio: &mut AudioViewMut<'_, S>, inputs: usize) {
    for channel in inputs..audio.channels() {
        if let Some(plane) = audio.plane_mut(channel) {
            plane.fill(S::ZERO);
        }
    }
}
