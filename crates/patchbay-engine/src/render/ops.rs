use std::sync::Arc;

use patchbay_core::{AudioBuffer, AudioViewMut, IoRole, ProcessContext, Sample};
use patchbay_graph::Node;

use super::program::OpContext;
use super::SampleOps;

/// One step of a compiled render sequence.
pub(crate) enum Op<S: SampleOps> {
    ClearChannel { channel: usize },
    CopyChannel { source: usize, dest: usize },
    AddChannel { source: usize, dest: usize },
    ClearMidi { index: usize },
    CopyMidi { source: usize, dest: usize },
    AddMidi { source: usize, dest: usize },
    Delay(DelayOp<S>),
    Process(ProcessOp<S>),
}

impl<S: SampleOps> Op<S> {
    pub(crate) fn execute(&mut self, ctx: &mut OpContext<'_, S>) {
        let num_samples = ctx.num_samples;
        match self {
            Op::ClearChannel { channel } => {
                ctx.audio.channel_mut(*channel)[..num_samples].fill(S::ZERO);
            }
            Op::CopyChannel { source, dest } => {
                let (src, dst) = ctx.audio.pair_mut(*source, *dest);
                dst[..num_samples].copy_from_slice(&src[..num_samples]);
            }
            Op::AddChannel { source, dest } => {
                let (src, dst) = ctx.audio.pair_mut(*source, *dest);
                for (d, s) in dst[..num_samples].iter_mut().zip(&src[..num_samples]) {
                    *d = S::from_f64(d.to_f64() + s.to_f64());
                }
            }
            Op::ClearMidi { index } => ctx.midi[*index].clear(),
            Op::CopyMidi { source, dest } => {
                let (src, dst) = midi_pair(ctx.midi, *source, *dest);
                dst.copy_from(src);
            }
            Op::AddMidi { source, dest } => {
                let (src, dst) = midi_pair(ctx.midi, *source, *dest);
                dst.add_events(src, 0, num_samples, 0);
            }
            Op::Delay(op) => op.run(ctx),
            Op::Process(op) => op.run(ctx),
        }
    }
}

fn midi_pair(
    buffers: &mut [patchbay_core::MidiBuffer],
    source: usize,
    dest: usize,
) -> (&patchbay_core::MidiBuffer, &mut patchbay_core::MidiBuffer) {
    debug_assert_ne!(source, dest);
    if source < dest {
        let (left, right) = buffers.split_at_mut(dest);
        (&left[source], &mut right[0])
    } else {
        let (left, right) = buffers.split_at_mut(source);
        (&right[0], &mut left[dest])
    }
}

/// Fixed integer-sample delay line applied in place to one pool channel.
/// The ring state carries across blocks.
pub(crate) struct DelayOp<S: Sample> {
    channel: usize,
    buffer: Vec<S>,
    read: usize,
    write: usize,
}

impl<S: Sample + super::SampleOps> DelayOp<S> {
    pub(crate) fn new(channel: usize, delay: usize) -> Self {
        Self {
            channel,
            buffer: vec![S::ZERO; delay + 1],
            read: 0,
            write: delay,
        }
    }

    #[cfg(test)]
    pub(crate) fn delay(&self) -> usize {
        self.buffer.len() - 1
    }

    fn run(&mut self, ctx: &mut OpContext<'_, S>) {
        let capacity = self.buffer.len();
        let data = &mut ctx.audio.channel_mut(self.channel)[..ctx.num_samples];
        for sample in data {
            self.buffer[self.write] = *sample;
            *sample = self.buffer[self.read];
            self.read += 1;
            if self.read == capacity {
                self.read = 0;
            }
            self.write += 1;
            if self.write == capacity {
                self.write = 0;
            }
        }
    }
}

/// Runs one node for the block: binds the mapped pool channels into a planar
/// view, takes the node's callback lock and calls the right process entry
/// point, bridging precision when the sequence and the processor disagree.
/// Endpoint nodes never reach their processor; the op moves data between the
/// caller's buffers and the pool directly.
pub(crate) struct ProcessOp<S: SampleOps> {
    node: Arc<Node>,
    channel_map: Vec<usize>,
    total_channels: usize,
    midi_index: usize,
    io_role: Option<IoRole>,
    uses_double_hint: bool,
    planes: Vec<*mut S>,
    temp_single: AudioBuffer<f32>,
    temp_double: AudioBuffer<f64>,
    temp_planes_single: Vec<*mut f32>,
    temp_planes_double: Vec<*mut f64>,
}

// The raw plane pointers are per-call scratch, only written and read while
// `run` borrows the workspace.
unsafe impl<S: SampleOps> Send for ProcessOp<S> {}

impl<S: SampleOps> ProcessOp<S> {
    pub(crate) fn new(
        node: Arc<Node>,
        channel_map: Vec<usize>,
        total_channels: usize,
        midi_index: usize,
        io_role: Option<IoRole>,
        uses_double_hint: bool,
    ) -> Self {
        let planes = Vec::with_capacity(total_channels);
        Self {
            node,
            channel_map,
            total_channels,
            midi_index,
            io_role,
            uses_double_hint,
            planes,
            temp_single: AudioBuffer::default(),
            temp_double: AudioBuffer::default(),
            temp_planes_single: Vec::new(),
            temp_planes_double: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn channel_map(&self) -> &[usize] {
        &self.channel_map
    }

    #[cfg(test)]
    pub(crate) fn midi_index(&self) -> usize {
        self.midi_index
    }

    /// Pre-sizes the precision-bridge scratch so the mismatch path stays off
    /// the allocator on the audio thread.
    pub(crate) fn prepare(&mut self, block_size: usize) {
        if self.io_role.is_some() || self.uses_double_hint == S::IS_DOUBLE {
            return;
        }
        if self.uses_double_hint {
            self.temp_double.resize(self.total_channels, block_size);
            self.temp_planes_double.resize(self.total_channels, std::ptr::null_mut());
        } else {
            self.temp_single.resize(self.total_channels, block_size);
            self.temp_planes_single.resize(self.total_channels, std::ptr::null_mut());
        }
    }

    fn run(&mut self, ctx: &mut OpContext<'_, S>) {
        match self.io_role {
            Some(role) => self.run_io(role, ctx),
            None => self.run_processor(ctx),
        }
    }

    fn run_io(&mut self, role: IoRole, ctx: &mut OpContext<'_, S>) {
        let num_samples = ctx.num_samples;
        match role {
            IoRole::AudioIn => {
                let channels = self.channel_map.len().min(ctx.caller_audio.num_channels());
                for (index, &slot) in self.channel_map.iter().enumerate().take(channels) {
                    let source =
                        &ctx.caller_audio.channel(index)[ctx.caller_offset..][..num_samples];
                    ctx.audio.channel_mut(slot)[..num_samples].copy_from_slice(source);
                }
            }
            IoRole::AudioOut => {
                let channels = self.channel_map.len().min(ctx.output.num_channels());
                for (index, &slot) in self.channel_map.iter().enumerate().take(channels) {
                    let source = &ctx.audio.channel(slot)[..num_samples];
                    let dest = &mut ctx.output.channel_mut(index)[..num_samples];
                    for (d, s) in dest.iter_mut().zip(source) {
                        *d = S::from_f64(d.to_f64() + s.to_f64());
                    }
                }
            }
            IoRole::MidiIn => {
                ctx.midi[self.midi_index].add_events(ctx.midi_in, 0, num_samples, 0);
            }
            IoRole::MidiOut => {
                ctx.midi_out
                    .add_events(&ctx.midi[self.midi_index], 0, num_samples, 0);
            }
        }
    }

    fn run_processor(&mut self, ctx: &mut OpContext<'_, S>) {
        let num_samples = ctx.num_samples;
        let mut processor = self.node.processor();

        if processor.is_suspended() {
            for &slot in &self.channel_map {
                ctx.audio.channel_mut(slot)[..num_samples].fill(S::ZERO);
            }
            return;
        }

        let num_channels = if processor.input_channels() == 0 && processor.output_channels() == 0 {
            0
        } else {
            self.total_channels
        };

        self.planes.clear();
        self.planes
            .extend(self.channel_map.iter().map(|&slot| ctx.audio.ptr_mut(slot)));

        let mut view = AudioViewMut::from_planes(&mut self.planes[..num_channels], num_samples);
        let process_ctx = ProcessContext {
            play_head: ctx.play_head,
        };
        let bypassed = self.node.is_bypassed() && !processor.has_bypass_parameter();
        let midi = &mut ctx.midi[self.midi_index];

        if processor.is_using_double_precision() == S::IS_DOUBLE {
            S::call_process(&mut **processor, &mut view, midi, &process_ctx, bypassed);
        } else if processor.is_using_double_precision() {
            // sequence runs single, processor was prepared for double
            self.temp_double.resize(num_channels, num_samples);
            copy_view_into(&view, &mut self.temp_double, num_samples);
            self.temp_planes_double.clear();
            self.temp_planes_double
                .extend(self.temp_double.as_mut_slice().iter_mut().map(|c| c.as_mut_ptr()));
            {
                let mut converted =
                    AudioViewMut::from_planes(&mut self.temp_planes_double, num_samples);
                if bypassed {
                    processor.process_block_bypassed_f64(&mut converted, midi, &process_ctx);
                } else {
                    processor.process_block_f64(&mut converted, midi, &process_ctx);
                }
            }
            copy_buffer_into_view(&self.temp_double, &mut view, num_samples);
        } else {
            // sequence runs double, processor was prepared for single
            self.temp_single.resize(num_channels, num_samples);
            copy_view_into(&view, &mut self.temp_single, num_samples);
            self.temp_planes_single.clear();
            self.temp_planes_single
                .extend(self.temp_single.as_mut_slice().iter_mut().map(|c| c.as_mut_ptr()));
            {
                let mut converted =
                    AudioViewMut::from_planes(&mut self.temp_planes_single, num_samples);
                if bypassed {
                    processor.process_block_bypassed(&mut converted, midi, &process_ctx);
                } else {
                    processor.process_block(&mut converted, midi, &process_ctx);
                }
            }
            copy_buffer_into_view(&self.temp_single, &mut view, num_samples);
        }
    }
}

fn copy_view_into<A: Sample, B: Sample>(
    view: &AudioViewMut<'_, A>,
    buffer: &mut AudioBuffer<B>,
    num_samples: usize,
) {
    for channel in 0..view.channels() {
        let Some(source) = view.plane(channel) else {
            continue;
        };
        let dest = buffer.channel_mut(channel);
        for (d, s) in dest[..num_samples].iter_mut().zip(&source[..num_samples]) {
            *d = B::from_f64(s.to_f64());
        }
    }
}

fn copy_buffer_into_view<A: Sample, B: Sample>(
    buffer: &AudioBuffer<A>,
    view: &mut AudioViewMut<'_, B>,
    num_samples: usize,
) {
    for channel in 0..view.channels() {
        let source = buffer.channel(channel);
        let Some(dest) = view.plane_mut(channel) else {
            continue;
        };
        for (d, s) in dest[..num_samples].iter_mut().zip(&source[..num_samples]) {
            *d = B::from_f64(s.to_f64());
        }
    }
}
