use patchbay_core::{AudioBuffer, MidiBuffer, PlayHead, Sample};

use super::ops::Op;
use super::SampleOps;

/// Event capacity reserved per MIDI buffer; plenty for one block without
/// reallocation.
const MIDI_BUFFER_CAPACITY: usize = 512;

/// The pool of reusable work channels a compiled sequence renders into.
/// Slot 0 is the shared read-only zero channel; ops never leave non-zero
/// data in it.
#[derive(Debug, Default)]
pub(crate) struct Workspace<S: Sample> {
    channels: Vec<Vec<S>>,
}

impl<S: Sample> Workspace<S> {
    pub(crate) fn prepare(&mut self, num_channels: usize, block_size: usize) {
        self.channels = vec![vec![S::ZERO; block_size]; num_channels];
    }

    pub(crate) fn channel(&self, index: usize) -> &[S] {
        &self.channels[index]
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> &mut [S] {
        &mut self.channels[index]
    }

    pub(crate) fn ptr_mut(&mut self, index: usize) -> *mut S {
        self.channels[index].as_mut_ptr()
    }

    /// Simultaneous read access to `source` and write access to `dest`.
    pub(crate) fn pair_mut(&mut self, source: usize, dest: usize) -> (&[S], &mut [S]) {
        debug_assert_ne!(source, dest);
        if source < dest {
            let (left, right) = self.channels.split_at_mut(dest);
            (&left[source], &mut right[0])
        } else {
            let (left, right) = self.channels.split_at_mut(source);
            (&right[0], &mut left[dest])
        }
    }
}

/// Everything an op may touch while the sequence renders one block.
pub(crate) struct OpContext<'a, S: SampleOps> {
    pub audio: &'a mut Workspace<S>,
    pub midi: &'a mut [MidiBuffer],
    /// The caller's audio buffer, read by audio-input endpoints.
    pub caller_audio: &'a AudioBuffer<S>,
    /// First frame of the current chunk within the caller's buffer.
    pub caller_offset: usize,
    /// Accumulator audio-output endpoints sum into; copied back to the
    /// caller once every op has run.
    pub output: &'a mut AudioBuffer<S>,
    /// Snapshot of the caller's incoming MIDI, read by MIDI-input endpoints.
    pub midi_in: &'a MidiBuffer,
    /// Accumulator MIDI-output endpoints merge into.
    pub midi_out: &'a mut MidiBuffer,
    pub play_head: Option<PlayHead>,
    pub num_samples: usize,
}

/// Executable program of buffer ops for one sample precision.
pub(crate) struct RenderProgram<S: SampleOps> {
    pub(crate) ops: Vec<Op<S>>,
    pub(crate) num_buffers: usize,
    pub(crate) num_midi_buffers: usize,
    block_size: usize,
    workspace: Workspace<S>,
    output_accumulator: AudioBuffer<S>,
    midi_pool: Vec<MidiBuffer>,
    midi_in_scratch: MidiBuffer,
    midi_out_accumulator: MidiBuffer,
    midi_chunk: MidiBuffer,
}

impl<S: SampleOps> RenderProgram<S> {
    pub(crate) fn new(ops: Vec<Op<S>>, num_buffers: usize, num_midi_buffers: usize) -> Self {
        Self {
            ops,
            num_buffers,
            num_midi_buffers,
            block_size: 0,
            workspace: Workspace::default(),
            output_accumulator: AudioBuffer::default(),
            midi_pool: Vec::new(),
            midi_in_scratch: MidiBuffer::new(),
            midi_out_accumulator: MidiBuffer::new(),
            midi_chunk: MidiBuffer::new(),
        }
    }

    /// Sizes every buffer the program touches while rendering, so the audio
    /// thread stays off the allocator afterwards.
    pub(crate) fn prepare_buffers(&mut self, block_size: usize) {
        self.block_size = block_size;
        self.workspace.prepare(self.num_buffers, block_size);
        self.output_accumulator = AudioBuffer::new(self.num_buffers.max(1), block_size);
        self.midi_pool = (0..self.num_midi_buffers)
            .map(|_| MidiBuffer::with_capacity(MIDI_BUFFER_CAPACITY))
            .collect();
        self.midi_in_scratch.ensure_capacity(MIDI_BUFFER_CAPACITY);
        self.midi_out_accumulator.ensure_capacity(MIDI_BUFFER_CAPACITY);
        self.midi_chunk.ensure_capacity(MIDI_BUFFER_CAPACITY);
        for op in &mut self.ops {
            if let Op::Process(process) = op {
                process.prepare(block_size);
            }
        }
    }

    /// Renders one caller block.
    ///
    /// A block larger than the prepared size is split into prepared-size
    /// chunks with the MIDI spliced per chunk; the play head is only valid
    /// for the first chunk and is withheld from the rest.
    pub(crate) fn perform(
        &mut self,
        audio: &mut AudioBuffer<S>,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        let num_samples = audio.frames();

        if num_samples > self.block_size && self.block_size > 0 {
            let mut chunk = std::mem::take(&mut self.midi_chunk);
            let mut start = 0;
            while start < num_samples {
                let len = self.block_size.min(num_samples - start);
                chunk.clear();
                chunk.add_events(midi, start, len, -(start as i64));
                let chunk_play_head = if start == 0 { play_head } else { None };
                self.render_block(audio, start, len, &mut chunk, chunk_play_head);
                start += self.block_size;
            }
            self.midi_chunk = chunk;
            return;
        }

        self.render_block(audio, 0, num_samples, midi, play_head);
    }

    fn render_block(
        &mut self,
        audio: &mut AudioBuffer<S>,
        start: usize,
        num_samples: usize,
        midi: &mut MidiBuffer,
        play_head: Option<PlayHead>,
    ) {
        self.midi_in_scratch.clear();
        self.midi_in_scratch.add_events(midi, 0, num_samples, 0);

        let caller_channels = audio.num_channels();
        self.output_accumulator
            .resize(caller_channels.max(1), num_samples);
        self.output_accumulator.clear();
        self.midi_out_accumulator.clear();

        {
            let caller = &*audio;
            let mut ctx = OpContext {
                audio: &mut self.workspace,
                midi: &mut self.midi_pool,
                caller_audio: caller,
                caller_offset: start,
                output: &mut self.output_accumulator,
                midi_in: &self.midi_in_scratch,
                midi_out: &mut self.midi_out_accumulator,
                play_head,
                num_samples,
            };
            for op in &mut self.ops {
                op.execute(&mut ctx);
            }
        }

        for channel in 0..caller_channels {
            let rendered = self.output_accumulator.channel(channel);
            audio.channel_mut(channel)[start..start + num_samples]
                .copy_from_slice(&rendered[..num_samples]);
        }

        midi.clear();
        midi.add_events(&self.midi_out_accumulator, 0, num_samples, 0);
    }
}
