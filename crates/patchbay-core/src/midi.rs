/// Raw MIDI event with a frame-accurate position inside the current block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiEvent {
    pub sample_offset: u32,
    pub data: [u8; 3],
    pub length: u8,
}

impl MidiEvent {
    #[inline]
    pub fn new(sample_offset: u32, data: [u8; 3]) -> Self {
        Self {
            sample_offset,
            data,
            length: 3,
        }
    }
}

/// Time-ordered collection of MIDI events for one audio block.
///
/// Events are kept sorted by `sample_offset`; events sharing an offset stay
/// in insertion order. Capacity is reserved up front by the render pipeline
/// so pushes on the audio thread stay off the allocator.
#[derive(Clone, Debug, Default)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

impl MidiBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn ensure_capacity(&mut self, capacity: usize) {
        if self.events.capacity() < capacity {
            self.events.reserve(capacity - self.events.len());
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    /// Inserts an event at its time-ordered position.
    pub fn push(&mut self, event: MidiEvent) {
        let index = self
            .events
            .partition_point(|existing| existing.sample_offset <= event.sample_offset);
        self.events.insert(index, event);
    }

    /// Replaces the contents with a copy of `source`, reusing the existing
    /// allocation where possible.
    pub fn copy_from(&mut self, source: &MidiBuffer) {
        self.events.clear();
        self.events.extend_from_slice(&source.events);
    }

    /// Merges events from `source` whose offsets fall inside
    /// `[start_sample, start_sample + num_samples)`, shifting each copied
    /// offset by `sample_delta`.
    pub fn add_events(
        &mut self,
        source: &MidiBuffer,
        start_sample: usize,
        num_samples: usize,
        sample_delta: i64,
    ) {
        let start = start_sample as u32;
        let end = start_sample.saturating_add(num_samples) as u32;
        for event in &source.events {
            if event.sample_offset < start || event.sample_offset >= end {
                continue;
            }
            let shifted = i64::from(event.sample_offset) + sample_delta;
            debug_assert!(shifted >= 0, "event shifted before the block start");
            self.push(MidiEvent {
                sample_offset: shifted.max(0) as u32,
                ..*event
            });
        }
    }
}
