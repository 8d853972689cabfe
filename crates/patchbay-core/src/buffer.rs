use crate::sample::Sample;

/// Non-interleaved audio buffer for processing.
#[derive(Debug, Clone)]
pub struct AudioBuffer<S: Sample> {
    channels: Vec<Vec<S>>,
}

impl<S: Sample> AudioBuffer<S> {
    pub fn new(num_channels: usize, frames: usize) -> Self {
        let channels = (0..num_channels).map(|_| vec![S::ZERO; frames]).collect();
        Self { channels }
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(S::ZERO);
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames per channel.
    pub fn frames(&self) -> usize {
        self.channels
            .first()
            .map(|channel| channel.len())
            .unwrap_or_default()
    }

    /// Resizes in place. A no-op when the shape already matches, and channel
    /// storage is never shrunk below its capacity, so steady-state calls stay
    /// off the allocator.
    pub fn resize(&mut self, num_channels: usize, frames: usize) {
        if self.channels.len() != num_channels {
            self.channels.resize_with(num_channels, Vec::new);
        }
        for channel in &mut self.channels {
            if channel.len() != frames {
                channel.resize(frames, S::ZERO);
            }
        }
    }

    pub fn channel(&self, index: usize) -> &[S] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [S] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &Vec<S>> {
        self.channels.iter()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Vec<S>> {
        self.channels.iter_mut()
    }

    pub fn as_slice(&self) -> &[Vec<S>] {
        &self.channels
    }

    pub fn as_mut_slice(&mut self) -> &mut [Vec<S>] {
        &mut self.channels
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut S> {
        self.channels
            .iter_mut()
            .flat_map(|channel| channel.iter_mut())
    }
}

impl<S: Sample> Default for AudioBuffer<S> {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
        }
    }
}
