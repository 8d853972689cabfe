//! Patchbay Core
//! =============
//! Shared primitives for the patchbay audio processor graph: sample types,
//! planar audio buffers and views, MIDI buffers, and the processor contract
//! that graph nodes are built around.

pub mod block;
pub mod buffer;
pub mod midi;
pub mod processor;
pub mod sample;

pub use block::AudioViewMut;
pub use buffer::AudioBuffer;
pub use midi::{MidiBuffer, MidiEvent};
pub use processor::{IoRole, PlayHead, Precision, ProcessContext, Processor};
pub use sample::Sample;
