use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use patchbay_core::Precision;
use serde::{Deserialize, Serialize};

use crate::{NodeId, Nodes};

/// Settings the graph (and every node in it) is prepared to run at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepareSettings {
    pub precision: Precision,
    pub sample_rate: f64,
    pub block_size: usize,
}

#[derive(Default)]
struct Inner {
    current: Option<PrepareSettings>,
    prepared: BTreeSet<NodeId>,
}

/// Tracks which settings each node has been prepared with.
///
/// `set_state` records what the host most recently requested;
/// `apply_settings` brings the nodes in line with it. Application runs on
/// the topology thread only, and never while any lock taken by a process
/// call is held — each processor's own prepare/release/process exclusion is
/// guaranteed by the render pipeline refusing to run sequences whose
/// settings no longer match the requested ones.
#[derive(Default)]
pub struct NodeStates {
    requested: ArcSwapOption<PrepareSettings>,
    inner: Mutex<Inner>,
}

impl NodeStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the settings to use the next time the graph is rebuilt.
    pub fn set_state(&self, settings: Option<PrepareSettings>) {
        self.requested.store(settings.map(Arc::new));
    }

    /// The most recently requested settings. Lock-free; safe to call from
    /// the audio thread.
    pub fn last_requested(&self) -> Option<PrepareSettings> {
        self.requested.load().as_deref().copied()
    }

    /// Brings every node in line with the requested settings and returns
    /// what was applied.
    ///
    /// When the settings changed since the last application, every node is
    /// released first and the prepared set starts over; otherwise only
    /// nodes not yet prepared (newly added ones) are touched.
    pub fn apply_settings(&self, nodes: &Nodes) -> Option<PrepareSettings> {
        let requested = self.last_requested();
        let mut inner = self.inner.lock();

        if inner.current != requested {
            inner.current = requested;
            for node in nodes.iter() {
                node.processor().release_resources();
            }
            inner.prepared.clear();
        }

        if let Some(settings) = inner.current {
            for node in nodes.iter() {
                if !inner.prepared.insert(node.id()) {
                    continue;
                }
                let mut processor = node.processor();
                let precision = if processor.supports_double_precision() {
                    settings.precision
                } else {
                    Precision::Single
                };
                processor.set_processing_precision(precision);
                processor.set_rate_and_block_size(settings.sample_rate, settings.block_size);
                processor.prepare_to_play(settings.sample_rate, settings.block_size);
            }
        }

        inner.current
    }
}
