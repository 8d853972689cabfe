use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use patchbay_core::{IoRole, Processor};

use crate::{GraphError, NodeId};

/// One vertex of the graph, wrapping a single opaque processor.
///
/// Nodes are shared between the topology thread and any render sequence
/// still referencing them, so removal from the registry does not destroy
/// the processor; the last [`Arc`] does, always off the audio thread.
pub struct Node {
    id: NodeId,
    processor: Mutex<Box<dyn Processor>>,
    bypassed: AtomicBool,
}

impl Node {
    pub(crate) fn new(id: NodeId, processor: Box<dyn Processor>) -> Arc<Self> {
        Arc::new(Self {
            id,
            processor: Mutex::new(processor),
            bypassed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Locks the processor. This mutex is the node's callback lock: the
    /// audio thread holds it for the duration of the node's process op, and
    /// it is the only lock the audio thread ever blocks on.
    pub fn processor(&self) -> MutexGuard<'_, Box<dyn Processor>> {
        self.processor.lock()
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Relaxed)
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Relaxed);
    }

    pub fn input_channels(&self) -> usize {
        self.processor().input_channels()
    }

    pub fn output_channels(&self) -> usize {
        self.processor().output_channels()
    }

    pub fn accepts_midi(&self) -> bool {
        self.processor().accepts_midi()
    }

    pub fn produces_midi(&self) -> bool {
        self.processor().produces_midi()
    }

    pub fn latency_samples(&self) -> usize {
        self.processor().latency_samples()
    }

    pub fn io_role(&self) -> Option<IoRole> {
        self.processor().io_role()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("bypassed", &self.is_bypassed())
            .finish_non_exhaustive()
    }
}

/// The graph's node registry, ordered by id for binary-search lookup.
#[derive(Debug, Default)]
pub struct Nodes {
    array: Vec<Arc<Node>>,
}

impl Nodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<Node>> {
        self.array
            .binary_search_by_key(&id, |node| node.id())
            .ok()
            .map(|index| Arc::clone(&self.array[index]))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.array
            .binary_search_by_key(&id, |node| node.id())
            .is_ok()
    }

    /// Inserts a node at its sorted position. Fails when the id is taken.
    pub fn add(
        &mut self,
        processor: Box<dyn Processor>,
        id: NodeId,
    ) -> Result<Arc<Node>, GraphError> {
        match self.array.binary_search_by_key(&id, |node| node.id()) {
            Ok(_) => Err(GraphError::DuplicateNodeId(id)),
            Err(index) => {
                let node = Node::new(id, processor);
                self.array.insert(index, Arc::clone(&node));
                Ok(node)
            }
        }
    }

    /// Removes and returns the node; the processor stays alive while any
    /// render sequence still references it.
    pub fn remove(&mut self, id: NodeId) -> Option<Arc<Node>> {
        self.array
            .binary_search_by_key(&id, |node| node.id())
            .ok()
            .map(|index| self.array.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.array.iter()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_core::{AudioViewMut, MidiBuffer, ProcessContext};

    struct Silence;

    impl Processor for Silence {
        fn name(&self) -> &str {
            "silence"
        }

        fn input_channels(&self) -> usize {
            0
        }

        fn output_channels(&self) -> usize {
            1
        }

        fn prepare_to_play(&mut self, _sample_rate: f64, _block_size: usize) {}

        fn release_resources(&mut self) {}

        fn process_block(
            &mut self,
            audio: &mut AudioViewMut<'_, f32>,
            _midi: &mut MidiBuffer,
            _ctx: &ProcessContext,
        ) {
            audio.clear();
        }
    }

    #[test]
    fn add_keeps_ids_sorted_and_unique() {
        let mut nodes = Nodes::new();
        nodes.add(Box::new(Silence), NodeId(7)).unwrap();
        nodes.add(Box::new(Silence), NodeId(3)).unwrap();
        nodes.add(Box::new(Silence), NodeId(5)).unwrap();

        let ids: Vec<NodeId> = nodes.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![NodeId(3), NodeId(5), NodeId(7)]);

        assert_eq!(
            nodes.add(Box::new(Silence), NodeId(5)).unwrap_err(),
            GraphError::DuplicateNodeId(NodeId(5))
        );
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn removed_nodes_stay_alive_while_referenced() {
        let mut nodes = Nodes::new();
        let node = nodes.add(Box::new(Silence), NodeId(1)).unwrap();
        let removed = nodes.remove(NodeId(1)).unwrap();
        assert!(nodes.is_empty());
        assert_eq!(removed.id(), NodeId(1));
        // both handles still point at the same live node
        assert!(Arc::ptr_eq(&node, &removed));
    }

    #[test]
    fn lookup_misses_return_none() {
        let mut nodes = Nodes::new();
        nodes.add(Box::new(Silence), NodeId(2)).unwrap();
        assert!(nodes.get(NodeId(1)).is_none());
        assert!(nodes.get(NodeId(2)).is_some());
        assert!(nodes.remove(NodeId(9)).is_none());
    }
}
