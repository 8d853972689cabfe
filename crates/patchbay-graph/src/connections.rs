use std::collections::{BTreeMap, BTreeSet};

use crate::{Connection, GraphError, NodeAndChannel, NodeId, Nodes};

/// A value type holding the full set of graph connections, mapped from each
/// destination endpoint to its ordered set of sources.
#[derive(Debug, Default, Clone)]
pub struct Connections {
    sources_for_destination: BTreeMap<NodeAndChannel, BTreeSet<NodeAndChannel>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the connection against the registry and inserts it.
    pub fn add(&mut self, nodes: &Nodes, connection: &Connection) -> Result<(), GraphError> {
        check_legal(nodes, connection)?;
        if self.is_connected(connection) {
            return Err(GraphError::DuplicateConnection);
        }
        self.sources_for_destination
            .entry(connection.destination)
            .or_default()
            .insert(connection.source);
        Ok(())
    }

    /// Erases the connection, reporting whether anything was removed.
    pub fn remove(&mut self, connection: &Connection) -> bool {
        match self.sources_for_destination.get_mut(&connection.destination) {
            Some(sources) => sources.remove(&connection.source),
            None => false,
        }
    }

    /// Removes every connection touching `node` as either endpoint.
    pub fn disconnect_node(&mut self, node: NodeId) -> bool {
        let before = self.sources_for_destination.len();
        self.sources_for_destination
            .retain(|destination, _| destination.node != node);
        let mut removed = self.sources_for_destination.len() != before;

        for sources in self.sources_for_destination.values_mut() {
            let size = sources.len();
            sources.retain(|source| source.node != node);
            removed |= sources.len() != size;
        }

        removed
    }

    /// Prunes every connection that is no longer legal against the current
    /// registry, reporting whether any were removed.
    pub fn remove_illegal(&mut self, nodes: &Nodes) -> bool {
        let mut removed = false;
        for (destination, sources) in &mut self.sources_for_destination {
            let size = sources.len();
            sources.retain(|source| {
                check_legal(nodes, &Connection::new(*source, *destination)).is_ok()
            });
            removed |= sources.len() != size;
        }
        removed
    }

    pub fn is_connection_legal(nodes: &Nodes, connection: &Connection) -> bool {
        check_legal(nodes, connection).is_ok()
    }

    pub fn can_connect(&self, nodes: &Nodes, connection: &Connection) -> bool {
        Self::is_connection_legal(nodes, connection) && !self.is_connected(connection)
    }

    pub fn is_connected(&self, connection: &Connection) -> bool {
        self.sources_for_destination
            .get(&connection.destination)
            .is_some_and(|sources| sources.contains(&connection.source))
    }

    /// Whether any connection exists from `source` to `destination`,
    /// regardless of channel.
    pub fn is_connected_between(&self, source: NodeId, destination: NodeId) -> bool {
        self.sources_for_destination
            .iter()
            .filter(|(dest, _)| dest.node == destination)
            .any(|(_, sources)| sources.iter().any(|s| s.node == source))
    }

    /// Sources feeding a single destination endpoint.
    pub fn sources_of(
        &self,
        destination: NodeAndChannel,
    ) -> impl Iterator<Item = NodeAndChannel> + '_ {
        self.sources_for_destination
            .get(&destination)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Every node feeding any port of `destination`.
    pub fn source_nodes_of(&self, destination: NodeId) -> BTreeSet<NodeId> {
        self.sources_for_destination
            .iter()
            .filter(|(dest, _)| dest.node == destination)
            .flat_map(|(_, sources)| sources.iter().map(|s| s.node))
            .collect()
    }

    /// All connections in lexicographic order.
    pub fn connections(&self) -> Vec<Connection> {
        let mut result: Vec<Connection> = self
            .sources_for_destination
            .iter()
            .flat_map(|(destination, sources)| {
                sources
                    .iter()
                    .map(|source| Connection::new(*source, *destination))
            })
            .collect();
        result.sort();
        result
    }

    pub fn len(&self) -> usize {
        self.sources_for_destination
            .values()
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reachability: is there a directed path from `source` to
    /// `destination`? Terminates on cycles via the visited set.
    pub fn is_an_input_to(&self, source: NodeId, destination: NodeId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![destination];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for feeder in self.source_nodes_of(current) {
                if feeder == source {
                    return true;
                }
                if !visited.contains(&feeder) {
                    stack.push(feeder);
                }
            }
        }

        false
    }
}

fn check_legal(nodes: &Nodes, connection: &Connection) -> Result<(), GraphError> {
    let source = connection.source;
    let destination = connection.destination;

    if source.node == destination.node {
        return Err(GraphError::SelfLoop);
    }
    if source.channel < 0 || destination.channel < 0 {
        return Err(GraphError::ChannelOutOfRange);
    }
    if source.is_midi() != destination.is_midi() {
        return Err(GraphError::KindMismatch);
    }

    let source_node = nodes.get(source.node).ok_or(GraphError::MissingNode)?;
    let destination_node = nodes.get(destination.node).ok_or(GraphError::MissingNode)?;

    let source_ok = if source.is_midi() {
        source_node.produces_midi()
    } else {
        (source.channel as usize) < source_node.output_channels()
    };
    let destination_ok = if destination.is_midi() {
        destination_node.accepts_midi()
    } else {
        (destination.channel as usize) < destination_node.input_channels()
    };

    if source_ok && destination_ok {
        Ok(())
    } else {
        Err(GraphError::ChannelOutOfRange)
    }
}
