use std::collections::BTreeMap;

use crate::time::Instant;
use crate::wire::TcpSeqNumber;

use super::{Config, Error, IsnGenerator};
use super::connection::{Connection, Segment, Signals, SocketAddr, State};

/// The table of all connections, keyed by their local endpoint.
///
/// Nothing in the table is ever removed by the engine itself. A connection that reached `CLOSED`
/// stays bound until the owner calls [`remove`](#method.remove).
#[derive(Debug)]
pub struct Endpoint {
    connections: BTreeMap<SocketAddr, Connection>,
    isn: IsnGenerator,
    config: Config,
}

impl Endpoint {
    /// An empty table with a randomly keyed sequence number generator.
    pub fn new(config: Config) -> Self {
        Endpoint::with_isn(config, IsnGenerator::from_rng())
    }

    /// An empty table using the given sequence number generator.
    pub fn with_isn(config: Config, isn: IsnGenerator) -> Self {
        Endpoint {
            connections: BTreeMap::new(),
            isn,
            config,
        }
    }

    /// The configuration shared by all connections.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a closed connection bound to `local`.
    pub fn bind(&mut self, local: SocketAddr) -> Result<(), Error> {
        if self.connections.contains_key(&local) {
            return Err(Error::AddressInUse);
        }
        net_trace!("{}: bound", local);
        self.connections.insert(local, Connection::new(local, &self.config));
        Ok(())
    }

    /// Delete a closed connection from the table.
    pub fn remove(&mut self, local: SocketAddr) -> Result<Connection, Error> {
        match self.connections.get(&local).map(|connection| connection.current) {
            None => Err(Error::ConnectionDoesNotExist),
            Some(State::Closed) => self.connections.remove(&local)
                .ok_or(Error::ConnectionDoesNotExist),
            Some(_) => Err(Error::ConnectionExists),
        }
    }

    /// The connection bound to `local`.
    pub fn get(&self, local: SocketAddr) -> Option<&Connection> {
        self.connections.get(&local)
    }

    /// The connection bound to `local`, mutably.
    pub fn get_mut(&mut self, local: SocketAddr) -> Option<&mut Connection> {
        self.connections.get_mut(&local)
    }

    /// The state of the connection bound to `local`.
    pub fn state(&self, local: SocketAddr) -> Option<State> {
        self.get(local).map(|connection| connection.current)
    }

    /// The number of bound connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// All connections, ordered by local endpoint.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> + '_ {
        self.connections.values_mut()
    }

    /// Draw an initial send sequence number for a connection attempt.
    pub fn initial_seq_num(&self, local: SocketAddr, foreign: SocketAddr, time: Instant)
        -> TcpSeqNumber
    {
        self.isn.get_isn(local, foreign, time)
    }

    /// Demultiplex an arriving segment and run it through its connection.
    ///
    /// The local endpoint must match exactly. A connection that knows its peer only accepts
    /// segments from that peer. Segments matching no connection are answered with a reset.
    pub fn arrives(&mut self, segment: &Segment, now: Instant) -> Signals {
        let local = segment.local();
        let foreign = segment.foreign();
        let Endpoint { connections, isn, .. } = self;
        match connections.get_mut(&local) {
            Some(connection) if connection.foreign.map_or(true, |peer| peer == foreign) => {
                connection.arrives(segment, isn, now)
            },
            _ => {
                net_debug!("{}: no connection for segment from {}", local, foreign);
                Signals::reset(segment)
            },
        }
    }
}
