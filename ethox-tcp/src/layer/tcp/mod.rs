//! The Transmission Control Protocol engine.
//!
//! A connection is represented by a protocol control block, [`Connection`], bound to a local
//! [`SocketAddr`]. All of them live in one [`Endpoint`], the connection table, which is itself
//! owned by a [`Stack`] behind a single lock. The stack is the socket-call façade: `open`, `send`,
//! `receive`, `close`, `abort` and `status` on the user side, `ingress` for segments handed up by
//! the IP layer and `sweep` for the retransmission timer.
//!
//! ## Segment arrival
//!
//! Arriving segments are processed in the order and with the checks of RFC 793, section 3.9:
//! the states `CLOSED`, `LISTEN` and `SYN-SENT` have dedicated handling while every synchronized
//! state runs the same pipeline of sequence acceptability, reset, synchronization, acknowledgment,
//! urgent data, segment text and finally the FIN bit. Processing returns the segments to be sent
//! in answer, the caller transmits them while still holding the table lock.
//!
//! ## Retransmission
//!
//! Every segment occupying sequence space is recorded on the connection's retransmission queue
//! together with the completion of the call that produced it. The sweep releases acknowledged
//! entries, which feeds the round trip estimator, and resends entries whose backed-off timeout
//! elapsed. An entry that ran out of attempts fails its call. A connection whose user timeout
//! elapsed is aborted as a whole.
//!
//! ## Completions
//!
//! Calls which finish later take a [`Completion`], the sending half of an mpsc channel, and the
//! engine reports exactly one result on it. Use [`completion`] to create a pair with a blocking
//! [`Waiter`].
//!
//! ## Deviations
//!
//! * No TCP options are sent or interpreted, in particular no MSS negotiation and no window
//!   scaling. The receive window is therefore capped at 65535 octets.
//! * Out-of-order segments are acknowledged and dropped rather than reassembled.
//! * There is no congestion control besides the exponential backoff of retransmissions, and no
//!   zero window probing.
//! * A reset received in `SYN-RECEIVED` closes the connection even when it came from a passive
//!   open, reporting "connection refused" to the caller.
use std::sync::mpsc;

use crate::layer;
use crate::time::Duration;

mod arrives;
mod connection;
mod endpoint;
mod siphash;
mod socket;
mod timer;


pub use connection::{
    Call,
    Connection,
    Outgoing,
    Receive,
    Segment,
    Send,
    Signals,
    SocketAddr,
    State};

pub use endpoint::Endpoint;
pub use siphash::IsnGenerator;
pub use socket::{Stack, TimerHandle};
pub use timer::RtoEstimator;

/// Errors reported to the user of a connection.
///
/// These travel through the completion channel of the call they concern. Only calls that
/// complete synchronously return them directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// The peer reset an established connection, or the connection was aborted.
    #[error("connection reset")]
    ConnectionReset,

    /// The peer reset the connection while it was being synchronized.
    #[error("connection refused")]
    ConnectionRefused,

    /// The data does not fit into the peer's window.
    #[error("insufficient resources")]
    InsufficientResources,

    /// Open was called on a connection that is not closed or listening.
    #[error("connection already exists")]
    ConnectionExists,

    /// The connection is closed or not bound at all.
    #[error("connection does not exist")]
    ConnectionDoesNotExist,

    /// The connection is shutting down and can not carry out the request.
    #[error("connection closing")]
    ConnectionClosing,

    /// An active open requires the foreign endpoint.
    #[error("foreign socket unspecified")]
    ForeignUnspecified,

    /// The local endpoint is already bound to another connection.
    #[error("local address already used")]
    AddressInUse,

    /// The user timeout or the TIME-WAIT period elapsed.
    #[error("connection aborted due to user timeout")]
    UserTimeout,

    /// A segment was not acknowledged after all retransmissions.
    #[error("retransmission time exceeded, network may be unreachable")]
    RetransmissionTimeout,

    /// Another receive call is still outstanding.
    #[error("receive already pending")]
    ReceivePending,

    /// The segment could not be handed to the IP layer.
    #[error("transmission failed: {0}")]
    Transmit(#[from] layer::Error),
}

/// The sending half of a call's completion channel.
pub type Completion<T = ()> = mpsc::Sender<Result<T, Error>>;

/// Blocks on the receiving half of a completion channel.
#[derive(Debug)]
pub struct Waiter<T = ()> {
    inner: mpsc::Receiver<Result<T, Error>>,
}

/// Create a connected completion and waiter.
pub fn completion<T>() -> (Completion<T>, Waiter<T>) {
    let (sender, inner) = mpsc::channel();
    (sender, Waiter { inner })
}

impl<T> Waiter<T> {
    /// Block until the call completed.
    ///
    /// A completion dropped without a result means the connection it belonged to is gone.
    pub fn wait(&self) -> Result<T, Error> {
        self.inner.recv().unwrap_or(Err(Error::ConnectionDoesNotExist))
    }

    /// Block for at most `timeout`, `None` if the call is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, Error>> {
        match self.inner.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(Error::ConnectionDoesNotExist)),
        }
    }

    /// Poll without blocking.
    pub fn try_wait(&self) -> Option<Result<T, Error>> {
        match self.inner.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(Error::ConnectionDoesNotExist)),
        }
    }
}

/// Tunables of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum segment lifetime, TIME-WAIT lasts twice as long.
    pub msl: Duration,
    /// Retransmission timeout before the first round trip sample.
    pub initial_rto: Duration,
    /// Lower bound of the estimated retransmission timeout.
    pub min_rto: Duration,
    /// Upper bound of the estimated retransmission timeout.
    pub max_rto: Duration,
    /// Timer expirations after which an unacknowledged segment fails its call.
    pub max_retransmits: u32,
    /// Transmission attempts made synchronously by open and send.
    pub transmit_attempts: u32,
    /// Pause before the n-th retry is `n` times this.
    pub transmit_backoff: Duration,
    /// Period of the background retransmission sweep.
    pub sweep_interval: Duration,
    /// Connection timeout when open does not name one.
    pub user_timeout: Duration,
    /// Capacity of each connection's receive buffer.
    pub receive_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            msl: Duration::from_secs(120),
            initial_rto: Duration::from_secs(10),
            min_rto: Duration::from_secs(1),
            max_rto: Duration::from_secs(60),
            max_retransmits: 3,
            transmit_attempts: 3,
            transmit_backoff: Duration::from_millis(10),
            sweep_interval: Duration::from_millis(100),
            user_timeout: Duration::from_secs(300),
            receive_window: usize::from(u16::MAX),
        }
    }
}

impl Config {
    /// The duration of the TIME-WAIT state.
    pub fn time_wait(&self) -> Duration {
        self.msl * 2
    }
}
