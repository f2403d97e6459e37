use core::fmt;
use std::collections::VecDeque;

use crate::storage::RingBuffer;
use crate::time::{Duration, Instant};
use crate::wire::{IpAddress, TcpFlags, TcpRepr, TcpSeqNumber};

use super::{Completion, Config, Error, RtoEstimator};

/// One side of a connection, an address and a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketAddr {
    /// The network address.
    pub addr: IpAddress,
    /// The port number.
    pub port: u16,
}

impl SocketAddr {
    /// Combine an address and a port.
    pub const fn new(addr: IpAddress, port: u16) -> Self {
        SocketAddr { addr, port }
    }
}

impl fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// The protocol control block of one connection.
///
/// Includes the current state machine state, the endpoints, the sequence variables of both
/// directions and the queues of outstanding work. Fields that callers may inspect are public,
/// the queues are only reachable through the methods that keep their invariants.
#[derive(Debug)]
pub struct Connection {
    /// The current state of the state machine.
    pub current: State,

    /// The local endpoint, fixed while the connection is in the table.
    pub local: SocketAddr,

    /// The remote endpoint, unknown until an open names it or a SYN arrives.
    pub foreign: Option<SocketAddr>,

    /// The sending state.
    ///
    /// In RFC793 this is referred to as `SND`.
    pub send: Send,

    /// The receiving state.
    ///
    /// In RFC793 this is referred to as `RCV`.
    pub recv: Receive,

    /// The connection timeout, measured from the first transmission of each segment.
    pub timeout: Duration,

    /// The time TIME-WAIT was last (re)started.
    pub last_tx: Instant,

    /// The round trip estimator of this connection.
    pub rto: RtoEstimator,

    /// Received text not yet handed to a receive call.
    ///
    /// Its free space is the receive window we advertise.
    pub(crate) rx: RingBuffer,

    /// Segments in flight, ordered by sequence number.
    pub(crate) retransmit: VecDeque<Retransmit>,

    /// The single outstanding receive call.
    pub(crate) pending: Option<PendingReceive>,
}

/// The send sequence variables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Send {
    /// The next not yet acknowledged sequence number.
    ///
    /// In RFC793 this is referred to as `SND.UNA`.
    pub unacked: TcpSeqNumber,

    /// The next sequence number to use for transmission.
    ///
    /// In RFC793 this is referred to as `SND.NXT`.
    pub next: TcpSeqNumber,

    /// The send window size indicated by the receiver.
    ///
    /// In RFC793 this is referred to as `SND.WND`.
    pub window: u16,

    /// The send urgent pointer, `SND.UP`.
    pub urgent: TcpSeqNumber,

    /// Sequence number of the segment used for the last window update, `SND.WL1`.
    pub wl1: TcpSeqNumber,

    /// Acknowledgment number of the segment used for the last window update, `SND.WL2`.
    pub wl2: TcpSeqNumber,

    /// The initial sequence number.
    ///
    /// In RFC793 this is referred to as `ISS`.
    pub initial_seq: TcpSeqNumber,

    /// The sequence number occupied by our FIN, once one was sent.
    pub fin: Option<TcpSeqNumber>,
}

/// The receive sequence variables.
///
/// The receive window, `RCV.WND`, is not stored. It is the free space of the receive buffer, see
/// [`Connection::recv_window`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Receive {
    /// The next expected sequence number.
    ///
    /// In RFC793 this is referred to as `RCV.NXT`.
    pub next: TcpSeqNumber,

    /// The receive urgent pointer, `RCV.UP`.
    pub urgent: TcpSeqNumber,

    /// The initial receive sequence number.
    ///
    /// In RFC793 this is referred to as `IRS`.
    pub initial_seq: TcpSeqNumber,
}

/// State enum of the statemachine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// No connection, the initial and the final state.
    Closed,

    /// Waiting for a connection request from any remote endpoint.
    Listen,

    /// An open connection request.
    SynSent,

    /// Connection request we intend to answer, waiting on ack.
    SynReceived,

    /// An open connection.
    Established,

    /// Closed our side of the connection.
    FinWait1,

    /// Closing connection nicely, initiated by us and acknowledged.
    FinWait2,

    /// Other side closed its connection.
    CloseWait,

    /// Closed both sides but we don't know the other knows.
    Closing,

    /// Connection closed after other side closed its already.
    LastAck,

    /// Both sides recognized connection as closed.
    TimeWait,
}

impl State {
    /// Whether the three-way handshake completed in this state.
    pub fn is_synchronized(self) -> bool {
        !matches!(self, State::Closed | State::Listen | State::SynSent)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::Listen => "LISTEN",
            State::SynSent => "SYN-SENT",
            State::SynReceived => "SYN-RECEIVED",
            State::Established => "ESTABLISHED",
            State::FinWait1 => "FIN-WAIT-1",
            State::FinWait2 => "FIN-WAIT-2",
            State::CloseWait => "CLOSE-WAIT",
            State::Closing => "CLOSING",
            State::LastAck => "LAST-ACK",
            State::TimeWait => "TIME-WAIT",
        };
        f.write_str(name)
    }
}

/// The user call a retransmission entry answers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    /// A SYN, from an active open or answering one.
    Open,
    /// Segment text.
    Send,
    /// Our FIN.
    Close,
}

/// A segment occupying sequence space that was not yet acknowledged.
#[derive(Debug)]
pub(crate) struct Retransmit {
    pub(crate) seq: TcpSeqNumber,
    pub(crate) flags: TcpFlags,
    pub(crate) payload: Vec<u8>,
    pub(crate) first_sent: Instant,
    pub(crate) last_sent: Instant,
    pub(crate) retries: u32,
    pub(crate) call: Call,
    pub(crate) reply: Option<Completion>,
}

impl Retransmit {
    /// The first sequence number after this segment.
    pub(crate) fn end(&self) -> TcpSeqNumber {
        self.seq + self.payload.len() + self.flags.sequence_len()
    }

    pub(crate) fn complete(self, result: Result<(), Error>) {
        if let Some(reply) = self.reply {
            // A caller that stopped listening is not an error of the connection.
            let _ = reply.send(result);
        }
    }
}

/// An outstanding receive call.
#[derive(Debug)]
pub(crate) struct PendingReceive {
    pub(crate) capacity: usize,
    pub(crate) reply: Completion<Vec<u8>>,
}

/// An arriving segment, decoded.
#[derive(Clone, Copy, Debug)]
pub struct Segment<'a> {
    /// The parsed header.
    pub repr: TcpRepr,
    /// The source address of the carrying datagram.
    pub src: IpAddress,
    /// The destination address of the carrying datagram.
    pub dst: IpAddress,
    /// The segment text.
    pub payload: &'a [u8],
}

impl Segment<'_> {
    /// The endpoint the segment is addressed to.
    pub fn local(&self) -> SocketAddr {
        SocketAddr::new(self.dst, self.repr.dst_port)
    }

    /// The endpoint the segment came from.
    pub fn foreign(&self) -> SocketAddr {
        SocketAddr::new(self.src, self.repr.src_port)
    }
}

/// A segment to transmit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    /// The header to emit.
    pub repr: TcpRepr,
    /// The segment text.
    pub payload: Vec<u8>,
    /// Our address.
    pub src: IpAddress,
    /// The peer's address.
    pub dst: IpAddress,
}

impl Outgoing {
    /// The complete segment with its checksum.
    pub fn encode(&self) -> Vec<u8> {
        self.repr.encode(&self.payload, self.src, self.dst)
    }
}

/// Output signals of the model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signals {
    /// Segments to send in answer, in order.
    pub answers: Vec<Outgoing>,
}

impl Signals {
    /// Queue an answer, if there is one.
    pub fn answer(&mut self, outgoing: Option<Outgoing>) {
        self.answers.extend(outgoing);
    }

    /// The answer to a segment without a matching connection.
    pub fn reset(segment: &Segment) -> Self {
        let mut signals = Signals::default();
        signals.answer(Connection::reset_for(segment));
        signals
    }
}

impl Connection {
    /// A closed connection bound to `local`.
    pub fn new(local: SocketAddr, config: &Config) -> Self {
        Connection {
            current: State::Closed,
            local,
            foreign: None,
            send: Send::default(),
            recv: Receive::default(),
            timeout: config.user_timeout,
            last_tx: Instant::default(),
            rto: RtoEstimator::new(config),
            rx: RingBuffer::new(config.receive_window.min(usize::from(u16::MAX))),
            retransmit: VecDeque::new(),
            pending: None,
        }
    }

    /// The receive window, free space in the receive buffer.
    pub fn recv_window(&self) -> usize {
        self.rx.window()
    }

    /// Octets received but not yet handed to a receive call.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// The number of segments awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.retransmit.len()
    }

    /// Whether a receive call is outstanding.
    pub fn receive_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn set_state(&mut self, next: State) {
        if self.current != next {
            net_trace!("{}: {} -> {}", self.local, self.current, next);
        }
        self.current = next;
    }

    /// Whether our FIN was sent and acknowledged.
    pub(crate) fn fin_acked(&self) -> bool {
        match self.send.fin {
            Some(fin) => self.send.unacked > fin,
            None => false,
        }
    }

    /// Build a segment towards the peer.
    ///
    /// The acknowledgment and window are taken from the current receive state whenever the ACK
    /// flag is set. Returns `None` while the peer is unknown.
    pub(crate) fn segment(&self, flags: TcpFlags, seq: TcpSeqNumber, payload: Vec<u8>)
        -> Option<Outgoing>
    {
        let foreign = self.foreign?;
        let ack_number = if flags.ack() { Some(self.recv.next) } else { None };
        let window_len = self.recv_window().min(usize::from(u16::MAX)) as u16;
        Some(Outgoing {
            repr: TcpRepr {
                src_port: self.local.port,
                dst_port: foreign.port,
                flags,
                seq_number: seq,
                ack_number,
                window_len,
                urgent_at: 0,
                payload_len: payload.len(),
            },
            payload,
            src: self.local.addr,
            dst: foreign.addr,
        })
    }

    /// A segment without text at `SND.NXT`.
    pub(crate) fn control(&self, flags: TcpFlags) -> Option<Outgoing> {
        self.segment(flags, self.send.next, Vec::new())
    }

    /// Record a transmitted segment for retransmission.
    pub(crate) fn enqueue(&mut self, outgoing: &Outgoing, call: Call, reply: Option<Completion>,
                          now: Instant)
    {
        self.retransmit.push_back(Retransmit {
            seq: outgoing.repr.seq_number,
            flags: outgoing.repr.flags,
            payload: outgoing.payload.clone(),
            first_sent: now,
            last_sent: now,
            retries: 0,
            call,
            reply,
        });
    }

    /// Drop every entry covered by `SND.UNA`, feeding the round trip estimator.
    pub(crate) fn release_acked(&mut self, now: Instant) {
        while let Some(entry) = self.retransmit.front() {
            if entry.end() > self.send.unacked {
                break;
            }
            let sample = now - entry.last_sent;
            if let Some(entry) = self.retransmit.pop_front() {
                net_trace!("{}: {:?} segment {} acknowledged after {:?}",
                    self.local, entry.call, entry.seq, sample);
                self.rto.sample(sample);
                entry.complete(Ok(()));
            }
        }
    }

    /// Force the connection into `CLOSED`, failing all outstanding calls with `error`.
    pub(crate) fn terminate(&mut self, error: Error) {
        for entry in self.retransmit.drain(..) {
            entry.complete(Err(error));
        }
        if let Some(pending) = self.pending.take() {
            let _ = pending.reply.send(Err(error));
        }
        self.rx.clear();
        self.foreign = None;
        self.send.fin = None;
        self.set_state(State::Closed);
    }

    /// Hand buffered text to the outstanding receive call, if any.
    pub(crate) fn deliver(&mut self) {
        if self.rx.is_empty() {
            return;
        }
        if let Some(pending) = self.pending.take() {
            let data = self.rx.dequeue_many(pending.capacity);
            net_trace!("{}: delivered {} octets", self.local, data.len());
            let _ = pending.reply.send(Ok(data));
        }
    }

    /// The RST answering a segment that belongs to no synchronized connection.
    ///
    /// A segment carrying RST itself is never answered.
    pub fn reset_for(segment: &Segment) -> Option<Outgoing> {
        let repr = segment.repr;
        if repr.flags.rst() {
            return None;
        }

        let (flags, seq_number, ack_number) = match repr.ack_number {
            Some(ack) => (TcpFlags::RST, ack, None),
            None => (
                TcpFlags::RST | TcpFlags::ACK,
                TcpSeqNumber(0),
                Some(repr.seq_number + repr.sequence_len()),
            ),
        };

        Some(Outgoing {
            repr: TcpRepr {
                src_port: repr.dst_port,
                dst_port: repr.src_port,
                flags,
                seq_number,
                ack_number,
                window_len: 0,
                urgent_at: 0,
                payload_len: 0,
            },
            payload: Vec::new(),
            src: segment.dst,
            dst: segment.src,
        })
    }
}
