//! The socket-call façade.
//!
//! [`Stack`] owns the connection table behind one lock. Every call takes the lock for its whole
//! synchronous part, transmissions included, so calls, arriving segments and the timer sweep
//! never interleave.
use std::sync::{mpsc, Arc};
use std::{io, thread};

use parking_lot::Mutex;

use crate::layer::{self, ip::{InterfaceId, Transmit}};
use crate::time::{Duration, Instant};
use crate::wire::{self, IpAddress, IpProtocol, TcpChecksum, TcpFlags, TcpPacket, TcpRepr};

use super::{Completion, Config, Error};
use super::connection::{Call, Connection, Outgoing, PendingReceive, Receive, Segment, SocketAddr,
    State};
use super::endpoint::Endpoint;

/// A TCP stack: the connection table, the transmitter towards the IP layer and a clock.
pub struct Stack {
    table: Mutex<Endpoint>,
    ip: Arc<dyn Transmit + Send + Sync>,
    clock: Box<dyn Fn() -> Instant + Send + Sync>,
}

/// Stops the background sweep of [`Stack::spawn_timer`] when dropped.
#[derive(Debug)]
pub struct TimerHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Stack {
    /// A stack with an empty table, reading the system clock.
    pub fn new(config: Config, ip: Arc<dyn Transmit + Send + Sync>) -> Self {
        Stack::with_endpoint(Endpoint::new(config), ip)
    }

    /// A stack around an existing table.
    pub fn with_endpoint(endpoint: Endpoint, ip: Arc<dyn Transmit + Send + Sync>) -> Self {
        Stack {
            table: Mutex::new(endpoint),
            ip,
            clock: Box::new(Instant::now),
        }
    }

    /// Replace the clock, e.g. with a manually advanced one.
    pub fn with_clock<F>(mut self, clock: F) -> Self
        where F: Fn() -> Instant + Send + Sync + 'static
    {
        self.clock = Box::new(clock);
        self
    }

    /// Bind a closed connection to `local`.
    pub fn bind(&self, local: SocketAddr) -> Result<(), Error> {
        self.table.lock().bind(local)
    }

    /// Delete the closed connection bound to `local`.
    pub fn remove(&self, local: SocketAddr) -> Result<(), Error> {
        self.table.lock().remove(local).map(drop)
    }

    /// Open the connection bound to `local`.
    ///
    /// A passive open listens, for any peer or only for `foreign` if given, and completes
    /// immediately. An active open sends a SYN to `foreign` and completes once it is
    /// acknowledged. `timeout` bounds how long any segment may stay unacknowledged.
    pub fn open(&self, local: SocketAddr, foreign: Option<SocketAddr>, active: bool,
                timeout: Option<Duration>, reply: Completion)
    {
        let now = (self.clock)();
        let mut table = self.table.lock();
        let config = *table.config();
        let iss = match foreign {
            Some(foreign) if active => Some(table.initial_seq_num(local, foreign, now)),
            _ => None,
        };

        let connection = match table.get_mut(local) {
            Some(connection) => connection,
            None => return complete(reply, Err(Error::ConnectionDoesNotExist)),
        };

        if !matches!(connection.current, State::Closed | State::Listen) {
            return complete(reply, Err(Error::ConnectionExists));
        }

        connection.timeout = timeout.unwrap_or(config.user_timeout);
        if !active {
            connection.foreign = foreign;
            connection.set_state(State::Listen);
            return complete(reply, Ok(()));
        }

        let (foreign, iss) = match (foreign, iss) {
            (Some(foreign), Some(iss)) => (foreign, iss),
            _ => return complete(reply, Err(Error::ForeignUnspecified)),
        };

        let previous = connection.foreign.replace(foreign);
        connection.send = super::Send {
            unacked: iss,
            next: iss,
            urgent: iss,
            initial_seq: iss,
            ..super::Send::default()
        };
        connection.recv = Receive::default();

        let syn = match connection.control(TcpFlags::SYN) {
            Some(syn) => syn,
            None => return complete(reply, Err(Error::ForeignUnspecified)),
        };

        match self.transmit(&syn, &config) {
            Ok(()) => {
                connection.send.next = iss + 1;
                connection.set_state(State::SynSent);
                connection.enqueue(&syn, Call::Open, Some(reply), now);
            },
            Err(err) => {
                connection.foreign = previous;
                complete(reply, Err(err.into()));
            },
        }
    }

    /// Send `data` on an established connection.
    ///
    /// Completes once the peer acknowledged all of it.
    pub fn send(&self, local: SocketAddr, data: &[u8], reply: Completion) {
        let now = (self.clock)();
        let mut table = self.table.lock();
        let config = *table.config();
        let connection = match table.get_mut(local) {
            Some(connection) => connection,
            None => return complete(reply, Err(Error::ConnectionDoesNotExist)),
        };

        match connection.current {
            State::Established | State::CloseWait => (),
            State::Listen if connection.foreign.is_none() => {
                return complete(reply, Err(Error::ForeignUnspecified))
            },
            State::Closed => return complete(reply, Err(Error::ConnectionDoesNotExist)),
            _ => return complete(reply, Err(Error::ConnectionClosing)),
        }

        if data.len() > usize::from(connection.send.window) {
            return complete(reply, Err(Error::InsufficientResources));
        }

        if data.is_empty() {
            return complete(reply, Ok(()));
        }

        let seq = connection.send.next;
        let segment = match connection.segment(TcpFlags::ACK | TcpFlags::PSH, seq, data.to_vec()) {
            Some(segment) => segment,
            None => return complete(reply, Err(Error::ConnectionDoesNotExist)),
        };

        match self.transmit(&segment, &config) {
            Ok(()) => {
                connection.send.next += data.len();
                connection.enqueue(&segment, Call::Send, Some(reply), now);
            },
            Err(err) => complete(reply, Err(err.into())),
        }
    }

    /// Receive at most `capacity` octets.
    ///
    /// Completes with buffered text right away if there is some, otherwise once text arrives.
    /// Only one receive may be outstanding per connection.
    pub fn receive(&self, local: SocketAddr, capacity: usize, reply: Completion<Vec<u8>>) {
        let mut table = self.table.lock();
        let connection = match table.get_mut(local) {
            Some(connection) => connection,
            None => return complete(reply, Err(Error::ConnectionDoesNotExist)),
        };

        if connection.receive_pending() {
            return complete(reply, Err(Error::ReceivePending));
        }

        match connection.current {
            State::Closed => return complete(reply, Err(Error::ConnectionDoesNotExist)),
            State::Closing | State::LastAck | State::TimeWait => {
                return complete(reply, Err(Error::ConnectionClosing))
            },
            State::CloseWait if connection.buffered() == 0 => {
                return complete(reply, Err(Error::ConnectionClosing))
            },
            _ => (),
        }

        if capacity == 0 {
            return complete(reply, Ok(Vec::new()));
        }

        let window_closed = connection.recv_window() == 0;
        connection.pending = Some(PendingReceive { capacity, reply });
        connection.deliver();

        if window_closed && connection.recv_window() > 0 && connection.current.is_synchronized() {
            // The peer can not probe a zero window, tell it the window reopened.
            let update = connection.control(TcpFlags::ACK);
            self.emit(update);
        }
    }

    /// Close our side of the connection.
    ///
    /// Completes once our FIN was acknowledged, or right away where no FIN is needed.
    pub fn close(&self, local: SocketAddr, reply: Completion) {
        let now = (self.clock)();
        let mut table = self.table.lock();
        let config = *table.config();
        let connection = match table.get_mut(local) {
            Some(connection) => connection,
            None => return complete(reply, Err(Error::ConnectionDoesNotExist)),
        };

        let next = match connection.current {
            State::Closed => return complete(reply, Err(Error::ConnectionDoesNotExist)),
            State::Listen | State::SynSent => {
                connection.terminate(Error::ConnectionClosing);
                return complete(reply, Ok(()));
            },
            State::SynReceived | State::Established => State::FinWait1,
            State::CloseWait => State::LastAck,
            State::FinWait1 | State::FinWait2 | State::Closing | State::LastAck
                | State::TimeWait => return complete(reply, Err(Error::ConnectionClosing)),
        };

        let fin = match connection.control(TcpFlags::FIN | TcpFlags::ACK) {
            Some(fin) => fin,
            None => return complete(reply, Err(Error::ConnectionDoesNotExist)),
        };

        match self.transmit(&fin, &config) {
            Ok(()) => {
                connection.send.fin = Some(connection.send.next);
                connection.send.next += 1;
                connection.set_state(next);
                connection.enqueue(&fin, Call::Close, Some(reply), now);
            },
            Err(err) => complete(reply, Err(err.into())),
        }
    }

    /// Abort the connection, failing every outstanding call with "connection reset".
    pub fn abort(&self, local: SocketAddr) -> Result<(), Error> {
        let mut table = self.table.lock();
        let connection = table.get_mut(local).ok_or(Error::ConnectionDoesNotExist)?;
        if connection.current == State::Closed {
            return Err(Error::ConnectionDoesNotExist);
        }

        let reset = connection.control(TcpFlags::RST);
        connection.terminate(Error::ConnectionReset);
        self.emit(reset);
        Ok(())
    }

    /// The state of the connection bound to `local`.
    pub fn status(&self, local: SocketAddr) -> Result<State, Error> {
        self.table.lock().state(local).ok_or(Error::ConnectionDoesNotExist)
    }

    /// Inspect the connection bound to `local`.
    pub fn with_connection<R>(&self, local: SocketAddr, f: impl FnOnce(&Connection) -> R)
        -> Option<R>
    {
        self.table.lock().get(local).map(f)
    }

    /// Process a TCP payload handed up by the IP layer.
    ///
    /// Malformed segments are logged and returned as errors without touching any connection.
    pub fn ingress(&self, bytes: &[u8], src: IpAddress, dst: IpAddress, interface: InterfaceId)
        -> wire::Result<()>
    {
        let packet = TcpPacket::new_checked(bytes).map_err(|err| {
            net_debug!("{} -> {} on {:?}: dropped segment, {}", src, dst, interface, err);
            err
        })?;
        let checksum = TcpChecksum::Manual { src_addr: src, dst_addr: dst };
        let repr = TcpRepr::parse(&packet, checksum).map_err(|err| {
            net_debug!("{} -> {} on {:?}: dropped segment, {}", src, dst, interface, err);
            err
        })?;

        let segment = Segment { repr, src, dst, payload: packet.payload() };
        let now = (self.clock)();
        let mut table = self.table.lock();
        let signals = table.arrives(&segment, now);
        for answer in signals.answers {
            self.emit(Some(answer));
        }
        Ok(())
    }

    /// Run the retransmission timers of all connections once.
    pub fn sweep(&self) {
        let now = (self.clock)();
        let mut table = self.table.lock();
        for outgoing in table.sweep(now) {
            self.emit(Some(outgoing));
        }
    }

    /// Sweep periodically on a background thread.
    pub fn spawn_timer(self: &Arc<Self>) -> io::Result<TimerHandle> {
        let interval = self.table.lock().config().sweep_interval;
        let stack = Arc::clone(self);
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("tcp-timer".into())
            .spawn(move || {
                while let Err(mpsc::RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                    stack.sweep();
                }
            })?;
        Ok(TimerHandle { stop: Some(stop), thread: Some(thread) })
    }

    /// Transmit a segment for a user call, retrying with linear backoff.
    fn transmit(&self, outgoing: &Outgoing, config: &Config) -> layer::Result<()> {
        let bytes = outgoing.encode();
        let attempts = config.transmit_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ip.transmit(IpProtocol::Tcp, &bytes, outgoing.src, outgoing.dst) {
                Ok(()) => {
                    net_trace!("{} -> {}: {}", outgoing.src, outgoing.dst, outgoing.repr);
                    return Ok(());
                },
                Err(err) if attempt < attempts => {
                    net_debug!("{} -> {}: attempt {} failed, {}",
                        outgoing.src, outgoing.dst, attempt, err);
                    thread::sleep(config.transmit_backoff * attempt);
                    attempt += 1;
                },
                Err(err) => {
                    net_debug!("{} -> {}: giving up after {} attempts, {}",
                        outgoing.src, outgoing.dst, attempt, err);
                    return Err(err);
                },
            }
        }
    }

    /// Transmit an answer or retransmission once, the timer covers its loss.
    fn emit(&self, outgoing: Option<Outgoing>) {
        let outgoing = match outgoing {
            Some(outgoing) => outgoing,
            None => return,
        };
        let bytes = outgoing.encode();
        match self.ip.transmit(IpProtocol::Tcp, &bytes, outgoing.src, outgoing.dst) {
            Ok(()) => net_trace!("{} -> {}: {}", outgoing.src, outgoing.dst, outgoing.repr),
            Err(err) => net_debug!("{} -> {}: dropped {}, {}",
                outgoing.src, outgoing.dst, outgoing.repr, err),
        }
    }
}

impl TimerHandle {
    /// Stop the sweep and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the channel ends the loop.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn complete<T>(reply: Completion<T>, result: Result<T, Error>) {
    let _ = reply.send(result);
}
