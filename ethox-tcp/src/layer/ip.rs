//! The boundary towards the IP layer.
//!
//! Routing, link-address resolution and framing happen below this line and are not part of this
//! crate. The TCP layer only needs a way to hand over a finished segment, which is the
//! [`Transmit`] trait. [`Outbox`] is an in-memory implementation that records datagrams instead of
//! sending them, for tests and for wiring stacks together in one process.
use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{Error, FnHandler, Result};
use crate::wire::{IpAddress, IpProtocol};

/// Identifies the interface a datagram arrived on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u32);

/// Hands transport payloads to the network.
pub trait Transmit {
    /// Send `payload` as an IP datagram of the given protocol.
    ///
    /// An error applies to this attempt only. The caller decides whether to try again.
    fn transmit(&self, protocol: IpProtocol, payload: &[u8], src: IpAddress, dst: IpAddress)
        -> Result<()>;
}

impl<F> Transmit for FnHandler<F>
    where F: Fn(IpProtocol, &[u8], IpAddress, IpAddress) -> Result<()>
{
    fn transmit(&self, protocol: IpProtocol, payload: &[u8], src: IpAddress, dst: IpAddress)
        -> Result<()>
    {
        (self.0)(protocol, payload, src, dst)
    }
}

/// A datagram captured by an [`Outbox`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
    /// The encapsulated protocol.
    pub protocol: IpProtocol,
    /// The sending address.
    pub src: IpAddress,
    /// The receiving address.
    pub dst: IpAddress,
    /// The transport segment, header included.
    pub payload: Vec<u8>,
}

/// A transmitter that queues every datagram in memory.
#[derive(Debug, Default)]
pub struct Outbox {
    inner: Mutex<Queued>,
}

#[derive(Debug, Default)]
struct Queued {
    datagrams: VecDeque<Datagram>,
    failures: usize,
    attempts: usize,
}

impl Outbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Outbox::default()
    }

    /// Let the next `count` transmissions fail as if the next hop were unresolved.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failures = count;
    }

    /// Take the oldest captured datagram.
    pub fn pop(&self) -> Option<Datagram> {
        self.inner.lock().datagrams.pop_front()
    }

    /// Take all captured datagrams, oldest first.
    pub fn drain(&self) -> Vec<Datagram> {
        self.inner.lock().datagrams.drain(..).collect()
    }

    /// The number of datagrams waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().datagrams.len()
    }

    /// Whether no datagram is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of transmissions attempted so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }
}

impl Transmit for Outbox {
    fn transmit(&self, protocol: IpProtocol, payload: &[u8], src: IpAddress, dst: IpAddress)
        -> Result<()>
    {
        let mut inner = self.inner.lock();
        inner.attempts += 1;
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(Error::Unresolved);
        }
        inner.datagrams.push_back(Datagram {
            protocol,
            src,
            dst,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use super::*;

    const A: IpAddress = IpAddress::new(10, 0, 0, 1);
    const B: IpAddress = IpAddress::new(10, 0, 0, 2);

    #[test]
    fn outbox_records_and_fails() {
        let outbox = Outbox::new();
        outbox.fail_next(1);
        assert_eq!(outbox.transmit(IpProtocol::Tcp, b"one", A, B), Err(Error::Unresolved));
        assert_eq!(outbox.transmit(IpProtocol::Tcp, b"two", A, B), Ok(()));
        assert_eq!(outbox.attempts(), 2);
        assert_eq!(outbox.len(), 1);
        let datagram = outbox.pop().unwrap();
        assert_eq!(datagram.payload, b"two");
        assert_eq!((datagram.src, datagram.dst), (A, B));
        assert!(outbox.is_empty());
    }

    #[test]
    fn closure_transmitter() {
        let sent = Cell::new(0);
        let handler = FnHandler(|protocol: IpProtocol, payload: &[u8], _: IpAddress, _: IpAddress| {
            assert_eq!(protocol, IpProtocol::Tcp);
            sent.set(sent.get() + payload.len());
            Ok(())
        });
        handler.transmit(IpProtocol::Tcp, &[0; 20], A, B).unwrap();
        assert_eq!(sent.get(), 20);
    }
}
