//! Initial sequence number generation, as recommended by rfc6528.
//!
//! Uses a keyed cryptographic hash function (SipHash-2-4) instead of appending the secret key to
//! the four tuple for hashing. Hash function SipHash-2-4 from:
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use std::sync::atomic::{AtomicU64, Ordering};

use crate::time::Instant;
use crate::wire::TcpSeqNumber;

use super::SocketAddr;

/// An initial sequence number generator based on SipHash-2-4.
///
/// > ISN = M + SipHash-2-4(secretkey, localip, localport, remoteip, remoteport, draw)
///
/// `M` is a timer ticking every 4 microseconds. The draw counter is not part of RFC6528, it makes
/// repeated attempts for the same four tuple within one tick start from distinct numbers.
#[derive(Debug)]
pub struct IsnGenerator {
    keys: (u64, u64),
    draws: AtomicU64,
}

// Yes, that's the initial values, as ASCII text.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl IsnGenerator {
    /// Create a generator with a key drawn from the thread-local random number generator.
    pub fn from_rng() -> Self {
        Self::from_key(rand::random(), rand::random())
    }

    /// Create a generator with a pre-defined key.
    ///
    /// Really, create the key with some cryptographic random means or derive them from some other
    /// key with a key derivation function.
    pub fn from_key(a: u64, b: u64) -> Self {
        IsnGenerator { keys: (a, b), draws: AtomicU64::new(0) }
    }

    /// Get the initial sequence number for a new connection attempt.
    pub fn get_isn(&self, local: SocketAddr, foreign: SocketAddr, time: Instant) -> TcpSeqNumber {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        let mut state = State::init(self.keys.0, self.keys.1);

        let m0 = u64::from(local.addr.to_network_integer())
            | u64::from(foreign.addr.to_network_integer()) << 32;
        let m1 = u64::from(local.port)
            | u64::from(foreign.port) << 16
            | (draw & 0xffff_ffff) << 32;
        // Message length = 16
        let p = 16_u64 << 56;
        state.absorb(m0);
        state.absorb(m1);
        state.absorb(p);
        let hash = state.finalize() as u32;

        let ticks = time.total_millis().wrapping_mul(250) as u32;
        TcpSeqNumber::from_u32(hash.wrapping_add(ticks))
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process a single 8-byte block of the message.
    ///
    /// The caller absorbs the length block last.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    /// Do the finalization rounds.
    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

#[cfg(test)]
mod tests {
    use crate::wire::IpAddress;
    use super::*;

    const LOCAL: SocketAddr = SocketAddr::new(IpAddress::new(10, 0, 0, 1), 80);
    const FOREIGN: SocketAddr = SocketAddr::new(IpAddress::new(10, 0, 0, 2), 49152);

    /// See the paper, Appendix A.
    #[test]
    fn manual_test_vectors() {
        let k0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        let k1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());

        let mut state = State::init(k0, k1);
        let m0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        state.absorb(m0);
        let m1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());
        state.absorb(m1);

        assert_eq!(state.finalize(), 0xa129ca6149be45e5);
    }

    #[test]
    fn clock_advances_isn() {
        let early = IsnGenerator::from_key(1, 2);
        let late = IsnGenerator::from_key(1, 2);
        let a = early.get_isn(LOCAL, FOREIGN, Instant::from_millis(0));
        let b = late.get_isn(LOCAL, FOREIGN, Instant::from_millis(4));
        assert_eq!(b - a, 1000);
    }

    #[test]
    fn fresh_per_attempt() {
        let generator = IsnGenerator::from_key(1, 2);
        let now = Instant::from_millis(0);
        let a = generator.get_isn(LOCAL, FOREIGN, now);
        let b = generator.get_isn(LOCAL, FOREIGN, now);
        assert_ne!(a, b);
    }

    #[test]
    fn keyed() {
        let now = Instant::from_millis(0);
        let a = IsnGenerator::from_key(1, 2).get_isn(LOCAL, FOREIGN, now);
        let b = IsnGenerator::from_key(3, 4).get_isn(LOCAL, FOREIGN, now);
        assert_ne!(a, b);
    }
}
