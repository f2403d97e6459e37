//! A user-space TCP connection engine.
//!
//! ## Table of contents
//!
//! 1. [The wire module](wire/index.html): the TCP header codec and the internet checksum.
//! 2. [The layers](layer/index.html)
//!    1. [The ip boundary](layer/ip/index.html)
//!    1. [Tcp](layer/tcp/index.html)
//! 3. Internals
//!    1. [The storage module](storage/index.html)
//!    1. [Time](time/index.html)
//!
//! ## Design
//!
//! The engine sits between an IP layer, which it reaches only through the
//! [`Transmit`](layer/ip/trait.Transmit.html) trait, and user code calling the socket façade on
//! [`Stack`](layer/tcp/struct.Stack.html). Inbound datagrams classified as TCP are handed to
//! [`Stack::ingress`](layer/tcp/struct.Stack.html#method.ingress). Every protocol control block
//! lives in one table behind one lock; segment arrival, the retransmission sweep and user calls
//! all serialize on it.
//!
//! Calls that complete asynchronously take a [`Completion`](layer/tcp/type.Completion.html), the
//! sending half of a channel. The engine signals it exactly once, with success or with the error
//! that ended the call.
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod layer;
pub mod storage;
pub mod time;
pub mod wire;
