//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. The TCP layer keeps the local state of every connection and
//! processes segments against it. It reaches the network only through the [`ip::Transmit`] trait,
//! the downward boundary towards routing, address resolution and framing.
//!
//! ## Receiving
//!
//! The IP layer hands every datagram classified as TCP to
//! [`tcp::Stack::ingress`](tcp/struct.Stack.html#method.ingress) together with the addresses of
//! the datagram and the interface it arrived on.
//!
//! ## Sending
//!
//! Every outbound segment is fully encoded, checksum included, before it is passed to
//! [`ip::Transmit::transmit`]. A failed transmission is reported to the caller of the operation
//! that produced it, never retried silently beyond the configured attempts.
pub mod ip;
pub mod tcp;

/// The result of a delivery attempt at the IP boundary.
pub type Result<T> = core::result::Result<T, Error>;

/// A delivery error reported by the layer below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the device or sender does not allow or implement an operation.
    #[error("operation not permitted")]
    Illegal,

    /// Unable to find a route towards the destination address.
    #[error("no route to destination")]
    Unreachable,

    /// The link-layer address of the next hop is not yet known.
    ///
    /// This is usually transient, resolution is in progress.
    #[error("link-layer address unresolved")]
    Unresolved,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that implies that it would have been legal with
    /// more resources.
    #[error("resources exhausted")]
    Exhausted,
}

/// A standard wrapper for a function implementing a layer trait.
///
/// Implements [`ip::Transmit`] for closures with the matching signature.
pub struct FnHandler<F>(pub F);
