/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation* of TCP segments. It provides two levels
of functionality.

 * First, [`TcpPacket`] extracts fields from a sequence of octets and inserts fields into it. Its
   accessors are guaranteed not to panic once [`TcpPacket::check_len`] returned `Ok(())`.
 * Second, [`TcpRepr`] is a compact, high-level representation of the header that can be parsed
   from and emitted into a sequence of octets. Parsing validates the checksum over the IPv4
   pseudo header when asked to.

Options are never emitted and skipped when parsed, so an emitted header is always exactly 20
octets long.

# Examples

```rust
use ethox_tcp::wire::*;

let src = IpAddress::new(10, 0, 0, 1);
let dst = IpAddress::new(10, 0, 0, 2);
let repr = TcpRepr {
    src_port: 49152,
    dst_port: 80,
    seq_number: TcpSeqNumber(1000),
    ack_number: None,
    flags: TcpFlags::SYN,
    window_len: 0xffff,
    urgent_at: 0,
    payload_len: 0,
};

let bytes = repr.encode(&[], src, dst);
let packet = TcpPacket::new_checked(&bytes[..]).unwrap();
let parsed = TcpRepr::parse(&packet, TcpChecksum::Manual { src_addr: src, dst_addr: dst }).unwrap();
assert_eq!(parsed, repr);
```
*/

mod error;
pub mod ip;
pub mod tcp;

pub use self::error::{Error, Result};

pub use self::ip::{
    Address as IpAddress,
    Protocol as IpProtocol};

pub use self::tcp::{
    Checksum as TcpChecksum,
    Flags as TcpFlags,
    Packet as TcpPacket,
    Repr as TcpRepr,
    SeqNumber as TcpSeqNumber};

pub(crate) mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}
