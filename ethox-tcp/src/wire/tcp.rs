//! The TCP header: sequence numbers, control flags, the packet wrapper and its representation.
use core::{ops, cmp, fmt};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, IpProtocol, IpAddress, Result};
use super::ip::checksum;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl SeqNumber {
    /// Reinterpret an unsigned wire value.
    pub fn from_u32(value: u32) -> Self {
        SeqNumber(value as i32)
    }

    /// The unsigned wire value.
    pub fn to_u32(self) -> u32 {
        self.0 as u32
    }

    /// Whether `self` lies in the half-open window `[start, start + len)`.
    ///
    /// An empty window contains nothing.
    pub fn in_window(self, start: SeqNumber, len: usize) -> bool {
        len != 0 && start <= self && self < start + len
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to subtract to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::Sub for SeqNumber {
    type Output = usize;

    fn sub(self, rhs: SeqNumber) -> usize {
        let result = self.0.wrapping_sub(rhs.0);
        if result < 0 {
            panic!("attempt to subtract sequence numbers with underflow")
        }
        result as usize
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// The control flag octet of a segment.
///
/// Bits from high to low are CWR, ECE, URG, ACK, PSH, RST, SYN and FIN.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u8);

/// A read/write wrapper around a Transmission Control Protocol packet buffer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet<T> {
    buffer: T,
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const OFFSET:   usize = 12;
    pub(crate) const FLAGS:    usize = 13;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u8 = 0x01;
    pub(crate) const FLG_SYN: u8 = 0x02;
    pub(crate) const FLG_RST: u8 = 0x04;
    pub(crate) const FLG_PSH: u8 = 0x08;
    pub(crate) const FLG_ACK: u8 = 0x10;
    pub(crate) const FLG_URG: u8 = 0x20;
    pub(crate) const FLG_ECE: u8 = 0x40;
    pub(crate) const FLG_CWR: u8 = 0x80;
}

/// The length of a header without options, the only kind this codec emits.
pub const HEADER_LEN: usize = field::URGENT.end;

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with TCP packet structure.
    pub fn new_unchecked(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no header accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the header length field has a value smaller
    /// than the minimal header length.
    ///
    /// The result of this check is invalidated by calling [set_header_len].
    ///
    /// [set_header_len]: #method.set_header_len
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len < HEADER_LEN {
            Err(Error::Truncated)
        } else {
            let header_len = self.header_len() as usize;
            if header_len < HEADER_LEN {
                Err(Error::Malformed)
            } else if len < header_len {
                Err(Error::Truncated)
            } else {
                Ok(())
            }
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        let data = self.buffer.as_ref();
        SeqNumber(NetworkEndian::read_i32(&data[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        let data = self.buffer.as_ref();
        SeqNumber(NetworkEndian::read_i32(&data[field::ACK_NUM]))
    }

    /// Read all flags at once.
    #[inline]
    pub fn flags(&self) -> Flags {
        Flags(self.buffer.as_ref()[field::FLAGS])
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.buffer.as_ref()[field::OFFSET] >> 4) * 4
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::URGENT])
    }

    /// Return the options, which this codec does not interpret.
    #[inline]
    pub fn options(&self) -> &[u8] {
        let header_len = self.header_len() as usize;
        &self.buffer.as_ref()[HEADER_LEN..header_len]
    }

    /// Return the payload following the header and its options.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        let header_len = self.header_len() as usize;
        &self.buffer.as_ref()[header_len..]
    }

    /// Return the length of the segment, in terms of sequence space.
    pub fn sequence_len(&self) -> usize {
        self.payload().len() + self.flags().sequence_len()
    }

    /// Validate the packet checksum over the IPv4 pseudo header and the whole segment.
    pub fn verify_checksum(&self, src_addr: IpAddress, dst_addr: IpAddress) -> bool {
        let data = self.buffer.as_ref();
        checksum::is_valid(checksum::internet(&[
            checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Tcp,
                                    data.len() as u32),
            checksum::data(data)
        ]))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_i32(&mut data[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_i32(&mut data[field::ACK_NUM], value.0)
    }

    /// Set a combination of flags.
    #[inline]
    pub fn set_flags(&mut self, Flags(flags): Flags) {
        self.buffer.as_mut()[field::FLAGS] = flags;
    }

    /// Set the header length, in octets.
    ///
    /// The reserved bits are cleared.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.buffer.as_mut()[field::OFFSET] = (value / 4) << 4;
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::URGENT], value)
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self, src_addr: IpAddress, dst_addr: IpAddress) {
        self.set_checksum(0);
        let checksum = {
            let data = self.buffer.as_ref();
            checksum::internet(&[
                checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Tcp,
                                        data.len() as u32),
                checksum::data(data)
            ])
        };
        self.set_checksum(checksum)
    }

    /// Return a mutable pointer to the payload data.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len() as usize;
        &mut self.buffer.as_mut()[header_len..]
    }
}

impl Flags {
    /// The FIN flag alone.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag alone.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag alone.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag alone.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag alone.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The URG flag alone.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Return the ECE flag.
    #[inline]
    pub fn ece(&self) -> bool {
        self.0 & field::FLG_ECE != 0
    }

    /// Return the CWR flag.
    #[inline]
    pub fn cwr(&self) -> bool {
        self.0 & field::FLG_CWR != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the RST flag.
    #[inline]
    pub fn set_rst(&mut self, value: bool) {
        self.set(field::FLG_RST, value)
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    /// Set the URG flag.
    #[inline]
    pub fn set_urg(&mut self, value: bool) {
        self.set(field::FLG_URG, value)
    }

    fn set(&mut self, flag: u8, value: bool) {
        let without = self.0 & !flag;
        self.0 = without | if value { flag } else { 0 };
    }

    /// Return the length of a control flag, in terms of sequence space.
    pub fn sequence_len(self) -> usize {
        usize::from(self.syn()) + usize::from(self.fin())
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (field::FLG_CWR, "cwr"), (field::FLG_ECE, "ece"), (field::FLG_URG, "urg"),
            (field::FLG_ACK, "ack"), (field::FLG_PSH, "psh"), (field::FLG_RST, "rst"),
            (field::FLG_SYN, "syn"), (field::FLG_FIN, "fin"),
        ];
        let mut first = true;
        for &(bit, name) in names.iter() {
            if self.0 & bit == 0 { continue }
            if !first { write!(f, "|")? }
            write!(f, "{}", name)?;
            first = false;
        }
        if first { write!(f, "-")? }
        Ok(())
    }
}

/// A high-level representation of a Transmission Control Protocol header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The sending port.
    pub src_port:     u16,
    /// The receiving port.
    pub dst_port:     u16,
    /// All control flags, ACK included.
    pub flags:        Flags,
    /// The sequence number of the first octet, or of the SYN.
    pub seq_number:   SeqNumber,
    /// The acknowledgment number, present exactly when the ACK flag is.
    pub ack_number:   Option<SeqNumber>,
    /// The advertised receive window.
    pub window_len:   u16,
    /// Offset of the urgent pointer from the sequence number.
    pub urgent_at:    u16,
    /// The number of payload octets following the header.
    pub payload_len:  usize,
}

/// Abstraction for checksum behaviour.
///
/// The checksum requires calculating a pseudo header for the upper layer protocol consisting of
/// src and dst address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checksum {
    /// Always fill the checksum and check if it exists.
    Manual {
        /// The source address of the carrying datagram.
        src_addr: IpAddress,
        /// The destination address of the carrying datagram.
        dst_addr: IpAddress,
    },

    /// Never inspect the checksum.
    ///
    /// This assumes that some layer below has already performed the necessary checks.
    Ignored,
}

impl Repr {
    /// Parse a Transmission Control Protocol packet and return a high-level representation.
    pub fn parse<T>(packet: &Packet<&T>, checksum: Checksum) -> Result<Repr>
        where T: AsRef<[u8]> + ?Sized
    {
        packet.check_len()?;
        // Source and destination ports must be present.
        if packet.src_port() == 0 { return Err(Error::Malformed) }
        if packet.dst_port() == 0 { return Err(Error::Malformed) }

        if let Checksum::Manual { src_addr, dst_addr } = checksum {
            if !packet.verify_checksum(src_addr, dst_addr) {
                return Err(Error::WrongChecksum)
            }
        }

        let flags = packet.flags();
        let ack_number = if flags.ack() {
            Some(packet.ack_number())
        } else {
            None
        };

        Ok(Repr {
            src_port:     packet.src_port(),
            dst_port:     packet.dst_port(),
            flags,
            seq_number:   packet.seq_number(),
            ack_number,
            window_len:   packet.window_len(),
            urgent_at:    packet.urgent_at(),
            payload_len:  packet.payload().len(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Return the length of a packet that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        self.header_len() + self.payload_len
    }

    /// Emit a high-level representation into a Transmission Control Protocol packet.
    ///
    /// The checksum field is zeroed, call `fill_checksum` once the payload is in place.
    pub fn emit<T>(&self, packet: &mut Packet<T>)
        where T: AsRef<[u8]> + AsMut<[u8]>
    {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_seq_number(self.seq_number);
        packet.set_ack_number(self.ack_number.unwrap_or(SeqNumber(0)));
        packet.set_window_len(self.window_len);
        packet.set_header_len(self.header_len() as u8);
        let mut flags = self.flags;
        flags.set_ack(self.ack_number.is_some());
        packet.set_flags(flags);
        packet.set_checksum(0);
        packet.set_urgent_at(self.urgent_at);
    }

    /// Produce the complete segment carrying `payload`, checksum included.
    ///
    /// # Panics
    /// This function panics if `payload` is not `payload_len` octets long.
    pub fn encode(&self, payload: &[u8], src_addr: IpAddress, dst_addr: IpAddress) -> Vec<u8> {
        assert_eq!(payload.len(), self.payload_len, "payload length disagrees with header");
        let mut bytes = vec![0; self.buffer_len()];
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        self.emit(&mut packet);
        packet.payload_mut().copy_from_slice(payload);
        packet.fill_checksum(src_addr, dst_addr);
        bytes
    }

    /// Return the length of the segment, in terms of sequence space.
    pub fn sequence_len(&self) -> usize {
        self.payload_len + self.flags.sequence_len()
    }
}

impl<T: AsRef<[u8]>> fmt::Display for Packet<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} {}",
               self.src_port(), self.dst_port(), self.flags())?;
        write!(f, " seq={}", self.seq_number())?;
        if self.flags().ack() {
            write!(f, " ack={}", self.ack_number())?;
        }
        write!(f, " win={}", self.window_len())?;
        if self.flags().urg() {
            write!(f, " urg={}", self.urgent_at())?;
        }
        write!(f, " len={}", self.payload().len())
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} {}",
               self.src_port, self.dst_port, self.flags)?;
        write!(f, " seq={}", self.seq_number)?;
        if let Some(ack_number) = self.ack_number {
            write!(f, " ack={}", ack_number)?;
        }
        write!(f, " win={}", self.window_len)?;
        write!(f, " len={}", self.payload_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: IpAddress = IpAddress::new(192, 168, 1, 1);
    const DST_ADDR: IpAddress = IpAddress::new(192, 168, 1, 2);

    static PACKET_BYTES: [u8; 24] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x50, 0x18, 0x01, 0x23,
         0x22, 0xdc, 0x00, 0x00,
         0xaa, 0x00, 0x00, 0xff];

    static OPTIONS_PACKET_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x00, 0x00, 0x00, 0x00,
         0x60, 0x02, 0x01, 0x23,
         0x68, 0x88, 0x00, 0x00,
         0x01, 0x01, 0x01, 0x00,
         0xaa, 0x00, 0x00, 0xff];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    fn manual() -> Checksum {
        Checksum::Manual { src_addr: SRC_ADDR, dst_addr: DST_ADDR }
    }

    fn packet_repr() -> Repr {
        Repr {
            src_port:     48896,
            dst_port:     80,
            seq_number:   SeqNumber(0x01234567),
            ack_number:   Some(SeqNumber(0x89abcdefu32 as i32)),
            window_len:   0x0123,
            flags:        Flags::ACK | Flags::PSH,
            urgent_at:    0,
            payload_len:  PAYLOAD_BYTES.len(),
        }
    }

    #[test]
    fn test_deconstruct() {
        let packet = Packet::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.src_port(), 48896);
        assert_eq!(packet.dst_port(), 80);
        assert_eq!(packet.seq_number(), SeqNumber(0x01234567));
        assert_eq!(packet.ack_number(), SeqNumber(0x89abcdefu32 as i32));
        assert_eq!(packet.header_len(), 20);
        assert!(!packet.flags().fin());
        assert!(!packet.flags().syn());
        assert!(!packet.flags().rst());
        assert!(packet.flags().psh());
        assert!(packet.flags().ack());
        assert!(!packet.flags().urg());
        assert_eq!(packet.window_len(), 0x0123);
        assert_eq!(packet.urgent_at(), 0);
        assert_eq!(packet.checksum(), 0x22dc);
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[..]);
        assert!(packet.verify_checksum(SRC_ADDR, DST_ADDR));
    }

    #[test]
    fn test_construct() {
        let mut bytes = vec![0xa5; PACKET_BYTES.len()];
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet.set_src_port(48896);
        packet.set_dst_port(80);
        packet.set_seq_number(SeqNumber(0x01234567));
        packet.set_ack_number(SeqNumber(0x89abcdefu32 as i32));
        packet.set_header_len(20);
        let mut flags = Flags::default();
        flags.set_psh(true);
        flags.set_ack(true);
        packet.set_flags(flags);
        packet.set_window_len(0x0123);
        packet.set_urgent_at(0);
        packet.set_checksum(0xEEEE);
        packet.payload_mut().copy_from_slice(&PAYLOAD_BYTES[..]);
        packet.fill_checksum(SRC_ADDR, DST_ADDR);
        assert_eq!(&packet.into_inner()[..], &PACKET_BYTES[..]);
    }

    #[test]
    fn test_truncated() {
        let packet = Packet::new_checked(&PACKET_BYTES[..19]);
        assert_eq!(packet, Err(Error::Truncated));
        // The header claims 24 bytes but only 22 are present.
        let packet = Packet::new_checked(&OPTIONS_PACKET_BYTES[..22]);
        assert_eq!(packet, Err(Error::Truncated));
    }

    #[test]
    fn test_impossible_len() {
        let mut bytes = vec![0; 20];
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet.set_header_len(16);
        assert_eq!(packet.check_len(), Err(Error::Malformed));
    }

    #[test]
    fn test_parse() {
        let packet = Packet::new_checked(&PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(&packet, manual()).unwrap();
        assert_eq!(repr, packet_repr());
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[..]);
        assert_eq!(repr.sequence_len(), 4);
    }

    #[test]
    fn test_parse_skips_options() {
        let packet = Packet::new_checked(&OPTIONS_PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.options(), &[0x01, 0x01, 0x01, 0x00][..]);
        let repr = Repr::parse(&packet, manual()).unwrap();
        assert_eq!(repr.flags, Flags::SYN);
        assert_eq!(repr.ack_number, None);
        assert_eq!(repr.payload_len, 4);
        assert_eq!(repr.sequence_len(), 5);
        assert_eq!(packet.payload(), &PAYLOAD_BYTES[..]);
    }

    #[test]
    fn test_parse_bad_checksum() {
        let mut bytes = PACKET_BYTES;
        bytes[21] ^= 0x40;
        let packet = Packet::new_checked(&bytes[..]).unwrap();
        assert_eq!(Repr::parse(&packet, manual()), Err(Error::WrongChecksum));
        assert!(Repr::parse(&packet, Checksum::Ignored).is_ok());
    }

    #[test]
    fn test_parse_zero_port() {
        let mut bytes = PACKET_BYTES;
        bytes[0] = 0;
        bytes[1] = 0;
        let packet = Packet::new_checked(&bytes[..]).unwrap();
        assert_eq!(Repr::parse(&packet, Checksum::Ignored), Err(Error::Malformed));
    }

    #[test]
    fn test_emit() {
        let repr = packet_repr();
        let bytes = repr.encode(&PAYLOAD_BYTES, SRC_ADDR, DST_ADDR);
        assert_eq!(&bytes[..], &PACKET_BYTES[..]);
    }

    #[test]
    fn test_checksum_verifies_either_zero() {
        // Sum over a segment with its own checksum folded in is all ones.
        let bytes = packet_repr().encode(&PAYLOAD_BYTES, SRC_ADDR, DST_ADDR);
        let sum = checksum::combine(&[
            checksum::pseudo_header(&SRC_ADDR, &DST_ADDR, IpProtocol::Tcp, bytes.len() as u32),
            checksum::data(&bytes),
        ]);
        assert!(checksum::is_valid(!sum));
    }

    #[test]
    fn test_emit_ack_follows_number() {
        let mut repr = packet_repr();
        repr.ack_number = None;
        let bytes = repr.encode(&PAYLOAD_BYTES, SRC_ADDR, DST_ADDR);
        let packet = Packet::new_checked(&bytes[..]).unwrap();
        assert!(!packet.flags().ack());
        assert_eq!(packet.ack_number(), SeqNumber(0));
        assert_eq!(Repr::parse(&packet, manual()).unwrap().ack_number, None);
    }

    #[test]
    fn test_seq_number_wraps() {
        let max = SeqNumber::from_u32(u32::MAX);
        let wrapped = max + 2;
        assert_eq!(wrapped, SeqNumber(1));
        assert!(max < wrapped);
        assert_eq!(wrapped - max, 2);
        assert!(wrapped.in_window(max, 3));
        assert!(!wrapped.in_window(max, 2));
        assert!(!max.in_window(max, 0));
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_seq_number_sub_underflow() {
        let _ = SeqNumber(1) - SeqNumber(2);
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(format!("{}", Flags::SYN | Flags::ACK), "ack|syn");
        assert_eq!(format!("{}", Flags::default()), "-");
        assert_eq!(Flags(0x12), Flags::SYN | Flags::ACK);
        assert_eq!((Flags::SYN | Flags::FIN).sequence_len(), 2);
    }

    #[test]
    fn test_flags_set_and_clear() {
        let mut flags = Flags::SYN | Flags::ACK;
        flags.set_ack(false);
        assert_eq!(flags, Flags::SYN);
        flags.set_ack(false);
        assert_eq!(flags, Flags::SYN);
        flags.set_fin(true);
        flags.set_syn(false);
        assert_eq!(flags, Flags::FIN);
        assert!(!flags.syn() && flags.fin());
    }
}
