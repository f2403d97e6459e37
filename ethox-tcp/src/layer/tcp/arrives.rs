//! Processing of arriving segments, RFC 793 section 3.9.
use crate::time::Instant;
use crate::wire::{TcpFlags, TcpRepr, TcpSeqNumber};

use super::{Error, IsnGenerator};
use super::connection::{Call, Connection, Segment, Signals, State};

impl Connection {
    /// Process an arriving segment addressed to this connection.
    ///
    /// The connection is updated in place. The returned signals hold the segments to send in
    /// answer, completions of affected calls are signaled before this returns.
    pub fn arrives(&mut self, segment: &Segment, isn: &IsnGenerator, now: Instant) -> Signals {
        net_trace!("{}: {} in {}", self.local, segment.repr, self.current);
        let mut signals = Signals::default();
        match self.current {
            State::Closed => signals.answer(Connection::reset_for(segment)),
            State::Listen => self.arrives_listen(segment, isn, now, &mut signals),
            State::SynSent => self.arrives_syn_sent(segment, now, &mut signals),
            _ => self.arrives_synchronized(segment, now, &mut signals),
        }
        signals
    }

    fn arrives_listen(&mut self, segment: &Segment, isn: &IsnGenerator, now: Instant,
                      signals: &mut Signals)
    {
        let repr = segment.repr;
        if repr.flags.rst() {
            return;
        }

        if repr.ack_number.is_some() {
            // What are you acking? A previous connection.
            signals.answer(Connection::reset_for(segment));
            return;
        }

        if !repr.flags.syn() {
            net_debug!("{}: discarded segment without SYN in {}", self.local, self.current);
            return;
        }

        let foreign = segment.foreign();
        self.foreign = Some(foreign);
        self.recv.initial_seq = repr.seq_number;
        self.recv.next = repr.seq_number + 1;

        let iss = isn.get_isn(self.local, foreign, now);
        self.send.initial_seq = iss;
        self.send.unacked = iss;
        self.send.next = iss + 1;
        self.send.urgent = iss;
        self.update_window(&repr, iss);
        self.set_state(State::SynReceived);

        // Text riding on the SYN is kept for the established connection.
        self.accept_text(repr.seq_number + 1, segment.payload);

        if let Some(syn_ack) = self.segment(TcpFlags::SYN | TcpFlags::ACK, iss, Vec::new()) {
            self.enqueue(&syn_ack, Call::Open, None, now);
            signals.answer(Some(syn_ack));
        }
    }

    fn arrives_syn_sent(&mut self, segment: &Segment, now: Instant, signals: &mut Signals) {
        let repr = segment.repr;
        if let Some(ack) = repr.ack_number {
            if ack <= self.send.initial_seq || ack > self.send.next {
                net_debug!("{}: unacceptable ack {} in {}", self.local, ack, self.current);
                if !repr.flags.rst() {
                    signals.answer(Connection::reset_for(segment));
                }
                return;
            }
        }

        if repr.flags.rst() {
            // Only a reset acknowledging our SYN is believed.
            if repr.ack_number.is_some() {
                net_debug!("{}: connection reset by {}", self.local, segment.foreign());
                self.terminate(Error::ConnectionReset);
            }
            return;
        }

        if !repr.flags.syn() {
            net_debug!("{}: discarded segment without SYN in {}", self.local, self.current);
            return;
        }

        self.recv.initial_seq = repr.seq_number;
        self.recv.next = repr.seq_number + 1;
        if let Some(ack) = repr.ack_number {
            if ack > self.send.unacked {
                self.send.unacked = ack;
                self.release_acked(now);
            }
        }
        self.accept_text(repr.seq_number + 1, segment.payload);

        if self.send.unacked > self.send.initial_seq {
            self.set_state(State::Established);
            self.update_window(&repr, self.send.unacked);
            self.deliver();
            self.receive_fin(segment, now);
            signals.answer(self.control(TcpFlags::ACK));
        } else {
            // Simultaneous open, our SYN is now also an acknowledgment.
            self.set_state(State::SynReceived);
            self.update_window(&repr, self.send.initial_seq);
            let syn_ack = TcpFlags::SYN | TcpFlags::ACK;
            for entry in self.retransmit.iter_mut().filter(|entry| entry.flags.syn()) {
                entry.flags = syn_ack;
            }
            signals.answer(self.segment(syn_ack, self.send.initial_seq, Vec::new()));
        }
    }

    fn arrives_synchronized(&mut self, segment: &Segment, now: Instant, signals: &mut Signals) {
        let repr = segment.repr;
        let seq = repr.seq_number;

        // First, check the sequence number.
        if !self.acceptable(&repr) {
            if repr.flags.rst() {
                return;
            }
            net_debug!("{}: unacceptable segment seq={} len={}, expected {} window {}",
                self.local, seq, repr.sequence_len(), self.recv.next, self.recv_window());
            if self.current == State::TimeWait && repr.flags.fin() {
                // The peer did not see our ACK of its FIN.
                self.last_tx = now;
            }
            signals.answer(self.control(TcpFlags::ACK));
            return;
        }

        // Second, check the RST bit.
        if repr.flags.rst() {
            let error = match self.current {
                State::SynReceived => Error::ConnectionRefused,
                _ => Error::ConnectionReset,
            };
            net_debug!("{}: {} by {}", self.local, error, segment.foreign());
            self.terminate(error);
            return;
        }

        // Third, security and precedence are not supported.

        // Fourth, a SYN inside the window is an error.
        if repr.flags.syn() {
            net_debug!("{}: SYN in {}, resetting", self.local, self.current);
            signals.answer(self.control(TcpFlags::RST));
            self.terminate(Error::ConnectionReset);
            return;
        }

        // Fifth, check the ACK field.
        let ack = match repr.ack_number {
            Some(ack) => ack,
            None => {
                net_debug!("{}: discarded segment without ACK in {}", self.local, self.current);
                return;
            }
        };

        if self.current == State::SynReceived {
            if self.send.unacked < ack && ack <= self.send.next {
                self.set_state(State::Established);
                // Text that rode on the SYN is now readable.
                self.deliver();
            } else {
                signals.answer(Connection::reset_for(segment));
                return;
            }
        }

        if ack > self.send.next {
            // Acknowledges something not yet sent.
            signals.answer(self.control(TcpFlags::ACK));
            return;
        }

        if self.send.unacked < ack {
            self.send.unacked = ack;
            self.release_acked(now);
        }

        if self.send.unacked == ack
            && (self.send.wl1 < seq || (self.send.wl1 == seq && self.send.wl2 <= ack))
        {
            self.update_window(&repr, ack);
        }

        match self.current {
            State::FinWait1 if self.fin_acked() => self.set_state(State::FinWait2),
            State::Closing => {
                if !self.fin_acked() {
                    return;
                }
                self.enter_time_wait(now);
            },
            State::LastAck => {
                if self.fin_acked() {
                    self.terminate(Error::ConnectionClosing);
                }
                return;
            },
            _ => (),
        }

        // Sixth, check the URG bit.
        if repr.flags.urg() && self.receives_text() {
            let urgent = seq + usize::from(repr.urgent_at);
            if urgent > self.recv.urgent {
                self.recv.urgent = urgent;
            }
        }

        // Seventh, process the segment text.
        let mut ack_due = false;
        if !segment.payload.is_empty() {
            if self.receives_text() {
                self.accept_text(seq, segment.payload);
                self.deliver();
                ack_due = true;
            } else {
                net_debug!("{}: ignored text in {}", self.local, self.current);
            }
        }

        // Eighth, check the FIN bit.
        ack_due |= self.receive_fin(segment, now);

        if ack_due {
            signals.answer(self.control(TcpFlags::ACK));
        }
    }

    /// The acceptance test of RFC 793 against the receive window.
    fn acceptable(&self, repr: &TcpRepr) -> bool {
        let seq = repr.seq_number;
        let next = self.recv.next;
        match (repr.sequence_len(), self.recv_window()) {
            (0, 0) => seq == next,
            (0, window) => seq.in_window(next, window),
            (_, 0) => false,
            (len, window) => seq.in_window(next, window)
                || (seq + (len - 1)).in_window(next, window),
        }
    }

    fn receives_text(&self) -> bool {
        matches!(self.current, State::Established | State::FinWait1 | State::FinWait2)
    }

    fn update_window(&mut self, repr: &TcpRepr, ack: TcpSeqNumber) {
        self.send.window = repr.window_len;
        self.send.wl1 = repr.seq_number;
        self.send.wl2 = ack;
    }

    /// Buffer the in-order part of some text starting at `seq`.
    ///
    /// Octets before `RCV.NXT` are duplicates and skipped. Text starting beyond it is dropped,
    /// the acknowledgment sent in answer asks for the gap.
    fn accept_text(&mut self, seq: TcpSeqNumber, payload: &[u8]) {
        if payload.is_empty() {
            return;
        }
        let data = if seq <= self.recv.next {
            payload.get(self.recv.next - seq..).unwrap_or(&[])
        } else {
            net_debug!("{}: out of order text at {}, expected {}", self.local, seq, self.recv.next);
            return;
        };
        let taken = self.rx.enqueue_slice(data);
        self.recv.next += taken;
        if taken < data.len() {
            net_debug!("{}: receive window full, dropped {} octets", self.local, data.len() - taken);
        }
    }

    /// Consume a FIN once all text before it was received. Returns whether it was consumed.
    fn receive_fin(&mut self, segment: &Segment, now: Instant) -> bool {
        let repr = segment.repr;
        if !repr.flags.fin() {
            return false;
        }

        let text_start = if repr.flags.syn() { repr.seq_number + 1 } else { repr.seq_number };
        if text_start + repr.payload_len != self.recv.next {
            return false;
        }

        self.recv.next += 1;
        if self.rx.is_empty() {
            if let Some(pending) = self.pending.take() {
                let _ = pending.reply.send(Err(Error::ConnectionClosing));
            }
        }

        match self.current {
            State::SynReceived | State::Established => self.set_state(State::CloseWait),
            State::FinWait1 => {
                if self.fin_acked() {
                    self.enter_time_wait(now);
                } else {
                    self.set_state(State::Closing);
                }
            },
            State::FinWait2 => self.enter_time_wait(now),
            State::TimeWait => self.last_tx = now,
            _ => (),
        }
        true
    }

    fn enter_time_wait(&mut self, now: Instant) {
        self.set_state(State::TimeWait);
        self.last_tx = now;
    }
}
