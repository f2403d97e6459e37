//! Retransmission timeouts and the periodic sweep.
use crate::time::{Duration, Instant};

use super::{Config, Error};
use super::connection::{Connection, Outgoing, State};
use super::endpoint::Endpoint;

/// Estimates the retransmission timeout from round trip samples.
///
/// An exponentially weighted moving average, `SRTT = 0.7 SRTT + 0.3 RTT`, with the timeout at
/// `1.7 SRTT` clamped to the configured bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtoEstimator {
    srtt: Duration,
    rto: Duration,
    min: Duration,
    max: Duration,
}

const ALPHA: f64 = 0.7;
const BETA: f64 = 1.7;

impl RtoEstimator {
    /// The estimator before any sample, both estimates at the initial timeout.
    pub fn new(config: &Config) -> Self {
        RtoEstimator {
            srtt: config.initial_rto,
            rto: config.initial_rto,
            min: config.min_rto,
            max: config.max_rto,
        }
    }

    /// Feed a measured round trip time.
    pub fn sample(&mut self, rtt: Duration) {
        self.srtt = self.srtt.mul_f64(ALPHA) + rtt.mul_f64(1.0 - ALPHA);
        self.rto = self.srtt.mul_f64(BETA).clamp(self.min, self.max);
    }

    /// The smoothed round trip time.
    pub fn srtt(&self) -> Duration {
        self.srtt
    }

    /// The current retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// The timeout of an entry retransmitted `retries` times, doubled per retry.
    pub fn backoff(&self, retries: u32) -> Duration {
        let factor = 1u32.checked_shl(retries).unwrap_or(u32::MAX);
        self.rto.saturating_mul(factor)
    }
}

impl Connection {
    /// Run the timers of this connection, returning the segments to retransmit.
    pub fn on_timer(&mut self, now: Instant, config: &Config) -> Vec<Outgoing> {
        let mut resend = Vec::new();
        if self.current == State::TimeWait {
            if now >= self.last_tx + config.time_wait() {
                net_trace!("{}: TIME-WAIT expired", self.local);
                self.terminate(Error::UserTimeout);
            }
            return resend;
        }

        self.release_acked(now);

        let mut index = 0;
        while index < self.retransmit.len() {
            let backoff = self.rto.backoff(self.retransmit[index].retries);
            let entry = &mut self.retransmit[index];
            if now >= entry.first_sent + self.timeout {
                net_warn!("{}: user timeout of {:?} elapsed", self.local, self.timeout);
                self.terminate(Error::UserTimeout);
                return Vec::new();
            }

            if now < entry.last_sent + backoff {
                index += 1;
                continue;
            }

            entry.retries += 1;
            if entry.retries >= config.max_retransmits {
                net_warn!("{}: {:?} segment {} not acknowledged after {} attempts",
                    self.local, entry.call, entry.seq, entry.retries);
                if let Some(entry) = self.retransmit.remove(index) {
                    entry.complete(Err(Error::RetransmissionTimeout));
                }
                continue;
            }

            entry.last_sent = now;
            let (flags, seq, payload) = (entry.flags, entry.seq, entry.payload.clone());
            net_debug!("{}: retransmitting {} seq={} after {:?}", self.local, flags, seq, backoff);
            resend.extend(self.segment(flags, seq, payload));
            index += 1;
        }

        resend
    }
}

impl Endpoint {
    /// One sweep over all connections.
    pub fn sweep(&mut self, now: Instant) -> Vec<Outgoing> {
        let config = *self.config();
        self.iter_mut()
            .flat_map(|connection| connection.on_timer(now, &config))
            .collect()
    }
}
