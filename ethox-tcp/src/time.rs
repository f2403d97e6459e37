/*! Time structures.

The connection logic never reads a clock on its own. Every operation that depends on time receives
an [`Instant`], only the socket façade samples a clock, and that clock can be replaced.

 - [`Instant`] is used to represent absolute time.
 - [`Duration`] is used to represent relative time.
*/
use core::{fmt, ops};
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of milliseconds
/// since an arbitrary moment in time, such as system startup or the unix epoch.
///
/// * A value of `0` is inherently arbitrary.
/// * A value less than `0` indicates a time before the starting point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    /// Milliseconds since the arbitrary starting point.
    pub millis: i64,
}

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// Create a new `Instant` from the current [`std::time::SystemTime`].
    pub fn now() -> Instant {
        Self::from(std::time::SystemTime::now())
    }

    /// The fractional number of milliseconds that have passed
    /// since the beginning of time.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the
    /// beginning of time.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since
    /// the beginning of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl From<std::time::SystemTime> for Instant {
    fn from(other: std::time::SystemTime) -> Instant {
        // A clock set before the epoch reads as the epoch itself.
        let n = other.duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_millis(n.as_secs() as i64 * 1000 + i64::from(n.subsec_millis()))
    }
}

impl From<Instant> for std::time::SystemTime {
    fn from(instant: Instant) -> std::time::SystemTime {
        std::time::UNIX_EPOCH + Duration::from_millis(instant.millis.max(0) as u64)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_add(millis_of(rhs)))
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_sub(millis_of(rhs)))
    }
}

/// The time elapsed from `rhs` to `self`, zero if `rhs` is later.
impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(rhs.millis).max(0) as u64)
    }
}

fn millis_of(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
