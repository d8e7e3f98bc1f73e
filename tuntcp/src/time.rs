/*! Time structures.

 - [Instant] is an absolute point on a monotonic millisecond clock.
 - [Duration] is a relative span, the one from `core`.
 - [Expiration] is a deadline that may be absent.
 - [Timer] is a one-shot deadline that can be armed, canceled and polled.

[Instant]: struct.Instant.html
[Duration]: struct.Duration.html
[Expiration]: enum.Expiration.html
[Timer]: struct.Timer.html
*/
use core::{cmp, fmt, ops};
pub use core::time::Duration;

/// An absolute time value in milliseconds.
///
/// The epoch is arbitrary, usually the start of the monotonic clock of the system. Only
/// differences between instants carry meaning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    pub millis: i64,
}

/// An expiration time, inversion of `Option`.
///
/// `Never` compares greater than every `When`, so the minimum of several expirations is the
/// earliest deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    When(Instant),
    Never,
}

use Expiration::{When, Never};

/// A one-shot timer.
///
/// Arming replaces any previous deadline. Once the deadline has been observed by `poll` the timer
/// is disarmed again, so it fires at most once per arming. Canceling an idle timer has no effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    deadline: Expiration,
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

    /// The fractional part, in milliseconds.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    pub fn total_millis(&self) -> i64 {
        self.millis
    }

    /// The span from `self` until `later`, saturating at zero.
    pub fn until(self, later: Instant) -> Duration {
        Duration::from_millis((later.millis - self.millis).max(0) as u64)
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
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis += rhs.as_millis() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis - rhs.as_millis() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).abs() as u64)
    }
}

impl Expiration {
    /// Check if the deadline is at or before `now`.
    pub fn is_due(self, now: Instant) -> bool {
        match self {
            When(at) => at <= now,
            Never => false,
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(opt: Option<Instant>) -> Self {
        match opt {
            Some(instant) => When(instant),
            None => Never,
        }
    }
}

impl From<Expiration> for Option<Instant> {
    fn from(opt: Expiration) -> Self {
        match opt {
            When(instant) => Some(instant),
            Never => None,
        }
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}

impl Timer {
    /// Arm the timer to fire once `after` has passed since `now`.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = When(now + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = Never;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline != Never
    }

    pub fn deadline(&self) -> Expiration {
        self.deadline
    }

    /// Consume the deadline if it is due.
    ///
    /// Returns `true` exactly once for every arming whose deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.deadline.is_due(now) {
            self.deadline = Never;
            true
        } else {
            false
        }
    }
}
