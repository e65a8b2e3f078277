use core::ops::RangeInclusive;

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::time::{millis_between, Clock, Millis};

/// Decides when an unanswered message should be sent again,
/// and when to stop trying.
///
/// The timer holds no message; whoever owns it asks it what to do
/// every time they poll, and does the resending themselves.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use embedded_time::Instant;
/// use tadpole::retry::{Attempts, RetryTimer, Strategy, YouShould};
///
/// type Clock = tadpole::std::Clock;
/// let at = |ms: u64| Instant::<Clock>::new(ms * 1000);
///
/// let strategy = Strategy::Delay { min: Milliseconds(500),
///                                  max: Milliseconds(500) };
/// let mut timer = RetryTimer::new(at(0), strategy, Attempts(2));
///
/// assert_eq!(timer.what_should_i_do(at(499)), Err(nb::Error::WouldBlock));
/// assert_eq!(timer.what_should_i_do(at(500)), Ok(YouShould::Retry));
/// assert_eq!(timer.what_should_i_do(at(999)), Err(nb::Error::WouldBlock));
/// assert_eq!(timer.what_should_i_do(at(1000)), Ok(YouShould::Cry));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer<C: Clock> {
  start: Instant<C>,
  init: Millis,
  strategy: Strategy,
  attempts: Attempts,
  max_attempts: Attempts,
}

/// A number of transmissions, the first one included
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`]
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Every attempt has been used up and the last one went
  /// unanswered for its full delay; give up.
  Cry,
  /// Send it again
  Retry,
}

impl<C: Clock> RetryTimer<C> {
  /// Start timing an operation whose first attempt happened at `start`.
  ///
  /// When the strategy has jitter, the initial delay is drawn from its
  /// range with an rng seeded by `start`.
  pub fn new(start: Instant<C>, strategy: Strategy, max_attempts: Attempts) -> Self {
    let seed = Millis::try_from(start.duration_since_epoch()).map(|Milliseconds(ms)| ms)
                                                             .unwrap_or(0);

    Self { start,
           init: strategy.initial_delay(seed),
           strategy,
           attempts: Attempts(1),
           max_attempts }
  }

  /// Number of attempts made so far, including the first
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// Time since `start` at which the attempt after `attempts` is due
  pub fn due_after(&self, attempts: Attempts) -> Millis {
    Milliseconds(self.strategy.offset(self.init, attempts.0))
  }

  /// Ask whether it is time to retry.
  ///
  /// `WouldBlock` while the current attempt's delay has not elapsed.
  /// Otherwise, counts a new attempt and yields [`YouShould::Retry`], or
  /// [`YouShould::Cry`] when `max_attempts` have already been made.
  pub fn what_should_i_do(&mut self,
                          now: Instant<C>)
                          -> nb::Result<YouShould, core::convert::Infallible> {
    let Milliseconds(elapsed) = millis_between(self.start, now);
    let Milliseconds(due) = self.due_after(self.attempts);

    match elapsed {
      | elapsed if elapsed < due => Err(nb::Error::WouldBlock),
      | _ if self.attempts >= self.max_attempts => Ok(YouShould::Cry),
      | _ => {
        self.attempts.0 += 1;
        Ok(YouShould::Retry)
      },
    }
  }
}

/// How long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
  /// Wait a delay picked between `init_min` and `init_max` before the
  /// second attempt, and twice as long as the previous wait before
  /// each one after that (RFC7252 section 4.2).
  Exponential {
    /// Shortest initial delay
    init_min: Millis,
    /// Longest initial delay
    init_max: Millis,
  },
  /// Wait the same delay, picked between `min` and `max`, before every attempt.
  Delay {
    /// Shortest delay
    min: Millis,
    /// Longest delay
    max: Millis,
  },
}

impl Strategy {
  /// Does the delay vary?
  pub fn has_jitter(&self) -> bool {
    let range = self.range();
    range.start() != range.end()
  }

  /// The range the (initial) delay is picked from, in milliseconds
  pub fn range(&self) -> RangeInclusive<u64> {
    match *self {
      | Self::Delay { min, max } => min.0..=max.0,
      | Self::Exponential { init_min, init_max } => init_min.0..=init_max.0,
    }
  }

  fn initial_delay(&self, seed: u64) -> Millis {
    if self.has_jitter() {
      Milliseconds(ChaCha8Rng::seed_from_u64(seed).gen_range(self.range()))
    } else {
      Milliseconds(*self.range().start())
    }
  }

  /// Milliseconds from the first attempt until the one after
  /// `attempts` is due
  fn offset(&self, Milliseconds(init): Millis, attempts: u16) -> u64 {
    match (self, attempts) {
      | (_, 0) => 0,
      | (Self::Delay { .. }, n) => init * n as u64,
      // init, 2 * init, 4 * init, ...
      | (Self::Exponential { .. }, n) => init.saturating_mul(1u64 << (n - 1).min(63)),
    }
  }

  /// The longest an operation can take when every attempt goes unanswered
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use tadpole::retry::{Attempts, Strategy};
  ///
  /// let exp = Strategy::Exponential { init_min: Milliseconds(100),
  ///                                   init_max: Milliseconds(200) };
  /// assert_eq!(exp.max_time(Attempts(3)), Milliseconds(800u64));
  /// ```
  pub fn max_time(&self, max_attempts: Attempts) -> Millis {
    Milliseconds(self.offset(Milliseconds(*self.range().end()), max_attempts.0))
  }
}
