use embedded_time::duration::Milliseconds;
use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Milliseconds elapsed between two instants, or zero
/// if `later` is not later than `earlier`.
///
/// ```
/// use embedded_time::Instant;
/// use tadpole::std::Clock;
/// use tadpole::time::{millis_between, Millis};
///
/// let a = Instant::<Clock>::new(1_000);
/// let b = Instant::<Clock>::new(3_500_000);
///
/// assert_eq!(millis_between(a, b), Millis::new(3_499));
/// assert_eq!(millis_between(b, a), Millis::new(0));
/// ```
pub fn millis_between<C: Clock>(earlier: Instant<C>, later: Instant<C>) -> Millis {
  later.checked_duration_since(&earlier)
       .and_then(|elapsed| Millis::try_from(elapsed).ok())
       .unwrap_or(Milliseconds(0))
}
