use embedded_time::rate::Fraction;

/// Networking! woohoo!
pub mod net;

/// A [`Client`](crate::client::Client) over plain UDP, timed by the system clock
pub type Client = crate::client::Client<::std::net::UdpSocket, Clock>;

/// A [`Server`](crate::server::Server) over plain UDP
pub type Server = crate::server::Server<::std::net::UdpSocket>;

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(::std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(::std::time::Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let now = ::std::time::Instant::now();
    let elapsed = now.duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_micros() as u64))
  }
}
