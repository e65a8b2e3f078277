use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, Strategy};

/// Configuration options related to outbound CON messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Con {
  /// Retry strategy for CON requests that
  /// have not yet been ACKed.
  ///
  /// Defaults to an exponential retry strategy
  /// starting somewhere between 2 and 3 seconds:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use tadpole::config::Con;
  /// use tadpole::retry::Strategy;
  ///
  /// assert_eq!(Con::default().unacked_retry_strategy,
  ///            Strategy::Exponential { init_min: Milliseconds(2_000),
  ///                                    init_max: Milliseconds(3_000) });
  /// ```
  pub unacked_retry_strategy: Strategy,
  /// How long to wait for the response to a CON request
  /// that the server ACKed with an empty message.
  ///
  /// The request is not retransmitted once ACKed; when this
  /// timer gives up the request fails with
  /// [`DeliveryError::TooManyRetries`](crate::error::DeliveryError::TooManyRetries).
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use tadpole::config::Con;
  /// use tadpole::retry::Strategy;
  ///
  /// assert_eq!(Con::default().acked_retry_strategy,
  ///            Strategy::Exponential { init_min: Milliseconds(2_000),
  ///                                    init_max: Milliseconds(3_000) });
  /// ```
  pub acked_retry_strategy: Strategy,
  /// Number of times a CON message is sent (the first
  /// transmission included) before giving up.
  ///
  /// Defaults to 5 attempts, i.e. 4 retransmissions.
  /// ```
  /// use tadpole::config::Con;
  /// use tadpole::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_attempts, Attempts(5));
  /// ```
  pub max_attempts: Attempts,
}

/// Configuration options related to outbound NON requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Non {
  /// Strategy to use when we sent a NON request and haven't yet
  /// received a response.
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use tadpole::config::Non;
  /// use tadpole::retry::Strategy;
  ///
  /// assert_eq!(Non::default().retry_strategy,
  ///            Strategy::Delay { min: Milliseconds(5_000),
  ///                              max: Milliseconds(5_000) });
  /// ```
  pub retry_strategy: Strategy,
  /// Number of times a NON request is sent before erroring.
  ///
  /// Defaults to 1 (NON requests are never retransmitted, only timed out).
  /// ```
  /// use tadpole::config::Non;
  /// use tadpole::retry::Attempts;
  ///
  /// assert_eq!(Non::default().max_attempts, Attempts(1));
  /// ```
  pub max_attempts: Attempts,
}

/// Configuration options related to parsing & handling messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Msg {
  /// Seed used to generate message [`Token`](tadpole_msg::Token)s and
  /// the first message [`Id`](tadpole_msg::Id),
  /// customizable to allow for your application to generate tokens
  /// less guessably.
  ///
  /// The default value is 0, although a distinct value per device
  /// (random integer, machine identifier) makes tokens harder to guess.
  ///
  /// ```
  /// use tadpole::config::Msg;
  ///
  /// assert_eq!(Msg::default().token_seed, 0);
  /// ```
  pub token_seed: u16,

  /// See [`Con`]
  pub con: Con,

  /// See [`Non`]
  pub non: Non,
}

impl Default for Con {
  fn default() -> Self {
    Con { unacked_retry_strategy: Strategy::Exponential { init_min: Milliseconds(2_000),
                                                          init_max: Milliseconds(3_000) },
          acked_retry_strategy: Strategy::Exponential { init_min: Milliseconds(2_000),
                                                        init_max: Milliseconds(3_000) },
          max_attempts: Attempts(5) }
  }
}

impl Default for Non {
  fn default() -> Self {
    Non { retry_strategy: Strategy::Delay { min: Milliseconds(5_000),
                                            max: Milliseconds(5_000) },
          max_attempts: Attempts(1) }
  }
}

impl Default for Msg {
  fn default() -> Self {
    Msg { token_seed: 0,
          con: Con::default(),
          non: Non::default() }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Config {
  /// See [`Msg`]
  pub msg: Msg,
  /// Maximum number of observers a single resource accepts.
  ///
  /// Registrations beyond this are answered normally
  /// but not remembered.
  ///
  /// ```
  /// use tadpole::config::Config;
  ///
  /// assert_eq!(Config::default().max_observers, 16);
  /// ```
  pub max_observers: usize,
  /// Size of the buffer datagrams are received into;
  /// longer datagrams are truncated.
  ///
  /// ```
  /// use tadpole::config::Config;
  ///
  /// assert_eq!(Config::default().dgram_size, 1152);
  /// ```
  pub dgram_size: usize,
}

impl Default for Config {
  fn default() -> Self {
    Config { msg: Msg::default(),
             max_observers: 16,
             dgram_size: 1152 }
  }
}

impl Config {
  /// Longest a CON request can go unanswered before
  /// it fails, if the server never ACKs it
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use tadpole::config::Config;
  ///
  /// assert_eq!(Config::default().max_transmit_wait(), Milliseconds(48_000u64));
  /// ```
  pub fn max_transmit_wait(&self) -> crate::time::Millis {
    self.msg
        .con
        .unacked_retry_strategy
        .max_time(self.msg.con.max_attempts)
  }
}
