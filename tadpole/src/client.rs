use std::net::SocketAddr;

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tadpole_msg::codec::{build_message, parse_message};
use tadpole_msg::{known, CodeKind, Id, Message, OptNumber, OptionValue, Token, TryIntoBytes, Type};

use crate::config::Config;
use crate::error::{Delivery, DeliveryError, Error, What, When};
use crate::logging::msg_summary;
use crate::net::{Addrd, Socket, SocketErrorKind};
use crate::req::Method;
use crate::retry::{RetryTimer, YouShould};
use crate::server::resource::normalize_path;
use crate::session::{SessionConfig, State};
use crate::time::{Clock, Millis};

/// Called once with the outcome of a request
pub type OnComplete = Box<dyn FnOnce(Delivery)>;

/// Called with every notification of an observation,
/// or with the reason the observation could not be established
pub type OnNotify = Box<dyn FnMut(Delivery)>;

enum Kind {
  Plain(OnComplete),
  Register,
  /// GET with Observe=1; completes only on a response that is
  /// not a notification
  Deregister(OnComplete),
}

struct Exchange<C: Clock> {
  id: Id,
  token: Token,
  con: bool,
  bytes: Vec<u8>,
  sent: bool,
  acked: bool,
  failed: Option<DeliveryError>,
  timer: RetryTimer<C>,
  kind: Kind,
}

struct Observation {
  path: String,
  token: Token,
  on_notify: OnNotify,
  established: bool,
}

/// A CoAP client talking to the one server named by its [`SessionConfig`].
///
/// ```text
/// new -> create_client -> connect -> send_message / observe, poll ... -> disconnect -> destroy_client
/// ```
///
/// Outcomes are delivered to callbacks, and callbacks only run
/// inside [`Client::poll`].
///
/// ```
/// use tadpole::client::Client;
/// use tadpole::error::delivery_status;
/// use tadpole::msg::{Code, Id, Message, Token, Type};
/// use tadpole::net::loopback::Loopback;
/// use tadpole::resp::Resp;
/// use tadpole::server::{Resource, Server};
/// use tadpole::session::SessionConfig;
///
/// let mut server = Server::<Loopback>::new(SessionConfig { port: Some(7001),
///                                                          ..Default::default() });
/// server.create_server().unwrap();
/// server.init_resources(vec![Resource::new("hello").get(|_| Resp::content("hi"))])
///       .unwrap();
/// server.start_server(None).unwrap();
///
/// let mut client =
///   Client::<Loopback, tadpole::std::Clock>::new(SessionConfig { uri: "coap://127.0.0.1:7001".into(),
///                                                                ..Default::default() });
/// client.create_client().unwrap();
/// client.connect().unwrap();
///
/// let req = Message::new(Type::Con, Code::new(0, 1), Id(0), Token::default());
/// client.send_message("hello", req, |rep| {
///         assert_eq!(delivery_status(&rep), "NONE");
///         assert_eq!(rep.unwrap().payload.0, b"hi");
///       })
///       .unwrap();
///
/// server.poll().unwrap();
/// client.poll().unwrap();
/// assert_eq!(client.pending(), 0);
/// ```
pub struct Client<S: Socket, C: Clock> {
  session: SessionConfig,
  config: Config,
  clock: C,
  state: State,
  sock: Option<S>,
  peer: Option<SocketAddr>,
  rng: ChaCha8Rng,
  next_id: Id,
  exchanges: Vec<Exchange<C>>,
  observations: Vec<Observation>,
}

impl<S: Socket, C: Clock> core::fmt::Debug for Client<S, C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Client")
     .field("session", &self.session)
     .field("config", &self.config)
     .field("state", &self.state)
     .field("peer", &self.peer)
     .field("exchanges", &self.exchanges.len())
     .field("observations",
            &self.observations
                 .iter()
                 .map(|o| (o.path.as_str(), o.token))
                 .collect::<Vec<_>>())
     .finish()
  }
}

impl<S: Socket, C: Clock + Default> Client<S, C> {
  /// Create a client with the default [`Config`]
  pub fn new(session: SessionConfig) -> Self {
    Self::with_clock(session, Config::default(), C::default())
  }
}

fn transmit<S: Socket>(sock: &S, peer: SocketAddr, bytes: &[u8]) -> Result<bool, DeliveryError> {
  match sock.send(Addrd(bytes, peer)) {
    | Ok(()) => Ok(true),
    | Err(nb::Error::WouldBlock) => Ok(false),
    | Err(nb::Error::Other(e)) => {
      log::error!(target: "tadpole", "sending to {} failed: {:?}", peer, e);
      match S::error_kind(&e) {
        | SocketErrorKind::Tls => Err(DeliveryError::TlsFailed),
        | _ => Err(DeliveryError::NotDeliverable),
      }
    },
  }
}

impl<S: Socket, C: Clock> Client<S, C> {
  /// Create a client
  pub fn with_clock(session: SessionConfig, config: Config, clock: C) -> Self {
    Self { session,
           config,
           clock,
           state: State::Created,
           sock: None,
           peer: None,
           rng: ChaCha8Rng::seed_from_u64(config.msg.token_seed as u64),
           next_id: Id(0),
           exchanges: Vec::new(),
           observations: Vec::new() }
  }

  /// Where the client is in its lifecycle
  pub fn state(&self) -> State {
    self.state
  }

  /// The server this client talks to, once created
  pub fn peer(&self) -> Option<SocketAddr> {
    self.peer
  }

  /// The address the client's socket is bound to, once created
  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.sock.as_ref().and_then(|s| s.local_addr().ok())
  }

  /// Number of requests still waiting for their outcome
  pub fn pending(&self) -> usize {
    self.exchanges.len()
  }

  /// Number of observations registered or being registered
  pub fn observations(&self) -> usize {
    self.observations.len()
  }

  fn require(&self, when: When, allowed: &[State]) -> Result<(), Error> {
    if allowed.contains(&self.state) {
      Ok(())
    } else {
      Err(when.what(What::BadState(self.state)))
    }
  }

  fn now(&self, when: When) -> Result<Instant<C>, Error> {
    self.clock
        .try_now()
        .map_err(|_| when.what(What::ClockError))
  }

  fn next_id(&mut self) -> Id {
    let id = self.next_id;
    self.next_id = id.next();
    id
  }

  fn next_token(&mut self) -> Token {
    let seed = self.config.msg.token_seed.to_be_bytes();
    let salt = self.rng.gen::<u64>().to_be_bytes();
    Token::opaque(&[&seed[..], &salt[..]].concat())
  }

  /// Resolve the server's address and bind a socket to talk to it on
  pub fn create_client(&mut self) -> Result<(), Error> {
    self.require(When::CreateClient, &[State::Created])?;
    self.session
        .check()
        .map_err(|e| When::CreateClient.what(e.what))?;

    let peer = self.session.peer_addr()?;
    let sock = match peer {
                 | SocketAddr::V4(_) => S::bind_raw("0.0.0.0:0"),
                 | SocketAddr::V6(_) => S::bind_raw("[::]:0"),
               }.map_err(|e| Error::from_socket::<S>(When::CreateClient, e))?;

    let Milliseconds(since_epoch) =
      Millis::try_from(self.now(When::CreateClient)?.duration_since_epoch()).unwrap_or(Milliseconds(0));
    self.rng = ChaCha8Rng::seed_from_u64(since_epoch ^ self.config.msg.token_seed as u64);
    self.next_id = Id(self.rng.gen());

    self.sock = Some(sock);
    self.peer = Some(peer);
    self.state = State::Configured;
    log::debug!(target: "tadpole", "client created for {}", peer);
    Ok(())
  }

  /// Establish the session's security with the server.
  ///
  /// The handshake is attempted once; when it fails the client
  /// stays configured and may `connect` again.
  pub fn connect(&mut self) -> Result<(), Error> {
    self.require(When::Connect, &[State::Configured])?;

    let secure = self.session.is_secure();
    let security = self.session.security();

    if let (Some(sock), Some(peer)) = (self.sock.as_mut(), self.peer) {
      sock.handshake(peer, security).map_err(|e| {
                                        log::warn!(target: "tadpole", "handshake with {} failed: {:?}", peer, e);
                                        let what = match S::error_kind(&e) {
                                          | SocketErrorKind::Interrupted => What::Interrupted,
                                          | _ if secure => What::Tls(format!("{:?}", e)),
                                          | _ => What::SockError(format!("{:?}", e)),
                                        };
                                        When::Connect.what(what)
                                      })?;
    }

    self.state = State::Connected;
    log::debug!(target: "tadpole", "client connected to {:?}", self.peer);
    Ok(())
  }

  /// Forget every pending request and observation; their callbacks
  /// are dropped without being called.
  ///
  /// Does nothing unless the client is connected.
  pub fn disconnect(&mut self) -> Result<(), Error> {
    if self.state != State::Connected {
      return Ok(());
    }

    self.exchanges.clear();
    self.observations.clear();
    self.state = State::Configured;
    log::debug!(target: "tadpole", "client disconnected from {:?}", self.peer);
    Ok(())
  }

  /// Disconnect and release the socket. Safe in any state.
  pub fn destroy_client(&mut self) -> Result<(), Error> {
    self.disconnect()?;
    self.sock = None;

    if self.state != State::Closed {
      log::debug!(target: "tadpole", "client destroyed");
    }

    self.state = State::Closed;
    Ok(())
  }

  /// Send a request to `path` on the server.
  ///
  /// The message id is always assigned by the client, and a token is
  /// generated when `msg` has none. `on_complete` receives the response
  /// (or why there is none) during a later [`Client::poll`].
  ///
  /// Yields the request's token.
  pub fn send_message(&mut self,
                      path: &str,
                      mut msg: Message,
                      on_complete: impl FnOnce(Delivery) + 'static)
                      -> Result<Token, Error> {
    self.require(When::SendMessage, &[State::Connected])?;

    if matches!(msg.ty, Type::Ack | Type::Reset) {
      return Err(When::SendMessage.what(What::BadArgs(format!("requests may not be {}",
                                                              msg.ty.as_str()))));
    }

    if msg.code.kind() != CodeKind::Request {
      return Err(When::SendMessage.what(What::BadArgs(format!("{} is not a request code", msg.code))));
    }

    msg.set_path(path);
    msg.id = self.next_id();
    if msg.token.0.is_empty() {
      msg.token = self.next_token();
    }

    self.start(When::SendMessage, msg, Kind::Plain(Box::new(on_complete)))
  }

  /// Observe `path` on the server.
  ///
  /// `on_notify` receives the registration's response followed by
  /// every notification, until the server answers with an error or
  /// the observation is cancelled. `token` is generated when `None`.
  ///
  /// Yields the observation's token.
  pub fn observe(&mut self,
                 path: &str,
                 ty: Type,
                 on_notify: impl FnMut(Delivery) + 'static,
                 mut options: Vec<(OptNumber, OptionValue)>,
                 token: Option<&[u8]>)
                 -> Result<Token, Error> {
    self.require(When::Observe, &[State::Connected])?;

    if matches!(ty, Type::Ack | Type::Reset) {
      return Err(When::Observe.what(What::BadArgs(format!("requests may not be {}", ty.as_str()))));
    }

    let token = match token {
      | Some(t) => Token::try_from_slice(t).ok_or_else(|| {
                                             When::Observe.what(What::BadArgs(format!("token is {} bytes, at most 8 allowed",
                                                                                      t.len())))
                                           })?,
      | None => self.next_token(),
    };

    if self.observations.iter().any(|o| o.token == token) {
      return Err(When::Observe.what(What::BadArgs("token is already used by another observation".into())));
    }

    options.retain(|(n, _)| *n != known::OBSERVE && *n != known::URI_PATH);
    options.push((known::OBSERVE, OptionValue::Uint(0)));
    options.extend(path.split('/')
                       .filter(|seg| !seg.is_empty())
                       .map(|seg| (known::URI_PATH, OptionValue::from(seg))));

    let id = self.next_id();
    let msg = build_message(ty, token.as_bytes(), id, Method::GET.code(), vec![], options)
              .map_err(|e| When::Observe.what(What::BadArgs(e.to_string())))?;

    self.observations.push(Observation { path: msg.path().unwrap_or_default(),
                                         token,
                                         on_notify: Box::new(on_notify),
                                         established: false });

    self.start(When::Observe, msg, Kind::Register)
  }

  /// Stop observing `path`.
  ///
  /// The observation's callback is dropped immediately; the server is
  /// told to deregister with a GET carrying Observe=1, whose outcome is
  /// passed to `on_complete`.
  pub fn cancel_observe(&mut self,
                        path: &str,
                        token: &[u8],
                        on_complete: impl FnOnce(Delivery) + 'static)
                        -> Result<(), Error> {
    self.require(When::CancelObserve, &[State::Connected])?;

    let path = normalize_path(path);

    let ix = self.observations
                 .iter()
                 .position(|o| o.path == path && o.token.as_bytes() == token)
                 .ok_or_else(|| {
                   When::CancelObserve.what(What::NotFound(format!("observation of /{}", path)))
                 })?;

    let obs = self.observations.remove(ix);
    self.exchanges
        .retain(|x| !(matches!(x.kind, Kind::Register) && x.token == obs.token));

    let mut msg = Message::new(Type::Con, Method::GET.code(), self.next_id(), obs.token);
    msg.set_path(&path);
    msg.set_uint(known::OBSERVE, 1)
       .map_err(|e| When::CancelObserve.what(What::BadArgs(e.to_string())))?;

    log::debug!(target: "tadpole", "cancelling observation of /{}", path);
    self.start(When::CancelObserve, msg, Kind::Deregister(Box::new(on_complete)))
        .map(|_| ())
  }

  fn start(&mut self, when: When, msg: Message, kind: Kind) -> Result<Token, Error> {
    let now = self.now(when)?;
    let (id, token, con) = (msg.id, msg.token, msg.ty == Type::Con);

    log::trace!(target: "tadpole", "-> {:?} {}", self.peer, msg_summary(&msg));
    let bytes = msg.try_into_bytes().map_err(|e| when.what(e.into()))?;

    let timer = if con {
      RetryTimer::new(now,
                      self.config.msg.con.unacked_retry_strategy,
                      self.config.msg.con.max_attempts)
    } else {
      RetryTimer::new(now,
                      self.config.msg.non.retry_strategy,
                      self.config.msg.non.max_attempts)
    };

    let (sent, failed) = match (self.sock.as_ref(), self.peer) {
      | (Some(sock), Some(peer)) => match transmit(sock, peer, &bytes) {
        | Ok(sent) => (sent, None),
        | Err(e) => (false, Some(e)),
      },
      | _ => (false, Some(DeliveryError::NotDeliverable)),
    };

    self.exchanges.push(Exchange { id,
                                   token,
                                   con,
                                   bytes,
                                   sent,
                                   acked: false,
                                   failed,
                                   timer,
                                   kind });

    Ok(token)
  }

  /// Receive and handle one datagram, then retransmit or give up
  /// on requests whose timers have elapsed. Every callback runs here.
  ///
  /// Yields `WouldBlock` when nothing was received.
  pub fn poll(&mut self) -> nb::Result<(), Error> {
    self.require(When::Polling, &[State::Connected])
        .map_err(nb::Error::Other)?;
    let now = self.now(When::Polling).map_err(nb::Error::Other)?;

    let dgram = match self.sock.as_ref() {
      | Some(sock) => sock.poll(self.config.dgram_size)
                          .map_err(|e| nb::Error::Other(Error::from_socket::<S>(When::Polling, e)))?,
      | None => None,
    };

    let received = dgram.is_some();
    if let Some(dgram) = dgram {
      self.handle(dgram, now);
    }

    self.tick(now);

    if received {
      Ok(())
    } else {
      Err(nb::Error::WouldBlock)
    }
  }

  fn handle(&mut self, Addrd(bytes, addr): Addrd<Vec<u8>>, now: Instant<C>) {
    if Some(addr) != self.peer {
      log::warn!(target: "tadpole", "<- {} ignoring datagram from unknown peer", addr);
      return;
    }

    let parsed = match parse_message(&bytes) {
      | Ok(p) => p,
      | Err(e) => {
        log::warn!(target: "tadpole", "<- {} unparseable message: {}", addr, e);
        return;
      },
    };

    for skipped in &parsed.skipped {
      log::warn!(target: "tadpole", "<- {} skipped option {}: {}", addr, skipped.opt.number, skipped.error);
    }

    let msg = parsed.message;
    log::trace!(target: "tadpole", "<- {} {}", addr, msg_summary(&msg));

    match (msg.ty, msg.code.kind()) {
      | (Type::Reset, _) => match self.exchanges.iter().position(|x| x.id == msg.id) {
        | Some(ix) => self.resolve(ix, Err(DeliveryError::Rst)),
        | None => log::debug!(target: "tadpole", "<- {} reset for unknown message {:?}", addr, msg.id),
      },
      | (Type::Ack, CodeKind::Empty) => self.on_empty_ack(msg.id, now),
      | (Type::Ack, CodeKind::Response) => match self.exchanges.iter().position(|x| x.id == msg.id) {
        | Some(ix) => self.resolve(ix, Ok(msg)),
        | None => log::debug!(target: "tadpole", "<- {} ack for unknown message {:?}", addr, msg.id),
      },
      | (Type::Con, CodeKind::Response) | (Type::Non, CodeKind::Response) => self.on_response(msg),
      | (Type::Con, _) => {
        log::warn!(target: "tadpole", "<- {} unexpected {} message; resetting", addr, msg.code);
        self.reply(msg.reset());
      },
      | _ => log::warn!(target: "tadpole", "<- {} ignoring {:?} {}", addr, msg.ty, msg.code),
    }
  }

  fn on_empty_ack(&mut self, id: Id, now: Instant<C>) {
    let strategy = self.config.msg.con.acked_retry_strategy;
    let max_attempts = self.config.msg.con.max_attempts;

    match self.exchanges.iter_mut().find(|x| x.id == id) {
      | Some(x) if !x.acked => {
        x.acked = true;
        x.timer = RetryTimer::new(now, strategy, max_attempts);
      },
      | Some(_) => (),
      | None => log::debug!(target: "tadpole", "ack for unknown message {:?}", id),
    }
  }

  fn on_response(&mut self, msg: Message) {
    let notification = msg.observe().is_some();
    let exchange = self.exchanges.iter().position(|x| {
                                      x.token == msg.token
                                      && !(notification && matches!(x.kind, Kind::Deregister(_)))
                                    });
    let observation = self.observations
                          .iter()
                          .position(|o| o.established && o.token == msg.token);

    if exchange.is_none() && observation.is_none() {
      if msg.ty == Type::Con {
        log::warn!(target: "tadpole", "unmatched {} response; resetting", msg.code);
        self.reply(msg.reset());
      } else {
        log::warn!(target: "tadpole", "ignoring unmatched {} response", msg.code);
      }
      return;
    }

    if msg.ty == Type::Con {
      self.reply(msg.ack());
    }

    match (exchange, observation) {
      | (Some(ix), _) => self.resolve(ix, Ok(msg)),
      | (None, Some(ix)) => self.notify(ix, Ok(msg)),
      | (None, None) => (),
    }
  }

  fn reply(&self, msg: Message) {
    if let (Some(sock), Some(peer)) = (self.sock.as_ref(), self.peer) {
      log::trace!(target: "tadpole", "-> {} {}", peer, msg_summary(&msg));
      match msg.try_into_bytes() {
        | Ok(bytes) => {
          transmit(sock, peer, &bytes).ok();
        },
        | Err(e) => log::error!(target: "tadpole", "reply could not be serialized: {}", e),
      }
    }
  }

  /// Deliver a response (or failure) to an observation, dropping the
  /// observation unless it is still alive afterwards
  fn notify(&mut self, ix: usize, delivery: Delivery) {
    let alive = matches!(&delivery, Ok(rep) if rep.code.is_success() && rep.observe().is_some());

    if let Some(obs) = self.observations.get_mut(ix) {
      obs.established = alive;
      (obs.on_notify)(delivery);
    }

    if !alive && ix < self.observations.len() {
      let obs = self.observations.remove(ix);
      log::debug!(target: "tadpole", "observation of /{} ended", obs.path);
    }
  }

  fn resolve(&mut self, ix: usize, delivery: Delivery) {
    let x = self.exchanges.remove(ix);

    match x.kind {
      | Kind::Plain(on_complete) | Kind::Deregister(on_complete) => on_complete(delivery),
      | Kind::Register => match self.observations.iter().position(|o| o.token == x.token) {
        | Some(obs) => self.notify(obs, delivery),
        | None => log::debug!(target: "tadpole", "registration finished for a cancelled observation"),
      },
    }
  }

  fn tick(&mut self, now: Instant<C>) {
    let mut done = Vec::new();

    if let (Some(sock), Some(peer)) = (self.sock.as_ref(), self.peer) {
      for x in self.exchanges.iter_mut() {
        if let Some(e) = x.failed {
          done.push((x.id, e));
          continue;
        }

        if !x.sent {
          match transmit(sock, peer, &x.bytes) {
            | Ok(sent) => x.sent = sent,
            | Err(e) => done.push((x.id, e)),
          }
          continue;
        }

        match x.timer.what_should_i_do(now) {
          | Ok(YouShould::Retry) if !x.acked => {
            log::debug!(target: "tadpole",
                        "retransmitting {:?} (attempt {})",
                        x.id,
                        x.timer.attempts().0);
            if let Err(e) = transmit(sock, peer, &x.bytes) {
              done.push((x.id, e));
            }
          },
          | Ok(YouShould::Retry) => (),
          | Ok(YouShould::Cry) => {
            log::warn!(target: "tadpole", "giving up on {:?}{}", x.id, if x.con { "" } else { " (NON)" });
            done.push((x.id, DeliveryError::TooManyRetries));
          },
          | Err(nb::Error::WouldBlock) => (),
          | Err(nb::Error::Other(never)) => match never {},
        }
      }
    }

    for (id, e) in done {
      if let Some(ix) = self.exchanges.iter().position(|x| x.id == id) {
        self.resolve(ix, Err(e));
      }
    }
  }
}

impl<S: Socket, C: Clock> Drop for Client<S, C> {
  fn drop(&mut self) {
    self.destroy_client().ok();
  }
}
