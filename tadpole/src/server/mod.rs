use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::rc::Rc;

use tadpole_msg::codec::parse_message;
use tadpole_msg::{CodeKind, Id, Message, Token, TryIntoBytes, Type};

/// Resources
pub mod resource;

/// Observers
pub mod observe;

/// Resource table & dispatch
pub mod registry;

#[doc(inline)]
pub use observe::Observer;
#[doc(inline)]
pub use registry::Registry;
#[doc(inline)]
pub use resource::{Handler, Resource};

use crate::config::Config;
use crate::error::{Error, What, When};
use crate::logging::msg_summary;
use crate::net::{Addrd, PskVerifier, Socket};
use crate::session::{SessionConfig, State};

/// Longest a CON notification is remembered while waiting for its ACK or RST
const MAX_PENDING_NOTIFICATIONS: usize = 64;

/// Queue of resources whose observers should be notified.
///
/// Handlers run while the server is busy dispatching, so they cannot
/// call [`Server::notify_resource_changed`] themselves; they push the
/// path onto a notifier instead, and the server notifies once the
/// current dispatch is over.
///
/// ```
/// use tadpole::net::loopback::Loopback;
/// use tadpole::resp::{code, Resp};
/// use tadpole::server::{Resource, Server};
/// use tadpole::session::SessionConfig;
///
/// let mut server = Server::<Loopback>::new(SessionConfig::default());
/// let notifier = server.notifier();
///
/// let led = Resource::new("led").put(move |_| {
///                                 notifier.notify("led/state");
///                                 Resp::new(code::CHANGED)
///                               });
/// # drop(led);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Notifier(Rc<RefCell<VecDeque<String>>>);

impl Notifier {
  /// Notify the observers of `path` after the current dispatch.
  ///
  /// A path already waiting is not queued twice.
  pub fn notify(&self, path: impl AsRef<str>) {
    let path = resource::normalize_path(path.as_ref());
    let mut queue = self.0.borrow_mut();
    if !queue.contains(&path) {
      queue.push_back(path);
    }
  }

  /// Everything queued so far; paths queued while these are being
  /// notified wait for the next poll
  fn take(&self) -> VecDeque<String> {
    core::mem::take(&mut *self.0.borrow_mut())
  }
}

#[derive(Debug, Clone)]
struct PendingNotification {
  id: Id,
  addr: SocketAddr,
  path: String,
  token: Token,
}

/// A CoAP server
///
/// ```text
/// new -> create_server -> init_resources -> start_server -> poll ... -> stop_server -> destroy_server
/// ```
pub struct Server<S: Socket> {
  session: SessionConfig,
  config: Config,
  state: State,
  sock: Option<S>,
  registry: Registry,
  notifier: Notifier,
  pending: VecDeque<PendingNotification>,
}

impl<S: Socket> core::fmt::Debug for Server<S> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Server")
     .field("session", &self.session)
     .field("config", &self.config)
     .field("state", &self.state)
     .field("local_addr", &self.local_addr())
     .field("registry", &self.registry)
     .finish()
  }
}

impl<S: Socket> Server<S> {
  /// Create a server with the default [`Config`]
  pub fn new(session: SessionConfig) -> Self {
    Self::with_config(session, Config::default())
  }

  /// Create a server
  pub fn with_config(session: SessionConfig, config: Config) -> Self {
    Self { session,
           config,
           state: State::Created,
           sock: None,
           registry: Registry::new(config.max_observers, Id(config.msg.token_seed)),
           notifier: Notifier::default(),
           pending: VecDeque::new() }
  }

  /// Where the server is in its lifecycle
  pub fn state(&self) -> State {
    self.state
  }

  /// The address the server is bound to, once created
  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.sock.as_ref().and_then(|s| s.local_addr().ok())
  }

  /// The resources & observers
  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// A handle resource handlers can use to trigger notifications
  pub fn notifier(&self) -> Notifier {
    self.notifier.clone()
  }

  fn require(&self, when: When, allowed: &[State]) -> Result<(), Error> {
    if allowed.contains(&self.state) {
      Ok(())
    } else {
      Err(when.what(What::BadState(self.state)))
    }
  }

  /// Bind the server's socket on the configured port (see [`SessionConfig::port`])
  pub fn create_server(&mut self) -> Result<(), Error> {
    self.require(When::CreateServer, &[State::Created])?;
    self.session
        .check()
        .map_err(|e| When::CreateServer.what(e.what))?;

    let sock = S::bind_raw(("0.0.0.0", self.session.port())).map_err(|e| {
                                                               Error::from_socket::<S>(When::CreateServer, e)
                                                             })?;

    self.sock = Some(sock);
    self.state = State::Configured;
    log::debug!(target: "tadpole", "server bound to {:?}", self.local_addr());
    Ok(())
  }

  /// Register resources.
  ///
  /// Either all of them are registered, or (if any path is taken or
  /// repeated) none are.
  pub fn init_resources(&mut self, resources: Vec<Resource>) -> Result<(), Error> {
    self.require(When::InitResources, &[State::Configured, State::Listening])?;

    let mut paths = resources.iter().map(Resource::path).collect::<Vec<_>>();
    paths.sort_unstable();
    let dup = paths.windows(2)
                   .find(|w| w[0] == w[1])
                   .map(|w| w[0])
                   .or_else(|| paths.iter().copied().find(|p| self.registry.resource(p).is_some()));

    if let Some(path) = dup {
      return Err(When::InitResources.what(What::BadArgs(format!("resource /{} registered twice", path))));
    }

    resources.into_iter()
             .try_for_each(|r| self.registry.register(r))
             .map_err(|e| When::InitResources.what(e))
  }

  /// Unregister a resource.
  ///
  /// Requests for it are answered with 4.04 from now on, and its
  /// observers receive a final 4.04 notification.
  pub fn remove_resource(&mut self, path: &str) -> Result<(), Error> {
    self.require(When::RemoveResource, &[State::Configured, State::Listening])?;

    let finals = self.registry
                     .remove(path)
                     .map_err(|e| When::RemoveResource.what(e))?;

    finals.into_iter().for_each(|msg| self.send(msg));
    Ok(())
  }

  /// Start accepting requests.
  ///
  /// `verify_psk` is consulted for every incoming PSK handshake; without
  /// it, the statically configured [`Psk`](crate::ssl::Psk) (if any) is
  /// the only identity accepted. A session with `verify_psk` set
  /// requires the callback.
  pub fn start_server(&mut self, verify_psk: Option<PskVerifier>) -> Result<(), Error> {
    self.require(When::StartServer, &[State::Configured])?;

    let verifier = match (verify_psk, &self.session.psk) {
      | (Some(cb), _) => Some(cb),
      | (None, _) if self.session.verify_psk => {
        return Err(When::StartServer.what(What::BadArgs("verify_psk is set but no verifier was given".into())));
      },
      | (None, Some(psk)) => {
        let psk = psk.clone();
        let check: PskVerifier = Rc::new(move |identity: &[u8], key: &mut [u8]| {
          if identity == psk.identity.as_slice() && key.len() >= psk.psk.len() {
            key[..psk.psk.len()].copy_from_slice(&psk.psk);
            psk.psk.len()
          } else {
            0
          }
        });
        Some(check)
      },
      | (None, None) => None,
    };

    if let Some(sock) = self.sock.as_mut() {
      if verifier.is_some() {
        sock.set_psk_verifier(verifier)
            .map_err(|e| When::StartServer.what(What::Tls(format!("{:?}", e))))?;
      }
    }

    self.state = State::Listening;
    log::debug!(target: "tadpole", "server listening on {:?}", self.local_addr());
    Ok(())
  }

  /// Stop accepting requests; observers are forgotten.
  ///
  /// Does nothing unless the server is listening.
  pub fn stop_server(&mut self) -> Result<(), Error> {
    if self.state != State::Listening {
      return Ok(());
    }

    if let Some(sock) = self.sock.as_mut() {
      if let Err(e) = sock.set_psk_verifier(None) {
        log::warn!(target: "tadpole", "removing PSK verifier failed: {:?}", e);
      }
    }

    self.registry.clear_observers();
    self.pending.clear();
    self.state = State::Configured;
    log::debug!(target: "tadpole", "server stopped");
    Ok(())
  }

  /// Release the socket and every resource. Safe in any state.
  pub fn destroy_server(&mut self) -> Result<(), Error> {
    self.stop_server()?;
    self.sock = None;
    self.registry = Registry::new(self.config.max_observers, Id(self.config.msg.token_seed));
    self.pending.clear();

    if self.state != State::Closed {
      log::debug!(target: "tadpole", "server destroyed");
    }

    self.state = State::Closed;
    Ok(())
  }

  /// Send every observer of `path` a fresh representation,
  /// yielding how many notifications were sent
  pub fn notify_resource_changed(&mut self, path: &str) -> Result<usize, Error> {
    self.require(When::NotifyResourceChanged, &[State::Listening])?;
    self.notify(path)
        .map_err(|e| When::NotifyResourceChanged.what(e))
  }

  fn notify(&mut self, path: &str) -> Result<usize, What> {
    let notes = self.registry.notify(path)?;
    let n = notes.len();

    for note in notes {
      if note.data().ty == Type::Con {
        if self.pending.len() >= MAX_PENDING_NOTIFICATIONS {
          self.pending.pop_front();
        }

        self.pending.push_back(PendingNotification { id: note.data().id,
                                                     addr: note.addr(),
                                                     path: resource::normalize_path(path),
                                                     token: note.data().token });
      }

      self.send(note);
    }

    Ok(n)
  }

  /// Forget the observers of `path` that registered with `token`,
  /// yielding how many there were
  pub fn cancel_observe(&mut self, path: &str, token: &[u8]) -> Result<usize, Error> {
    self.require(When::CancelObserve, &[State::Configured, State::Listening])?;

    let token = Token::try_from_slice(token).ok_or_else(|| {
                                              When::CancelObserve.what(What::BadArgs(format!("token is {} bytes, at most 8 allowed",
                                                                                             token.len())))
                                            })?;

    if self.registry.resource(path).is_none() {
      return Err(When::CancelObserve.what(What::NotFound(format!("resource /{}", path))));
    }

    Ok(self.registry.cancel_observe(path, token))
  }

  fn send(&self, Addrd(msg, addr): Addrd<Message>) {
    let sock = match self.sock.as_ref() {
      | Some(s) => s,
      | None => return,
    };

    log::trace!(target: "tadpole", "-> {} {}", addr, msg_summary(&msg));

    match msg.try_into_bytes() {
      | Ok(bytes) => {
        if let Err(e) = sock.send(Addrd(bytes.as_slice(), addr)) {
          log::error!(target: "tadpole", "sending to {} failed: {:?}", addr, e);
        }
      },
      | Err(e) => log::error!(target: "tadpole", "message to {} could not be serialized: {}", addr, e),
    }
  }

  /// Receive and handle one datagram, then run the notifications
  /// handlers asked for.
  ///
  /// Yields `WouldBlock` when nothing was received.
  pub fn poll(&mut self) -> nb::Result<(), Error> {
    self.require(When::Polling, &[State::Listening])
        .map_err(nb::Error::Other)?;

    let dgram = match self.sock.as_ref() {
      | Some(sock) => sock.poll(self.config.dgram_size)
                          .map_err(|e| nb::Error::Other(Error::from_socket::<S>(When::Polling, e)))?,
      | None => None,
    };

    let dgram = dgram.ok_or(nb::Error::WouldBlock)?;
    self.handle(dgram);

    for path in self.notifier.take() {
      if let Err(e) = self.notify(&path) {
        log::warn!(target: "tadpole", "queued notification for /{} failed: {}", path, e);
      }
    }

    Ok(())
  }

  fn handle(&mut self, Addrd(bytes, addr): Addrd<Vec<u8>>) {
    let parsed = match parse_message(&bytes) {
      | Ok(p) => p,
      | Err(e) => {
        log::warn!(target: "tadpole", "<- {} unparseable message: {}", addr, e);
        // a CON we cannot read is rejected, if its id can be read
        if bytes.len() >= 4 && (bytes[0] >> 4) & 0b11 == 0 {
          let id = Id::from_be_bytes([bytes[2], bytes[3]]);
          self.send(Addrd(Message::new(Type::Reset, tadpole_msg::Code::EMPTY, id, Token::default()),
                          addr));
        }
        return;
      },
    };

    for skipped in &parsed.skipped {
      log::warn!(target: "tadpole", "<- {} skipped option {}: {}", addr, skipped.opt.number, skipped.error);
    }

    let msg = parsed.message;
    log::trace!(target: "tadpole", "<- {} {}", addr, msg_summary(&msg));

    match (msg.ty, msg.code.kind()) {
      | (Type::Con, CodeKind::Empty) => self.send(Addrd(msg.reset(), addr)),
      | (Type::Reset, CodeKind::Empty) => self.on_reset(msg.id, addr),
      | (Type::Ack, CodeKind::Empty) => {
        self.pending.retain(|p| !(p.id == msg.id && p.addr == addr));
      },
      | (Type::Con, CodeKind::Request) | (Type::Non, CodeKind::Request) => {
        let resp = self.registry.dispatch(Addrd(msg, addr));
        self.send(resp);
      },
      | (Type::Con, _) => {
        log::warn!(target: "tadpole", "<- {} unexpected {} message; resetting", addr, msg.code);
        self.send(Addrd(msg.reset(), addr));
      },
      | _ => log::warn!(target: "tadpole", "<- {} ignoring {:?} {}", addr, msg.ty, msg.code),
    }
  }

  fn on_reset(&mut self, id: Id, addr: SocketAddr) {
    let ix = match self.pending.iter().position(|p| p.id == id && p.addr == addr) {
      | Some(ix) => ix,
      | None => return,
    };

    if let Some(p) = self.pending.remove(ix) {
      if self.registry.cancel_observer(&p.path, p.token, p.addr) {
        log::debug!(target: "tadpole", "{} reset a notification; no longer observing /{}", addr, p.path);
      }
    }
  }
}

impl<S: Socket> Drop for Server<S> {
  fn drop(&mut self) {
    self.destroy_server().ok();
  }
}
