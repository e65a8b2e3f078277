use std::net::SocketAddr;

use tadpole_msg::known::{self, ContentFormat};
use tadpole_msg::{encode_option, Id, Message, Opt, OptionValue, Payload, Token, Type};

use super::observe::Observer;
use super::resource::{normalize_path, Resource};
use crate::error::What;
use crate::net::Addrd;
use crate::req::{Method, Req};
use crate::resp::{code, Resp};

const WELL_KNOWN_CORE: &str = ".well-known/core";

/// The resources of a server and the clients observing them.
///
/// The registry knows nothing of sockets: dispatching a request or
/// notifying observers yields the messages to send.
///
/// ```
/// use tadpole::msg::{Code, Id, Message, Token, Type};
/// use tadpole::net::Addrd;
/// use tadpole::resp::{code, Resp};
/// use tadpole::server::{Registry, Resource};
///
/// let mut registry = Registry::new(16, Id(100));
/// registry.register(Resource::new("status").get(|_| Resp::content("ok")))
///         .unwrap();
///
/// let mut req = Message::new(Type::Non, Code::new(0, 1), Id(1), Token::default());
/// req.set_path("status");
///
/// let resp = registry.dispatch(Addrd(req, "127.0.0.1:40000".parse().unwrap()));
/// assert_eq!(resp.data().code, code::CONTENT);
/// assert_eq!(resp.data().payload.0, b"ok");
/// ```
pub struct Registry {
  resources: Vec<Resource>,
  observers: Vec<Observer>,
  max_observers: usize,
  next_id: Id,
}

impl core::fmt::Debug for Registry {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Registry")
     .field("resources", &self.resources)
     .field("observers", &self.observers.len())
     .field("max_observers", &self.max_observers)
     .finish()
  }
}

impl Registry {
  /// Create an empty registry.
  ///
  /// Messages the registry originates (NON responses and notifications)
  /// are numbered from `first_id`.
  pub fn new(max_observers: usize, first_id: Id) -> Self {
    Self { resources: Vec::new(),
           observers: Vec::new(),
           max_observers,
           next_id: first_id }
  }

  fn next_id(&mut self) -> Id {
    let id = self.next_id;
    self.next_id = id.next();
    id
  }

  /// Add a resource; its path must not be taken
  pub fn register(&mut self, resource: Resource) -> Result<(), What> {
    if self.resource(resource.path()).is_some() {
      return Err(What::BadArgs(format!("resource /{} already registered", resource.path())));
    }

    log::debug!(target: "tadpole", "registered /{}", resource.path());
    self.resources.push(resource);
    Ok(())
  }

  /// Remove a resource.
  ///
  /// Its observers are dropped; the returned messages tell each of
  /// them that the resource is gone (4.04).
  pub fn remove(&mut self, path: &str) -> Result<Vec<Addrd<Message>>, What> {
    let path = normalize_path(path);
    let ix = self.resources
                 .iter()
                 .position(|r| r.path() == path)
                 .ok_or_else(|| What::NotFound(format!("resource /{}", path)))?;
    let resource = self.resources.remove(ix);

    let (gone, kept) = core::mem::take(&mut self.observers).into_iter()
                                                           .partition::<Vec<_>, _>(|o| o.path == path);
    self.observers = kept;

    log::debug!(target: "tadpole", "removed /{}, dropping {} observers", path, gone.len());

    Ok(gone.into_iter()
           .map(|o| {
             let id = self.next_id();
             let msg = Message::new(resource.notification_type(), code::NOT_FOUND, id, o.token);
             Addrd(msg, o.addr)
           })
           .collect())
  }

  /// Get a resource by path
  pub fn resource(&self, path: &str) -> Option<&Resource> {
    let path = normalize_path(path);
    self.resources.iter().find(|r| r.path() == path)
  }

  fn resource_mut(&mut self, path: &str) -> Option<&mut Resource> {
    self.resources.iter_mut().find(|r| r.path() == path)
  }

  /// Paths of every resource, in registration order
  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.resources.iter().map(|r| r.path())
  }

  /// Observers of a resource
  pub fn observers<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Observer> {
    self.observers.iter().filter(move |o| o.path == path)
  }

  /// Drop every observer, without telling them
  pub fn clear_observers(&mut self) {
    self.observers.clear();
  }

  /// All resources in CoRE link format
  pub fn well_known_core(&self) -> String {
    self.resources
        .iter()
        .map(Resource::link)
        .collect::<Vec<_>>()
        .join(",")
  }

  /// Answer a request.
  ///
  /// - 4.00 if the path is not UTF-8
  /// - 4.02 if the request carries a critical option this crate does not know
  /// - `GET /.well-known/core` lists the resources, unless a resource claims that path
  /// - 4.04 if no resource has the path
  /// - 4.05 if the method is not one of the four methods or the resource has no handler for it
  /// - otherwise the handler's response
  ///
  /// A CON request is answered with a piggybacked ACK, a NON request with a NON.
  ///
  /// GET requests carrying Observe on observable resources (un)register the sender.
  pub fn dispatch(&mut self, req: Addrd<Message>) -> Addrd<Message> {
    let Addrd(msg, addr) = req;
    let resp = self.respond(&msg, addr);
    let id = match msg.ty {
      | Type::Con => msg.id,
      | _ => self.next_id(),
    };

    let ty = match msg.ty {
      | Type::Con => Type::Ack,
      | _ => Type::Non,
    };

    Addrd(to_message(ty, id, msg.token, resp), addr)
  }

  fn respond(&mut self, msg: &Message, addr: SocketAddr) -> Resp {
    let path = match msg.path() {
      | Ok(p) => p,
      | Err(_) => return Resp::new(code::BAD_REQUEST).payload("Uri-Path is not UTF-8"),
    };

    if let Some(opt) = msg.opts
                          .iter()
                          .find(|o| o.number.is_critical() && known::kind_of(o.number).is_none())
    {
      return Resp::new(code::BAD_OPTION).payload(format!("unrecognized critical option {}", opt.number));
    }

    let method = Method::from_code(msg.code);

    if path == WELL_KNOWN_CORE && method == Some(Method::GET) && self.resource(&path).is_none() {
      return Resp::content(self.well_known_core()).content_format(ContentFormat::LinkFormat);
    }

    let resource = match self.resource(&path) {
      | Some(r) => r,
      | None => {
        log::debug!(target: "tadpole", "{} /{}: not found", msg.code, path);
        return Resp::new(code::NOT_FOUND);
      },
    };

    let (method, handler) = match method.and_then(|m| resource.handler(m).map(|h| (m, h))) {
      | Some(found) => found,
      | None => {
        log::debug!(target: "tadpole", "{} /{}: method not allowed", msg.code, path);
        return Resp::new(code::METHOD_NOT_ALLOWED);
      },
    };

    let mut resp = handler(&Req::new(msg.clone(), addr));

    if method == Method::GET && resource.is_observable() {
      match msg.observe() {
        | Some(0) if resp.code().is_success() => {
          if self.observe(&path, addr, msg) {
            if let Some(r) = self.resource_mut(&path) {
              resp.add_option(known::OBSERVE, OptionValue::Uint(r.next_seq() as u64));
            }
          }
        },
        | Some(1) => {
          self.observers.retain(|o| !o.is(&path, msg.token, addr));
        },
        | _ => (),
      }
    }

    resp
  }

  /// Remember an observer, returning whether it was accepted
  fn observe(&mut self, path: &str, addr: SocketAddr, msg: &Message) -> bool {
    self.observers.retain(|o| !o.is(path, msg.token, addr));

    if self.observers(path).count() >= self.max_observers {
      log::warn!(target: "tadpole", "/{} already has {} observers; not registering {}", path, self.max_observers, addr);
      return false;
    }

    log::debug!(target: "tadpole", "{} observes /{}", addr, path);
    self.observers.push(Observer { path: path.to_string(),
                                   token: msg.token,
                                   addr,
                                   request: msg.clone() });
    true
  }

  /// Re-run the GET handler of a resource for each of its observers,
  /// yielding one notification per observer.
  ///
  /// Notifications are sent as the resource's notification type and
  /// carry the observer's token and the next sequence number.
  ///
  /// A handler answering with anything but 2.xx ends the observation:
  /// that notification carries no Observe option and the observer is dropped.
  pub fn notify(&mut self, path: &str) -> Result<Vec<Addrd<Message>>, What> {
    let path = normalize_path(path);
    let resource = self.resource(&path)
                       .ok_or_else(|| What::NotFound(format!("resource /{}", path)))?;
    let ty = resource.notification_type();

    let resps = match resource.handler(Method::GET) {
      | Some(get) => self.observers(&path)
                         .map(|o| {
                           (o.token, o.addr, get(&Req::new(o.request.clone(), o.addr)))
                         })
                         .collect::<Vec<_>>(),
      | None => Vec::new(),
    };

    Ok(resps.into_iter()
            .map(|(token, addr, mut resp)| {
              if resp.code().is_success() {
                let seq = self.resource_mut(&path).map(|r| r.next_seq()).unwrap_or(0);
                resp.add_option(known::OBSERVE, OptionValue::Uint(seq as u64));
              } else {
                log::debug!(target: "tadpole", "/{} answered {}; {} no longer observes it", path, resp.code(), addr);
                self.cancel_observer(&path, token, addr);
              }

              let id = self.next_id();
              Addrd(to_message(ty, id, token, resp), addr)
            })
            .collect())
  }

  /// Drop the observers of `path` whose registration used `token`,
  /// yielding how many there were
  pub fn cancel_observe(&mut self, path: &str, token: Token) -> usize {
    let path = normalize_path(path);
    let before = self.observers.len();
    self.observers
        .retain(|o| !(o.path == path && o.token == token));
    before - self.observers.len()
  }

  /// Drop one observer
  pub fn cancel_observer(&mut self, path: &str, token: Token, addr: SocketAddr) -> bool {
    let before = self.observers.len();
    self.observers.retain(|o| !o.is(path, token, addr));
    before != self.observers.len()
  }
}

/// Build the message for a handler's response.
///
/// An option the handler set that cannot be encoded turns the
/// response into a 5.00 carrying the error text.
fn to_message(ty: Type, id: Id, token: Token, resp: Resp) -> Message {
  let (code, payload, opts) = resp.into_parts();

  let encoded = opts.into_iter()
                    .map(|(number, value)| {
                      encode_option(number, &value).map(|value| Opt { number, value })
                    })
                    .collect::<Result<Vec<_>, _>>();

  let mut msg = Message::new(ty, code, id, token);
  match encoded {
    | Ok(opts) => {
      msg.opts = opts;
      msg.payload = Payload(payload);
    },
    | Err(e) => {
      log::error!(target: "tadpole", "response could not be built: {}", e);
      msg.code = code::INTERNAL_SERVER_ERROR;
      msg.payload = Payload(e.to_string().into_bytes());
    },
  }

  msg
}

#[cfg(test)]
mod test {
  use tadpole_msg::{Code, OptValue};

  use super::*;

  fn addr() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
  }

  fn req(ty: Type, code: Code, path: &str) -> Message {
    let mut msg = Message::new(ty, code, Id(7), Token::try_from_slice(&[1, 2]).unwrap());
    msg.set_path(path);
    msg
  }

  fn get(path: &str) -> Message {
    req(Type::Con, Method::GET.code(), path)
  }

  fn observe(path: &str, token: u8) -> Message {
    let mut msg = get(path);
    msg.token = Token::try_from_slice(&[token]).unwrap();
    msg.set_uint(known::OBSERVE, 0).unwrap();
    msg
  }

  fn registry() -> Registry {
    let mut r = Registry::new(2, Id(100));
    r.register(Resource::new("status").get(|_| Resp::content("ok")))
     .unwrap();
    r.register(Resource::new("temp").observable(true)
                                    .attribute("rt", "temperature")
                                    .get(|_| Resp::content("23.5")))
     .unwrap();
    r
  }

  #[test]
  fn duplicate_paths_rejected() {
    let mut r = registry();
    assert!(matches!(r.register(Resource::new("/status/")),
                     Err(What::BadArgs(_))));
  }

  #[test]
  fn handler_response_piggybacked() {
    let mut r = registry();
    let Addrd(resp, to) = r.dispatch(Addrd(get("status"), addr()));

    assert_eq!(to, addr());
    assert_eq!(resp.ty, Type::Ack);
    assert_eq!(resp.id, Id(7));
    assert_eq!(resp.token.as_bytes(), &[1, 2]);
    assert_eq!(resp.code, code::CONTENT);
    assert_eq!(resp.payload.0, b"ok");
  }

  #[test]
  fn non_request_gets_non_response() {
    let mut r = registry();
    let resp = r.dispatch(Addrd(req(Type::Non, Method::GET.code(), "status"), addr()));

    assert_eq!(resp.data().ty, Type::Non);
    assert_eq!(resp.data().id, Id(100));
  }

  #[test]
  fn not_found() {
    let mut r = registry();
    let resp = r.dispatch(Addrd(get("nope"), addr()));
    assert_eq!(resp.data().code, code::NOT_FOUND);
  }

  #[test]
  fn method_not_allowed() {
    let mut r = registry();

    let put = r.dispatch(Addrd(req(Type::Con, Method::PUT.code(), "status"), addr()));
    assert_eq!(put.data().code, code::METHOD_NOT_ALLOWED);

    let fetch = r.dispatch(Addrd(req(Type::Con, Code::new(0, 5), "status"), addr()));
    assert_eq!(fetch.data().code, code::METHOD_NOT_ALLOWED);
  }

  #[test]
  fn unknown_critical_option() {
    let mut r = registry();
    let mut msg = get("status");
    msg.add(tadpole_msg::OptNumber(2049), OptValue(vec![1]));

    let resp = r.dispatch(Addrd(msg, addr()));
    assert_eq!(resp.data().code, code::BAD_OPTION);

    let mut msg = get("status");
    msg.add(tadpole_msg::OptNumber(2048), OptValue(vec![1]));

    let resp = r.dispatch(Addrd(msg, addr()));
    assert_eq!(resp.data().code, code::CONTENT);
  }

  #[test]
  fn well_known_core() {
    let mut r = registry();
    let Addrd(resp, _) = r.dispatch(Addrd(get(".well-known/core"), addr()));

    assert_eq!(resp.code, code::CONTENT);
    assert_eq!(resp.content_format(), Some(ContentFormat::LinkFormat));
    assert_eq!(String::from_utf8(resp.payload.0).unwrap(),
               r#"</status>,</temp>;rt="temperature";obs"#);
  }

  #[test]
  fn observe_register_notify_deregister() {
    let mut r = registry();

    let Addrd(resp, _) = r.dispatch(Addrd(observe("temp", 9), addr()));
    assert_eq!(resp.observe(), Some(0));
    assert_eq!(r.observers("temp").count(), 1);

    // re-registering replaces
    r.dispatch(Addrd(observe("temp", 9), addr()));
    assert_eq!(r.observers("temp").count(), 1);

    let notes = r.notify("temp").unwrap();
    assert_eq!(notes.len(), 1);
    let Addrd(note, to) = &notes[0];
    assert_eq!(*to, addr());
    assert_eq!(note.ty, Type::Non);
    assert_eq!(note.token.as_bytes(), &[9]);
    assert_eq!(note.observe(), Some(2));
    assert_eq!(note.payload.0, b"23.5");

    let mut dereg = observe("temp", 9);
    dereg.set_uint(known::OBSERVE, 1).unwrap();
    r.dispatch(Addrd(dereg, addr()));

    assert_eq!(r.observers("temp").count(), 0);
    assert!(r.notify("temp").unwrap().is_empty());
  }

  #[test]
  fn observe_ignored_on_plain_resources_and_errors() {
    let mut r = registry();
    let Addrd(resp, _) = r.dispatch(Addrd(observe("status", 9), addr()));

    assert_eq!(resp.observe(), None);
    assert_eq!(r.observers("status").count(), 0);

    r.register(Resource::new("broken").observable(true)
                                      .get(|_| Resp::new(code::SERVICE_UNAVAILABLE)))
     .unwrap();
    r.dispatch(Addrd(observe("broken", 9), addr()));
    assert_eq!(r.observers("broken").count(), 0);
  }

  #[test]
  fn failing_notification_ends_observation() {
    let ok = std::rc::Rc::new(std::cell::Cell::new(true));
    let ok_get = ok.clone();

    let mut r = Registry::new(4, Id(0));
    r.register(Resource::new("door").observable(true).get(move |_| {
                                                        if ok_get.get() {
                                                          Resp::content("shut")
                                                        } else {
                                                          Resp::new(code::SERVICE_UNAVAILABLE)
                                                        }
                                                      }))
     .unwrap();
    r.dispatch(Addrd(observe("door", 4), addr()));
    assert_eq!(r.notify("door").unwrap()[0].data().observe(), Some(1));

    ok.set(false);
    let notes = r.notify("door").unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].data().code, code::SERVICE_UNAVAILABLE);
    assert_eq!(notes[0].data().observe(), None);
    assert_eq!(r.observers("door").count(), 0);

    ok.set(true);
    assert!(r.notify("door").unwrap().is_empty());
  }

  #[test]
  fn max_observers() {
    let mut r = registry();
    for token in 0..3 {
      r.dispatch(Addrd(observe("temp", token), addr()));
    }

    assert_eq!(r.observers("temp").count(), 2);
  }

  #[test]
  fn cancel_observe_by_token() {
    let mut r = registry();
    r.dispatch(Addrd(observe("temp", 1), addr()));
    r.dispatch(Addrd(observe("temp", 2), addr()));

    assert_eq!(r.cancel_observe("temp", Token::try_from_slice(&[1]).unwrap()), 1);
    assert_eq!(r.observers("temp").map(|o| o.token.as_bytes()[0]).collect::<Vec<_>>(),
               vec![2]);
    assert_eq!(r.cancel_observe("temp", Token::try_from_slice(&[1]).unwrap()), 0);
  }

  #[test]
  fn removal_notifies_observers_with_not_found() {
    let mut r = registry();
    r.dispatch(Addrd(observe("temp", 1), addr()));

    let finals = r.remove("/temp").unwrap();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].data().code, code::NOT_FOUND);
    assert_eq!(finals[0].data().token.as_bytes(), &[1]);

    assert_eq!(r.dispatch(Addrd(get("temp"), addr())).data().code, code::NOT_FOUND);
    assert!(matches!(r.notify("temp"), Err(What::NotFound(_))));
    assert!(matches!(r.remove("temp"), Err(What::NotFound(_))));
  }

  #[test]
  fn unencodable_response_option_becomes_server_error() {
    let mut r = Registry::new(1, Id(0));
    r.register(Resource::new("bad").get(|_| {
                                     Resp::content("x").option(known::CONTENT_FORMAT,
                                                               OptionValue::Uint(70_000))
                                   }))
     .unwrap();

    let Addrd(resp, _) = r.dispatch(Addrd(get("bad"), addr()));
    assert_eq!(resp.code, code::INTERNAL_SERVER_ERROR);
    assert!(!resp.payload.0.is_empty());
  }
}
