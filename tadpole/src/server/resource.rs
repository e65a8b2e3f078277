use tadpole_msg::Type;

use crate::req::{Method, Req};
use crate::resp::Resp;

/// A request handler.
///
/// Runs synchronously inside [`Server::poll`](super::Server::poll) and must not block.
/// Side-effects that need the server (like notifying observers of another resource)
/// go through a [`Notifier`](super::Notifier).
pub type Handler = Box<dyn Fn(&Req) -> Resp>;

/// Highest Observe sequence number; the next one wraps to 0
const MAX_OBSERVE_SEQ: u32 = 0xFF_FFFF;

/// A resource hosted by a [`Server`](super::Server), addressed by its path
///
/// ```
/// use tadpole::msg::Type;
/// use tadpole::req::Method;
/// use tadpole::resp::{code, Resp};
/// use tadpole::server::Resource;
///
/// let temp = Resource::new("/sensors/temp/").observable(true)
///                                          .notify_with(Type::Con)
///                                          .attribute("rt", "temperature-c")
///                                          .get(|_| Resp::content("23.5"));
///
/// assert_eq!(temp.path(), "sensors/temp");
/// assert!(temp.handles(Method::GET));
/// assert!(!temp.handles(Method::PUT));
/// assert_eq!(temp.link(), r#"</sensors/temp>;rt="temperature-c";obs"#);
/// ```
pub struct Resource {
  path: String,
  observable: bool,
  notify_with: Type,
  attributes: Vec<(String, String)>,
  handlers: Vec<(Method, Handler)>,
  seq: u32,
}

impl core::fmt::Debug for Resource {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Resource")
     .field("path", &self.path)
     .field("observable", &self.observable)
     .field("notify_with", &self.notify_with)
     .field("attributes", &self.attributes)
     .field("methods",
            &self.handlers.iter().map(|(m, _)| *m).collect::<Vec<_>>())
     .finish()
  }
}

/// Strip leading, trailing and repeated `/`
pub(crate) fn normalize_path(path: &str) -> String {
  path.split('/')
      .filter(|seg| !seg.is_empty())
      .collect::<Vec<_>>()
      .join("/")
}

impl Resource {
  /// A resource at `path` with no handlers; not observable,
  /// notifications sent NON
  pub fn new(path: impl AsRef<str>) -> Self {
    Self { path: normalize_path(path.as_ref()),
           observable: false,
           notify_with: Type::Non,
           attributes: Vec::new(),
           handlers: Vec::new(),
           seq: 0 }
  }

  /// Accept observe registrations on GET
  pub fn observable(mut self, observable: bool) -> Self {
    self.observable = observable;
    self
  }

  /// Type of the notifications sent to observers (CON or NON)
  pub fn notify_with(mut self, ty: Type) -> Self {
    self.notify_with = ty;
    self
  }

  /// Add a link attribute, listed in `/.well-known/core`
  pub fn attribute(mut self, name: impl ToString, value: impl ToString) -> Self {
    self.attributes.push((name.to_string(), value.to_string()));
    self
  }

  /// Handle requests with `method`, replacing any previous handler for it
  pub fn handle(mut self, method: Method, f: impl Fn(&Req) -> Resp + 'static) -> Self {
    self.handlers.retain(|(m, _)| *m != method);
    self.handlers.push((method, Box::new(f)));
    self
  }

  /// Handle GET requests
  pub fn get(self, f: impl Fn(&Req) -> Resp + 'static) -> Self {
    self.handle(Method::GET, f)
  }

  /// Handle POST requests
  pub fn post(self, f: impl Fn(&Req) -> Resp + 'static) -> Self {
    self.handle(Method::POST, f)
  }

  /// Handle PUT requests
  pub fn put(self, f: impl Fn(&Req) -> Resp + 'static) -> Self {
    self.handle(Method::PUT, f)
  }

  /// Handle DELETE requests
  pub fn delete(self, f: impl Fn(&Req) -> Resp + 'static) -> Self {
    self.handle(Method::DELETE, f)
  }

  /// Path, without leading or trailing `/`
  pub fn path(&self) -> &str {
    &self.path
  }

  /// Does this resource accept observers?
  pub fn is_observable(&self) -> bool {
    self.observable
  }

  /// Type of the notifications sent to observers
  pub fn notification_type(&self) -> Type {
    self.notify_with
  }

  /// Link attributes
  pub fn attributes(&self) -> &[(String, String)] {
    &self.attributes
  }

  /// Is a handler bound to `method`?
  pub fn handles(&self, method: Method) -> bool {
    self.handler(method).is_some()
  }

  pub(crate) fn handler(&self, method: Method) -> Option<&Handler> {
    self.handlers
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, h)| h)
  }

  /// Next Observe sequence number (24 bits, wrapping)
  pub(crate) fn next_seq(&mut self) -> u32 {
    let seq = self.seq;
    self.seq = if seq >= MAX_OBSERVE_SEQ { 0 } else { seq + 1 };
    seq
  }

  /// This resource in CoRE link format
  pub fn link(&self) -> String {
    let mut link = format!("</{}>", self.path);

    for (name, value) in &self.attributes {
      if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        link.push_str(&format!(";{}={}", name, value));
      } else {
        link.push_str(&format!(";{}=\"{}\"", name, value));
      }
    }

    if self.observable {
      link.push_str(";obs");
    }

    link
  }
}
