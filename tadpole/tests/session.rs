use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tadpole::client::Client;
use tadpole::error::{delivery_status, Delivery, What};
use tadpole::msg::{known, Code, Id, Message, Payload, Token, Type};
use tadpole::net::loopback::Loopback;
use tadpole::resp::{code, Resp};
use tadpole::server::{Resource, Server};
use tadpole::session::{SessionConfig, State};
use tadpole::ssl::Psk;

type TestClient = Client<Loopback, tadpole::std::Clock>;

fn init_logger() {
  simple_logger::init_with_env().ok();
}

fn resources() -> Vec<Resource> {
  let led = Rc::new(Cell::new(false));
  let led_get = led.clone();

  vec![Resource::new("status").get(|_| Resp::content("ok")),
       Resource::new("led").get(move |_| Resp::content(if led_get.get() { "on" } else { "off" }))
                           .put(move |req| match req.payload() {
                             | b"on" => {
                               led.set(true);
                               Resp::new(code::CHANGED)
                             },
                             | b"off" => {
                               led.set(false);
                               Resp::new(code::CHANGED)
                             },
                             | _ => Resp::new(code::BAD_REQUEST).payload("expected on or off"),
                           }),
       Resource::new("temp").observable(true)
                            .attribute("rt", "temperature")
                            .get(|_| Resp::content("23.5"))]
}

fn server(session: SessionConfig) -> Server<Loopback> {
  init_logger();
  let mut server = Server::new(session);
  server.create_server().unwrap();
  server.init_resources(resources()).unwrap();
  server
}

fn client(port: u16, psk: Option<Psk>) -> TestClient {
  let mut client = TestClient::new(SessionConfig { uri: format!("coap://127.0.0.1:{}", port),
                                                   psk,
                                                   ..Default::default() });
  client.create_client().unwrap();
  client
}

/// Poll both ends until neither has anything left to read
fn pump(server: &mut Server<Loopback>, client: &mut TestClient) {
  loop {
    let s = server.poll().is_ok();
    let c = client.poll().is_ok();
    if !s && !c {
      break;
    }
  }
}

fn recorder() -> (Rc<RefCell<Vec<Delivery>>>, impl FnMut(Delivery) + 'static) {
  let seen = Rc::new(RefCell::new(Vec::new()));
  let seen2 = seen.clone();
  (seen, move |d| seen2.borrow_mut().push(d))
}

fn request(method: Code, payload: &[u8]) -> Message {
  let mut msg = Message::new(Type::Con, method, Id(0), Token::default());
  msg.payload = Payload(payload.to_vec());
  msg
}

#[test]
fn psk_get_status() {
  let key = [0xAAu8, 0xBB, 0xCC];
  let mut server = server(SessionConfig { port: Some(15684),
                                          psk: Some(Psk::new("dev1", key)),
                                          ..Default::default() });
  server.start_server(None).unwrap();

  let mut client = client(15684, Some(Psk::new("dev1", key)));
  client.connect().unwrap();
  assert_eq!(client.state(), State::Connected);

  let (seen, cb) = recorder();
  client.send_message("status", request(Code::new(0, 1), b""), cb)
        .unwrap();
  pump(&mut server, &mut client);

  let seen = seen.borrow();
  assert_eq!(seen.len(), 1);
  assert_eq!(delivery_status(&seen[0]), "NONE");

  let rep = seen[0].as_ref().unwrap();
  assert_eq!(rep.code.to_string(), "2.05");
  assert_eq!(rep.payload.0, b"ok");
}

#[test]
fn psk_verified_by_callback() {
  let mut server = server(SessionConfig { port: Some(15685),
                                          verify_psk: true,
                                          ..Default::default() });

  let e = server.start_server(None).unwrap_err();
  assert!(matches!(e.what, What::BadArgs(_)));

  let asked = Rc::new(RefCell::new(Vec::<Vec<u8>>::new()));
  let asked2 = asked.clone();
  server.start_server(Some(Rc::new(move |identity: &[u8], key: &mut [u8]| {
                             asked2.borrow_mut().push(identity.to_vec());
                             if identity == b"dev1" {
                               key[..2].copy_from_slice(&[1, 2]);
                               2
                             } else {
                               0
                             }
                           })))
        .unwrap();

  let mut good = client(15685, Some(Psk::new("dev1", [1u8, 2])));
  good.connect().unwrap();

  let mut stranger = client(15685, Some(Psk::new("dev2", [1u8, 2])));
  let e = stranger.connect().unwrap_err();
  assert!(matches!(e.what, What::Tls(_)));
  assert_eq!(stranger.state(), State::Configured);

  assert_eq!(*asked.borrow(), vec![b"dev1".to_vec(), b"dev2".to_vec()]);
}

#[test]
fn wrong_psk_fails_to_connect() {
  let mut server = server(SessionConfig { port: Some(15686),
                                          psk: Some(Psk::new("dev1", [0xAAu8, 0xBB, 0xCC])),
                                          ..Default::default() });
  server.start_server(None).unwrap();

  let mut client = client(15686, Some(Psk::new("dev1", [0xAAu8, 0xBB, 0xCD])));
  let e = client.connect().unwrap_err();

  assert!(matches!(e.what, What::Tls(_)));
  assert_eq!(e.code(), -4);
  assert!(e.to_string().starts_with("Failed to connect: "));
}

#[test]
fn unauthenticated_requests_are_not_delivered() {
  let mut server = server(SessionConfig { port: Some(15687),
                                          psk: Some(Psk::new("dev1", [1u8])),
                                          ..Default::default() });
  server.start_server(None).unwrap();

  // plain session against a secured server
  let mut client = client(15687, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  client.send_message("status", request(Code::new(0, 1), b""), cb)
        .unwrap();
  pump(&mut server, &mut client);

  assert_eq!(seen.borrow().len(), 1);
  assert_eq!(delivery_status(&seen.borrow()[0]), "TLS FAILED");
}

#[test]
fn put_led() {
  let mut server = server(SessionConfig { port: Some(15688),
                                          ..Default::default() });
  server.start_server(None).unwrap();
  let mut client = client(15688, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  client.send_message("led", request(Code::new(0, 3), b"on"), cb)
        .unwrap();
  pump(&mut server, &mut client);
  assert_eq!(seen.borrow()[0].as_ref().unwrap().code.to_string(), "2.04");

  let (seen, cb) = recorder();
  client.send_message("led", request(Code::new(0, 1), b""), cb)
        .unwrap();
  pump(&mut server, &mut client);
  assert_eq!(seen.borrow()[0].as_ref().unwrap().payload.0, b"on");

  let (seen, cb) = recorder();
  client.send_message("led", request(Code::new(0, 3), b"bogus"), cb)
        .unwrap();
  pump(&mut server, &mut client);
  let seen = seen.borrow();
  let rep = seen[0].as_ref().unwrap();
  assert_eq!(rep.code.to_string(), "4.00");
  assert_eq!(rep.payload.0, b"expected on or off");
}

#[test]
fn dispatch_errors_are_responses() {
  let mut server = server(SessionConfig { port: Some(15689),
                                          ..Default::default() });
  server.start_server(None).unwrap();
  let mut client = client(15689, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  client.send_message("nope", request(Code::new(0, 1), b""), cb)
        .unwrap();
  client.send_message("status", request(Code::new(0, 4), b""), |d| {
          assert_eq!(d.unwrap().code.to_string(), "4.05")
        })
        .unwrap();
  pump(&mut server, &mut client);

  assert_eq!(seen.borrow()[0].as_ref().unwrap().code.to_string(), "4.04");
  assert_eq!(client.pending(), 0);
}

#[test]
fn non_request_gets_non_response() {
  let mut server = server(SessionConfig { port: Some(15690),
                                          ..Default::default() });
  server.start_server(None).unwrap();
  let mut client = client(15690, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  let mut req = request(Code::new(0, 1), b"");
  req.ty = Type::Non;
  let token = client.send_message("status", req, cb).unwrap();
  pump(&mut server, &mut client);

  let seen = seen.borrow();
  let rep = seen[0].as_ref().unwrap();
  assert_eq!(rep.ty, Type::Non);
  assert_eq!(rep.token, token);
}

#[test]
fn well_known_core() {
  let mut server = server(SessionConfig { port: Some(15691),
                                          ..Default::default() });
  server.start_server(None).unwrap();
  let mut client = client(15691, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  client.send_message(".well-known/core", request(Code::new(0, 1), b""), cb)
        .unwrap();
  pump(&mut server, &mut client);

  let seen = seen.borrow();
  let rep = seen[0].as_ref().unwrap();
  let links = String::from_utf8(rep.payload.0.clone()).unwrap();

  assert_eq!(rep.content_format(), Some(known::ContentFormat::LinkFormat));
  assert!(links.contains("</status>"));
  assert!(links.contains("</led>"));
  assert!(links.contains("</temp>;rt=\"temperature\";obs"));
}

#[test]
fn observe_notify_then_cancel() {
  let mut server = server(SessionConfig { port: Some(15692),
                                          ..Default::default() });
  server.start_server(None).unwrap();
  let mut client = client(15692, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  let token = client.observe("temp", Type::Con, cb, vec![], None).unwrap();
  pump(&mut server, &mut client);

  assert_eq!(server.registry().observers("temp").count(), 1);
  assert_eq!(seen.borrow().len(), 1);

  assert_eq!(server.notify_resource_changed("temp").unwrap(), 1);
  pump(&mut server, &mut client);

  {
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    let note = seen[1].as_ref().unwrap();
    assert_eq!(note.token, token);
    assert_eq!(note.payload.0, b"23.5");
    assert!(note.observe().unwrap() > seen[0].as_ref().unwrap().observe().unwrap());
  }

  let (done, done_cb) = recorder();
  client.cancel_observe("temp", token.as_bytes(), done_cb)
        .unwrap();
  // sent before the server reads the deregistration
  assert_eq!(server.notify_resource_changed("temp").unwrap(), 1);
  pump(&mut server, &mut client);

  {
    let done = done.borrow();
    assert_eq!(done.len(), 1);
    let rep = done[0].as_ref().unwrap();
    assert_eq!(rep.code, code::CONTENT);
    assert_eq!(rep.observe(), None);
  }
  assert_eq!(seen.borrow().len(), 2);
  assert_eq!(server.registry().observers("temp").count(), 0);
  assert_eq!(server.notify_resource_changed("temp").unwrap(), 0);
  pump(&mut server, &mut client);

  assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn handlers_can_queue_notifications() {
  let mut server = Server::<Loopback>::new(SessionConfig { port: Some(15693),
                                                           ..Default::default() });
  server.create_server().unwrap();

  let level = Rc::new(Cell::new(0u8));
  let (level_get, notifier) = (level.clone(), server.notifier());
  server.init_resources(vec![Resource::new("level").observable(true)
                                                   .get(move |_| Resp::content(level_get.get().to_string()))
                                                   .put(move |req| {
                                                     level.set(req.payload_str()
                                                                  .ok()
                                                                  .and_then(|s| s.parse().ok())
                                                                  .unwrap_or(0));
                                                     notifier.notify("level");
                                                     Resp::new(code::CHANGED)
                                                   })])
        .unwrap();
  server.start_server(None).unwrap();

  let mut watcher = client(15693, None);
  watcher.connect().unwrap();
  let (seen, cb) = recorder();
  watcher.observe("level", Type::Non, cb, vec![], None).unwrap();
  pump(&mut server, &mut watcher);

  let mut writer = client(15693, None);
  writer.connect().unwrap();
  writer.send_message("level", request(Code::new(0, 3), b"7"), |_| ())
        .unwrap();
  pump(&mut server, &mut writer);
  pump(&mut server, &mut watcher);

  let seen = seen.borrow();
  assert_eq!(seen.len(), 2);
  assert_eq!(seen[1].as_ref().unwrap().payload.0, b"7");
}

#[test]
fn self_notifying_handler_notifies_once_per_poll() {
  let mut server = Server::<Loopback>::new(SessionConfig { port: Some(15696),
                                                           ..Default::default() });
  server.create_server().unwrap();

  let reads = Rc::new(Cell::new(0u32));
  let (reads_get, notifier) = (reads.clone(), server.notifier());
  server.init_resources(vec![Resource::new("tick").observable(true).get(move |_| {
                                                                     reads_get.set(reads_get.get() + 1);
                                                                     notifier.notify("tick");
                                                                     notifier.notify("/tick");
                                                                     Resp::content(reads_get.get().to_string())
                                                                   })])
        .unwrap();
  server.start_server(None).unwrap();

  let mut client = client(15696, None);
  client.connect().unwrap();
  let (seen, cb) = recorder();
  client.observe("tick", Type::Non, cb, vec![], None).unwrap();
  pump(&mut server, &mut client);

  // the registration, then the one notification it queued
  assert_eq!(reads.get(), 2);
  let seen = seen.borrow();
  assert_eq!(seen.len(), 2);
  assert_eq!(seen[1].as_ref().unwrap().payload.0, b"2");
  assert_eq!(client.observations(), 1);
}

#[test]
fn removed_resource_ends_observations() {
  let mut server = server(SessionConfig { port: Some(15694),
                                          ..Default::default() });
  server.start_server(None).unwrap();
  let mut client = client(15694, None);
  client.connect().unwrap();

  let (seen, cb) = recorder();
  client.observe("temp", Type::Con, cb, vec![], None).unwrap();
  pump(&mut server, &mut client);
  assert_eq!(client.observations(), 1);

  server.remove_resource("temp").unwrap();
  pump(&mut server, &mut client);

  assert_eq!(seen.borrow().len(), 2);
  assert_eq!(seen.borrow()[1].as_ref().unwrap().code.to_string(), "4.04");
  assert_eq!(client.observations(), 0);
}

#[test]
fn lifecycle() {
  let mut server = Server::<Loopback>::new(SessionConfig { port: Some(15695),
                                                           ..Default::default() });

  assert!(matches!(server.start_server(None).unwrap_err().what,
                   What::BadState(State::Created)));
  assert!(matches!(server.poll().unwrap_err(), nb::Error::Other(_)));

  server.create_server().unwrap();
  assert!(server.create_server().is_err());
  server.init_resources(resources()).unwrap();
  assert!(matches!(server.init_resources(vec![Resource::new("status")]).unwrap_err().what,
                   What::BadArgs(_)));

  server.start_server(None).unwrap();
  server.stop_server().unwrap();
  server.stop_server().unwrap();
  assert_eq!(server.state(), State::Configured);

  server.start_server(None).unwrap();
  server.destroy_server().unwrap();
  server.destroy_server().unwrap();
  assert_eq!(server.state(), State::Closed);
  assert!(server.local_addr().is_none());

  let mut client = client(15695, None);
  client.disconnect().unwrap();
  client.connect().unwrap();
  client.disconnect().unwrap();
  client.disconnect().unwrap();
  client.destroy_client().unwrap();
  client.destroy_client().unwrap();
  assert_eq!(client.state(), State::Closed);
  assert!(matches!(client.connect().unwrap_err().what, What::BadState(State::Closed)));
}
