//! Discovery and name-owner notifications between two attachments.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ledbus_core::BoxFuture;
use ledbus_core::bus::{
    BusAttachment, BusError, BusListener, BusOptions, NameFlags, SessionOpts, SessionPortListener,
    TransportMask,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Found(String, String),
    Lost(String, String),
    Owner(String, Option<String>, Option<String>),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl BusListener for Recorder {
    fn found_advertised_name<'a>(
        &'a self,
        name: &'a str,
        _transport: TransportMask,
        prefix: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.events
                .lock()
                .unwrap()
                .push(Event::Found(name.to_string(), prefix.to_string()));
        })
    }

    fn lost_advertised_name(&self, name: &str, _transport: TransportMask, prefix: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Lost(name.to_string(), prefix.to_string()));
    }

    fn name_owner_changed(&self, name: &str, previous: Option<&str>, new: Option<&str>) {
        self.events.lock().unwrap().push(Event::Owner(
            name.to_string(),
            previous.map(str::to_string),
            new.map(str::to_string),
        ));
    }
}

fn attachment(dir: &TempDir, app: &str) -> BusAttachment {
    let bus = BusAttachment::new(
        app,
        BusOptions::new(dir.path()).with_discovery_interval(Duration::from_millis(5)),
    );
    bus.start().unwrap();
    bus.connect().unwrap();
    bus
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[test_log::test(tokio::test)]
async fn test_found_then_lost() {
    let dir = TempDir::new().unwrap();
    let service = attachment(&dir, "service");
    let watcher = attachment(&dir, "watcher");

    let recorder = Arc::new(Recorder::default());
    watcher.register_bus_listener(recorder.clone());
    watcher
        .find_advertised_name("iot.example", TransportMask::ANY)
        .unwrap();

    service
        .advertise_name("iot.example.led", TransportMask::ANY)
        .unwrap();
    service
        .advertise_name("other.example.led", TransportMask::ANY)
        .unwrap();

    let found = Event::Found("iot.example.led".into(), "iot.example".into());
    wait_until(|| recorder.events().contains(&found)).await;

    service.cancel_advertise_name("iot.example.led");
    let lost = Event::Lost("iot.example.led".into(), "iot.example".into());
    wait_until(|| recorder.events().contains(&lost)).await;

    let adverts: Vec<Event> = recorder
        .events()
        .into_iter()
        .filter(|e| !matches!(e, Event::Owner(..)))
        .collect();
    assert_eq!(adverts, vec![found, lost]);

    service.stop().await;
    watcher.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_discovery_honours_transport_mask() {
    let dir = TempDir::new().unwrap();
    let service = attachment(&dir, "service");
    let watcher = attachment(&dir, "watcher");

    let recorder = Arc::new(Recorder::default());
    watcher.register_bus_listener(recorder.clone());
    watcher
        .find_advertised_name("iot.example", TransportMask::LOCAL)
        .unwrap();

    service
        .advertise_name("iot.example.remote", TransportMask::UNIX)
        .unwrap();
    service
        .advertise_name("iot.example.led", TransportMask::LOCAL)
        .unwrap();

    let found = Event::Found("iot.example.led".into(), "iot.example".into());
    wait_until(|| recorder.events().contains(&found)).await;
    // one more scan so a late report would show up
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        !recorder
            .events()
            .contains(&Event::Found("iot.example.remote".into(), "iot.example".into()))
    );

    service.stop().await;
    watcher.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_owner_changes_are_reported() {
    let dir = TempDir::new().unwrap();
    let service = attachment(&dir, "service");
    let watcher = attachment(&dir, "watcher");

    let recorder = Arc::new(Recorder::default());
    watcher.register_bus_listener(recorder.clone());

    service
        .request_name("iot.example.led", NameFlags::default())
        .unwrap();
    let acquired = Event::Owner(
        "iot.example.led".into(),
        None,
        Some(service.unique_name().to_string()),
    );
    wait_until(|| recorder.events().contains(&acquired)).await;

    service.stop().await;
    let released = Event::Owner(
        "iot.example.led".into(),
        Some(service.unique_name().to_string()),
        None,
    );
    wait_until(|| recorder.events().contains(&released)).await;

    watcher.stop().await;
}

struct AcceptAll;

impl SessionPortListener for AcceptAll {
    fn accept_session_joiner(&self, _port: u16, _joiner: &str, _opts: &SessionOpts) -> bool {
        true
    }
}

#[test_log::test(tokio::test)]
async fn test_join_and_session_records() {
    let dir = TempDir::new().unwrap();
    let service = attachment(&dir, "service");
    let client = attachment(&dir, "client");

    service
        .request_name("iot.example.led", NameFlags::default())
        .unwrap();
    service
        .bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll))
        .unwrap();
    assert_eq!(
        service.bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll)),
        Err(BusError::PortAlreadyBound(25))
    );

    let id = client
        .join_session("iot.example.led", 25, SessionOpts::default())
        .await
        .unwrap();
    assert_ne!(id, 0);

    let joined = client.session(id).unwrap();
    assert!(!joined.hosted);
    assert_eq!(joined.peer, service.unique_name());
    let hosted = service.session(id).unwrap();
    assert!(hosted.hosted);
    assert_eq!(hosted.peer, client.unique_name());

    assert_eq!(
        client
            .join_session("iot.example.nobody", 25, SessionOpts::default())
            .await,
        Err(BusError::UnknownPeer("iot.example.nobody".into()))
    );

    client.stop().await;
    assert_eq!(client.session(id), None);
    assert_eq!(service.session(id), None);
    service.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_host_forgets_sessions_of_stopped_clients() {
    let dir = TempDir::new().unwrap();
    let service = attachment(&dir, "service");
    service
        .request_name("iot.example.led", NameFlags::default())
        .unwrap();
    service
        .bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll))
        .unwrap();

    let mut ids = Vec::new();
    for _ in 0..10 {
        let client = attachment(&dir, "client");
        let id = client
            .join_session("iot.example.led", 25, SessionOpts::default())
            .await
            .unwrap();
        assert!(service.session(id).is_some());
        client.stop().await;
        ids.push(id);
    }
    for id in ids {
        assert_eq!(service.session(id), None);
    }

    service.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_explicit_leave() {
    let dir = TempDir::new().unwrap();
    let service = attachment(&dir, "service");
    let client = attachment(&dir, "client");
    service
        .request_name("iot.example.led", NameFlags::default())
        .unwrap();
    service
        .bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll))
        .unwrap();

    let id = client
        .join_session("iot.example.led", 25, SessionOpts::default())
        .await
        .unwrap();
    client.leave_session(id).await.unwrap();
    assert_eq!(service.session(id), None);
    assert_eq!(client.leave_session(id).await, Err(BusError::NoSession(id)));

    client.stop().await;
    service.stop().await;
}
