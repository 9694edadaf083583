//! Service and client talking over a real bus directory.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;

use ledbus_client::{ClientError, ClientReport, ClientState, LedRequest, run_client};
use ledbus_config::AppConfig;
use ledbus_core::bus::{
    BusAttachment, BusObject, BusOptions, MethodCall, MsgArg, NameFlags, SessionOpts,
    TransportMask, method_handler,
};
use ledbus_core::led::{ACK, METHOD_ON, led_interface};
use ledbus_core::{BusError, Interrupt};
use ledbus_gpio::{Level, SimulatedGpio};
use ledbus_service::{LedServiceListener, ServiceError, run_service};
use ledbus_test_utils::TestBus;

const DEADLINE: Duration = Duration::from_secs(10);

struct RunningService {
    gpio: SimulatedGpio,
    interrupt: Interrupt,
    handle: JoinHandle<Result<(), ServiceError>>,
}

impl RunningService {
    async fn start(config: AppConfig, bus: &TestBus) -> Self {
        let gpio = SimulatedGpio::new();
        let interrupt = Interrupt::new();
        let handle = tokio::spawn({
            let gpio = gpio.clone();
            let interrupt = interrupt.clone();
            async move { run_service(&config, Arc::new(gpio), &interrupt).await }
        });

        tokio::time::timeout(DEADLINE, async {
            while !bus.entries("adverts").contains(&"iot.example.led".to_string()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("service never advertised");

        Self {
            gpio,
            interrupt,
            handle,
        }
    }

    async fn stop(self) {
        self.interrupt.trigger();
        let result = tokio::time::timeout(DEADLINE, self.handle)
            .await
            .expect("service did not stop")
            .unwrap();
        assert!(result.is_ok(), "service failed: {result:?}");
    }
}

async fn client(config: &AppConfig, pin: u8, state: Option<&str>) -> ClientReport {
    tokio::time::timeout(
        DEADLINE,
        run_client(config, LedRequest::new(pin, state), &Interrupt::new()),
    )
    .await
    .expect("client did not finish")
}

#[test_log::test(tokio::test)]
async fn test_switch_registered_pin_on() {
    let bus = TestBus::new();
    let service = RunningService::start(bus.config(), &bus).await;

    let report = client(&bus.config(), 4, None).await;
    assert_eq!(report.result.as_deref().ok(), Some("ACK"));
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.call_line().as_deref(),
        Some("iot.example.led.on returned 'ACK'")
    );
    assert_eq!(
        report.history,
        vec![
            ClientState::Idle,
            ClientState::Discovering,
            ClientState::Joining,
            ClientState::Joined,
            ClientState::CallInFlight,
            ClientState::Done,
        ]
    );

    // three registration writes, then the call
    let writes = service.gpio.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes.last(), Some(&(4, Level::High)));
    assert_eq!(service.gpio.level(4), Some(Level::High));

    service.stop().await;
    assert_eq!(bus.entries("peers"), Vec::<String>::new());
}

#[test_log::test(tokio::test)]
async fn test_unknown_pin_is_acknowledged() {
    let bus = TestBus::new();
    let service = RunningService::start(bus.config(), &bus).await;
    let before = service.gpio.writes();

    let report = client(&bus.config(), 99, Some("0")).await;
    assert_eq!(report.member, "off");
    assert_eq!(report.result.as_deref().ok(), Some("ACK"));
    assert_eq!(report.exit_code(), 0);
    assert_eq!(service.gpio.writes(), before);

    service.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_last_write_wins_across_clients() {
    let bus = TestBus::new();
    let service = RunningService::start(bus.config(), &bus).await;

    for state in ["0", "1", "0"] {
        let report = client(&bus.config(), 5, Some(state)).await;
        assert_eq!(report.exit_code(), 0);
    }
    assert_eq!(service.gpio.level(5), Some(Level::Low));

    service.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_interrupt_without_service() {
    let bus = TestBus::new();
    let interrupt = Interrupt::new();
    interrupt.trigger();

    let report = run_client(&bus.config(), LedRequest::new(4, None), &interrupt).await;
    assert!(matches!(
        report.result,
        Err(ClientError::Bus(BusError::JoinSessionFailed))
    ));
    assert_eq!(report.exit_code(), BusError::JoinSessionFailed.code());
    assert_ne!(report.exit_code(), 0);
    assert!(!report.reached(ClientState::CallInFlight));
    assert_eq!(report.call_line(), None);
    assert_eq!(report.history.last(), Some(&ClientState::Failed));
}

#[test_log::test(tokio::test)]
async fn test_join_on_other_port_is_refused() {
    let bus = TestBus::new();
    let service = RunningService::start(bus.config(), &bus).await;
    let before = service.gpio.writes();

    let config = bus.builder().session_port(26).build();
    let report = client(&config, 4, None).await;
    assert!(matches!(
        report.result,
        Err(ClientError::Bus(BusError::JoinSessionNoSession(26)))
    ));
    assert!(!report.reached(ClientState::Joined));
    assert_eq!(service.gpio.writes(), before);

    service.stop().await;
}

/// A service whose `on` handler takes `delay` before acknowledging.
fn start_slow_service(config: &AppConfig, delay: Duration) -> BusAttachment {
    let name = config.bus.service_name.as_str();
    let port = config.bus.session_port;
    let host = BusAttachment::new("slowService", BusOptions::from_config(&config.bus).unwrap());
    let intf = led_interface(name).unwrap();
    host.add_interface(intf.clone()).unwrap();
    host.start().unwrap();

    let mut object = BusObject::new(config.bus.object_path.clone());
    object.add_interface(&intf).unwrap();
    object
        .add_method_handler(
            name,
            METHOD_ON,
            method_handler(move |_call: MethodCall| async move {
                tokio::time::sleep(delay).await;
                Ok(vec![MsgArg::from(ACK)])
            }),
        )
        .unwrap();
    host.register_bus_object(object).unwrap();

    host.connect().unwrap();
    host.request_name(name, NameFlags::default()).unwrap();
    host.bind_session_port(
        port,
        SessionOpts::default(),
        Arc::new(LedServiceListener::new(name, port)),
    )
    .unwrap();
    host.advertise_name(name, TransportMask::ANY).unwrap();
    host
}

#[test_log::test(tokio::test)]
async fn test_call_timeout_fails_the_call() {
    let bus = TestBus::new();
    let host = start_slow_service(&bus.config(), Duration::from_millis(500));

    let config = bus.builder().call_timeout_ms(50).build();
    let report = client(&config, 4, None).await;
    assert!(matches!(
        report.result,
        Err(ClientError::Bus(BusError::Timeout(50)))
    ));
    assert_eq!(
        report.call_line().as_deref(),
        Some("Method call to iot.example.led.on failed")
    );
    assert_eq!(report.exit_code(), 20);
    assert!(report.reached(ClientState::CallInFlight));
    assert_eq!(report.history.last(), Some(&ClientState::Failed));

    host.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_interrupt_while_service_never_answers() {
    let bus = TestBus::new();
    // long enough that only the interrupt can end the run in time
    let config = bus.builder().join_timeout_ms(60_000).build();

    // owns the name and advert, accepts connections, never replies
    for sub in ["peers", "names", "adverts"] {
        std::fs::create_dir_all(bus.subdir(sub)).unwrap();
    }
    let _silent =
        std::os::unix::net::UnixListener::bind(bus.peers_dir().join("silent.sock")).unwrap();
    std::fs::write(bus.subdir("names").join("iot.example.led"), "silent").unwrap();
    std::fs::write(
        bus.subdir("adverts").join("iot.example.led"),
        r#"{"name":"iot.example.led","owner":"silent","transport":65535}"#,
    )
    .unwrap();

    let interrupt = Interrupt::new();
    tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            interrupt.trigger();
        }
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        run_client(&config, LedRequest::new(4, None), &interrupt),
    )
    .await
    .expect("client did not return after the interrupt");
    assert!(matches!(
        report.result,
        Err(ClientError::Bus(BusError::JoinSessionFailed))
    ));
    assert!(!report.reached(ClientState::CallInFlight));
    assert_eq!(
        bus.entries("peers"),
        vec!["silent.sock".to_string()],
        "client endpoint left behind"
    );
}
