//! Client lifecycle: discover, join, call once, tear down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use ledbus_config::AppConfig;
use ledbus_core::bus::{
    BusAttachment, BusOptions, MsgArg, ProxyBusObject, STATUS_OK, SessionId, TransportMask,
};
use ledbus_core::led::{led_interface, method_for};
use ledbus_core::{BusError, Interrupt};

use crate::listener::{ClientListener, JoinProgress};
use crate::state::{ClientState, ClientStateMachine, IllegalTransition};

/// Exit status when the client's own state machine refuses a step.
pub const EXIT_ILLEGAL_TRANSITION: u8 = 65;

/// What the client was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedRequest {
    pub pin: u8,
    pub on: bool,
}

impl LedRequest {
    /// `state` of `0` means off; anything else, or no state, means on.
    pub fn new(pin: u8, state: Option<&str>) -> Self {
        let on = match state {
            None => true,
            Some(s) => s.trim().parse::<i64>().map_or(true, |v| v != 0),
        };
        Self { pin, on }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    State(#[from] IllegalTransition),
}

impl ClientError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ClientError::Bus(e) => e.code(),
            ClientError::State(_) => EXIT_ILLEGAL_TRANSITION,
        }
    }
}

/// Outcome of one client run.
#[derive(Debug)]
pub struct ClientReport {
    pub service_name: String,
    pub member: &'static str,
    /// The acknowledgement returned by the service.
    pub result: Result<String, ClientError>,
    /// Every state the client passed through.
    pub history: Vec<ClientState>,
}

impl ClientReport {
    pub fn reached(&self, state: ClientState) -> bool {
        self.history.contains(&state)
    }

    /// The line describing the remote call, if one was made.
    pub fn call_line(&self) -> Option<String> {
        if !self.reached(ClientState::CallInFlight) {
            return None;
        }
        Some(match &self.result {
            Ok(ack) => format!("{}.{} returned '{ack}'", self.service_name, self.member),
            Err(_) => format!("Method call to {}.{} failed", self.service_name, self.member),
        })
    }

    pub fn status_text(&self) -> String {
        match &self.result {
            Ok(_) => "OK".to_string(),
            Err(e) => e.to_string(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match &self.result {
            Ok(_) => STATUS_OK,
            Err(e) => e.exit_code(),
        }
    }
}

/// Discover the LED service, join its session and make one call.
pub async fn run_client(
    config: &AppConfig,
    request: LedRequest,
    interrupt: &Interrupt,
) -> ClientReport {
    let mut machine = ClientStateMachine::new();
    let result = match BusOptions::from_config(&config.bus) {
        Ok(options) => {
            let bus = BusAttachment::new(&config.bus.app_name, options);
            let result = drive(&bus, config, request, interrupt, &mut machine).await;
            bus.stop().await;
            result
        }
        Err(e) => Err(e.into()),
    };
    if result.is_err() {
        machine.fail();
    }
    ClientReport {
        service_name: config.bus.service_name.clone(),
        member: method_for(request.on),
        result,
        history: machine.history().to_vec(),
    }
}

async fn drive(
    bus: &BusAttachment,
    config: &AppConfig,
    request: LedRequest,
    interrupt: &Interrupt,
    machine: &mut ClientStateMachine,
) -> Result<String, ClientError> {
    let name = config.bus.service_name.as_str();

    let intf = led_interface(name)?;
    bus.add_interface(intf.clone())?;
    bus.start()?;
    bus.connect()?;

    let (listener, progress) = ClientListener::new(bus.clone(), name, config.bus.session_port);
    bus.register_bus_listener(Arc::new(listener));
    info!("Registered bus listener");
    machine.advance(ClientState::Discovering)?;
    bus.find_advertised_name(name, TransportMask::ANY)?;

    let session_id =
        wait_for_join(progress, interrupt, config.bus.poll_interval(), machine).await?;
    bus.cancel_find_advertised_name(name);
    machine.advance(ClientState::Joined)?;

    let mut proxy = ProxyBusObject::new(bus, name, &config.bus.object_path, session_id);
    proxy.add_interface(&intf)?;

    machine.advance(ClientState::CallInFlight)?;
    let member = method_for(request.on);
    let reply = proxy
        .method_call(
            name,
            member,
            &[MsgArg::Byte(request.pin)],
            config.bus.call_timeout(),
        )
        .await?;
    let ack = reply
        .first()
        .and_then(MsgArg::as_str)
        .unwrap_or_default()
        .to_string();
    machine.advance(ClientState::Done)?;
    Ok(ack)
}

/// Poll until the listener reports a join outcome or the interrupt fires.
///
/// An interrupt always wins, even over a join that completed in the same
/// poll period.
async fn wait_for_join(
    progress: watch::Receiver<JoinProgress>,
    interrupt: &Interrupt,
    poll: Duration,
    machine: &mut ClientStateMachine,
) -> Result<SessionId, ClientError> {
    loop {
        if interrupt.is_triggered() {
            return Err(BusError::JoinSessionFailed.into());
        }
        let current = progress.borrow().clone();
        match current {
            JoinProgress::Pending => {}
            JoinProgress::Joining => {
                if machine.state() == ClientState::Discovering {
                    machine.advance(ClientState::Joining)?;
                }
            }
            JoinProgress::Joined(id) => {
                if machine.state() == ClientState::Discovering {
                    machine.advance(ClientState::Joining)?;
                }
                return Ok(id);
            }
            JoinProgress::Failed(e) => return Err(e.into()),
        }
        tokio::time::sleep(poll).await;
    }
}
