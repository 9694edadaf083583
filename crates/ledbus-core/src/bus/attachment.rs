//! `BusAttachment` — one participant's connection to the bus.
//!
//! Lifecycle: [`new`](BusAttachment::new) → [`start`](BusAttachment::start)
//! → [`connect`](BusAttachment::connect) → name / port / discovery
//! operations → [`stop`](BusAttachment::stop). Every operation checks that
//! the lifecycle has progressed far enough and fails with a [`BusError`]
//! otherwise; nothing is retried.
//!
//! The attachment is a cheap handle over shared state, so listeners that
//! need to act on the bus (e.g. join a session from a discovery callback)
//! hold a clone of it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ledbus_config::{BusConfig, is_valid_bus_name};

use super::discovery;
use super::interface::InterfaceDescription;
use super::listener::{
    BusListener, NameFlags, SessionId, SessionOpts, SessionPort, SessionPortListener,
    TransportMask,
};
use super::msg::check_args;
use super::object::{BusObject, MethodCall};
use super::registry::{Advertisement, Registry, remove_if_exists};
use super::status::{BusError, BusResult};
use super::transport::{
    CallRequest, CallResponse, EndpointClient, JoinRequest, JoinResponse, LeaveRequest, server,
};

/// How long `stop` lets a background task wind down before aborting it.
const TASK_STOP_GRACE: Duration = Duration::from_secs(1);

/// Where the bus lives, how often discovery rescans it and how long a
/// peer gets to answer a join or leave.
#[derive(Debug, Clone)]
pub struct BusOptions {
    pub directory: PathBuf,
    pub discovery_interval: Duration,
    pub join_timeout: Duration,
}

impl BusOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            discovery_interval: Duration::from_millis(100),
            join_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn from_config(config: &BusConfig) -> BusResult<Self> {
        let directory = config
            .bus_directory()
            .map_err(|e| BusError::Transport(e.to_string()))?;
        Ok(Self::new(directory)
            .with_discovery_interval(config.discovery_interval())
            .with_join_timeout(config.join_timeout()))
    }
}

/// A session as recorded by either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub port: SessionPort,
    /// Unique name of the other side.
    pub peer: String,
    pub opts: SessionOpts,
    /// `true` on the side that accepted the join.
    pub hosted: bool,
}

#[derive(Default)]
struct State {
    started: bool,
    connected: bool,
    interfaces: HashMap<String, InterfaceDescription>,
    objects: HashMap<String, Arc<BusObject>>,
    listeners: Vec<Arc<dyn BusListener>>,
    ports: HashMap<SessionPort, (SessionOpts, Arc<dyn SessionPortListener>)>,
    sessions: HashMap<SessionId, SessionInfo>,
    owned_names: BTreeSet<String>,
    advertised: BTreeSet<String>,
    /// Active discovery prefixes and the transports each searches.
    discovery_prefixes: BTreeMap<String, TransportMask>,
    next_session: SessionId,
}

impl State {
    fn allocate_session_id(&mut self) -> SessionId {
        loop {
            self.next_session = self.next_session.wrapping_add(1);
            let id = self.next_session;
            if id != 0 && !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }
}

#[derive(Default)]
struct Tasks {
    shutdown_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

pub(crate) struct Shared {
    pub(crate) unique_name: String,
    pub(crate) registry: Registry,
    pub(crate) discovery_interval: Duration,
    join_timeout: Duration,
    state: Mutex<State>,
    tasks: Mutex<Tasks>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    pub(crate) fn listeners(&self) -> Vec<Arc<dyn BusListener>> {
        self.state().listeners.clone()
    }

    pub(crate) fn discovery_prefixes(&self) -> BTreeMap<String, TransportMask> {
        self.state().discovery_prefixes.clone()
    }

    /// Forget hosted sessions whose joiner's endpoint is gone.
    fn prune_departed(&self, st: &mut State) {
        st.sessions.retain(|id, s| {
            let keep = !s.hosted || self.registry.peer_alive(&s.peer);
            if !keep {
                debug!(session_id = id, peer = %s.peer, "dropping session of departed peer");
            }
            keep
        });
    }

    /// End a hosted session at the joiner's request. Returns `false` when
    /// `leaver` has no such session here.
    pub(crate) fn end_hosted_session(&self, id: SessionId, leaver: &str) -> bool {
        let mut st = self.state();
        let owned = st
            .sessions
            .get(&id)
            .is_some_and(|s| s.hosted && s.peer == leaver);
        if owned {
            st.sessions.remove(&id);
            info!(session_id = id, peer = leaver, "session left");
        }
        owned
    }

    /// Decide a join request against the bound port's listener.
    pub(crate) fn accept_join(&self, req: &JoinRequest) -> BusResult<JoinResponse> {
        let bound = self.state().ports.get(&req.port).cloned();
        let Some((_opts, listener)) = bound else {
            debug!(port = req.port, joiner = %req.joiner, "join on unbound port");
            return Err(BusError::JoinSessionNoSession(req.port));
        };

        if !listener.accept_session_joiner(req.port, &req.joiner, &req.opts) {
            return Err(BusError::JoinSessionRejected(self.unique_name.clone()));
        }

        let id = {
            let mut st = self.state();
            self.prune_departed(&mut st);
            let id = st.allocate_session_id();
            st.sessions.insert(
                id,
                SessionInfo {
                    id,
                    port: req.port,
                    peer: req.joiner.clone(),
                    opts: req.opts.clone(),
                    hosted: true,
                },
            );
            id
        };
        listener.session_joined(req.port, id, &req.joiner);
        info!(session_id = id, port = req.port, joiner = %req.joiner, "session established");
        Ok(JoinResponse { session_id: id })
    }

    /// Validate a call against the hosted session and the target object's
    /// interface, then run the handler.
    pub(crate) async fn dispatch_call(&self, req: CallRequest) -> BusResult<CallResponse> {
        let (handler, out_sig) = {
            let st = self.state();
            st.sessions
                .get(&req.session_id)
                .filter(|s| s.hosted && s.peer == req.sender)
                .ok_or(BusError::NoSession(req.session_id))?;
            let obj = st
                .objects
                .get(&req.path)
                .ok_or_else(|| BusError::NoSuchObject(req.path.clone()))?;
            let intf = obj
                .interface(&req.interface)
                .ok_or_else(|| BusError::NoSuchInterface(req.interface.clone()))?;
            let member = intf.require_member(&req.member)?;
            check_args(&member.in_sig, &req.args)?;
            let handler = obj.handler(&req.interface, &req.member).ok_or_else(|| {
                BusError::NoSuchMember {
                    interface: req.interface.clone(),
                    member: req.member.clone(),
                }
            })?;
            (handler, member.out_sig.clone())
        };

        debug!(
            session_id = req.session_id,
            path = %req.path,
            member = %req.member,
            "dispatching method call"
        );
        let reply = handler(MethodCall {
            session_id: req.session_id,
            sender: req.sender,
            path: req.path,
            interface: req.interface,
            member: req.member,
            args: req.args,
        })
        .await?;
        check_args(&out_sig, &reply).map_err(|e| BusError::MethodFailed(e.to_string()))?;
        Ok(CallResponse { args: reply })
    }

    fn release_registry_entries(&self, names: &BTreeSet<String>, adverts: &BTreeSet<String>) {
        for name in adverts {
            self.registry.cancel_advertise(name, &self.unique_name);
        }
        for name in names {
            self.registry.release_name(name, &self.unique_name);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let st = lock(&self.state);
        if st.connected {
            self.release_registry_entries(&st.owned_names, &st.advertised);
            remove_if_exists(&self.registry.peer_socket(&self.unique_name));
        }
    }
}

static NEXT_ATTACHMENT: AtomicU32 = AtomicU32::new(1);

/// Seed for session ids so separate processes hand out different ranges.
fn session_seed() -> SessionId {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos ^ std::process::id().rotate_left(16)) & 0x7fff_0000
}

/// A participant on the bus.
#[derive(Clone)]
pub struct BusAttachment {
    shared: Arc<Shared>,
}

impl BusAttachment {
    /// Create an attachment. Nothing touches the bus directory until
    /// [`connect`](Self::connect).
    pub fn new(app_name: &str, options: BusOptions) -> Self {
        let seq = NEXT_ATTACHMENT.fetch_add(1, Ordering::Relaxed);
        let unique_name = format!("{app_name}.{}.{seq}", std::process::id());
        let state = State {
            next_session: session_seed(),
            ..State::default()
        };
        Self {
            shared: Arc::new(Shared {
                unique_name,
                registry: Registry::new(options.directory),
                discovery_interval: options.discovery_interval,
                join_timeout: options.join_timeout,
                state: Mutex::new(state),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    pub fn unique_name(&self) -> &str {
        &self.shared.unique_name
    }

    pub(crate) fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    fn require_started(&self) -> BusResult<()> {
        if self.shared.state().started {
            Ok(())
        } else {
            Err(BusError::NotStarted)
        }
    }

    fn require_connected(&self) -> BusResult<()> {
        let st = self.shared.state();
        if !st.started {
            Err(BusError::NotStarted)
        } else if !st.connected {
            Err(BusError::NotConnected)
        } else {
            Ok(())
        }
    }

    // ── Interfaces and objects ────────────────────────────────────────

    /// Make an activated interface known to this attachment.
    pub fn add_interface(&self, intf: InterfaceDescription) -> BusResult<()> {
        let mut st = self.shared.state();
        if st.interfaces.contains_key(intf.name()) {
            return Err(BusError::InterfaceExists(intf.name().to_string()));
        }
        debug!(interface = %intf.name(), "interface added");
        st.interfaces.insert(intf.name().to_string(), intf);
        Ok(())
    }

    pub fn interface(&self, name: &str) -> Option<InterfaceDescription> {
        self.shared.state().interfaces.get(name).cloned()
    }

    pub fn register_bus_listener(&self, listener: Arc<dyn BusListener>) {
        self.shared.state().listeners.push(listener);
    }

    pub fn start(&self) -> BusResult<()> {
        let mut st = self.shared.state();
        if st.started {
            return Err(BusError::AlreadyStarted);
        }
        st.started = true;
        debug!(unique_name = %self.shared.unique_name, "bus attachment started");
        Ok(())
    }

    /// Serve `object` at its path. Its interfaces must be known to the bus.
    pub fn register_bus_object(&self, object: BusObject) -> BusResult<()> {
        self.require_started()?;
        let mut st = self.shared.state();
        if st.objects.contains_key(object.path()) {
            return Err(BusError::ObjectExists(object.path().to_string()));
        }
        if let Some(unknown) = object
            .interfaces()
            .iter()
            .find(|i| !st.interfaces.contains_key(i.name()))
        {
            return Err(BusError::NoSuchInterface(unknown.name().to_string()));
        }
        st.objects.insert(object.path().to_string(), Arc::new(object));
        Ok(())
    }

    // ── Connection ────────────────────────────────────────────────────

    /// Bind this attachment's endpoint and start the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) -> BusResult<()> {
        self.require_started()?;
        if self.shared.state().connected {
            return Err(BusError::AlreadyConnected);
        }

        let registry = &self.shared.registry;
        registry.ensure_layout()?;
        let socket = registry.peer_socket(&self.shared.unique_name);
        remove_if_exists(&socket);
        let listener = UnixListener::bind(&socket)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_state = self.shared();
        let server_rx = shutdown_rx.clone();
        let server_task = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, server_state, server_rx).await {
                warn!(error = %e, "endpoint server stopped with error");
            }
        });
        let watcher_task = tokio::spawn(discovery::run(self.shared(), shutdown_rx));

        {
            let mut tasks = lock(&self.shared.tasks);
            tasks.shutdown_tx = Some(shutdown_tx);
            tasks.handles = vec![server_task, watcher_task];
        }
        self.shared.state().connected = true;
        info!(
            unique_name = %self.shared.unique_name,
            bus = %registry.root().display(),
            "connected to bus"
        );
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state().connected
    }

    // ── Names and advertisement ───────────────────────────────────────

    pub fn request_name(&self, name: &str, flags: NameFlags) -> BusResult<()> {
        self.require_connected()?;
        if !is_valid_bus_name(name) {
            return Err(BusError::InvalidBusName(name.to_string()));
        }
        self.shared
            .registry
            .claim_name(name, &self.shared.unique_name, flags)?;
        self.shared.state().owned_names.insert(name.to_string());
        info!(name, "name acquired");
        Ok(())
    }

    pub fn release_name(&self, name: &str) {
        if self.shared.state().owned_names.remove(name) {
            self.shared
                .registry
                .release_name(name, &self.shared.unique_name);
        }
    }

    /// Accept sessions on `port`, admitting joiners `listener` accepts.
    pub fn bind_session_port(
        &self,
        port: SessionPort,
        opts: SessionOpts,
        listener: Arc<dyn SessionPortListener>,
    ) -> BusResult<()> {
        self.require_started()?;
        let mut st = self.shared.state();
        if st.ports.contains_key(&port) {
            return Err(BusError::PortAlreadyBound(port));
        }
        st.ports.insert(port, (opts, listener));
        info!(port, "session port bound");
        Ok(())
    }

    /// Stop accepting sessions on `port`. Established sessions stay.
    pub fn unbind_session_port(&self, port: SessionPort) {
        if self.shared.state().ports.remove(&port).is_some() {
            info!(port, "session port unbound");
        }
    }

    pub fn advertise_name(&self, name: &str, transport: TransportMask) -> BusResult<()> {
        self.require_connected()?;
        if !is_valid_bus_name(name) {
            return Err(BusError::InvalidBusName(name.to_string()));
        }
        self.shared.registry.advertise(&Advertisement {
            name: name.to_string(),
            owner: self.shared.unique_name.clone(),
            transport,
        })?;
        self.shared.state().advertised.insert(name.to_string());
        info!(name, "name advertised");
        Ok(())
    }

    pub fn cancel_advertise_name(&self, name: &str) {
        if self.shared.state().advertised.remove(name) {
            self.shared
                .registry
                .cancel_advertise(name, &self.shared.unique_name);
        }
    }

    // ── Discovery and sessions ────────────────────────────────────────

    /// Report advertisements whose name starts with `prefix` and whose
    /// transports intersect `transport` to the registered [`BusListener`]s.
    pub fn find_advertised_name(&self, prefix: &str, transport: TransportMask) -> BusResult<()> {
        self.require_connected()?;
        self.shared
            .state()
            .discovery_prefixes
            .insert(prefix.to_string(), transport);
        info!(prefix, transport = transport.0, "discovery started");
        Ok(())
    }

    pub fn cancel_find_advertised_name(&self, prefix: &str) {
        if self.shared.state().discovery_prefixes.remove(prefix).is_some() {
            debug!(prefix, "discovery cancelled");
        }
    }

    /// Join a session with the owner of `name` on `port`.
    ///
    /// Fails with [`BusError::Timeout`] if the owner does not answer within
    /// the join timeout.
    pub async fn join_session(
        &self,
        name: &str,
        port: SessionPort,
        opts: SessionOpts,
    ) -> BusResult<SessionId> {
        self.require_connected()?;
        let owner = self
            .shared
            .registry
            .resolve(name)
            .ok_or_else(|| BusError::UnknownPeer(name.to_string()))?;
        let client = EndpointClient::new(self.shared.registry.peer_socket(&owner));
        let request = JoinRequest {
            joiner: self.shared.unique_name.clone(),
            port,
            opts: opts.clone(),
        };
        let timeout = self.shared.join_timeout;
        let resp = tokio::time::timeout(timeout, client.join(&request))
            .await
            .map_err(|_| BusError::Timeout(timeout.as_millis() as u64))??;

        self.shared.state().sessions.insert(
            resp.session_id,
            SessionInfo {
                id: resp.session_id,
                port,
                peer: owner,
                opts,
                hosted: false,
            },
        );
        Ok(resp.session_id)
    }

    /// Drop session `id`. A joined session's host is told so it can forget
    /// the session too.
    pub async fn leave_session(&self, id: SessionId) -> BusResult<()> {
        let session = self
            .shared
            .state()
            .sessions
            .remove(&id)
            .ok_or(BusError::NoSession(id))?;
        if session.hosted {
            return Ok(());
        }

        let client = EndpointClient::new(self.shared.registry.peer_socket(&session.peer));
        let request = LeaveRequest {
            session_id: id,
            leaver: self.shared.unique_name.clone(),
        };
        let timeout = self.shared.join_timeout;
        let resp = tokio::time::timeout(timeout, client.leave(&request))
            .await
            .map_err(|_| BusError::Timeout(timeout.as_millis() as u64))??;
        if !resp.left {
            debug!(session_id = id, peer = %session.peer, "host had already dropped the session");
        }
        Ok(())
    }

    pub fn session(&self, id: SessionId) -> Option<SessionInfo> {
        self.shared.state().sessions.get(&id).cloned()
    }

    pub(crate) fn endpoint_for_session(&self, id: SessionId) -> BusResult<EndpointClient> {
        let st = self.shared.state();
        let session = st
            .sessions
            .get(&id)
            .filter(|s| !s.hosted)
            .ok_or(BusError::NoSession(id))?;
        Ok(EndpointClient::new(
            self.shared.registry.peer_socket(&session.peer),
        ))
    }

    // ── Teardown ──────────────────────────────────────────────────────

    /// Leave joined sessions, withdraw adverts and names, stop background
    /// tasks and remove the endpoint. Safe to call more than once.
    ///
    /// Each step is bounded: leave notices by the join timeout, tasks by a
    /// short grace period after which they are aborted.
    pub async fn stop(&self) {
        let joined: Vec<SessionId> = self
            .shared
            .state()
            .sessions
            .values()
            .filter(|s| !s.hosted)
            .map(|s| s.id)
            .collect();
        for id in joined {
            if let Err(e) = self.leave_session(id).await {
                debug!(session_id = id, error = %e, "leave notice not delivered");
            }
        }

        let (names, adverts, was_connected) = {
            let mut st = self.shared.state();
            let names = std::mem::take(&mut st.owned_names);
            let adverts = std::mem::take(&mut st.advertised);
            let was_connected = st.connected;
            st.connected = false;
            st.started = false;
            st.discovery_prefixes.clear();
            st.ports.clear();
            st.sessions.clear();
            // listeners may hold clones of this attachment
            st.listeners.clear();
            st.objects.clear();
            (names, adverts, was_connected)
        };
        self.shared.release_registry_entries(&names, &adverts);

        let (shutdown_tx, handles) = {
            let mut tasks = lock(&self.shared.tasks);
            (tasks.shutdown_tx.take(), std::mem::take(&mut tasks.handles))
        };
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
        for mut handle in handles {
            if tokio::time::timeout(TASK_STOP_GRACE, &mut handle)
                .await
                .is_err()
            {
                warn!(unique_name = %self.shared.unique_name, "background task did not stop, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }

        if was_connected {
            remove_if_exists(&self.shared.registry.peer_socket(&self.shared.unique_name));
            info!(unique_name = %self.shared.unique_name, "disconnected from bus");
        }
    }
}

impl std::fmt::Debug for BusAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusAttachment")
            .field("unique_name", &self.shared.unique_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::bus::InterfaceBuilder;

    fn led_interface() -> InterfaceDescription {
        InterfaceBuilder::new("iot.example.led")
            .add_method("on", "y", "s", "pinNum, ackStr")
            .unwrap()
            .activate()
    }

    #[test]
    fn test_lifecycle_order_is_enforced() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new("order", BusOptions::new(tmp.path()));
        assert_eq!(bus.connect(), Err(BusError::NotStarted));
        assert_eq!(
            bus.register_bus_object(BusObject::new("/led")),
            Err(BusError::NotStarted)
        );
        bus.start().unwrap();
        assert_eq!(bus.start(), Err(BusError::AlreadyStarted));
        assert_eq!(
            bus.request_name("iot.example.led", NameFlags::default()),
            Err(BusError::NotConnected)
        );
        assert_eq!(
            bus.advertise_name("iot.example.led", TransportMask::ANY),
            Err(BusError::NotConnected)
        );
        assert_eq!(
            bus.find_advertised_name("iot.example.led", TransportMask::ANY),
            Err(BusError::NotConnected)
        );
    }

    #[test]
    fn test_interface_names_are_unique() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new("intf", BusOptions::new(tmp.path()));
        bus.add_interface(led_interface()).unwrap();
        assert_eq!(
            bus.add_interface(led_interface()),
            Err(BusError::InterfaceExists("iot.example.led".into()))
        );
        assert!(bus.interface("iot.example.led").is_some());
        assert!(bus.interface("iot.example.other").is_none());
    }

    #[test]
    fn test_object_interfaces_must_be_known() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new("obj", BusOptions::new(tmp.path()));
        bus.start().unwrap();
        let mut obj = BusObject::new("/led");
        obj.add_interface(&led_interface()).unwrap();
        assert_eq!(
            bus.register_bus_object(obj),
            Err(BusError::NoSuchInterface("iot.example.led".into()))
        );
    }

    #[test]
    fn test_unique_names_differ() {
        let tmp = TempDir::new().unwrap();
        let a = BusAttachment::new("app", BusOptions::new(tmp.path()));
        let b = BusAttachment::new("app", BusOptions::new(tmp.path()));
        assert_ne!(a.unique_name(), b.unique_name());
        assert!(a.unique_name().starts_with("app."));
    }

    #[test]
    fn test_session_ids_skip_zero() {
        let mut st = State {
            next_session: u32::MAX,
            ..State::default()
        };
        assert_eq!(st.allocate_session_id(), 1);
    }

    #[tokio::test]
    async fn test_connect_and_stop_manage_registry() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new("svc", BusOptions::new(tmp.path()));
        bus.start().unwrap();
        bus.connect().unwrap();
        assert_eq!(bus.connect(), Err(BusError::AlreadyConnected));

        let socket = bus.shared.registry.peer_socket(bus.unique_name());
        assert!(socket.exists());

        bus.request_name("iot.example.led", NameFlags::default())
            .unwrap();
        bus.advertise_name("iot.example.led", TransportMask::ANY)
            .unwrap();
        assert_eq!(
            bus.shared.registry.resolve("iot.example.led").as_deref(),
            Some(bus.unique_name())
        );
        assert_eq!(
            bus.request_name("not a name", NameFlags::default()),
            Err(BusError::InvalidBusName("not a name".into()))
        );

        bus.stop().await;
        assert!(!bus.is_connected());
        assert!(!socket.exists());
        assert!(bus.shared.registry.resolve("iot.example.led").is_none());

        // second stop is a no-op
        bus.stop().await;
    }

    struct AcceptAll;

    impl SessionPortListener for AcceptAll {
        fn accept_session_joiner(&self, _port: u16, _joiner: &str, _opts: &SessionOpts) -> bool {
            true
        }
    }

    fn join_request(joiner: &str, port: SessionPort) -> JoinRequest {
        JoinRequest {
            joiner: joiner.to_string(),
            port,
            opts: SessionOpts::default(),
        }
    }

    #[tokio::test]
    async fn test_join_times_out_on_silent_owner() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new(
            "joiner",
            BusOptions::new(tmp.path()).with_join_timeout(Duration::from_millis(50)),
        );
        bus.start().unwrap();
        bus.connect().unwrap();

        // accepts connections into its backlog but never answers
        let registry = &bus.shared.registry;
        let _silent = std::os::unix::net::UnixListener::bind(registry.peer_socket("silent"))
            .unwrap();
        registry
            .claim_name("iot.example.led", "silent", NameFlags::default())
            .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            bus.join_session("iot.example.led", 25, SessionOpts::default()),
        )
        .await
        .expect("join did not honour its timeout");
        assert_eq!(result, Err(BusError::Timeout(50)));

        tokio::time::timeout(Duration::from_secs(5), bus.stop())
            .await
            .expect("stop blocked");
    }

    #[test]
    fn test_departed_joiners_are_pruned() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new("host", BusOptions::new(tmp.path()));
        bus.start().unwrap();
        bus.shared.registry.ensure_layout().unwrap();
        bus.bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll))
            .unwrap();

        // the first joiner never had an endpoint, so it counts as gone
        let gone = bus.shared.accept_join(&join_request("gone", 25)).unwrap();
        assert!(bus.session(gone.session_id).is_some());

        std::fs::write(bus.shared.registry.peer_socket("alive"), b"").unwrap();
        let alive = bus.shared.accept_join(&join_request("alive", 25)).unwrap();
        assert!(bus.session(gone.session_id).is_none());
        assert!(bus.session(alive.session_id).is_some());

        assert!(!bus.shared.end_hosted_session(alive.session_id, "gone"));
        assert!(bus.shared.end_hosted_session(alive.session_id, "alive"));
        assert!(bus.session(alive.session_id).is_none());
    }

    #[test]
    fn test_unbound_port_refuses_joins() {
        let tmp = TempDir::new().unwrap();
        let bus = BusAttachment::new("host", BusOptions::new(tmp.path()));
        bus.start().unwrap();
        bus.bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll))
            .unwrap();
        bus.unbind_session_port(25);
        assert_eq!(
            bus.shared.accept_join(&join_request("peer", 25)).map(|r| r.session_id),
            Err(BusError::JoinSessionNoSession(25))
        );
        // the port is free to bind again
        bus.bind_session_port(25, SessionOpts::default(), Arc::new(AcceptAll))
            .unwrap();
    }

    #[test]
    fn test_from_config_uses_bus_directory() {
        let config = BusConfig {
            address: "unix:path=/tmp/ledbus-from-config".to_string(),
            discovery_interval_ms: 20,
            ..BusConfig::default()
        };
        let opts = BusOptions::from_config(&config).unwrap();
        assert_eq!(opts.directory, PathBuf::from("/tmp/ledbus-from-config"));
        assert_eq!(opts.discovery_interval, Duration::from_millis(20));
        assert_eq!(opts.join_timeout, config.join_timeout());

        let bad = BusConfig {
            address: "tcp:x".to_string(),
            ..BusConfig::default()
        };
        assert!(BusOptions::from_config(&bad).is_err());
    }
}
