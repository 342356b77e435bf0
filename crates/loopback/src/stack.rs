//! In-process network stack over loopback TCP.
//!
//! Behaves like the virtual network stack from the caller's side: lifecycle
//! calls return immediately and their completion is announced later, from a
//! dedicated worker thread, through the subscribed notification sink. Each
//! notification is built from raw structures that live only for the duration
//! of the callback.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use ztnc_core::event::details::NetworkStatus;
use ztnc_core::event::raw::{
    RawAddrDetails, RawNetifDetails, RawNetworkDetails, RawNodeDetails, RawSockAddr,
};
use ztnc_core::{
    EventCode, NetworkId, NetworkStack, NodeId, NotificationSink, RawNotification, StackError,
};

use crate::identity;
use crate::stream::{LoopbackListener, LoopbackStream};

const NETWORK_MTU: u32 = 2800;

#[derive(Clone, Debug)]
pub struct LoopbackConfig {
    /// Address reported as assigned on every joined network; streams bind
    /// and listen on it.
    pub address: Ipv4Addr,
    /// Pause before each notification, to mimic a stack that takes time to
    /// converge.
    pub event_delay: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::LOCALHOST,
            event_delay: Duration::ZERO,
        }
    }
}

enum Command {
    Start { node_id: NodeId, port: u16 },
    Join(NetworkId),
    Stop,
}

struct Running {
    node_id: NodeId,
    commands: Sender<Command>,
}

type SinkSlot = Arc<RwLock<Option<Arc<dyn NotificationSink>>>>;

/// Loopback implementation of [`NetworkStack`].
pub struct LoopbackStack {
    config: LoopbackConfig,
    sink: SinkSlot,
    running: Mutex<Option<Running>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LoopbackStack {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            sink: Arc::new(RwLock::new(None)),
            running: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    fn send(&self, command: Command) -> Result<(), StackError> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(StackError::NotRunning)?;
        running
            .commands
            .send(command)
            .map_err(|_| StackError::NotRunning)
    }

    fn require_running(&self) -> Result<(), StackError> {
        if self.running.lock().is_some() {
            Ok(())
        } else {
            Err(StackError::NotRunning)
        }
    }

    fn join_worker(&self) {
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("loopback worker panicked");
            }
        }
    }
}

impl Default for LoopbackStack {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl Drop for LoopbackStack {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.commands.send(Command::Stop);
        }
        self.join_worker();
    }
}

impl NetworkStack for LoopbackStack {
    type Stream = LoopbackStream;
    type Listener = LoopbackListener;

    fn subscribe(&self, sink: Arc<dyn NotificationSink>) {
        *self.sink.write() = Some(sink);
    }

    fn start(&self, cache_dir: &Path, port: u16) -> Result<(), StackError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(StackError::AlreadyRunning);
        }
        // A previous session's worker may still be winding down.
        self.join_worker();

        let node_id = identity::load_or_create(cache_dir)?;
        let (commands, rx) = channel::unbounded();
        let worker = Worker {
            config: self.config.clone(),
            sink: Arc::clone(&self.sink),
            networks: Vec::new(),
        };
        let handle = thread::Builder::new()
            .name("ztnc-loopback".into())
            .spawn(move || worker.run(rx))?;
        *self.worker.lock() = Some(handle);

        commands
            .send(Command::Start { node_id, port })
            .map_err(|_| StackError::Lifecycle {
                op: "start",
                code: -1,
            })?;
        *running = Some(Running { node_id, commands });
        info!(node = %node_id, "loopback node starting");
        Ok(())
    }

    fn join(&self, nwid: NetworkId) -> Result<(), StackError> {
        self.send(Command::Join(nwid))
    }

    fn node_id(&self) -> Option<NodeId> {
        self.running.lock().as_ref().map(|r| r.node_id)
    }

    fn listen(&self, port: u16) -> Result<LoopbackListener, StackError> {
        self.require_running()?;
        let inner = TcpListener::bind(SocketAddrV4::new(self.config.address, port))?;
        debug!(addr = ?inner.local_addr().ok(), "listening");
        Ok(LoopbackListener { inner })
    }

    fn accept(&self, listener: &LoopbackListener) -> Result<LoopbackStream, StackError> {
        self.require_running()?;
        let (stream, peer) = listener.inner.accept()?;
        debug!(%peer, "accepted");
        Ok(LoopbackStream::new(stream)?)
    }

    fn connect(&self, addr: SocketAddr) -> Result<LoopbackStream, StackError> {
        self.require_running()?;
        let stream = TcpStream::connect(addr)?;
        debug!(%addr, "connected");
        Ok(LoopbackStream::new(stream)?)
    }

    fn stop(&self) -> Result<(), StackError> {
        let running = self.running.lock().take().ok_or(StackError::NotRunning)?;
        running
            .commands
            .send(Command::Stop)
            .map_err(|_| StackError::Lifecycle { op: "stop", code: -1 })
    }
}

/// Owns everything the notification thread needs.
struct Worker {
    config: LoopbackConfig,
    sink: SinkSlot,
    networks: Vec<NetworkId>,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>) {
        for command in commands {
            match command {
                Command::Start { node_id, port } => self.started(node_id, port),
                Command::Join(nwid) => self.joined(nwid),
                Command::Stop => {
                    self.stopped();
                    return;
                }
            }
        }
    }

    fn started(&mut self, node_id: NodeId, port: u16) {
        let node = RawNodeDetails {
            address: node_id.0,
            primary_port: port,
            secondary_port: 0,
            tertiary_port: 0,
            ver_major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            ver_minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            ver_rev: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        };
        self.emit(RawNotification::new(EventCode::StackUp.raw()));
        let mut online = RawNotification::new(EventCode::NodeOnline.raw());
        online.node = &node;
        self.emit(online);
    }

    fn joined(&mut self, nwid: NetworkId) {
        if self.networks.contains(&nwid) {
            return;
        }
        self.networks.push(nwid);

        let assigned = RawSockAddr::from(SocketAddr::from((self.config.address, 0)));
        let mut network = RawNetworkDetails::empty(nwid.0);
        network.set_name(&format!("loopback-{nwid}"));
        network.mtu = NETWORK_MTU;
        network.status = NetworkStatus::RequestingConfiguration.raw();

        let mut requesting = RawNotification::new(EventCode::NetworkRequestingConfig.raw());
        requesting.network = &network;
        self.emit(requesting);

        let netif = RawNetifDetails {
            nwid: nwid.0,
            mac: 0,
            mtu: NETWORK_MTU as i32,
        };
        let mut netif_up = RawNotification::new(EventCode::NetifUp.raw());
        netif_up.netif = &netif;
        self.emit(netif_up);

        let addr = RawAddrDetails {
            nwid: nwid.0,
            addr: assigned,
        };
        let mut addr_added = RawNotification::new(EventCode::AddrAddedIp4.raw());
        addr_added.addr = &addr;
        self.emit(addr_added);

        let mut network = network;
        network.status = NetworkStatus::Ok.raw();
        network.assigned_addr_count = 1;
        network.assigned_addrs[0] = assigned;
        for code in [EventCode::NetworkReadyIp4, EventCode::NetworkOk] {
            let mut ready = RawNotification::new(code.raw());
            ready.network = &network;
            self.emit(ready);
        }
    }

    fn stopped(&mut self) {
        for nwid in std::mem::take(&mut self.networks) {
            let network = RawNetworkDetails::empty(nwid.0);
            let mut down = RawNotification::new(EventCode::NetworkDown.raw());
            down.network = &network;
            self.emit(down);
        }
        self.emit(RawNotification::new(EventCode::StackDown.raw()));
        self.emit(RawNotification::new(EventCode::NodeDown.raw()));
        info!("loopback node down");
    }

    fn emit(&self, raw: RawNotification) {
        if !self.config.event_delay.is_zero() {
            thread::sleep(self.config.event_delay);
        }
        // Never hold the slot lock across the callback.
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            // SAFETY: every pointer in `raw` refers to a local of the calling
            // frame that outlives this call.
            unsafe { sink.on_notification(&raw) };
        }
    }
}
