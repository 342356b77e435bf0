//! Relay session: bring the node up, join the network, open one stream and
//! pump it against local input/output, then tear everything down in order.

use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};
use ztnc_core::{
    CallbackAdapter, CancellationToken, CapturedEvent, EventCode, EventRegistry, NetworkId,
    NetworkStack, Waiter,
};
use ztnc_streaming::{DuplexPump, LocalIo, PumpReport};

use crate::config::Options;

/// Which end of the stream this process opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Dial a remote listener.
    Connect(SocketAddr),
    /// Accept one connection on a local port.
    Listen(u16),
}

/// Waiters for every notification the session blocks on. All are registered
/// before `start`, so nothing the stack announces early is missed.
struct Milestones {
    online: Waiter,
    address: Waiter,
    ready: Waiter,
    down: Waiter,
}

impl Milestones {
    fn register(registry: &EventRegistry, nwid: NetworkId) -> Self {
        Self {
            online: registry.register(|e: &CapturedEvent| e.code == EventCode::NodeOnline),
            address: registry.register(move |e: &CapturedEvent| {
                e.code == EventCode::AddrAddedIp4 && e.nwid() == Some(nwid)
            }),
            ready: registry.register(move |e: &CapturedEvent| {
                e.code == EventCode::NetworkReadyIp4 && e.nwid().map_or(true, |id| id == nwid)
            }),
            // Any terminal notification means the node is gone.
            down: registry.register(|e: &CapturedEvent| e.code.is_terminal()),
        }
    }
}

/// Runs one relay session against `stack`.
///
/// Any startup failure (lifecycle call error, cancelled or abandoned wait)
/// returns early without tearing down later stages. Once a stream is open,
/// the session always ends with the stream closed, `stop` issued and the
/// node-down notification awaited for at most `options.teardown_timeout`.
pub fn execute<S, I, O>(
    stack: &S,
    options: &Options,
    cache_dir: &Path,
    local: LocalIo<I, O>,
    token: &CancellationToken,
) -> anyhow::Result<PumpReport>
where
    S: NetworkStack,
    I: Read + Send,
    O: Write + Send,
{
    let nwid = options.network;
    let registry = EventRegistry::new();
    stack.subscribe(Arc::new(CallbackAdapter::new(registry.clone())));
    let mut milestones = Milestones::register(&registry, nwid);

    eprintln!("Connecting to network stack...");
    stack
        .start(cache_dir, options.stack_port)
        .context("failed to start node")?;
    milestones
        .online
        .wait_cancellable(token)
        .context("node did not come online")?;

    eprintln!("Joining network {nwid}...");
    stack
        .join(nwid)
        .with_context(|| format!("failed to join network {nwid}"))?;
    let assigned = milestones
        .address
        .wait_cancellable(token)
        .context("no address assigned")?;
    let ready = milestones
        .ready
        .wait_cancellable(token)
        .context("network never became ready")?;

    let address = assigned.addr.as_ref().and_then(|a| a.addr).map(|a| a.ip());
    let node = stack.node_id();
    info!(
        node = ?node,
        address = ?address,
        status = ?ready.network.as_ref().map(|n| n.status),
        "joined network {nwid}"
    );
    if let Some(node) = node {
        eprintln!("Node {node} has address {}", display_ip(address));
    }

    let remote = match options.command {
        Command::Listen(port) => {
            let listener = stack
                .listen(port)
                .with_context(|| format!("failed to listen on port {port}"))?;
            eprintln!("Listening at ({nwid}) {}:{port}", display_ip(address));
            stack.accept(&listener).context("failed to accept connection")?
        }
        Command::Connect(addr) => stack
            .connect(addr)
            .with_context(|| format!("failed to connect to {addr}"))?,
    };
    eprintln!("Established connection");

    let report = DuplexPump::new(token.clone())
        .with_config(options.pump)
        .run(remote, local);
    debug!(?report, interrupted = token.signal_received(), "session finished");

    eprintln!("Disconnecting...");
    match stack.stop() {
        Ok(()) => match milestones.down.wait_timeout(options.teardown_timeout) {
            Ok(_) => debug!("node down"),
            Err(err) => warn!(%err, "node did not report shutdown"),
        },
        Err(err) => warn!(%err, "failed to stop node"),
    }
    eprintln!("Connection terminated");
    Ok(report)
}

fn display_ip(ip: Option<IpAddr>) -> String {
    ip.map_or_else(|| "?".to_string(), |ip| ip.to_string())
}
