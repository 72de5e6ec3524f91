//! Component: the process-wide handle.
//!
//! Owns the registry, the monitor hub, the peer directory and the event loop
//! task. Construction either yields a running Component or an error; there is
//! no half-started state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use swmlink_core::error::{Result, SwmError};
use swmlink_core::protocol::{encode, MessageFamily};

use crate::actor::{Command, EventLoop, LoopState};
use crate::classify::{Classifier, PeerDirectory, PeerInfo};
use crate::config::ComponentConfig;
use crate::monitor::{MonitorHub, MonitorSubscription};
use crate::pending::{PendingHandle, PendingRegistry};
use crate::transport::GroupTransport;

const COMMAND_QUEUE: usize = 256;

pub struct Component {
    name: String,
    group: String,
    node_id: String,
    timeout: Duration,
    shutdown_on_timeout: bool,

    registry: Arc<PendingRegistry>,
    monitor: MonitorHub,
    directory: Arc<PeerDirectory>,

    commands: mpsc::Sender<Command>,
    state: watch::Receiver<LoopState>,
    task: Mutex<Option<JoinHandle<Box<dyn GroupTransport>>>>,
    alive: AtomicBool,
}

impl Component {
    /// Validate `config`, announce headers, start the transport, join the
    /// group and spawn the event loop.
    pub async fn start<T>(config: ComponentConfig, transport: T) -> Result<Self>
    where
        T: GroupTransport + 'static,
    {
        config.validate()?;

        let mut transport: Box<dyn GroupTransport> = Box::new(transport);
        for (key, value) in config.header_pairs() {
            transport.set_header(&key, &value);
        }

        transport.start().await?;
        if let Err(e) = transport.join(&config.group).await {
            transport.stop().await;
            return Err(e);
        }
        if config.join_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.join_settle_ms)).await;
        }

        let node_id = transport.uuid().to_owned();
        let registry = Arc::new(PendingRegistry::new());
        let monitor = MonitorHub::default();
        let directory = Arc::new(PeerDirectory::new());

        let classifier = Classifier::new(
            config.short_name.clone(),
            registry.clone(),
            monitor.clone(),
            directory.clone(),
            config.match_direct_messages,
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let (state_tx, state_rx) = watch::channel(LoopState::Running);
        let event_loop = EventLoop::new(
            transport,
            cmd_rx,
            classifier,
            config.poll_quantum(),
            state_tx,
        );

        let span = tracing::info_span!("event_loop", node = %config.short_name);
        let task = tokio::spawn(event_loop.run().instrument(span));

        tracing::info!(
            node = %config.short_name,
            group = %config.group,
            node_id = %node_id,
            timeout_ms = config.timeout_ms(),
            "component started"
        );

        Ok(Self {
            name: config.short_name.clone(),
            group: config.group.clone(),
            node_id,
            timeout: config.request_timeout(),
            shutdown_on_timeout: config.shutdown_on_timeout,
            registry,
            monitor,
            directory,
            commands: cmd_tx,
            state: state_rx,
            task: Mutex::new(Some(task)),
            alive: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Transport-level node id (used as requester identity).
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn loop_state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    pub fn subscribe_monitor(&self) -> MonitorSubscription {
        self.monitor.subscribe()
    }

    pub fn peers(&self) -> Vec<PeerInfo> {
        self.directory.snapshot()
    }

    /// Wait until at least `min` peers are known. `false` on timeout.
    pub async fn wait_for_peers(&self, min: usize, timeout: Duration) -> bool {
        self.directory.wait_for(min, timeout).await
    }

    fn ensure_alive(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(SwmError::Stopped);
        }
        Ok(())
    }

    /// Encode `payload` for `family` and register it, without sending.
    /// Returns the handle and the wire text.
    pub fn encode_request(
        &self,
        family: MessageFamily,
        payload: Value,
    ) -> Result<(PendingHandle, String)> {
        self.ensure_alive()?;
        let encoded = encode(family, payload)?;
        let wire = encoded.to_wire()?;
        let handle = self
            .registry
            .register(&encoded.correlation_id, &self.node_id, encoded.envelope)?;
        // shutdown may have drained between the check above and the insert
        if !self.is_alive() {
            self.registry.cancel(handle.query_id());
            return Err(SwmError::Stopped);
        }
        Ok((handle, wire))
    }

    /// Broadcast `body` to the Component's group.
    pub async fn shout(&self, body: &str) -> Result<()> {
        self.ensure_alive()?;
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Shout {
                group: self.group.clone(),
                body: body.to_owned(),
                done,
            })
            .await
            .map_err(|_| SwmError::Stopped)?;
        rx.await.map_err(|_| SwmError::Stopped)?
    }

    pub async fn whisper(&self, peer: &str, body: &str) -> Result<()> {
        self.ensure_alive()?;
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Whisper {
                peer: peer.to_owned(),
                body: body.to_owned(),
                done,
            })
            .await
            .map_err(|_| SwmError::Stopped)?;
        rx.await.map_err(|_| SwmError::Stopped)?
    }

    /// Encode, register and broadcast. A failed broadcast unregisters.
    pub async fn send(&self, family: MessageFamily, payload: Value) -> Result<PendingHandle> {
        let (handle, wire) = self.encode_request(family, payload)?;
        if let Err(e) = self.shout(&wire).await {
            self.registry.cancel(handle.query_id());
            return Err(e);
        }
        tracing::debug!(node = %self.name, query_id = %handle.query_id(), "request sent");
        Ok(handle)
    }

    /// Wait for the reply to `handle`.
    ///
    /// The deadline is `registered_at + timeout`; a timeout too large to
    /// represent waits without a deadline. On timeout only this entry
    /// is cancelled; if a reply won the race against the cancel, that reply is
    /// returned instead.
    pub async fn wait_for_reply(&self, handle: PendingHandle, timeout: Duration) -> Result<Value> {
        let (query_id, registered_at, mut rx) = handle.into_parts();
        let Some(deadline) = registered_at.checked_add(timeout) else {
            return rx.await.map_err(|_| SwmError::Stopped);
        };

        match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(SwmError::Stopped),
            Err(_) => {
                if !self.registry.cancel(&query_id) {
                    return rx.await.map_err(|_| SwmError::Stopped);
                }
                let timeout_ms = timeout.as_millis() as u64;
                tracing::warn!(node = %self.name, query_id = %query_id, timeout_ms, "request timed out");
                if self.shutdown_on_timeout {
                    tracing::warn!(node = %self.name, "shutdown-on-timeout set, stopping component");
                    self.shutdown().await;
                }
                Err(SwmError::Timeout {
                    query_id,
                    timeout_ms,
                })
            }
        }
    }

    /// `send` + `wait_for_reply` with the configured timeout.
    pub async fn request(&self, family: MessageFamily, payload: Value) -> Result<Value> {
        let handle = self.send(family, payload).await?;
        self.wait_for_reply(handle, self.timeout).await
    }

    /// Drop the registration behind `handle`. `true` iff it was still live.
    pub fn cancel(&self, handle: &PendingHandle) -> bool {
        self.registry.cancel(handle.query_id())
    }

    /// Stop the loop, release every pending waiter, leave the group and stop
    /// the transport. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        // ---- stop the loop and take the transport back
        let _ = self.commands.send(Command::Terminate).await;
        let task = self.task.lock().await.take();
        let transport = match task {
            Some(task) => match task.await {
                Ok(transport) => Some(transport),
                Err(e) => {
                    tracing::error!(node = %self.name, error = %e, "event loop task failed");
                    None
                }
            },
            None => None,
        };

        // ---- release waiters
        let drained = self.registry.drain_all();
        if !drained.is_empty() {
            tracing::info!(node = %self.name, count = drained.len(), "pending requests released");
        }
        drop(drained);

        // ---- leave and release the transport
        if let Some(mut transport) = transport {
            if let Err(e) = transport.leave(&self.group).await {
                tracing::warn!(node = %self.name, group = %self.group, error = %e, "leave failed");
            }
            transport.stop().await;
        }

        tracing::info!(node = %self.name, "component stopped");
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            let _ = self.commands.try_send(Command::Terminate);
            let drained = self.registry.drain_all();
            tracing::debug!(node = %self.name, released = drained.len(), "component dropped without shutdown");
        }
    }
}
