//! Primary named-event protocol client
//!
//! `ChatSocket` owns exactly one logical connection to the chat server. A
//! background task holds the WebSocket; public operations are non-blocking
//! sends onto a command channel, except `connect` which awaits the first
//! handshake outcome. Reconnection is automatic with bounded exponential
//! backoff; a generation counter fences every task-side effect so nothing
//! from a superseded connection can touch state or fire callbacks after
//! `disconnect` or a newer `connect`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use async_trait::async_trait;

use gigchat_core::wire::{ClientEvent, ServerEvent};
use gigchat_core::{
    ChatError, ChatUser, ClientConfig, ConnectionStatus, MessageType, Result, ThreadId,
    TypingTracker,
};

use crate::endpoint;
use crate::handlers::ChatEventHandlers;
use crate::transport::ChatTransport;
use crate::typing::{TypingDebouncer, TypingEdge};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ----------------------------------------------------------------------------
// Client Handle
// ----------------------------------------------------------------------------

/// The primary gigchat client
///
/// Cheap to clone; all clones share the same connection.
#[derive(Clone)]
pub struct ChatSocket {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    state: Mutex<ClientState>,
    handlers: RwLock<ChatEventHandlers>,
    typing: TypingDebouncer,
    typing_seen: Mutex<TypingTracker>,
    generation: AtomicU64,
    manual_close: AtomicBool,
}

#[derive(Default)]
struct ClientState {
    status: ConnectionStatus,
    token: Option<String>,
    current_thread: Option<ThreadId>,
    current_user: Option<ChatUser>,
    session_id: Option<Uuid>,
    outbound: Option<mpsc::UnboundedSender<ClientEvent>>,
    attempts: u32,
}

impl ChatSocket {
    /// Create a client for the given configuration. No connection is made
    /// until `connect`.
    pub fn new(config: ClientConfig) -> Self {
        let typing = TypingDebouncer::new(config.typing.stop_delay);
        let typing_seen = Mutex::new(TypingTracker::new(config.typing.indicator_ttl));
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ClientState::default()),
                handlers: RwLock::new(ChatEventHandlers::default()),
                typing,
                typing_seen,
                generation: AtomicU64::new(0),
                manual_close: AtomicBool::new(false),
            }),
        }
    }

    /// Establish an authenticated connection.
    ///
    /// Resolves when the transport reports connected. Fails only if the
    /// initial attempt dies before automatic reconnection has taken over;
    /// from then on failures are reported through the status and error
    /// callbacks.
    pub async fn connect(&self, token: &str) -> Result<()> {
        self.inner.config.validate()?;
        if self.is_connected() {
            return Ok(());
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.manual_close.store(false, Ordering::SeqCst);
        {
            let mut state = self.inner.state.lock().unwrap();
            state.token = Some(token.to_string());
            state.attempts = 0;
        }
        self.inner.set_status(generation, ConnectionStatus::Connecting);

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(connection_task(
            Arc::clone(&self.inner),
            token.to_string(),
            generation,
            ready_tx,
        ));

        ready_rx
            .await
            .unwrap_or_else(|_| Err(ChatError::handshake("connection task exited unexpectedly")))
    }

    /// Tear the connection down immediately. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.manual_close.store(true, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.typing.cancel();

        let changed = {
            let mut state = self.inner.state.lock().unwrap();
            state.outbound = None;
            state.session_id = None;
            state.current_thread = None;
            state.current_user = None;
            let changed = state.status != ConnectionStatus::Disconnected;
            state.status = ConnectionStatus::Disconnected;
            changed
        };
        self.inner.typing_seen.lock().unwrap().clear();

        if changed {
            info!("chat connection closed by client");
            self.inner.fire_status(ConnectionStatus::Disconnected);
        }
    }

    /// Force-disconnect and reconnect with the stored token
    pub async fn retry_connection(&self) -> Result<()> {
        let token = {
            let state = self.inner.state.lock().unwrap();
            state.token.clone()
        }
        .ok_or(ChatError::MissingToken)?;

        info!("retrying chat connection");
        self.disconnect().await;
        self.connect(&token).await
    }

    /// Force-disconnect and reconnect with a fresh token
    pub async fn reconnect_with_token(&self, token: &str) -> Result<()> {
        self.disconnect().await;
        self.connect(token).await
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().unwrap().status
    }

    /// Thread currently acknowledged by the server, if any
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.inner.state.lock().unwrap().current_thread
    }

    /// Identity confirmed by the server for this session
    pub fn current_user(&self) -> Option<ChatUser> {
        self.inner.state.lock().unwrap().current_user.clone()
    }

    /// Client-assigned id of the established connection
    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.state.lock().unwrap().session_id
    }

    /// Automatic attempts consumed by the current reconnection cycle
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().unwrap().attempts
    }

    /// Merge a partial handler set; only provided keys are overwritten.
    pub fn set_event_handlers(&self, handlers: ChatEventHandlers) {
        self.inner.handlers.write().unwrap().merge(handlers);
    }

    /// Users with a live typing indicator in the thread
    pub fn typing_users(&self, thread_id: ThreadId) -> Vec<String> {
        self.inner
            .typing_seen
            .lock()
            .unwrap()
            .active_users(thread_id, Instant::now())
    }

    /// Request membership of a thread.
    ///
    /// Any previously tracked thread is left first, so at most one
    /// subscription is ever active. The tracked thread updates when the
    /// server acknowledges with `thread_joined`.
    pub fn join_thread(&self, thread_id: ThreadId) -> Result<()> {
        let previous = self.inner.state.lock().unwrap().current_thread;
        if let Some(previous) = previous.filter(|prev| *prev != thread_id) {
            debug!(%previous, "leaving tracked thread before join");
            let _ = self.inner.emit(ClientEvent::LeaveThread {
                thread_id: previous,
            });
        }
        self.inner.emit(ClientEvent::JoinThread { thread_id })
    }

    /// Leave a thread; the tracked thread is cleared only when it matches.
    pub fn leave_thread(&self, thread_id: ThreadId) -> Result<()> {
        self.inner.emit(ClientEvent::LeaveThread { thread_id })?;
        let mut state = self.inner.state.lock().unwrap();
        if state.current_thread == Some(thread_id) {
            state.current_thread = None;
        }
        Ok(())
    }

    /// Send a message to a thread. Content is trimmed; empty content is
    /// refused locally. Failures while disconnected also reach the error
    /// callback, matching the UI contract.
    pub fn send_message(
        &self,
        thread_id: ThreadId,
        content: &str,
        message_type: MessageType,
    ) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            warn!("refusing to send empty message");
            return Err(ChatError::EmptyMessage);
        }
        self.inner
            .emit(ClientEvent::SendMessage {
                thread_id,
                content: content.to_string(),
                message_type,
            })
            .map_err(|err| {
                self.inner.fire_error(&err);
                err
            })
    }

    /// Mark every message in the thread as read
    pub fn mark_read(&self, thread_id: ThreadId) -> Result<()> {
        self.inner.emit(ClientEvent::MarkAsRead { thread_id })
    }

    /// Signal a typing edge.
    ///
    /// Emits `typing_start` once per edge and re-arms the auto-stop timer
    /// on repeat calls; after the configured idle delay a `typing_stop` is
    /// emitted automatically.
    pub fn start_typing(&self, thread_id: ThreadId) {
        if !self.is_connected() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let edge = self.inner.typing.start(thread_id, move |thread_id| {
            if let Some(inner) = weak.upgrade() {
                trace!(%thread_id, "typing idle, auto stop");
                let _ = inner.emit(ClientEvent::TypingStop { thread_id });
            }
        });
        match edge {
            TypingEdge::Started { stop_previous } => {
                if let Some(previous) = stop_previous {
                    let _ = self.inner.emit(ClientEvent::TypingStop {
                        thread_id: previous,
                    });
                }
                let _ = self.inner.emit(ClientEvent::TypingStart { thread_id });
            }
            TypingEdge::Refreshed => {}
        }
    }

    /// Cancel the pending auto-stop and emit `typing_stop` now; a no-op
    /// when no edge is active.
    pub fn stop_typing(&self, thread_id: ThreadId) {
        if self.inner.typing.stop(thread_id) && self.is_connected() {
            let _ = self.inner.emit(ClientEvent::TypingStop { thread_id });
        }
    }
}

// ----------------------------------------------------------------------------
// Shared State Helpers
// ----------------------------------------------------------------------------

impl Inner {
    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Transition status and notify, unless superseded or unchanged.
    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        {
            let mut state = self.state.lock().unwrap();
            if self.generation.load(Ordering::SeqCst) != generation || state.status == status {
                return;
            }
            state.status = status;
        }
        debug!(%status, "connection status changed");
        self.fire_status(status);
    }

    fn fire_status(&self, status: ConnectionStatus) {
        let handler = self.handlers.read().unwrap().on_connection_change.clone();
        if let Some(handler) = handler {
            handler(status);
        }
    }

    fn fire_error(&self, err: &ChatError) {
        let handler = self.handlers.read().unwrap().on_error.clone();
        if let Some(handler) = handler {
            handler(err);
        }
    }

    /// Queue an event onto the live session, or refuse when disconnected.
    fn emit(&self, event: ClientEvent) -> Result<()> {
        let sender = {
            let state = self.state.lock().unwrap();
            if state.status.is_connected() {
                state.outbound.clone()
            } else {
                None
            }
        };
        match sender {
            Some(sender) => sender.send(event).map_err(|_| ChatError::NotConnected),
            None => {
                warn!(event = %event.name(), "dropping emit while disconnected");
                Err(ChatError::NotConnected)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Connection Task
// ----------------------------------------------------------------------------

async fn connection_task(
    inner: Arc<Inner>,
    token: String,
    generation: u64,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut ready = Some(ready);
    let mut attempt: u32 = 0;

    loop {
        if inner.is_stale(generation) {
            return;
        }

        match dial(&inner, &token).await {
            Ok(stream) => {
                attempt = 0;
                let session_id = Uuid::new_v4();
                let (tx, rx) = mpsc::unbounded_channel();
                let rejoin = {
                    let mut state = inner.state.lock().unwrap();
                    if inner.generation.load(Ordering::SeqCst) != generation {
                        return; // torn down while dialing
                    }
                    state.outbound = Some(tx.clone());
                    state.session_id = Some(session_id);
                    state.attempts = 0;
                    state.current_thread
                };
                inner.set_status(generation, ConnectionStatus::Connected);
                if let Some(ready_tx) = ready.take() {
                    let _ = ready_tx.send(Ok(()));
                }
                if let Some(thread_id) = rejoin {
                    debug!(%thread_id, "rejoining thread after reconnect");
                    let _ = tx.send(ClientEvent::JoinThread { thread_id });
                }
                drop(tx);
                info!(%session_id, "chat connection established");

                let reason = run_session(&inner, generation, stream, rx).await;

                {
                    let mut state = inner.state.lock().unwrap();
                    if inner.generation.load(Ordering::SeqCst) == generation {
                        state.outbound = None;
                        state.session_id = None;
                    }
                }
                inner.typing.cancel();
                if inner.is_stale(generation) || inner.manual_close.load(Ordering::SeqCst) {
                    return;
                }
                warn!(%reason, "chat connection lost");
                inner.fire_error(&ChatError::transport(reason));
            }
            Err(err) => {
                if inner.is_stale(generation) {
                    return;
                }
                warn!(error = %err, "chat connection attempt failed");
                if let Some(ready_tx) = ready.take() {
                    let _ = ready_tx.send(Err(err));
                }
            }
        }

        attempt += 1;
        {
            let mut state = inner.state.lock().unwrap();
            state.attempts = attempt;
        }
        if attempt > inner.config.reconnect.max_attempts {
            inner.set_status(generation, ConnectionStatus::Disconnected);
            inner.fire_error(&ChatError::ReconnectExhausted {
                attempts: inner.config.reconnect.max_attempts,
            });
            return;
        }

        let delay = inner.config.reconnect.delay_for(attempt);
        debug!(
            attempt,
            max = inner.config.reconnect.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        inner.set_status(generation, ConnectionStatus::Reconnecting);
        tokio::time::sleep(delay).await;
    }
}

async fn dial(inner: &Inner, token: &str) -> Result<WsStream> {
    let url = endpoint::event_endpoint(&inner.config.server_url, token)?;
    match tokio::time::timeout(inner.config.connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(err)) => Err(ChatError::handshake(err.to_string())),
        Err(_) => Err(ChatError::handshake(format!(
            "handshake timed out after {:?}",
            inner.config.connect_timeout
        ))),
    }
}

/// Drive one established session until it ends; returns the reason.
async fn run_session(
    inner: &Arc<Inner>,
    generation: u64,
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
) -> String {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(event) => {
                    let text = match event.to_json() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "failed to encode outbound event");
                            continue;
                        }
                    };
                    trace!(event = %event.name(), "emit");
                    if let Err(err) = sink.send(WsMessage::Text(text)).await {
                        return format!("send failed: {err}");
                    }
                }
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return "closed by client".to_string();
                }
            },
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match ServerEvent::from_json(&text) {
                    Ok(event) => dispatch(inner, generation, event),
                    Err(err) => warn!(error = %err, "ignoring undecodable frame"),
                },
                Some(Ok(WsMessage::Ping(payload))) => {
                    if let Err(err) = sink.send(WsMessage::Pong(payload)).await {
                        return format!("pong failed: {err}");
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return match frame {
                        Some(close) => format!("closed by server: {}", close.reason),
                        None => "closed by server".to_string(),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return format!("transport error: {err}"),
                None => return "stream ended".to_string(),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Event Dispatch
// ----------------------------------------------------------------------------

/// Map one inbound event to state updates and the registered callback.
/// Missing callbacks are silently ignored.
fn dispatch(inner: &Arc<Inner>, generation: u64, event: ServerEvent) {
    if inner.is_stale(generation) {
        return;
    }
    let handlers = inner.handlers.read().unwrap().clone();

    match event {
        ServerEvent::ConnectionConfirmed { status, user } => {
            debug!(%status, user = %user.username, "connection confirmed by server");
            inner.state.lock().unwrap().current_user = Some(user.clone());
            if let Some(handler) = handlers.on_connection_confirmed {
                handler(user);
            }
        }
        ServerEvent::NewMessage(message) => {
            if let Some(handler) = handlers.on_message {
                handler(message);
            }
        }
        ServerEvent::ThreadJoined {
            thread_id,
            messages,
        } => {
            inner.state.lock().unwrap().current_thread = Some(thread_id);
            debug!(%thread_id, history = messages.len(), "thread joined");
            if let Some(handler) = handlers.on_thread_joined {
                handler(thread_id, messages);
            }
        }
        ServerEvent::TypingStart { user, thread_id } => {
            inner
                .typing_seen
                .lock()
                .unwrap()
                .note_start(thread_id, &user, Instant::now());
            if let Some(handler) = handlers.on_typing_start {
                handler(&user, thread_id);
            }
        }
        ServerEvent::TypingStop { user, thread_id } => {
            inner.typing_seen.lock().unwrap().note_stop(thread_id, &user);
            if let Some(handler) = handlers.on_typing_stop {
                handler(&user, thread_id);
            }
        }
        ServerEvent::UserJoined { user, thread_id } => {
            if let Some(handler) = handlers.on_user_joined {
                handler(&user, thread_id);
            }
        }
        ServerEvent::UserLeft { user, thread_id } => {
            if let Some(handler) = handlers.on_user_left {
                handler(&user, thread_id);
            }
        }
        ServerEvent::MessagesRead {
            user,
            thread_id,
            count,
        } => {
            if let Some(handler) = handlers.on_messages_read {
                handler(&user, thread_id, count);
            }
        }
        ServerEvent::Error { message } => {
            let err = ChatError::server(message);
            warn!(error = %err, "server reported error");
            inner.fire_error(&err);
        }
        ServerEvent::Unknown => warn!("ignoring unknown server event"),
    }
}

// ----------------------------------------------------------------------------
// Trait Implementation
// ----------------------------------------------------------------------------

#[async_trait]
impl ChatTransport for ChatSocket {
    async fn connect(&self, token: &str) -> Result<()> {
        ChatSocket::connect(self, token).await
    }

    async fn disconnect(&self) {
        ChatSocket::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        ChatSocket::is_connected(self)
    }

    fn status(&self) -> ConnectionStatus {
        ChatSocket::status(self)
    }

    fn set_event_handlers(&self, handlers: ChatEventHandlers) {
        ChatSocket::set_event_handlers(self, handlers)
    }

    async fn join_thread(&self, thread_id: ThreadId) -> Result<()> {
        ChatSocket::join_thread(self, thread_id)
    }

    async fn leave_thread(&self, thread_id: ThreadId) -> Result<()> {
        ChatSocket::leave_thread(self, thread_id)
    }

    async fn send_message(
        &self,
        thread_id: ThreadId,
        content: &str,
        message_type: MessageType,
    ) -> Result<()> {
        ChatSocket::send_message(self, thread_id, content, message_type)
    }

    async fn mark_read(&self, thread_id: ThreadId) -> Result<()> {
        ChatSocket::mark_read(self, thread_id)
    }

    async fn start_typing(&self, thread_id: ThreadId) {
        ChatSocket::start_typing(self, thread_id)
    }

    async fn stop_typing(&self, thread_id: ThreadId) {
        ChatSocket::stop_typing(self, thread_id)
    }

    async fn retry_connection(&self) -> Result<()> {
        ChatSocket::retry_connection(self).await
    }

    async fn reconnect_with_token(&self, token: &str) -> Result<()> {
        ChatSocket::reconnect_with_token(self, token).await
    }
}
