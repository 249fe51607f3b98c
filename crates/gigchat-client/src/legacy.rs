//! Legacy raw-envelope fallback client
//!
//! Speaks the flat `{"type": ...}` envelope over per-thread endpoints
//! (`/ws/chat/{thread_id}/?token=...`). A connection is scoped to one
//! thread, so under the shared `ChatTransport` contract `connect` records
//! credentials, `join_thread` dials the thread endpoint, and leaving the
//! tracked thread closes the socket. Reconnection is a manual loop with
//! uncapped `base * 2^attempt` backoff, suppressed by the manual-close
//! flag. Read-marking follows the legacy id-list protocol: inbound unread
//! message ids accumulate until `mark_read` flushes them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use async_trait::async_trait;

use gigchat_core::legacy::{LegacyClientFrame, LegacyServerFrame};
use gigchat_core::{
    ChatError, ClientConfig, ConnectionStatus, MessageId, MessageType, Result, ThreadId,
};

use crate::endpoint;
use crate::handlers::ChatEventHandlers;
use crate::transport::ChatTransport;
use crate::typing::{TypingDebouncer, TypingEdge};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ----------------------------------------------------------------------------
// Client Handle
// ----------------------------------------------------------------------------

/// The legacy envelope-protocol client
#[derive(Clone)]
pub struct LegacyChatSocket {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    state: Mutex<LegacyState>,
    handlers: RwLock<ChatEventHandlers>,
    typing: TypingDebouncer,
    generation: AtomicU64,
    manual_close: AtomicBool,
}

#[derive(Default)]
struct LegacyState {
    status: ConnectionStatus,
    token: Option<String>,
    thread: Option<ThreadId>,
    outbound: Option<mpsc::UnboundedSender<LegacyClientFrame>>,
    unread: Vec<MessageId>,
    attempts: u32,
}

impl LegacyChatSocket {
    pub fn new(config: ClientConfig) -> Self {
        let typing = TypingDebouncer::new(config.typing.stop_delay);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(LegacyState::default()),
                handlers: RwLock::new(ChatEventHandlers::default()),
                typing,
                generation: AtomicU64::new(0),
                manual_close: AtomicBool::new(false),
            }),
        }
    }

    /// Record credentials; dials immediately only when a thread is already
    /// tracked (the legacy endpoint is thread-scoped).
    pub async fn connect(&self, token: &str) -> Result<()> {
        self.inner.config.validate()?;
        let thread = {
            let mut state = self.inner.state.lock().unwrap();
            state.token = Some(token.to_string());
            state.thread
        };
        match thread {
            Some(thread_id) if !self.is_connected() => self.dial_thread(thread_id).await,
            _ => Ok(()),
        }
    }

    /// Dial the endpoint for a thread, replacing any current session.
    pub async fn join_thread(&self, thread_id: ThreadId) -> Result<()> {
        let (token, already_joined) = {
            let state = self.inner.state.lock().unwrap();
            (
                state.token.clone(),
                state.thread == Some(thread_id) && state.status.is_connected(),
            )
        };
        if token.is_none() {
            return Err(ChatError::MissingToken);
        }
        if already_joined {
            return Ok(());
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            state.thread = Some(thread_id);
            state.unread.clear();
        }
        self.dial_thread(thread_id).await
    }

    /// Leaving the tracked thread closes the socket; other ids are no-ops.
    pub async fn leave_thread(&self, thread_id: ThreadId) -> Result<()> {
        let tracked = self.inner.state.lock().unwrap().thread;
        if tracked == Some(thread_id) {
            self.disconnect().await;
        } else {
            warn!(%thread_id, "leave ignored, thread not tracked");
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.inner.manual_close.store(true, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.typing.cancel();

        let changed = {
            let mut state = self.inner.state.lock().unwrap();
            state.outbound = None;
            state.thread = None;
            state.unread.clear();
            let changed = state.status != ConnectionStatus::Disconnected;
            state.status = ConnectionStatus::Disconnected;
            changed
        };
        if changed {
            info!("legacy chat connection closed by client");
            self.inner.fire_status(ConnectionStatus::Disconnected);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().unwrap().status
    }

    /// Thread the socket is currently scoped to
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.inner.state.lock().unwrap().thread
    }

    /// Inbound message ids not yet flushed by `mark_read`
    pub fn unread_ids(&self) -> Vec<MessageId> {
        self.inner.state.lock().unwrap().unread.clone()
    }

    pub fn set_event_handlers(&self, handlers: ChatEventHandlers) {
        self.inner.handlers.write().unwrap().merge(handlers);
    }

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
        self.require_thread(thread_id)?;
        self.inner
            .emit(LegacyClientFrame::ChatMessage {
                message: content.to_string(),
                message_type,
                metadata: None,
            })
            .map_err(|err| {
                self.inner.fire_error(&err);
                err
            })
    }

    /// Flush the accumulated unread ids for the thread. A no-op when
    /// nothing is unread.
    pub fn mark_read(&self, thread_id: ThreadId) -> Result<()> {
        self.require_thread(thread_id)?;
        let message_ids = {
            let mut state = self.inner.state.lock().unwrap();
            std::mem::take(&mut state.unread)
        };
        if message_ids.is_empty() {
            return Ok(());
        }
        self.inner
            .emit(LegacyClientFrame::MarkMessagesRead { message_ids })
    }

    pub fn start_typing(&self, thread_id: ThreadId) {
        if !self.is_connected() || self.require_thread(thread_id).is_err() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let edge = self.inner.typing.start(thread_id, move |_| {
            if let Some(inner) = weak.upgrade() {
                let _ = inner.emit(LegacyClientFrame::TypingIndicator { is_typing: false });
            }
        });
        if matches!(edge, TypingEdge::Started { .. }) {
            let _ = self
                .inner
                .emit(LegacyClientFrame::TypingIndicator { is_typing: true });
        }
    }

    pub fn stop_typing(&self, thread_id: ThreadId) {
        if self.inner.typing.stop(thread_id) && self.is_connected() {
            let _ = self
                .inner
                .emit(LegacyClientFrame::TypingIndicator { is_typing: false });
        }
    }

    pub async fn retry_connection(&self) -> Result<()> {
        let (token, thread) = {
            let state = self.inner.state.lock().unwrap();
            (state.token.clone(), state.thread)
        };
        let token = token.ok_or(ChatError::MissingToken)?;
        self.disconnect().await;
        {
            let mut state = self.inner.state.lock().unwrap();
            state.thread = thread;
        }
        self.connect(&token).await
    }

    pub async fn reconnect_with_token(&self, token: &str) -> Result<()> {
        let thread = self.inner.state.lock().unwrap().thread;
        self.disconnect().await;
        {
            let mut state = self.inner.state.lock().unwrap();
            state.thread = thread;
        }
        self.connect(token).await
    }

    fn require_thread(&self, thread_id: ThreadId) -> Result<()> {
        let tracked = self.inner.state.lock().unwrap().thread;
        if tracked == Some(thread_id) {
            Ok(())
        } else {
            warn!(%thread_id, ?tracked, "operation targets an untracked thread");
            Err(ChatError::NotConnected)
        }
    }

    async fn dial_thread(&self, thread_id: ThreadId) -> Result<()> {
        let token = self
            .inner
            .state
            .lock()
            .unwrap()
            .token
            .clone()
            .ok_or(ChatError::MissingToken)?;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.manual_close.store(false, Ordering::SeqCst);
        self.inner
            .set_status(generation, ConnectionStatus::Connecting);

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(connection_task(
            Arc::clone(&self.inner),
            thread_id,
            token,
            generation,
            ready_tx,
        ));

        ready_rx
            .await
            .unwrap_or_else(|_| Err(ChatError::handshake("connection task exited unexpectedly")))
    }
}

// ----------------------------------------------------------------------------
// Shared State Helpers
// ----------------------------------------------------------------------------

impl Inner {
    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        {
            let mut state = self.state.lock().unwrap();
            if self.generation.load(Ordering::SeqCst) != generation || state.status == status {
                return;
            }
            state.status = status;
        }
        debug!(%status, "legacy connection status changed");
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

    fn emit(&self, frame: LegacyClientFrame) -> Result<()> {
        let sender = {
            let state = self.state.lock().unwrap();
            if state.status.is_connected() {
                state.outbound.clone()
            } else {
                None
            }
        };
        match sender {
            Some(sender) => sender.send(frame).map_err(|_| ChatError::NotConnected),
            None => {
                warn!(frame = %frame.name(), "dropping frame while disconnected");
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
    thread_id: ThreadId,
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

        match dial(&inner, thread_id, &token).await {
            Ok(stream) => {
                attempt = 0;
                let (tx, rx) = mpsc::unbounded_channel();
                {
                    let mut state = inner.state.lock().unwrap();
                    if inner.generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    state.outbound = Some(tx);
                    state.attempts = 0;
                }
                inner.set_status(generation, ConnectionStatus::Connected);
                if let Some(ready_tx) = ready.take() {
                    let _ = ready_tx.send(Ok(()));
                }
                info!(%thread_id, "legacy chat connection established");

                let reason = run_session(&inner, generation, thread_id, stream, rx).await;

                {
                    let mut state = inner.state.lock().unwrap();
                    if inner.generation.load(Ordering::SeqCst) == generation {
                        state.outbound = None;
                    }
                }
                inner.typing.cancel();
                if inner.is_stale(generation) || inner.manual_close.load(Ordering::SeqCst) {
                    return;
                }
                warn!(%reason, "legacy chat connection lost");
                inner.fire_error(&ChatError::transport(reason));
            }
            Err(err) => {
                if inner.is_stale(generation) {
                    return;
                }
                warn!(error = %err, "legacy connection attempt failed");
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

        // Uncapped exponential backoff, bounded only by the attempt limit.
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = inner
            .config
            .reconnect
            .initial_delay
            .saturating_mul(1u32 << exponent);
        debug!(
            attempt,
            max = inner.config.reconnect.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling legacy reconnect"
        );
        inner.set_status(generation, ConnectionStatus::Reconnecting);
        tokio::time::sleep(delay).await;
    }
}

async fn dial(inner: &Inner, thread_id: ThreadId, token: &str) -> Result<WsStream> {
    let url = endpoint::thread_endpoint(&inner.config.server_url, thread_id, token)?;
    match tokio::time::timeout(inner.config.connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(err)) => Err(ChatError::handshake(err.to_string())),
        Err(_) => Err(ChatError::handshake(format!(
            "handshake timed out after {:?}",
            inner.config.connect_timeout
        ))),
    }
}

async fn run_session(
    inner: &Arc<Inner>,
    generation: u64,
    thread_id: ThreadId,
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<LegacyClientFrame>,
) -> String {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    let text = match frame.to_json() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "failed to encode outbound frame");
                            continue;
                        }
                    };
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
                Some(Ok(WsMessage::Text(text))) => match LegacyServerFrame::from_json(&text) {
                    Ok(frame) => dispatch(inner, generation, thread_id, frame),
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
// Frame Dispatch
// ----------------------------------------------------------------------------

fn dispatch(inner: &Arc<Inner>, generation: u64, thread_id: ThreadId, frame: LegacyServerFrame) {
    if inner.is_stale(generation) {
        return;
    }
    let handlers = inner.handlers.read().unwrap().clone();

    match frame {
        LegacyServerFrame::ConnectionEstablished { message } => {
            debug!(message = message.as_deref().unwrap_or(""), "legacy connection established");
        }
        LegacyServerFrame::ChatMessage { data } => {
            if !data.is_read {
                inner.state.lock().unwrap().unread.push(data.id);
            }
            if let Some(handler) = handlers.on_message {
                handler(data);
            }
        }
        LegacyServerFrame::MessagesRead {
            message_ids,
            reader,
        } => {
            {
                let mut state = inner.state.lock().unwrap();
                state.unread.retain(|id| !message_ids.contains(id));
            }
            if let Some(handler) = handlers.on_messages_read {
                handler(&reader, thread_id, message_ids.len() as u64);
            }
        }
        LegacyServerFrame::TypingIndicator {
            user,
            is_typing,
            thread_id: frame_thread,
        } => {
            let thread = frame_thread.unwrap_or(thread_id);
            if is_typing {
                if let Some(handler) = handlers.on_typing_start {
                    handler(&user, thread);
                }
            } else if let Some(handler) = handlers.on_typing_stop {
                handler(&user, thread);
            }
        }
        LegacyServerFrame::Error { message } => {
            let err = ChatError::server(message.unwrap_or_else(|| "Unknown error".to_string()));
            warn!(error = %err, "legacy server reported error");
            inner.fire_error(&err);
        }
        LegacyServerFrame::Unknown => warn!("ignoring unknown legacy frame"),
    }
}

// ----------------------------------------------------------------------------
// Trait Implementation
// ----------------------------------------------------------------------------

#[async_trait]
impl ChatTransport for LegacyChatSocket {
    async fn connect(&self, token: &str) -> Result<()> {
        LegacyChatSocket::connect(self, token).await
    }

    async fn disconnect(&self) {
        LegacyChatSocket::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        LegacyChatSocket::is_connected(self)
    }

    fn status(&self) -> ConnectionStatus {
        LegacyChatSocket::status(self)
    }

    fn set_event_handlers(&self, handlers: ChatEventHandlers) {
        LegacyChatSocket::set_event_handlers(self, handlers)
    }

    async fn join_thread(&self, thread_id: ThreadId) -> Result<()> {
        LegacyChatSocket::join_thread(self, thread_id).await
    }

    async fn leave_thread(&self, thread_id: ThreadId) -> Result<()> {
        LegacyChatSocket::leave_thread(self, thread_id).await
    }

    async fn send_message(
        &self,
        thread_id: ThreadId,
        content: &str,
        message_type: MessageType,
    ) -> Result<()> {
        LegacyChatSocket::send_message(self, thread_id, content, message_type)
    }

    async fn mark_read(&self, thread_id: ThreadId) -> Result<()> {
        LegacyChatSocket::mark_read(self, thread_id)
    }

    async fn start_typing(&self, thread_id: ThreadId) {
        LegacyChatSocket::start_typing(self, thread_id)
    }

    async fn stop_typing(&self, thread_id: ThreadId) {
        LegacyChatSocket::stop_typing(self, thread_id)
    }

    async fn retry_connection(&self) -> Result<()> {
        LegacyChatSocket::retry_connection(self).await
    }

    async fn reconnect_with_token(&self, token: &str) -> Result<()> {
        LegacyChatSocket::reconnect_with_token(self, token).await
    }
}
