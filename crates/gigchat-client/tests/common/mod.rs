#![allow(dead_code)]

//! In-process chat servers for integration tests
//!
//! Each mock accepts real WebSocket connections and speaks the server side
//! of one protocol with scripted behavior: history on join, message echo,
//! read receipts, and optional fault injection (dropping a session after N
//! frames). Every inbound frame is recorded per session so tests can assert
//! on exactly what reached the wire.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use gigchat_core::legacy::{LegacyClientFrame, LegacyServerFrame};
use gigchat_core::wire::{ClientEvent, ServerEvent};
use gigchat_core::{ChatUser, Message, MessageId, ThreadId, UserId};

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Poll `check` every 10ms until it holds, or panic after `deadline`.
pub async fn wait_for<F: Fn() -> bool>(deadline: Duration, what: &str, check: F) {
    let start = tokio::time::Instant::now();
    while !check() {
        if start.elapsed() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn server_user() -> ChatUser {
    ChatUser {
        id: UserId(1),
        username: "server".to_string(),
        first_name: "Chat".to_string(),
        last_name: "Server".to_string(),
    }
}

fn history(thread_id: ThreadId) -> Vec<Message> {
    use time::macros::datetime;
    vec![
        Message {
            id: MessageId(1),
            content: "first".to_string(),
            sender: server_user(),
            timestamp: datetime!(2025-03-14 09:00:00 UTC),
            message_type: Default::default(),
            is_read: true,
            thread_id: Some(thread_id),
        },
        Message {
            id: MessageId(2),
            content: "second".to_string(),
            sender: server_user(),
            timestamp: datetime!(2025-03-14 09:05:00 UTC),
            message_type: Default::default(),
            is_read: true,
            thread_id: Some(thread_id),
        },
    ]
}

// ----------------------------------------------------------------------------
// Event-Protocol Mock Server
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EventServerBehavior {
    /// Drop (session, after_frames): close that session's socket once it
    /// has received the given number of frames.
    pub kill_session_after: Option<(usize, usize)>,
    /// Reply to `send_message` with an `error` frame instead of echoing.
    pub error_on_send: bool,
    /// Announce a peer ("peer") joining and typing after each thread join,
    /// and leaving/stopping after each mark-as-read.
    pub announce_peer: bool,
}

pub struct MockEventServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<(usize, ClientEvent)>>>,
    uris: Arc<Mutex<Vec<String>>>,
    sessions: Arc<AtomicUsize>,
}

impl MockEventServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(EventServerBehavior::default()).await
    }

    pub async fn spawn_with(behavior: EventServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Arc<Mutex<Vec<(usize, ClientEvent)>>> = Arc::default();
        let uris: Arc<Mutex<Vec<String>>> = Arc::default();
        let sessions = Arc::new(AtomicUsize::new(0));

        {
            let received = Arc::clone(&received);
            let uris = Arc::clone(&uris);
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let session = sessions.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(run_event_session(
                        stream,
                        session,
                        behavior.clone(),
                        Arc::clone(&received),
                        Arc::clone(&uris),
                    ));
                }
            });
        }

        Self {
            addr,
            received,
            uris,
            sessions,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn received(&self) -> Vec<(usize, ClientEvent)> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_names(&self) -> Vec<&'static str> {
        self.received().into_iter().map(|(_, e)| e.name()).collect()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.received_names().iter().filter(|n| **n == name).count()
    }

    pub fn connect_uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

async fn run_event_session(
    stream: TcpStream,
    session: usize,
    behavior: EventServerBehavior,
    received: Arc<Mutex<Vec<(usize, ClientEvent)>>>,
    uris: Arc<Mutex<Vec<String>>>,
) {
    let uri_log = Arc::clone(&uris);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        uri_log.lock().unwrap().push(request.uri().to_string());
        Ok(response)
    };
    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();

    let confirm = ServerEvent::ConnectionConfirmed {
        status: "connected".to_string(),
        user: server_user(),
    };
    let _ = sink.send(event_text(&confirm)).await;

    let mut frames = 0usize;
    let mut next_id = 100 + session as i64 * 1000;
    let mut unread = 0u64;

    while let Some(Ok(message)) = source.next().await {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let Ok(event) = ClientEvent::from_json(&text) else {
            continue;
        };
        received.lock().unwrap().push((session, event.clone()));
        frames += 1;

        match event {
            ClientEvent::JoinThread { thread_id } => {
                let _ = sink
                    .send(event_text(&ServerEvent::ThreadJoined {
                        thread_id,
                        messages: history(thread_id),
                    }))
                    .await;
                if behavior.announce_peer {
                    let _ = sink
                        .send(event_text(&ServerEvent::UserJoined {
                            user: "peer".to_string(),
                            thread_id,
                        }))
                        .await;
                    let _ = sink
                        .send(event_text(&ServerEvent::TypingStart {
                            user: "peer".to_string(),
                            thread_id,
                        }))
                        .await;
                }
            }
            ClientEvent::SendMessage {
                thread_id,
                content,
                message_type,
            } => {
                if behavior.error_on_send {
                    let _ = sink
                        .send(event_text(&ServerEvent::Error {
                            message: "message rejected".to_string(),
                        }))
                        .await;
                } else {
                    next_id += 1;
                    unread += 1;
                    let echoed = Message {
                        id: MessageId(next_id),
                        content,
                        sender: server_user(),
                        timestamp: time::OffsetDateTime::now_utc(),
                        message_type,
                        is_read: false,
                        thread_id: Some(thread_id),
                    };
                    let _ = sink.send(event_text(&ServerEvent::NewMessage(echoed))).await;
                }
            }
            ClientEvent::MarkAsRead { thread_id } => {
                let count = unread;
                unread = 0;
                let _ = sink
                    .send(event_text(&ServerEvent::MessagesRead {
                        user: "server".to_string(),
                        thread_id,
                        count,
                    }))
                    .await;
                if behavior.announce_peer {
                    let _ = sink
                        .send(event_text(&ServerEvent::TypingStop {
                            user: "peer".to_string(),
                            thread_id,
                        }))
                        .await;
                    let _ = sink
                        .send(event_text(&ServerEvent::UserLeft {
                            user: "peer".to_string(),
                            thread_id,
                        }))
                        .await;
                }
            }
            _ => {}
        }

        if let Some((kill_session, kill_after)) = behavior.kill_session_after {
            if session == kill_session && frames >= kill_after {
                // Drop the socket with no close frame, like a dying server.
                return;
            }
        }
    }
}

fn event_text(event: &ServerEvent) -> WsMessage {
    WsMessage::Text(event.to_json().unwrap())
}

// ----------------------------------------------------------------------------
// Legacy-Protocol Mock Server
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct LegacyServerBehavior {
    pub kill_session_after: Option<(usize, usize)>,
}

pub struct MockLegacyServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<(usize, LegacyClientFrame)>>>,
    uris: Arc<Mutex<Vec<String>>>,
    sessions: Arc<AtomicUsize>,
}

impl MockLegacyServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(LegacyServerBehavior::default()).await
    }

    pub async fn spawn_with(behavior: LegacyServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Arc<Mutex<Vec<(usize, LegacyClientFrame)>>> = Arc::default();
        let uris: Arc<Mutex<Vec<String>>> = Arc::default();
        let sessions = Arc::new(AtomicUsize::new(0));

        {
            let received = Arc::clone(&received);
            let uris = Arc::clone(&uris);
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let session = sessions.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(run_legacy_session(
                        stream,
                        session,
                        behavior.clone(),
                        Arc::clone(&received),
                        Arc::clone(&uris),
                    ));
                }
            });
        }

        Self {
            addr,
            received,
            uris,
            sessions,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn received(&self) -> Vec<(usize, LegacyClientFrame)> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_names(&self) -> Vec<&'static str> {
        self.received().into_iter().map(|(_, f)| f.name()).collect()
    }

    pub fn connect_uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

async fn run_legacy_session(
    stream: TcpStream,
    session: usize,
    behavior: LegacyServerBehavior,
    received: Arc<Mutex<Vec<(usize, LegacyClientFrame)>>>,
    uris: Arc<Mutex<Vec<String>>>,
) {
    let uri_log = Arc::clone(&uris);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        uri_log.lock().unwrap().push(request.uri().to_string());
        Ok(response)
    };
    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();

    let established = LegacyServerFrame::ConnectionEstablished {
        message: Some("Connected".to_string()),
    };
    let _ = sink.send(legacy_text(&established)).await;

    let mut frames = 0usize;
    let mut next_id = 500 + session as i64 * 1000;

    while let Some(Ok(message)) = source.next().await {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let Ok(frame) = LegacyClientFrame::from_json(&text) else {
            continue;
        };
        received.lock().unwrap().push((session, frame.clone()));
        frames += 1;

        match frame {
            LegacyClientFrame::ChatMessage {
                message,
                message_type,
                ..
            } => {
                next_id += 1;
                let echoed = Message {
                    id: MessageId(next_id),
                    content: message,
                    sender: server_user(),
                    timestamp: time::OffsetDateTime::now_utc(),
                    message_type,
                    is_read: false,
                    thread_id: None,
                };
                let _ = sink
                    .send(legacy_text(&LegacyServerFrame::ChatMessage { data: echoed }))
                    .await;
            }
            LegacyClientFrame::MarkMessagesRead { message_ids } => {
                let _ = sink
                    .send(legacy_text(&LegacyServerFrame::MessagesRead {
                        message_ids,
                        reader: "server".to_string(),
                    }))
                    .await;
            }
            LegacyClientFrame::TypingIndicator { .. } => {}
        }

        if let Some((kill_session, kill_after)) = behavior.kill_session_after {
            if session == kill_session && frames >= kill_after {
                return;
            }
        }
    }
}

fn legacy_text(frame: &LegacyServerFrame) -> WsMessage {
    WsMessage::Text(frame.to_json().unwrap())
}

// ----------------------------------------------------------------------------
// Handler Recorder
// ----------------------------------------------------------------------------

/// Captures every callback invocation for later assertions
#[derive(Clone, Default)]
pub struct Recorder {
    pub statuses: Arc<Mutex<Vec<gigchat_core::ConnectionStatus>>>,
    pub messages: Arc<Mutex<Vec<Message>>>,
    pub joins: Arc<Mutex<Vec<(ThreadId, usize)>>>,
    pub reads: Arc<Mutex<Vec<(String, ThreadId, u64)>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
    pub presence: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a full handler set wired to this recorder
    pub fn handlers(&self) -> gigchat_client::ChatEventHandlers {
        let statuses = Arc::clone(&self.statuses);
        let messages = Arc::clone(&self.messages);
        let joins = Arc::clone(&self.joins);
        let reads = Arc::clone(&self.reads);
        let errors = Arc::clone(&self.errors);
        let typing_start = Arc::clone(&self.presence);
        let typing_stop = Arc::clone(&self.presence);
        let user_joined = Arc::clone(&self.presence);
        let user_left = Arc::clone(&self.presence);

        gigchat_client::ChatEventHandlers::new()
            .on_connection_change(move |status| statuses.lock().unwrap().push(status))
            .on_message(move |message| messages.lock().unwrap().push(message))
            .on_thread_joined(move |thread_id, history| {
                joins.lock().unwrap().push((thread_id, history.len()))
            })
            .on_messages_read(move |user, thread_id, count| {
                reads.lock().unwrap().push((user.to_string(), thread_id, count))
            })
            .on_error(move |err| errors.lock().unwrap().push(err.to_string()))
            .on_typing_start(move |user, _| {
                typing_start
                    .lock()
                    .unwrap()
                    .push(("typing_start", user.to_string()))
            })
            .on_typing_stop(move |user, _| {
                typing_stop
                    .lock()
                    .unwrap()
                    .push(("typing_stop", user.to_string()))
            })
            .on_user_joined(move |user, _| {
                user_joined
                    .lock()
                    .unwrap()
                    .push(("user_joined", user.to_string()))
            })
            .on_user_left(move |user, _| {
                user_left
                    .lock()
                    .unwrap()
                    .push(("user_left", user.to_string()))
            })
    }

    pub fn statuses(&self) -> Vec<gigchat_core::ConnectionStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn message_contents(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn joins(&self) -> Vec<(ThreadId, usize)> {
        self.joins.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<(String, ThreadId, u64)> {
        self.reads.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn presence(&self) -> Vec<(&'static str, String)> {
        self.presence.lock().unwrap().clone()
    }
}
