//! Interactive chat application
//!
//! Owns a `ChatTransport` and drives it from a line-based loop: plain lines
//! go to the joined thread, slash commands cover membership, read receipts,
//! and typing. Inbound events print as they arrive; the local message list
//! merges the join snapshot with pushed messages so it stays deduplicated
//! and ordered regardless of arrival order.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use gigchat_client::{ChatEventHandlers, ChatSocket, ChatTransport, LegacyChatSocket};
use gigchat_core::history::{insert_message, merge_messages};
use gigchat_core::{Message, MessageType, ThreadId};

use crate::config::AppConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

pub struct ChatApp {
    transport: Arc<dyn ChatTransport>,
    messages: Arc<Mutex<Vec<Message>>>,
    joined: Arc<Mutex<Option<ThreadId>>>,
    prompt: String,
}

impl ChatApp {
    /// Build the app around the primary client, or the legacy fallback
    /// when explicitly requested.
    pub fn new(config: &AppConfig, use_legacy: bool) -> Self {
        let client_config = config.client_config();
        let transport: Arc<dyn ChatTransport> = if use_legacy {
            Arc::new(LegacyChatSocket::new(client_config))
        } else {
            Arc::new(ChatSocket::new(client_config))
        };
        let app = Self {
            transport,
            messages: Arc::new(Mutex::new(Vec::new())),
            joined: Arc::new(Mutex::new(None)),
            prompt: config.cli.prompt.clone(),
        };
        app.install_handlers();
        app
    }

    fn install_handlers(&self) {
        let messages = Arc::clone(&self.messages);
        let join_list = Arc::clone(&self.messages);
        let joined = Arc::clone(&self.joined);

        let handlers = ChatEventHandlers::new()
            .on_connection_change(|status| println!("* connection {status}"))
            .on_connection_confirmed(|user| println!("* signed in as {}", user.display_name()))
            .on_message(move |message| {
                println!(
                    "[{}] {}: {}",
                    message.timestamp.time(),
                    message.sender.display_name(),
                    message.content
                );
                insert_message(&mut messages.lock().unwrap(), message);
            })
            .on_thread_joined(move |thread_id, history| {
                println!("* joined thread {thread_id} ({} messages)", history.len());
                *joined.lock().unwrap() = Some(thread_id);
                let mut list = join_list.lock().unwrap();
                let pushed = std::mem::take(&mut *list);
                *list = merge_messages(history, pushed);
            })
            .on_typing_start(|user, _| println!("* {user} is typing..."))
            .on_typing_stop(|user, _| println!("* {user} stopped typing"))
            .on_user_joined(|user, thread_id| println!("* {user} joined thread {thread_id}"))
            .on_user_left(|user, thread_id| println!("* {user} left thread {thread_id}"))
            .on_messages_read(|user, _, count| println!("* {user} read {count} messages"))
            .on_error(|err| eprintln!("! {err}"));

        self.transport.set_event_handlers(handlers);
    }

    /// Connect, optionally join a thread, and run the input loop until
    /// `/quit` or ctrl-c.
    pub async fn run(&self, token: &str, initial_thread: Option<ThreadId>) -> Result<()> {
        self.transport.connect(token).await?;
        if let Some(thread_id) = initial_thread {
            self.transport.join_thread(thread_id).await?;
        }

        println!("Commands: /join <id>, /leave, /read, /typing, /status, /history, /quit");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if !self.handle_line(line.trim()).await? {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            }
        }

        self.transport.disconnect().await;
        Ok(())
    }

    /// Process one input line; returns `false` to quit.
    async fn handle_line(&self, line: &str) -> Result<bool> {
        if line.is_empty() {
            return Ok(true);
        }

        let mut parts = line.splitn(2, ' ');
        let command = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        match command {
            "/quit" | "/exit" => return Ok(false),
            "/join" => match rest.parse::<i64>() {
                Ok(id) => {
                    if let Err(err) = self.transport.join_thread(ThreadId(id)).await {
                        eprintln!("! {err}");
                    }
                }
                Err(_) => eprintln!("! usage: /join <thread-id>"),
            },
            "/leave" => match self.joined_thread() {
                Some(thread_id) => {
                    if let Err(err) = self.transport.leave_thread(thread_id).await {
                        eprintln!("! {err}");
                    } else {
                        *self.joined.lock().unwrap() = None;
                        println!("* left thread {thread_id}");
                    }
                }
                None => eprintln!("! not in a thread"),
            },
            "/read" => match self.joined_thread() {
                Some(thread_id) => {
                    if let Err(err) = self.transport.mark_read(thread_id).await {
                        eprintln!("! {err}");
                    }
                }
                None => eprintln!("! not in a thread"),
            },
            "/typing" => match self.joined_thread() {
                Some(thread_id) => self.transport.start_typing(thread_id).await,
                None => eprintln!("! not in a thread"),
            },
            "/status" => {
                println!("* connection {}", self.transport.status());
                match self.joined_thread() {
                    Some(thread_id) => println!("* thread {thread_id}"),
                    None => println!("* no thread joined"),
                }
            }
            "/history" => {
                let messages = self.messages.lock().unwrap().clone();
                for message in &messages {
                    println!(
                        "[{}] {}: {}",
                        message.timestamp.time(),
                        message.sender.display_name(),
                        message.content
                    );
                }
                println!("* {} messages", messages.len());
            }
            _ if command.starts_with('/') => eprintln!("! unknown command {command}"),
            _ => match self.joined_thread() {
                Some(thread_id) => {
                    debug!(%thread_id, "sending message");
                    self.transport.stop_typing(thread_id).await;
                    if let Err(err) = self
                        .transport
                        .send_message(thread_id, line, MessageType::Text)
                        .await
                    {
                        eprintln!("! {err}");
                    }
                }
                None => eprintln!("! join a thread first: /join <id>"),
            },
        }

        print!("{}", self.prompt);
        use std::io::Write;
        let _ = std::io::stdout().flush();
        Ok(true)
    }

    fn joined_thread(&self) -> Option<ThreadId> {
        *self.joined.lock().unwrap()
    }
}
