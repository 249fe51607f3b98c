//! Endpoint derivation
//!
//! The auth token travels in the connection handshake payload (the URL
//! query), never in a header.

use url::Url;

use gigchat_core::{ChatError, Result, ThreadId};

/// Endpoint of the named-event protocol
pub(crate) fn event_endpoint(server_url: &str, token: &str) -> Result<Url> {
    let mut url = parse_base(server_url)?;
    url.set_path("/ws/chat/");
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

/// Per-thread endpoint of the legacy envelope protocol
pub(crate) fn thread_endpoint(server_url: &str, thread_id: ThreadId, token: &str) -> Result<Url> {
    let mut url = parse_base(server_url)?;
    url.set_path(&format!("/ws/chat/{thread_id}/"));
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

fn parse_base(server_url: &str) -> Result<Url> {
    Url::parse(server_url)
        .map_err(|err| ChatError::config(format!("invalid server URL {server_url}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_endpoint_carries_token_in_query() {
        let url = event_endpoint("ws://localhost:8006", "tok123").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8006/ws/chat/?token=tok123");
    }

    #[test]
    fn thread_endpoint_embeds_the_thread_id() {
        let url = thread_endpoint("wss://chat.example.com", ThreadId(42), "tok123").unwrap();
        assert_eq!(url.as_str(), "wss://chat.example.com/ws/chat/42/?token=tok123");
    }

    #[test]
    fn invalid_base_urls_are_config_errors() {
        assert!(matches!(
            event_endpoint("not a url", "tok"),
            Err(ChatError::Configuration { .. })
        ));
    }
}
