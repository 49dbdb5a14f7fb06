//! Connection Handshake
//!
//! The first frame on either channel must be `{"token", "name"}`. A bad
//! token or a missing name is answered with `{"success": false}` and the
//! socket is closed; there is no second attempt on the same socket.

use axum::extract::ws::{Message, WebSocket};
use thiserror::Error;

use super::messages::{decode, encode, CodecError, HandshakeReply, HandshakeRequest};

/// Why a handshake did not bind a name
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Connection closed before handshake")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("Invalid handshake frame: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing server name")]
    MissingName,
}

impl HandshakeError {
    /// Whether the peer is still there to be told about the failure
    fn can_reply(&self) -> bool {
        !matches!(self, HandshakeError::Closed | HandshakeError::Transport(_))
    }
}

/// Check credentials and return the name to bind
///
/// Any token mismatch is rejected, whether or not a name was supplied.
pub fn verify(request: &HandshakeRequest, token: &str) -> Result<String, HandshakeError> {
    if request.token.as_deref().unwrap_or_default() != token {
        return Err(HandshakeError::InvalidToken);
    }
    match request.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(HandshakeError::MissingName),
    }
}

/// Read the handshake frame, skipping control frames
async fn read_request(socket: &mut WebSocket) -> Result<HandshakeRequest, HandshakeError> {
    loop {
        match socket.recv().await {
            None | Some(Ok(Message::Close(_))) => return Err(HandshakeError::Closed),
            Some(Err(e)) => return Err(HandshakeError::Transport(e)),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Text(text))) => return Ok(decode(&text)?),
            Some(Ok(Message::Binary(_))) => return Err(CodecError::NotText.into()),
        }
    }
}

async fn reply(socket: &mut WebSocket, success: bool) -> Result<(), HandshakeError> {
    let frame = encode(&HandshakeReply { success })?;
    socket.send(Message::Text(frame)).await?;
    Ok(())
}

/// Run the handshake on a freshly accepted socket
///
/// On success the reply has been sent and the bound name is returned. On
/// failure the socket has been answered (when still open) and closed.
pub async fn perform(socket: &mut WebSocket, token: &str) -> Result<String, HandshakeError> {
    let outcome = match read_request(socket).await {
        Ok(request) => verify(&request, token),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(name) => {
            reply(socket, true).await?;
            tracing::info!(server = %name, "Authentication succeeded, server connected");
            Ok(name)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Authentication failed! Check the token in the plugin configuration.");
            if e.can_reply() {
                let _ = reply(socket, false).await;
                let _ = socket.send(Message::Close(None)).await;
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(token: Option<&str>, name: Option<&str>) -> HandshakeRequest {
        HandshakeRequest {
            token: token.map(String::from),
            name: name.map(String::from),
        }
    }

    #[test]
    fn test_verify_success() {
        let name = verify(&request(Some("secret"), Some("S1")), "secret").unwrap();
        assert_eq!(name, "S1");
    }

    #[test]
    fn test_verify_wrong_token() {
        let result = verify(&request(Some("nope"), Some("S1")), "secret");
        assert!(matches!(result, Err(HandshakeError::InvalidToken)));
    }

    #[test]
    fn test_verify_wrong_token_without_name() {
        let result = verify(&request(Some("nope"), None), "secret");
        assert!(matches!(result, Err(HandshakeError::InvalidToken)));

        let result = verify(&request(None, None), "secret");
        assert!(matches!(result, Err(HandshakeError::InvalidToken)));
    }

    #[test]
    fn test_verify_missing_or_empty_name() {
        let result = verify(&request(Some("secret"), None), "secret");
        assert!(matches!(result, Err(HandshakeError::MissingName)));

        let result = verify(&request(Some("secret"), Some("")), "secret");
        assert!(matches!(result, Err(HandshakeError::MissingName)));
    }

    #[test]
    fn test_only_live_peers_get_a_reply() {
        assert!(HandshakeError::InvalidToken.can_reply());
        assert!(HandshakeError::MissingName.can_reply());
        assert!(!HandshakeError::Closed.can_reply());
    }
}
