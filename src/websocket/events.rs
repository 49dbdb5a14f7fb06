//! Event Handlers
//!
//! One handler per request type. Each receives the origin server's name and
//! the decoded request, applies the relay rules, and returns the data for a
//! successful reply or `None` when the chat relay the origin cares about
//! failed. Broadcasts to other servers are best-effort and never turn a
//! reply into a failure.

use super::messages::{Push, Request, ResponseData};
use crate::api::AppState;

const CHAT_FAILURE: &str =
    "Failed to send message to chat! Check that the bot is online and the group ids are correct.";

/// Route a decoded request to its handler
pub async fn handle_request(
    state: &AppState,
    origin: &str,
    request: Request,
) -> Option<ResponseData> {
    match request {
        Request::Message { message } => relay_message(state, &message).await,
        Request::ServerPid { pid } => server_pid(state, origin, pid).await,
        Request::ServerStartup { pid } => server_startup(state, origin, pid).await,
        Request::ServerShutdown {} => server_shutdown(state, origin).await,
        Request::PlayerInfo { player, message } => {
            player_info(state, origin, &player, &message).await
        }
        Request::PlayerJoined { player } => {
            player_presence(state, origin, &player, Presence::Joined).await
        }
        Request::PlayerLeft { player } => {
            player_presence(state, origin, &player, Presence::Left).await
        }
    }
}

/// Deliver to chat, logging a configuration hint on failure
async fn send_to_chat(state: &AppState, text: &str) -> bool {
    tracing::debug!(text = %text, "Relaying message to chat");
    let delivered = state.chat.send_message(text).await;
    if !delivered {
        tracing::warn!("{}", CHAT_FAILURE);
    }
    delivered
}

async fn relay_message(state: &AppState, message: &str) -> Option<ResponseData> {
    if message.is_empty() {
        tracing::warn!("Received empty message, nothing to relay");
        return None;
    }
    send_to_chat(state, message)
        .await
        .then(ResponseData::empty)
}

async fn server_pid(state: &AppState, origin: &str, pid: Option<u32>) -> Option<ResponseData> {
    match pid {
        Some(pid) => state.watcher.append(origin, pid).await,
        None => tracing::debug!(server = %origin, "Pid report without a usable pid"),
    }
    Some(ResponseData::empty())
}

async fn server_startup(state: &AppState, origin: &str, pid: Option<u32>) -> Option<ResponseData> {
    tracing::info!(server = %origin, "Server startup received");

    state.servers.append(origin).await;
    if let Some(pid) = pid {
        state.watcher.append(origin, pid).await;
    }

    let flag = ResponseData::Startup {
        flag: state.bridge.sync_all_game_message,
    };
    if !state.bridge.broadcast_server {
        return Some(flag);
    }

    state
        .registry
        .broadcast(origin, &Push::notice(origin, "Server opened!"))
        .await;

    send_to_chat(state, &format!("Server [{}] is now online.", origin))
        .await
        .then_some(flag)
}

async fn server_shutdown(state: &AppState, origin: &str) -> Option<ResponseData> {
    tracing::info!(server = %origin, "Server shutdown received, disconnecting");

    state.watcher.remove(origin).await;
    state.registry.disconnect(origin).await;

    if !state.bridge.broadcast_server {
        return Some(ResponseData::empty());
    }

    state
        .registry
        .broadcast(origin, &Push::notice(origin, "Server closed!"))
        .await;

    send_to_chat(state, &format!("Server [{}] has shut down.", origin))
        .await
        .then(ResponseData::empty)
}

async fn player_info(
    state: &AppState,
    origin: &str,
    player: &str,
    message: &str,
) -> Option<ResponseData> {
    tracing::debug!(server = %origin, player = %player, "Player chat received");

    if state.bridge.sync_all_game_message {
        send_to_chat(state, &format!("[{}] <{}> {}", origin, player, message)).await;
    }
    if state.bridge.sync_message_between_servers {
        state
            .registry
            .broadcast(origin, &Push::chat(origin, player, message))
            .await;
    }
    Some(ResponseData::empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Joined,
    Left,
}

/// Text shown in game on other servers and text relayed to chat
fn presence_messages(origin: &str, player: &str, presence: Presence, bot: bool) -> (String, String) {
    let who = if bot { "Bot" } else { "Player" };
    match presence {
        Presence::Joined => (
            format!("{} {} joined the game.", who, player),
            format!("{} {} joined server [{}].", who, player, origin),
        ),
        Presence::Left => (
            format!("{} {} left the game.", who, player),
            format!("{} {} left server [{}].", who, player, origin),
        ),
    }
}

async fn player_presence(
    state: &AppState,
    origin: &str,
    player: &str,
    presence: Presence,
) -> Option<ResponseData> {
    tracing::info!(server = %origin, player = %player, ?presence, "Player presence changed");

    if !state.bridge.broadcast_player {
        return Some(ResponseData::empty());
    }

    let (server_message, chat_message) =
        presence_messages(origin, player, presence, state.bridge.is_bot(player));

    if state.bridge.sync_message_between_servers {
        state
            .registry
            .broadcast(origin, &Push::notice(origin, server_message))
            .await;
    }

    send_to_chat(state, &chat_message)
        .await
        .then(ResponseData::empty)
}
