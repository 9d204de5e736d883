//! WebSocket message dispatch
//!
//! Entry point for client messages. Session binding is checked here, then
//! each action is dispatched into the state layer; rejections come back as
//! error messages to the sender only, never as room broadcasts.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::ws::ConnCtx;
use std::sync::Arc;

const MAX_PLAYER_NAME: usize = 32;

/// Macro to extract the connection's room/player binding and return early
/// if the socket never joined a room
macro_rules! require_session {
    ($ctx:expr) => {
        match (&$ctx.room, &$ctx.player) {
            (Some(room), Some(player)) => (room.clone(), player.clone()),
            _ => {
                return Some(ServerMessage::Error {
                    code: "NO_SESSION".to_string(),
                    msg: "Join a room first".to_string(),
                });
            }
        }
    };
}

fn rejected(msg: String) -> Option<ServerMessage> {
    Some(ServerMessage::Error {
        code: "REJECTED".to_string(),
        msg,
    })
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    ctx: &mut ConnCtx,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom { name } => {
            let name = name.trim().to_string();
            if name.is_empty() || name.chars().count() > MAX_PLAYER_NAME {
                return rejected("Pick a name between 1 and 32 characters".to_string());
            }
            let outcome = state.create_room(name).await;
            ctx.room = Some(outcome.code.clone());
            ctx.player = Some(outcome.player_id.clone());
            ctx.spectator = false;
            let snapshot = state
                .snapshot_for(&outcome.code, Some(&outcome.player_id))
                .await
                .ok()?;
            Some(ServerMessage::RoomJoined {
                code: outcome.code,
                player_id: outcome.player_id,
                token: outcome.token,
                snapshot,
            })
        }

        ClientMessage::JoinRoom {
            code,
            name,
            spectator,
            token,
        } => {
            let name = name.trim().to_string();
            if name.chars().count() > MAX_PLAYER_NAME {
                return rejected("Pick a name between 1 and 32 characters".to_string());
            }
            if name.is_empty() && !spectator {
                return rejected("Pick a name between 1 and 32 characters".to_string());
            }
            let code = code.trim().to_uppercase();
            match state.join_room(&code, name, spectator, token).await {
                Ok(outcome) => {
                    ctx.room = Some(code.clone());
                    ctx.player = Some(outcome.player_id.clone());
                    ctx.spectator = state
                        .read_room(&code, |room| {
                            room.player(&outcome.player_id)
                                .map(|p| p.spectator)
                                .unwrap_or(spectator)
                        })
                        .await
                        .unwrap_or(spectator);
                    let snapshot = state
                        .snapshot_for(&code, Some(&outcome.player_id))
                        .await
                        .ok()?;
                    Some(ServerMessage::RoomJoined {
                        code,
                        player_id: outcome.player_id,
                        token: outcome.token,
                        snapshot,
                    })
                }
                Err(e) => rejected(e),
            }
        }

        ClientMessage::LeaveRoom => {
            let (room, player) = require_session!(ctx);
            state.leave_room(&room, &player).await;
            ctx.room = None;
            ctx.player = None;
            ctx.spectator = false;
            None
        }

        ClientMessage::SetReady { ready } => {
            let (room, player) = require_session!(ctx);
            match state.set_ready(&room, &player, ready).await {
                Ok(()) => None,
                Err(e) => rejected(e),
            }
        }

        // Host-only actions; the state layer verifies the requester.
        ClientMessage::StartGame { mode, rounds } => {
            let (room, player) = require_session!(ctx);
            match state.start_game(&room, &player, mode, rounds).await {
                Ok(()) => None,
                Err(e) => rejected(e),
            }
        }

        ClientMessage::NextRound => {
            let (room, player) = require_session!(ctx);
            match state.next_round(&room, &player).await {
                Ok(()) => None,
                Err(e) => rejected(e),
            }
        }

        ClientMessage::RestartGame => {
            let (room, player) = require_session!(ctx);
            match state.restart_game(&room, &player).await {
                Ok(()) => None,
                Err(e) => rejected(e),
            }
        }

        // In-round actions
        ClientMessage::SubmitPrompt { text } => {
            let (room, player) = require_session!(ctx);
            match state.submit_prompt(&room, &player, text).await {
                Ok(()) => Some(ServerMessage::PromptAck),
                Err(e) => rejected(e),
            }
        }

        ClientMessage::SubmitContent { content } => {
            let (room, player) = require_session!(ctx);
            match state.submit_content(&room, &player, content).await {
                Ok(()) => Some(ServerMessage::SubmissionConfirmed),
                Err(e) => rejected(e),
            }
        }

        ClientMessage::ProposeName { name } => {
            let (room, player) = require_session!(ctx);
            match state.propose_name(&room, &player, name).await {
                Ok(()) => Some(ServerMessage::SubmissionConfirmed),
                Err(e) => rejected(e),
            }
        }

        ClientMessage::CastVote { target } => {
            let (room, player) = require_session!(ctx);
            match state.cast_vote(&room, &player, target).await {
                Ok(()) => Some(ServerMessage::VoteAck),
                Err(e) => rejected(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;

    #[tokio::test]
    async fn test_actions_require_a_session() {
        let state = Arc::new(AppState::new());
        let mut ctx = ConnCtx::default();

        let response = handle_message(
            ClientMessage::SubmitContent {
                content: "orphaned".to_string(),
            },
            &mut ctx,
            &state,
        )
        .await;

        match response {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "NO_SESSION"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_room_binds_the_connection() {
        let state = Arc::new(AppState::new());
        let mut ctx = ConnCtx::default();

        let response = handle_message(
            ClientMessage::CreateRoom {
                name: "Alice".to_string(),
            },
            &mut ctx,
            &state,
        )
        .await;

        match response {
            Some(ServerMessage::RoomJoined { code, player_id, .. }) => {
                assert_eq!(ctx.room.as_ref(), Some(&code));
                assert_eq!(ctx.player.as_ref(), Some(&player_id));
            }
            other => panic!("expected room joined, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let state = Arc::new(AppState::new());
        let mut ctx = ConnCtx::default();

        let response = handle_message(
            ClientMessage::CreateRoom {
                name: "   ".to_string(),
            },
            &mut ctx,
            &state,
        )
        .await;

        assert!(matches!(response, Some(ServerMessage::Error { .. })));
        assert!(ctx.room.is_none());
    }
}
