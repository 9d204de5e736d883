use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        name: String,
    },
    JoinRoom {
        code: RoomCode,
        name: String,
        #[serde(default)]
        spectator: bool,
        /// Reconnect token from a previous session.
        token: Option<String>,
    },
    LeaveRoom,
    SetReady {
        ready: bool,
    },
    // Host-only messages
    StartGame {
        mode: GameMode,
        rounds: Option<u32>,
    },
    NextRound,
    RestartGame,
    // In-round messages
    SubmitPrompt {
        text: String,
    },
    SubmitContent {
        content: String,
    },
    ProposeName {
        name: String,
    },
    CastVote {
        target: VoteTarget,
    },
}

/// What a vote points at; which kinds are legal depends on mode and phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteTarget {
    /// A submission author (Capture) or the guessed twist holder (Twist).
    Author { player: PlayerId },
    /// A relay stage index.
    Stage { index: usize },
    /// The author of a proposed name (Relay).
    Name { player: PlayerId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: String,
    },
    RoomJoined {
        code: RoomCode,
        player_id: PlayerId,
        /// Keep this to reconnect as the same player.
        token: String,
        snapshot: RoomSnapshot,
    },
    /// Personalized full room-state snapshot, pushed after every mutation.
    RoomState {
        snapshot: RoomSnapshot,
    },
    PromptAck,
    SubmissionConfirmed,
    VoteAck,
    /// Live tallies streamed to spectators during the voting phase.
    SpectatorVoteCounts {
        counts: HashMap<String, u32>,
        seq: u64,
    },
    Error {
        code: String,
        msg: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub spectator: bool,
    pub ready: bool,
    pub score: u32,
    pub submitted: bool,
    pub voted: bool,
    pub is_host: bool,
}

impl PlayerInfo {
    pub fn for_player(p: &Player, host: &PlayerId) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            connected: p.connected,
            spectator: p.spectator,
            ready: p.ready,
            score: p.score,
            submitted: p.submitted,
            voted: p.voted,
            is_host: p.id == *host,
        }
    }
}

/// A revealed submission. Only present in snapshots once the phase allows
/// the viewer to see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionView {
    pub author: PlayerId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStageView {
    pub index: usize,
    pub author: PlayerId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameView {
    pub author: PlayerId,
    pub name: String,
}

/// Mode-specific round projection. Fields are filtered per viewer: a
/// player's own in-progress content is visible only to themselves until the
/// reveal, and the twist instruction only ever reaches its holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RoundView {
    Capture {
        prompt: String,
        subject: PlayerId,
        artifact: Option<String>,
        submissions: Vec<SubmissionView>,
        your_submission: Option<String>,
        your_vote: Option<PlayerId>,
    },
    Twist {
        prompt: String,
        /// Only present in the holder's own snapshot before the reveal.
        twist: Option<String>,
        /// Revealed to everyone once scoring has run.
        holder: Option<PlayerId>,
        submissions: Vec<SubmissionView>,
        your_submission: Option<String>,
        your_vote: Option<PlayerId>,
    },
    Relay {
        chain_length: usize,
        position: usize,
        current_author: Option<PlayerId>,
        /// The latest stage, shown to the player whose turn it is.
        previous_stage: Option<RelayStageView>,
        /// The full chain, visible from the naming phase onward.
        stages: Vec<RelayStageView>,
        names: Vec<NameView>,
        your_name: Option<String>,
        your_stage_vote: Option<usize>,
        your_name_vote: Option<PlayerId>,
    },
}

/// Full personalized room-state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host: PlayerId,
    pub phase: Phase,
    pub version: u64,
    pub server_now: String,
    pub deadline: Option<String>,
    pub mode: Option<GameMode>,
    pub round_no: Option<u32>,
    pub total_rounds: Option<u32>,
    pub players: Vec<PlayerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundView>,
    /// Reason the current round was skipped, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    /// Point awards from the last scored round (reveal phase onward).
    pub awards: Vec<PointAward>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<String>,
}
