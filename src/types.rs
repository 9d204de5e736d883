use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomCode = String;

/// One stage of the per-round state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    PromptCollection,
    RoundSetup,
    Submission,
    Naming,
    Voting,
    Reveal,
    Ended,
}

/// Round-setup algorithm, selected once at game start and fixed for the
/// whole game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Capture,
    Twist,
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub prompt_seconds: u32,
    pub submission_seconds: u32,
    pub naming_seconds: u32,
    pub voting_seconds: u32,
    pub relay_stage_seconds: u32,
    pub rounds: u32,
    pub max_content_chars: usize,
    pub max_prompt_chars: usize,
    pub max_name_chars: usize,
    /// Language for fallback content lookups.
    pub language: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            prompt_seconds: 45,
            submission_seconds: 90,
            naming_seconds: 30,
            voting_seconds: 30,
            relay_stage_seconds: 45,
            rounds: 5,
            max_content_chars: 20_000,
            max_prompt_chars: 120,
            max_name_chars: 60,
            language: "en".to_string(),
        }
    }
}

impl GameConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        fn env_u32(key: &str, default: u32) -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        }
        fn env_usize(key: &str, default: usize) -> usize {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        Self {
            prompt_seconds: env_u32("DOODLE_PROMPT_SECONDS", defaults.prompt_seconds),
            submission_seconds: env_u32("DOODLE_SUBMISSION_SECONDS", defaults.submission_seconds),
            naming_seconds: env_u32("DOODLE_NAMING_SECONDS", defaults.naming_seconds),
            voting_seconds: env_u32("DOODLE_VOTING_SECONDS", defaults.voting_seconds),
            relay_stage_seconds: env_u32(
                "DOODLE_RELAY_STAGE_SECONDS",
                defaults.relay_stage_seconds,
            ),
            rounds: env_u32("DOODLE_ROUNDS", defaults.rounds),
            max_content_chars: env_usize("DOODLE_MAX_CONTENT_CHARS", defaults.max_content_chars),
            max_prompt_chars: env_usize("DOODLE_MAX_PROMPT_CHARS", defaults.max_prompt_chars),
            max_name_chars: env_usize("DOODLE_MAX_NAME_CHARS", defaults.max_name_chars),
            language: std::env::var("DOODLE_LANGUAGE")
                .ok()
                .and_then(|s| {
                    let trimmed = s.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_string())
                })
                .unwrap_or(defaults.language),
        }
    }
}

/// A player's stable identity. Survives reconnects; the websocket connection
/// handle does not. Per-round flags (`submitted`, `voted`) are reset at
/// round boundaries, `score` only on a full restart.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub token: String,
    pub name: String,
    pub connected: bool,
    pub spectator: bool,
    pub ready: bool,
    pub score: u32,
    pub submitted: bool,
    pub voted: bool,
}

impl Player {
    pub fn new(id: PlayerId, token: String, name: String, spectator: bool) -> Self {
        Self {
            id,
            token,
            name,
            connected: true,
            spectator,
            ready: false,
            score: 0,
            submitted: false,
            voted: false,
        }
    }

    /// Reset the transient per-round flags at a round boundary.
    pub fn reset_round_flags(&mut self) {
        self.submitted = false;
        self.voted = false;
    }
}

/// A player-submitted creative prompt; each entry is consumed at most once
/// per game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptEntry {
    pub author: PlayerId,
    pub text: String,
    pub used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub author: PlayerId,
    pub content: String,
    pub created_at: String,
}

/// One link of a relay chain, tagged with its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStage {
    pub author: PlayerId,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureData {
    /// The round's designated subject. Does not submit, but votes.
    pub subject: PlayerId,
    pub prompt: String,
    /// The subject's captured artifact. Provided by the subject during the
    /// submission phase, or filled with a placeholder if they never deliver.
    pub artifact: Option<String>,
    pub submissions: HashMap<PlayerId, Submission>,
    /// voter -> author of the chosen submission
    pub votes: HashMap<PlayerId, PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwistData {
    /// Secretly designated; only revealed at scoring time.
    pub holder: PlayerId,
    pub prompt: String,
    /// Extra instruction visible only to the holder.
    pub twist: String,
    pub submissions: HashMap<PlayerId, Submission>,
    /// voter -> guessed holder
    pub votes: HashMap<PlayerId, PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayData {
    /// Random traversal order, computed once per round.
    pub order: Vec<PlayerId>,
    /// Current position in the traversal order.
    pub position: usize,
    pub stages: Vec<RelayStage>,
    /// player -> proposed name for the finished artifact
    pub names: HashMap<PlayerId, String>,
    /// voter -> stage index
    pub stage_votes: HashMap<PlayerId, usize>,
    /// voter -> author of the chosen name
    pub name_votes: HashMap<PlayerId, PlayerId>,
}

/// Mode-specific round data, exactly one shape per mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModeData {
    Capture(CaptureData),
    Twist(TwistData),
    Relay(RelayData),
}

impl ModeData {
    /// An unpopulated shape for the given mode; the mode strategy fills it
    /// in during round setup.
    pub fn empty(mode: GameMode) -> Self {
        match mode {
            GameMode::Capture => ModeData::Capture(CaptureData {
                subject: String::new(),
                prompt: String::new(),
                artifact: None,
                submissions: HashMap::new(),
                votes: HashMap::new(),
            }),
            GameMode::Twist => ModeData::Twist(TwistData {
                holder: String::new(),
                prompt: String::new(),
                twist: String::new(),
                submissions: HashMap::new(),
                votes: HashMap::new(),
            }),
            GameMode::Relay => ModeData::Relay(RelayData {
                order: Vec::new(),
                position: 0,
                stages: Vec::new(),
                names: HashMap::new(),
                stage_votes: HashMap::new(),
                name_votes: HashMap::new(),
            }),
        }
    }
}

/// One point award computed by the scoring engine, kept on the round for the
/// reveal display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointAward {
    pub player: PlayerId,
    pub points: u32,
    pub reason: String,
}

/// Per-round state plus the game-level fields it carries forward. Exactly
/// one is live per room; it is fully replaced at every round boundary via
/// [`RoundState::successor`].
#[derive(Debug, Clone)]
pub struct RoundState {
    pub mode: GameMode,
    pub phase: Phase,
    /// Monotonic counter bumped on every phase assignment. Together with
    /// `phase` it names one phase *instance*, so a trigger armed for an
    /// earlier visit of the same phase can be told apart from the current
    /// one.
    pub phase_seq: u64,
    pub round_no: u32,
    pub total_rounds: u32,
    /// RFC3339 deadline of the current phase, if the phase is timed.
    pub deadline: Option<String>,
    pub data: ModeData,
    pub prompt_pool: Vec<PromptEntry>,
    /// Subjects already chosen this game (Capture rotation).
    pub prior_subjects: Vec<PlayerId>,
    /// Twist holders already chosen this game.
    pub prior_holders: Vec<PlayerId>,
    /// Reason string when the round's dependent phases were skipped.
    pub skipped: Option<String>,
    pub awards: Vec<PointAward>,
    /// Why the game ended, once phase is `Ended`.
    pub end_reason: Option<String>,
}

impl RoundState {
    pub fn first(mode: GameMode, total_rounds: u32) -> Self {
        Self {
            mode,
            phase: Phase::RoundSetup,
            phase_seq: 0,
            round_no: 1,
            total_rounds,
            deadline: None,
            data: ModeData::empty(mode),
            prompt_pool: Vec::new(),
            prior_subjects: Vec::new(),
            prior_holders: Vec::new(),
            skipped: None,
            awards: Vec::new(),
            end_reason: None,
        }
    }

    /// A fresh round carrying forward the game-level fields (mode, rotation
    /// memory, prompt pool) and discarding everything per-round.
    pub fn successor(&self) -> Self {
        Self {
            mode: self.mode,
            phase: Phase::RoundSetup,
            // Continue the counter so the successor's phase instances never
            // collide with this round's while an old lock is still held.
            phase_seq: self.phase_seq + 1,
            round_no: self.round_no + 1,
            total_rounds: self.total_rounds,
            deadline: None,
            data: ModeData::empty(self.mode),
            prompt_pool: self.prompt_pool.clone(),
            prior_subjects: self.prior_subjects.clone(),
            prior_holders: self.prior_holders.clone(),
            skipped: None,
            awards: Vec::new(),
            end_reason: None,
        }
    }

    /// Enter a phase under a fresh sequence number. Every phase change must
    /// go through here; a bare `phase` assignment would let stale triggers
    /// key the new instance.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.phase_seq += 1;
    }
}

/// A game session container. Owns its `RoundState` exclusively;
/// `round == None` means the room sits in the lobby.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub host: PlayerId,
    pub players: Vec<Player>,
    pub config: GameConfig,
    pub round: Option<RoundState>,
    /// Bumped on every mutation; drives snapshot pushes.
    pub version: u64,
    pub created_at: String,
}

impl Room {
    pub fn phase(&self) -> Phase {
        match &self.round {
            Some(r) => r.phase,
            None => Phase::Lobby,
        }
    }

    /// The identity of the current phase instance. Triggers capture this
    /// when armed and present it back; a mismatch means the room has moved
    /// on and the trigger is stale.
    pub fn phase_key(&self) -> (Phase, u64) {
        match &self.round {
            Some(r) => (r.phase, r.phase_seq),
            None => (Phase::Lobby, 0),
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Connected, non-spectator players in room order.
    pub fn participants(&self) -> Vec<&Player> {
        self.players
            .iter()
            .filter(|p| p.connected && !p.spectator)
            .collect()
    }

    pub fn participant_ids(&self) -> Vec<PlayerId> {
        self.participants().iter().map(|p| p.id.clone()).collect()
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host == player_id
    }
}
