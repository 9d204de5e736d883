use doodledash::protocol::{ClientMessage, RoundView, ServerMessage, VoteTarget};
use doodledash::state::AppState;
use doodledash::types::{GameMode, ModeData, Phase};
use doodledash::ws::handlers::handle_message;
use doodledash::ws::ConnCtx;
use std::sync::Arc;

async fn join(
    state: &Arc<AppState>,
    code: &str,
    name: &str,
) -> (ConnCtx, String) {
    let mut ctx = ConnCtx::default();
    let response = handle_message(
        ClientMessage::JoinRoom {
            code: code.to_string(),
            name: name.to_string(),
            spectator: false,
            token: None,
        },
        &mut ctx,
        state,
    )
    .await;
    let player_id = match response {
        Some(ServerMessage::RoomJoined { player_id, .. }) => player_id,
        other => panic!("Expected RoomJoined, got {:?}", other),
    };
    (ctx, player_id)
}

/// End-to-end integration test for a complete capture game
#[tokio::test]
async fn test_full_game_flow() {
    let state = Arc::new(AppState::new());

    // 1. Host creates the room
    let mut host_ctx = ConnCtx::default();
    let created = handle_message(
        ClientMessage::CreateRoom {
            name: "Alice".to_string(),
        },
        &mut host_ctx,
        &state,
    )
    .await;
    let (code, host_id) = match created {
        Some(ServerMessage::RoomJoined {
            code,
            player_id,
            snapshot,
            ..
        }) => {
            assert_eq!(snapshot.phase, Phase::Lobby);
            (code, player_id)
        }
        other => panic!("Expected RoomJoined, got {:?}", other),
    };

    // 2. Two more players join and ready up
    let (mut bob_ctx, bob_id) = join(&state, &code, "Bob").await;
    let (mut carol_ctx, carol_id) = join(&state, &code, "Carol").await;
    for ctx in [&mut bob_ctx, &mut carol_ctx] {
        let response =
            handle_message(ClientMessage::SetReady { ready: true }, ctx, &state).await;
        assert!(response.is_none(), "ready should be silently accepted");
    }

    // 3. A non-host cannot start the game
    let rejected = handle_message(
        ClientMessage::StartGame {
            mode: GameMode::Capture,
            rounds: Some(1),
        },
        &mut bob_ctx,
        &state,
    )
    .await;
    assert!(matches!(rejected, Some(ServerMessage::Error { .. })));

    // 4. The host starts; prompt collection opens first
    let started = handle_message(
        ClientMessage::StartGame {
            mode: GameMode::Capture,
            rounds: Some(1),
        },
        &mut host_ctx,
        &state,
    )
    .await;
    assert!(started.is_none());
    assert_eq!(
        state.read_room(&code, |r| r.phase()).await.unwrap(),
        Phase::PromptCollection
    );

    // 5. Everyone seeds a prompt; quorum moves the room into the round
    for (ctx, text) in [
        (&mut host_ctx, "draw a lighthouse"),
        (&mut bob_ctx, "draw a dragon"),
        (&mut carol_ctx, "draw a library"),
    ] {
        let ack = handle_message(
            ClientMessage::SubmitPrompt {
                text: text.to_string(),
            },
            ctx,
            &state,
        )
        .await;
        assert!(matches!(ack, Some(ServerMessage::PromptAck)));
    }
    assert_eq!(
        state.read_room(&code, |r| r.phase()).await.unwrap(),
        Phase::Submission
    );

    // 6. The subject delivers the artifact, everyone else an interpretation
    let subject = state
        .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
            ModeData::Capture(d) => d.subject.clone(),
            _ => unreachable!(),
        })
        .await
        .unwrap();
    let mut all = vec![
        (host_id.clone(), &mut host_ctx),
        (bob_id.clone(), &mut bob_ctx),
        (carol_id.clone(), &mut carol_ctx),
    ];
    // The subject delivers first: once the interpreters' quorum completes,
    // the submission phase closes and a late artifact would be rejected.
    all.sort_by_key(|(id, _)| *id != subject);
    let mut interpreters = Vec::new();
    for (id, ctx) in all {
        let confirmed = handle_message(
            ClientMessage::SubmitContent {
                content: format!("work of {}", id),
            },
            ctx,
            &state,
        )
        .await;
        assert!(matches!(confirmed, Some(ServerMessage::SubmissionConfirmed)));
        if id != subject {
            interpreters.push((id, ctx));
        }
    }
    assert_eq!(
        state.read_room(&code, |r| r.phase()).await.unwrap(),
        Phase::Voting
    );

    // 7. Votes: both the subject and the second interpreter back the first
    let (runner_up, runner_ctx) = interpreters.pop().unwrap();
    let (favorite, favorite_ctx) = interpreters.pop().unwrap();
    let mut subject_ctx = ConnCtx {
        room: Some(code.clone()),
        player: Some(subject.clone()),
        spectator: false,
    };
    let ballots = [
        (&mut subject_ctx, favorite.clone()),
        (runner_ctx, favorite.clone()),
        (favorite_ctx, runner_up.clone()),
    ];
    for (ctx, target) in ballots {
        let ack = handle_message(
            ClientMessage::CastVote {
                target: VoteTarget::Author { player: target },
            },
            ctx,
            &state,
        )
        .await;
        assert!(matches!(ack, Some(ServerMessage::VoteAck)));
    }

    // 8. Reveal: scores are on the board, submissions are public
    let snapshot = state.snapshot_for(&code, Some(&favorite)).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Reveal);
    match snapshot.round.as_ref().unwrap() {
        RoundView::Capture { submissions, .. } => assert_eq!(submissions.len(), 2),
        other => panic!("Expected capture view, got {:?}", other),
    }
    let scores = state
        .read_room(&code, |room| {
            (
                room.player(&favorite).unwrap().score,
                room.player(&runner_up).unwrap().score,
                room.player(&subject).unwrap().score,
            )
        })
        .await
        .unwrap();
    assert_eq!(scores.0, 125);
    assert_eq!(scores.1, 75);
    assert_eq!(scores.2, 0);

    // 9. Single-round budget: advancing ends the game
    let ended = handle_message(ClientMessage::NextRound, &mut host_ctx, &state).await;
    assert!(ended.is_none());
    let (phase, reason) = state
        .read_room(&code, |room| {
            (
                room.phase(),
                room.round.as_ref().unwrap().end_reason.clone(),
            )
        })
        .await
        .unwrap();
    assert_eq!(phase, Phase::Ended);
    assert_eq!(reason.as_deref(), Some("rounds complete"));

    // 10. Restart wipes the slate back to the lobby
    let restarted = handle_message(ClientMessage::RestartGame, &mut host_ctx, &state).await;
    assert!(restarted.is_none());
    let (phase, total_score) = state
        .read_room(&code, |room| {
            (
                room.phase(),
                room.players.iter().map(|p| p.score).sum::<u32>(),
            )
        })
        .await
        .unwrap();
    assert_eq!(phase, Phase::Lobby);
    assert_eq!(total_score, 0);
    assert_eq!(state.timers.pending_for_room(&code), 0);
}

#[tokio::test]
async fn test_mid_game_joiner_spectates_with_filtered_view() {
    let state = Arc::new(AppState::new());

    let mut host_ctx = ConnCtx::default();
    let code = match handle_message(
        ClientMessage::CreateRoom {
            name: "Alice".to_string(),
        },
        &mut host_ctx,
        &state,
    )
    .await
    {
        Some(ServerMessage::RoomJoined { code, .. }) => code,
        other => panic!("Expected RoomJoined, got {:?}", other),
    };
    let (mut bob_ctx, _bob) = join(&state, &code, "Bob").await;
    let (mut carol_ctx, _carol) = join(&state, &code, "Carol").await;
    for ctx in [&mut bob_ctx, &mut carol_ctx] {
        handle_message(ClientMessage::SetReady { ready: true }, ctx, &state).await;
    }
    handle_message(
        ClientMessage::StartGame {
            mode: GameMode::Twist,
            rounds: Some(2),
        },
        &mut host_ctx,
        &state,
    )
    .await;

    // Joining a running game forces spectator seating.
    let mut late_ctx = ConnCtx::default();
    let response = handle_message(
        ClientMessage::JoinRoom {
            code: code.clone(),
            name: "Dave".to_string(),
            spectator: false,
            token: None,
        },
        &mut late_ctx,
        &state,
    )
    .await;
    match response {
        Some(ServerMessage::RoomJoined { snapshot, .. }) => {
            assert!(late_ctx.spectator);
            // The twist instruction never reaches a spectator.
            match snapshot.round.as_ref().unwrap() {
                RoundView::Twist { twist, holder, .. } => {
                    assert!(twist.is_none());
                    assert!(holder.is_none());
                }
                other => panic!("Expected twist view, got {:?}", other),
            }
        }
        other => panic!("Expected RoomJoined, got {:?}", other),
    }

    // Spectators cannot act in the round.
    let vote = handle_message(
        ClientMessage::SubmitContent {
            content: "ghost entry".to_string(),
        },
        &mut late_ctx,
        &state,
    )
    .await;
    assert!(matches!(vote, Some(ServerMessage::Error { .. })));
}

#[tokio::test]
async fn test_reconnect_token_restores_seat() {
    let state = Arc::new(AppState::new());

    let mut host_ctx = ConnCtx::default();
    let code = match handle_message(
        ClientMessage::CreateRoom {
            name: "Alice".to_string(),
        },
        &mut host_ctx,
        &state,
    )
    .await
    {
        Some(ServerMessage::RoomJoined { code, .. }) => code,
        other => panic!("Expected RoomJoined, got {:?}", other),
    };

    let mut bob_ctx = ConnCtx::default();
    let (bob_id, bob_token) = match handle_message(
        ClientMessage::JoinRoom {
            code: code.clone(),
            name: "Bob".to_string(),
            spectator: false,
            token: None,
        },
        &mut bob_ctx,
        &state,
    )
    .await
    {
        Some(ServerMessage::RoomJoined {
            player_id, token, ..
        }) => (player_id, token),
        other => panic!("Expected RoomJoined, got {:?}", other),
    };

    state.handle_disconnect(&code, &bob_id).await;

    let mut fresh_ctx = ConnCtx::default();
    let response = handle_message(
        ClientMessage::JoinRoom {
            code: code.clone(),
            name: "Bob".to_string(),
            spectator: false,
            token: Some(bob_token),
        },
        &mut fresh_ctx,
        &state,
    )
    .await;
    match response {
        Some(ServerMessage::RoomJoined { player_id, .. }) => {
            assert_eq!(player_id, bob_id);
        }
        other => panic!("Expected RoomJoined, got {:?}", other),
    }
    let player_count = state
        .read_room(&code, |room| room.players.len())
        .await
        .unwrap();
    assert_eq!(player_count, 2);
}
