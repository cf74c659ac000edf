use agreeable::caption::{
    CaptionManager, CaptionRenderer, CaptionRequest, CaptionResult, TemplateCatalog,
};
use agreeable::config::ServerConfig;
use agreeable::protocol::{ClientMessage, ServerMessage};
use agreeable::session::Session;
use agreeable::state::AppState;
use agreeable::types::*;
use agreeable::ws::handlers::handle_message;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn quote_settings() -> RoomSettings {
    RoomSettings {
        game_type: GameType::Quote,
        max_players: 3,
        max_rounds: 2,
        submission_seconds: 10,
        voting_seconds: 10,
    }
}

fn manual_config() -> ServerConfig {
    ServerConfig {
        auto_advance: false,
        ..ServerConfig::default()
    }
}

async fn send(state: &AppState, session: &mut Session, msg: ClientMessage) -> ServerMessage {
    handle_message(msg, session, state)
        .await
        .expect("every intent gets a reply")
}

async fn expect_ack(state: &AppState, session: &mut Session, msg: ClientMessage) {
    match send(state, session, msg).await {
        ServerMessage::Ack { .. } => {}
        other => panic!("Expected Ack, got {:?}", other),
    }
}

async fn expect_error(state: &AppState, session: &mut Session, msg: ClientMessage, code: &str) {
    match send(state, session, msg).await {
        ServerMessage::Error { code: actual, .. } => assert_eq!(actual, code),
        other => panic!("Expected {} error, got {:?}", code, other),
    }
}

async fn join(state: &AppState, session: &mut Session, room_id: &str, name: &str) {
    let reply = send(
        state,
        session,
        ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
            display_name: name.to_string(),
        },
    )
    .await;
    assert!(
        matches!(reply, ServerMessage::RoomJoined { .. }),
        "join failed: {:?}",
        reply
    );
}

fn say(text: &str) -> ClientMessage {
    ClientMessage::Submit {
        payload: SubmissionPayload::Text {
            text: text.to_string(),
        },
    }
}

/// Three players in room ABC123, host A, nothing started yet
async fn abc_room(state: &AppState) -> (Session, Session, Session) {
    state
        .create_room_with_code("ABC123", "A", "Ann".to_string(), quote_settings())
        .await
        .unwrap();

    let mut a = Session::new("A".to_string());
    let mut b = Session::new("B".to_string());
    let mut c = Session::new("C".to_string());
    // Host connects to the room it created
    join(state, &mut a, "ABC123", "Ann").await;
    join(state, &mut b, "ABC123", "Bea").await;
    join(state, &mut c, "ABC123", "Cal").await;
    (a, b, c)
}

/// End-to-end game driven by the countdown
#[tokio::test(start_paused = true)]
async fn test_full_game_flow() {
    let state = AppState::new();
    let (mut a, mut b, mut c) = abc_room(&state).await;

    expect_ack(&state, &mut a, ClientMessage::StartGame).await;
    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.status, RoomStatus::Submission);
    assert_eq!(room.round_number, 1);

    // Round 1
    expect_ack(&state, &mut a, say("To be or not to be")).await;
    expect_ack(&state, &mut b, say("I think therefore I am")).await;
    expect_ack(&state, &mut c, say("Veni vidi vici")).await;

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.status, RoomStatus::Voting);
    assert_eq!(room.time_left, 10);

    let target = ClientMessage::Vote {
        target: "A".to_string(),
    };
    expect_ack(&state, &mut b, target.clone()).await;
    expect_ack(&state, &mut c, target.clone()).await;
    expect_error(&state, &mut c, target, "ALREADY_VOTED").await;

    // Voting expires: round 1 of 2, so back to submission
    tokio::time::sleep(Duration::from_secs(10)).await;
    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.status, RoomStatus::Submission);
    assert_eq!(room.round_number, 2);
    assert!(room.current_round.submissions.is_empty());

    // Round 2
    expect_ack(&state, &mut a, say("Carpe diem")).await;
    expect_ack(&state, &mut b, say("Know thyself")).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        state.get_room("ABC123").await.unwrap().status,
        RoomStatus::Voting
    );
    tokio::time::sleep(Duration::from_secs(10)).await;

    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.status, RoomStatus::Results);
    assert_eq!(room.players["A"].total_votes, 2);
    assert_eq!(room.players["B"].total_votes, 0);
    assert_eq!(room.players["C"].total_votes, 0);

    let standings = state.standings("ABC123").await.unwrap();
    assert_eq!(standings[0].participant_id, "A");
    assert_eq!(standings[0].rank, 1);
    assert_eq!(standings[1].rank, 2);
    assert_eq!(standings[2].rank, 2);

    // Results holds until restart
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        state.get_room("ABC123").await.unwrap().status,
        RoomStatus::Results
    );

    // Restart + start gives a fresh first round with the same roster
    expect_error(&state, &mut b, ClientMessage::Restart, "NOT_HOST").await;
    expect_ack(&state, &mut a, ClientMessage::Restart).await;
    expect_ack(&state, &mut a, ClientMessage::StartGame).await;
    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.status, RoomStatus::Submission);
    assert_eq!(room.round_number, 1);
    assert_eq!(room.player_count(), 3);
    assert!(room.players.values().all(|p| p.total_votes == 0));
}

#[tokio::test]
async fn test_start_game_rules() {
    let state = AppState::with_config(manual_config());
    state
        .create_room_with_code("ABC123", "A", "Ann".to_string(), quote_settings())
        .await
        .unwrap();
    let mut a = Session::new("A".to_string());
    let mut b = Session::new("B".to_string());
    join(&state, &mut a, "ABC123", "Ann").await;

    expect_error(&state, &mut a, ClientMessage::StartGame, "NOT_ENOUGH_PLAYERS").await;
    join(&state, &mut b, "ABC123", "Bea").await;
    expect_error(&state, &mut b, ClientMessage::StartGame, "NOT_HOST").await;

    let before = state.get_room("ABC123").await.unwrap();
    assert_eq!(before.status, RoomStatus::Lobby);
    expect_ack(&state, &mut a, ClientMessage::StartGame).await;
}

#[tokio::test]
async fn test_stale_intents_are_rejected() {
    let state = AppState::with_config(manual_config());
    let (mut a, mut b, mut c) = abc_room(&state).await;

    expect_error(
        &state,
        &mut b,
        ClientMessage::Vote {
            target: "A".to_string(),
        },
        "WRONG_PHASE",
    )
    .await;

    expect_ack(&state, &mut a, ClientMessage::StartGame).await;
    expect_ack(&state, &mut a, say("first")).await;
    expect_ack(&state, &mut a, ClientMessage::Advance).await;

    // Arrives after the phase moved on
    expect_error(&state, &mut c, say("too late"), "WRONG_PHASE").await;
    expect_error(
        &state,
        &mut b,
        ClientMessage::Vote {
            target: "B".to_string(),
        },
        "SELF_VOTE",
    )
    .await;

    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.current_round.submissions.len(), 1);
    assert!(room.current_round.voted.is_empty());
}

#[tokio::test]
async fn test_host_quit_deletes_room_for_everyone() {
    let state = AppState::with_config(manual_config());
    let (mut a, mut b, _c) = abc_room(&state).await;

    expect_ack(&state, &mut a, ClientMessage::Quit).await;

    // B's observer learns the room is gone
    let snapshot = tokio::time::timeout(Duration::from_secs(1), b.next_update())
        .await
        .unwrap();
    match b.observe(snapshot) {
        Some(ServerMessage::RoomDeleted { room_id }) => assert_eq!(room_id, "ABC123"),
        other => panic!("Expected RoomDeleted, got {:?}", other),
    }

    let mut d = Session::new("D".to_string());
    expect_error(
        &state,
        &mut d,
        ClientMessage::JoinRoom {
            room_id: "ABC123".to_string(),
            display_name: "Dee".to_string(),
        },
        "ROOM_NOT_FOUND",
    )
    .await;
}

#[tokio::test]
async fn test_non_host_quit_mid_round() {
    let state = AppState::with_config(manual_config());
    let (mut a, mut b, mut c) = abc_room(&state).await;
    expect_ack(&state, &mut a, ClientMessage::StartGame).await;
    expect_ack(&state, &mut b, say("leaving soon")).await;
    expect_ack(&state, &mut c, say("staying")).await;

    expect_ack(&state, &mut b, ClientMessage::Quit).await;
    expect_ack(&state, &mut a, ClientMessage::Advance).await;

    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.status, RoomStatus::Voting);
    assert!(!room.is_player("B"));
    assert_eq!(room.current_round.submissions.len(), 1);

    expect_error(
        &state,
        &mut a,
        ClientMessage::Vote {
            target: "B".to_string(),
        },
        "UNKNOWN_TARGET",
    )
    .await;
}

#[tokio::test]
async fn test_disconnect_cleanup_runs_once() {
    let state = AppState::with_config(manual_config());
    let (_a, mut b, _c) = abc_room(&state).await;

    let presence = b.leave().unwrap();
    state.handle_disconnect(&presence).await;
    state.handle_disconnect(&presence).await;

    let room = state.get_room("ABC123").await.unwrap();
    assert_eq!(room.player_count(), 2);
    assert!(!room.is_player("B"));
}

#[tokio::test]
async fn test_concurrent_joins_respect_capacity() {
    let state = AppState::with_config(manual_config());
    state
        .create_room_with_code("FULL01", "host", "Host".to_string(), quote_settings())
        .await
        .unwrap();

    let attempts: Vec<_> = (0..10)
        .map(|i| {
            let state = state.clone();
            tokio::spawn(async move {
                let mut session = Session::new(format!("p{}", i));
                handle_message(
                    ClientMessage::JoinRoom {
                        room_id: "FULL01".to_string(),
                        display_name: format!("P{}", i),
                    },
                    &mut session,
                    &state,
                )
                .await
            })
        })
        .collect();

    let mut full = 0;
    for attempt in attempts {
        if let Some(ServerMessage::Error { code, .. }) = attempt.await.unwrap() {
            assert_eq!(code, "ROOM_FULL");
            full += 1;
        }
    }

    assert_eq!(full, 8);
    assert_eq!(state.get_room("FULL01").await.unwrap().player_count(), 3);
}

#[tokio::test]
async fn test_patches_follow_subscription() {
    let state = AppState::with_config(manual_config());
    let (mut a, mut b, _c) = abc_room(&state).await;
    expect_ack(
        &state,
        &mut b,
        ClientMessage::Subscribe {
            topics: vec![agreeable::state::RoomTopic::Status],
        },
    )
    .await;

    expect_ack(&state, &mut a, ClientMessage::StartGame).await;
    let snapshot = b.next_update().await;
    match b.observe(snapshot) {
        Some(ServerMessage::RoomPatch(patch)) => {
            assert_eq!(patch.status, Some(RoomStatus::Submission));
            assert_eq!(patch.round_number, Some(1));
            assert!(patch.players.is_none());
            assert!(patch.current_round.is_none());
        }
        other => panic!("Expected RoomPatch, got {:?}", other),
    }

    // Submissions only touch current_round, which B did not subscribe to
    expect_ack(&state, &mut a, say("quiet")).await;
    let snapshot = b.next_update().await;
    assert!(b.observe(snapshot).is_none());
}

struct StubRenderer;

#[async_trait]
impl CaptionRenderer for StubRenderer {
    async fn render(&self, request: &CaptionRequest) -> CaptionResult<String> {
        Ok(format!(
            "https://i.test/{}/{}.jpg",
            request.template_id,
            request.boxes.join("_")
        ))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct StubCatalog;

#[async_trait]
impl TemplateCatalog for StubCatalog {
    async fn list_templates(&self) -> CaptionResult<Vec<MemeTemplate>> {
        Ok(vec![MemeTemplate {
            id: "181913649".to_string(),
            url: "https://i.imgflip.com/30b1gx.jpg".to_string(),
            box_count: 2,
        }])
    }
}

fn with_stub_captions(config: ServerConfig) -> AppState {
    AppState::with_config(config)
        .with_captions(CaptionManager::new(Arc::new(StubRenderer), Arc::new(StubCatalog)))
}

#[tokio::test]
async fn test_meme_round_publishes_template_and_renders() {
    let state = with_stub_captions(manual_config());
    let settings = RoomSettings {
        game_type: GameType::Meme,
        ..quote_settings()
    };
    state
        .create_room_with_code("MEME01", "A", "Ann".to_string(), settings)
        .await
        .unwrap();
    let mut a = Session::new("A".to_string());
    let mut b = Session::new("B".to_string());
    join(&state, &mut a, "MEME01", "Ann").await;
    join(&state, &mut b, "MEME01", "Bea").await;
    expect_ack(&state, &mut a, ClientMessage::StartGame).await;

    let template = loop {
        expect_ack(&state, &mut b, ClientMessage::RequestTemplate).await;
        if let Some(template) = state.get_room("MEME01").await.unwrap().current_round.template {
            break template;
        }
        tokio::task::yield_now().await;
    };
    assert_eq!(template.id, "181913649");

    let meme = |top: &str, bottom: &str| ClientMessage::Submit {
        payload: SubmissionPayload::Meme {
            template_id: template.id.clone(),
            boxes: vec![top.to_string(), bottom.to_string()],
        },
    };
    expect_ack(&state, &mut a, meme("tests", "more tests")).await;
    expect_ack(&state, &mut b, meme("ship", "it")).await;
    expect_error(
        &state,
        &mut b,
        ClientMessage::Submit {
            payload: SubmissionPayload::Text {
                text: "plain".to_string(),
            },
        },
        "INVALID_SUBMISSION",
    )
    .await;

    expect_ack(&state, &mut a, ClientMessage::Advance).await;

    let room = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let room = state.get_room("MEME01").await.unwrap();
            if room
                .current_round
                .submissions
                .values()
                .all(|s| s.rendered_url.is_some())
            {
                return room;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(
        room.current_round.submissions["B"].rendered_url.as_deref(),
        Some("https://i.test/181913649/ship_it.jpg")
    );
    assert_eq!(room.status, RoomStatus::Voting);
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_http_room_endpoints() {
    let state = AppState::with_config(manual_config());
    let (_a, mut b, mut c) = abc_room(&state).await;
    let app = agreeable::app(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/rooms/ABC123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "lobby");
    assert_eq!(json["players"]["B"]["display_name"], "Bea");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/rooms/NOPE42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "ROOM_NOT_FOUND");

    expect_ack(&state, &mut c, ClientMessage::Quit).await;
    expect_ack(&state, &mut b, ClientMessage::Quit).await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rooms/ABC123/standings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["participant_id"], "A");
}

#[tokio::test]
async fn test_http_caption_endpoints() {
    let unconfigured = agreeable::app(AppState::with_config(manual_config()));
    let response = unconfigured
        .oneshot(
            Request::builder()
                .uri("/api/templates")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let app = agreeable::app(with_stub_captions(manual_config()));
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/templates")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await[0]["box_count"], 2);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/caption")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"template_id":"181913649","boxes":["top","bottom"]}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["url"], "https://i.test/181913649/top_bottom.jpg");
    assert!(json.get("error_message").is_none());
}
