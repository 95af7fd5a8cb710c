use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

use pollduel::client::{HttpVoteGateway, PollVoteState, VoteGateway, VoteStage, cast_vote};
use pollduel::config::Config;
use pollduel::models::{
    CreatePollRequest, PollStatus, VoteChoice, VoteCount, VoteOutcome, VoteRequest, VoterIdentity,
};
use pollduel::services::poll_service;
use pollduel::services::realtime_service::RealtimeHub;
use pollduel::store::MemoryStore;
use pollduel::{AppState, create_app};

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        redis_url: String::new(),
        port: 0,
        host: "127.0.0.1".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        sweep_interval_secs: 300,
        vote_rate_limit: 30,
    }
}

fn create_request() -> CreatePollRequest {
    CreatePollRequest {
        creator: VoterIdentity::User(Uuid::new_v4()),
        option_a_label: Some("Tabs".to_string()),
        option_b_label: Some("Spaces".to_string()),
        option_a_image: None,
        option_b_image: None,
        description: None,
        is_public: true,
    }
}

async fn spawn_app(store: Arc<MemoryStore>, hub: Arc<RealtimeHub>) -> String {
    let state = AppState {
        store,
        hub,
        redis: None,
        config: Arc::new(test_config()),
    };
    let app = create_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn http_gateway_round_trips_the_voting_protocol() {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(RealtimeHub::new());
    let base_url = spawn_app(store.clone(), hub.clone()).await;

    let http = reqwest::Client::new();
    let created: serde_json::Value = http
        .post(format!("{}/api/polls", base_url))
        .json(&serde_json::json!({
            "creator": { "kind": "user", "id": Uuid::new_v4() },
            "option_a_label": "Tabs",
            "option_b_label": "Spaces",
        }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    let poll_id = Uuid::parse_str(created["id"].as_str().unwrap()).unwrap();

    let fetched: serde_json::Value = http
        .get(format!("{}/api/polls/{}", base_url, poll_id))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "active");
    assert_eq!(fetched["counts"]["option_a"], 0);

    let gateway = HttpVoteGateway::new(&base_url).unwrap();
    let identity = VoterIdentity::Anonymous("anon_1700000000000_ab12cd34".to_string());
    let mut view = PollVoteState::new(
        poll_id,
        identity.clone(),
        PollStatus::Active,
        VoteCount::default(),
    );

    let outcome = cast_vote(&mut view, &gateway, VoteChoice::OptionA)
        .await
        .unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted { .. }));
    assert_eq!(view.stage(), VoteStage::Voted);
    assert_eq!(view.counts(), VoteCount { option_a: 1, option_b: 0 });

    // Retried over the wire with the other option: idempotent, first
    // choice stands.
    let outcome = gateway
        .submit(
            poll_id,
            &VoteRequest {
                voter: identity,
                choice: VoteChoice::OptionB,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, VoteOutcome::AlreadyVoted);
    assert_eq!(
        gateway.counts(poll_id).await.unwrap(),
        VoteCount { option_a: 1, option_b: 0 }
    );
}

#[tokio::test]
async fn sweep_endpoint_closes_expired_polls_and_gates_votes() {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(RealtimeHub::new());
    let base_url = spawn_app(store.clone(), hub.clone()).await;

    // Created 25 hours ago, so its expiry has passed but its stored status
    // still reads active.
    let expired = poll_service::create_poll(
        store.as_ref(),
        create_request(),
        Utc::now() - Duration::hours(25),
    )
    .await
    .unwrap();
    let fresh = poll_service::create_poll(store.as_ref(), create_request(), Utc::now())
        .await
        .unwrap();

    let http = reqwest::Client::new();
    let swept: serde_json::Value = http
        .post(format!("{}/api/maintenance/sweep", base_url))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(swept["closed"], 1);

    let gateway = HttpVoteGateway::new(&base_url).unwrap();
    let outcome = gateway
        .submit(
            expired.id,
            &VoteRequest {
                voter: VoterIdentity::Anonymous("anon_1700000000000_ab12cd34".to_string()),
                choice: VoteChoice::OptionA,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, VoteOutcome::PollClosed);

    let outcome = gateway
        .submit(
            fresh.id,
            &VoteRequest {
                voter: VoterIdentity::Anonymous("anon_1700000000000_ab12cd34".to_string()),
                choice: VoteChoice::OptionA,
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted { .. }));
}
