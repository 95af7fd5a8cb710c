use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use pollduel::client::{
    IdentityResolver, MemoryTokenStore, PollVoteState, VoteGateway, VoteStage, cast_vote,
};
use pollduel::error::Result;
use pollduel::models::{
    CreatePollRequest, PollStatus, VoteChoice, VoteCount, VoteOutcome, VoteRequest, VoterIdentity,
};
use pollduel::services::realtime_service::{Delivery, RealtimeHub};
use pollduel::services::{poll_service, vote_service};
use pollduel::store::{MemoryStore, PollStore};

fn create_request() -> CreatePollRequest {
    CreatePollRequest {
        creator: VoterIdentity::User(Uuid::new_v4()),
        option_a_label: Some("Mountains".to_string()),
        option_b_label: Some("Beach".to_string()),
        option_a_image: None,
        option_b_image: None,
        description: Some("Where to next?".to_string()),
        is_public: true,
    }
}

fn anon_resolver() -> IdentityResolver {
    IdentityResolver::new(None, Arc::new(MemoryTokenStore::new()))
}

#[tokio::test]
async fn anonymous_voting_lifecycle_end_to_end() {
    let store = MemoryStore::new();
    let hub = Arc::new(RealtimeHub::new());
    let t0 = Utc::now();

    let poll = poll_service::create_poll(&store, create_request(), t0)
        .await
        .unwrap();
    assert_eq!(poll.expires_at, t0 + Duration::hours(24));

    // First anonymous voter casts option A an hour in.
    let voter_a = anon_resolver();
    let identity_a = voter_a.resolve(poll.id, t0 + Duration::hours(1)).unwrap();
    let outcome = vote_service::submit_vote(
        &store,
        &hub,
        poll.id,
        identity_a.clone(),
        VoteChoice::OptionA,
        t0 + Duration::hours(1),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted { .. }));
    assert_eq!(
        vote_service::counts_for(&store, poll.id).await.unwrap(),
        VoteCount { option_a: 1, option_b: 0 }
    );

    // The same token retries with the other option; the first choice stands.
    let retry_identity = voter_a.resolve(poll.id, t0 + Duration::hours(2)).unwrap();
    assert_eq!(retry_identity, identity_a);
    let outcome = vote_service::submit_vote(
        &store,
        &hub,
        poll.id,
        retry_identity,
        VoteChoice::OptionB,
        t0 + Duration::hours(2),
    )
    .await
    .unwrap();
    assert_eq!(outcome, VoteOutcome::AlreadyVoted);
    assert_eq!(
        vote_service::counts_for(&store, poll.id).await.unwrap(),
        VoteCount { option_a: 1, option_b: 0 }
    );
    let stored = store.find_vote(poll.id, &identity_a).await.unwrap().unwrap();
    assert_eq!(stored.choice, VoteChoice::OptionA);

    // A different anonymous voter is a distinct identity.
    let voter_b = anon_resolver();
    let identity_b = voter_b.resolve(poll.id, t0 + Duration::hours(3)).unwrap();
    assert_ne!(identity_b, identity_a);
    let outcome = vote_service::submit_vote(
        &store,
        &hub,
        poll.id,
        identity_b,
        VoteChoice::OptionB,
        t0 + Duration::hours(3),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted { .. }));
    assert_eq!(
        vote_service::counts_for(&store, poll.id).await.unwrap(),
        VoteCount { option_a: 1, option_b: 1 }
    );

    // Past expiry every attempt is rejected, stored status notwithstanding.
    let late_voter = anon_resolver();
    let identity_late = late_voter.resolve(poll.id, t0 + Duration::hours(25)).unwrap();
    let outcome = vote_service::submit_vote(
        &store,
        &hub,
        poll.id,
        identity_late,
        VoteChoice::OptionA,
        t0 + Duration::hours(25),
    )
    .await
    .unwrap();
    assert_eq!(outcome, VoteOutcome::PollClosed);
    assert_eq!(
        vote_service::counts_for(&store, poll.id).await.unwrap(),
        VoteCount { option_a: 1, option_b: 1 }
    );
}

#[tokio::test]
async fn displayed_counts_converge_across_live_clients() {
    let store = MemoryStore::new();
    let hub = Arc::new(RealtimeHub::new());
    let t0 = Utc::now();
    let now = t0 + Duration::hours(1);

    let poll = poll_service::create_poll(&store, create_request(), t0)
        .await
        .unwrap();

    let identity_a = anon_resolver().resolve(poll.id, now).unwrap();
    let identity_b = anon_resolver().resolve(poll.id, now).unwrap();

    let mut sub_a = hub.subscribe(poll.id);
    let mut sub_b = hub.subscribe(poll.id);
    let initial = vote_service::counts_for(&store, poll.id).await.unwrap();
    let mut view_a = PollVoteState::new(poll.id, identity_a.clone(), PollStatus::Active, initial);
    let mut view_b = PollVoteState::new(poll.id, identity_b.clone(), PollStatus::Active, initial);

    // A votes: optimistic increment first, durable write second.
    view_a.begin_submit(VoteChoice::OptionA, now).unwrap();
    let outcome =
        vote_service::submit_vote(&store, &hub, poll.id, identity_a, VoteChoice::OptionA, now)
            .await
            .unwrap();
    let VoteOutcome::Accepted { vote_id } = outcome else {
        panic!("expected acceptance, got {:?}", outcome);
    };
    view_a.resolve_accepted(vote_id);

    // Both subscribers receive the broadcast; A recognizes its own echo.
    let Delivery::Event(event) = sub_a.recv().await else {
        panic!("missing event");
    };
    view_a.apply(&event, now);
    let Delivery::Event(event) = sub_b.recv().await else {
        panic!("missing event");
    };
    view_b.apply(&event, now);

    assert_eq!(view_a.counts(), VoteCount { option_a: 1, option_b: 0 });
    assert_eq!(view_b.counts(), VoteCount { option_a: 1, option_b: 0 });

    // B votes the other way; both views converge again.
    view_b.begin_submit(VoteChoice::OptionB, now).unwrap();
    let outcome =
        vote_service::submit_vote(&store, &hub, poll.id, identity_b, VoteChoice::OptionB, now)
            .await
            .unwrap();
    let VoteOutcome::Accepted { vote_id } = outcome else {
        panic!("expected acceptance, got {:?}", outcome);
    };
    view_b.resolve_accepted(vote_id);

    let Delivery::Event(event) = sub_a.recv().await else {
        panic!("missing event");
    };
    view_a.apply(&event, now);
    let Delivery::Event(event) = sub_b.recv().await else {
        panic!("missing event");
    };
    view_b.apply(&event, now);

    let authoritative = vote_service::counts_for(&store, poll.id).await.unwrap();
    assert_eq!(authoritative, VoteCount { option_a: 1, option_b: 1 });
    assert_eq!(view_a.counts(), authoritative);
    assert_eq!(view_b.counts(), authoritative);

    // An explicit close reaches both views through the same channel.
    poll_service::close_poll(&store, &hub, poll.id).await.unwrap();
    let Delivery::Event(event) = sub_a.recv().await else {
        panic!("missing event");
    };
    view_a.apply(&event, now);
    let Delivery::Event(event) = sub_b.recv().await else {
        panic!("missing event");
    };
    view_b.apply(&event, now);

    assert_eq!(view_a.status(), PollStatus::Closed);
    assert_eq!(view_b.status(), PollStatus::Closed);
}

/// Gateway running directly against the services, as an embedded client
/// would.
struct InProcessGateway {
    store: Arc<MemoryStore>,
    hub: Arc<RealtimeHub>,
    now: DateTime<Utc>,
}

#[async_trait]
impl VoteGateway for InProcessGateway {
    async fn submit(&self, poll_id: Uuid, request: &VoteRequest) -> Result<VoteOutcome> {
        vote_service::submit_vote(
            self.store.as_ref(),
            &self.hub,
            poll_id,
            request.voter.clone(),
            request.choice,
            self.now,
        )
        .await
    }

    async fn counts(&self, poll_id: Uuid) -> Result<VoteCount> {
        vote_service::counts_for(self.store.as_ref(), poll_id).await
    }
}

#[tokio::test]
async fn cast_vote_driver_reconciles_ack_and_echo() {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(RealtimeHub::new());
    let t0 = Utc::now();

    let poll = poll_service::create_poll(store.as_ref(), create_request(), t0)
        .await
        .unwrap();
    let gateway = InProcessGateway {
        store: store.clone(),
        hub: hub.clone(),
        now: t0 + Duration::hours(1),
    };

    let resolver = anon_resolver();
    let identity = resolver.resolve(poll.id, t0).unwrap();
    let mut sub = hub.subscribe(poll.id);
    let mut view = PollVoteState::new(
        poll.id,
        identity.clone(),
        PollStatus::Active,
        VoteCount::default(),
    );

    let outcome = cast_vote(&mut view, &gateway, VoteChoice::OptionA)
        .await
        .unwrap();
    assert!(matches!(outcome, VoteOutcome::Accepted { .. }));
    assert_eq!(view.stage(), VoteStage::Voted);

    // The echo of our own vote arrives and changes nothing.
    let Delivery::Event(event) = sub.recv().await else {
        panic!("missing event");
    };
    view.apply(&event, Utc::now());
    assert_eq!(view.counts(), VoteCount { option_a: 1, option_b: 0 });

    // Voted is terminal for this poll and identity.
    assert!(cast_vote(&mut view, &gateway, VoteChoice::OptionB).await.is_err());

    // A reload builds a fresh machine; the duplicate is rediscovered and
    // the view resyncs to authoritative counts.
    let mut reloaded = PollVoteState::new(
        poll.id,
        identity,
        PollStatus::Active,
        vote_service::counts_for(store.as_ref(), poll.id).await.unwrap(),
    );
    let outcome = cast_vote(&mut reloaded, &gateway, VoteChoice::OptionB)
        .await
        .unwrap();
    assert_eq!(outcome, VoteOutcome::AlreadyVoted);
    assert_eq!(reloaded.stage(), VoteStage::Voted);
    assert_eq!(reloaded.counts(), VoteCount { option_a: 1, option_b: 0 });
}
