//! Competitive bidding against an in-memory database.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{add_company, harness, lead_input, Harness};
use database::{bid, BidStatus, NewBid};
use lead_engine::{ApiError, AuthContext, ToastVariant};

async fn queued_lead(h: &Harness) -> String {
    add_company(&h.db, "snekker", &["roofing"], 5_000_000).await;
    add_company(&h.db, "tømrer", &["roofing"], 5_000_000).await;

    h.engine
        .leads()
        .create_lead(&AuthContext::user("user-1"), lead_input("Need carpenter", "carpentry"))
        .await
        .unwrap()
        .lead_id
}

#[tokio::test]
async fn test_place_bid() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;
    let auth = AuthContext::company("owner-1", "snekker");

    let mut board = h.engine.bid_board(&auth, &lead_id).await.unwrap();
    assert!(board.bids().is_empty());

    let placed = board
        .place_bid(50_000, 80_000, Some("Kan starte mandag".to_string()), false)
        .await
        .unwrap();

    assert_eq!(placed.bid_status, BidStatus::Active);
    assert_eq!(placed.company_id, "snekker");
    let minutes = (placed.expires_at - Utc::now()).num_minutes();
    assert!((23 * 60..=24 * 60).contains(&minutes));

    assert_eq!(board.my_bids().len(), 1);
    assert_eq!(board.stats().total_bids, 1);
    assert_eq!(board.stats().highest_bid, Some(50_000));
    assert_eq!(board.stats().my_bid_rank, Some(1));
    assert_eq!(h.notifier.last().unwrap().variant, ToastVariant::Success);
}

#[tokio::test]
async fn test_second_active_bid_is_rejected() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;
    let auth = AuthContext::company("owner-1", "snekker");

    let mut board = h.engine.bid_board(&auth, &lead_id).await.unwrap();
    board.place_bid(50_000, 80_000, None, false).await.unwrap();

    let result = board.place_bid(60_000, 80_000, None, false).await;
    match result {
        Err(ApiError::DuplicateActiveBid { lead_id: l, company_id }) => {
            assert_eq!(l, lead_id);
            assert_eq!(company_id, "snekker");
        }
        other => panic!("expected duplicate bid error, got {:?}", other),
    }
    assert_eq!(h.notifier.last().unwrap().variant, ToastVariant::Error);

    // A second board for the same company is turned away as well.
    let mut stale = h.engine.bid_board(&auth, &lead_id).await.unwrap();
    assert!(matches!(
        stale.place_bid(70_000, 80_000, None, false).await,
        Err(ApiError::DuplicateActiveBid { .. })
    ));
    assert_eq!(board.bids().len(), 1);
}

#[tokio::test]
async fn test_expired_bid_does_not_block_a_new_one() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;

    let stale = bid::create_bid(
        h.db.pool(),
        &NewBid {
            lead_id: lead_id.clone(),
            company_id: "snekker".to_string(),
            bid_amount_cents: 50_000,
            max_budget_cents: 70_000,
            auto_bid: false,
            message: None,
            expires_at: Utc::now() - chrono::Duration::hours(1),
        },
    )
    .await
    .unwrap();

    let mut board = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &lead_id)
        .await
        .unwrap();
    assert_eq!(board.stats().total_bids, 0);

    let placed = board.place_bid(55_000, 70_000, None, false).await.unwrap();
    assert_eq!(placed.bid_status, BidStatus::Active);
    assert_eq!(board.stats().total_bids, 1);
    assert_eq!(board.stats().my_bid_rank, Some(1));

    let closed = bid::get_bid(h.db.pool(), &stale.id).await.unwrap();
    assert_eq!(closed.bid_status, BidStatus::Lost);
}

#[tokio::test]
async fn test_board_only_changes_its_own_bids() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;

    let mut owner = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &lead_id)
        .await
        .unwrap();
    let theirs = owner.place_bid(50_000, 80_000, None, false).await.unwrap();

    let mut rival = h
        .engine
        .bid_board(&AuthContext::company("owner-2", "tømrer"), &lead_id)
        .await
        .unwrap();
    assert!(rival.withdraw_bid(&theirs.id).await.is_err());
    assert!(rival.update_bid(&theirs.id, 1_000, Some(1_000), None).await.is_err());
    assert_eq!(h.notifier.last().unwrap().variant, ToastVariant::Error);

    let mut viewer = h
        .engine
        .bid_board(&AuthContext::user("user-1"), &lead_id)
        .await
        .unwrap();
    assert!(matches!(viewer.withdraw_bid(&theirs.id).await, Err(ApiError::NoCompany)));

    // The same company on another lead cannot reach the bid either.
    let other_lead = h
        .engine
        .leads()
        .create_lead(&AuthContext::user("user-2"), lead_input("Need carpenter", "carpentry"))
        .await
        .unwrap()
        .lead_id;
    let mut elsewhere = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &other_lead)
        .await
        .unwrap();
    assert!(elsewhere.withdraw_bid(&theirs.id).await.is_err());

    let unchanged = bid::get_bid(h.db.pool(), &theirs.id).await.unwrap();
    assert_eq!(unchanged.bid_status, BidStatus::Active);
    assert_eq!(unchanged.bid_amount_cents, 50_000);
}

#[tokio::test]
async fn test_bid_validation_and_company_context() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;

    let mut anonymous = h
        .engine
        .bid_board(&AuthContext::user("user-1"), &lead_id)
        .await
        .unwrap();
    assert!(matches!(
        anonymous.place_bid(50_000, 80_000, None, false).await,
        Err(ApiError::NoCompany)
    ));

    let mut board = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &lead_id)
        .await
        .unwrap();
    assert!(matches!(
        board.place_bid(90_000, 80_000, None, false).await,
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        board.place_bid(0, 80_000, None, false).await,
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        board.place_bid(i64::MAX, i64::MAX, None, false).await,
        Err(ApiError::Validation(_))
    ));
    assert!(board.bids().is_empty());
}

#[tokio::test]
async fn test_ranking_update_and_withdraw() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;

    let mut first = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &lead_id)
        .await
        .unwrap();
    let mut second = h
        .engine
        .bid_board(&AuthContext::company("owner-2", "tømrer"), &lead_id)
        .await
        .unwrap();

    let mine = first.place_bid(50_000, 100_000, None, true).await.unwrap();
    second.place_bid(70_000, 90_000, None, false).await.unwrap();

    first.refresh().await.unwrap();
    assert_eq!(first.stats().total_bids, 2);
    assert_eq!(first.stats().highest_bid, Some(70_000));
    assert_eq!(first.stats().average_bid, Some(60_000));
    assert_eq!(first.stats().my_bid_rank, Some(2));
    assert_eq!(second.stats().my_bid_rank, Some(1));

    // The stored max still applies when none is given.
    assert!(matches!(
        first.update_bid(&mine.id, 120_000, None, None).await,
        Err(ApiError::Validation(_))
    ));

    let raised = first
        .update_bid(&mine.id, 80_000, None, Some("Kan starte i dag".to_string()))
        .await
        .unwrap();
    assert_eq!(raised.bid_amount_cents, 80_000);
    assert_eq!(raised.max_budget_cents, 100_000);
    assert_eq!(raised.message.as_deref(), Some("Kan starte i dag"));
    assert_eq!(first.stats().my_bid_rank, Some(1));

    first.withdraw_bid(&mine.id).await.unwrap();
    assert_eq!(first.stats().total_bids, 1);
    assert_eq!(first.stats().my_bid_rank, None);
    assert_eq!(first.my_bids()[0].bid_status, BidStatus::Withdrawn);

    // Withdrawn bids are final.
    assert!(first.withdraw_bid(&mine.id).await.is_err());
    assert_eq!(h.notifier.last().unwrap().variant, ToastVariant::Error);

    // With the old bid withdrawn a new one is accepted.
    first.place_bid(55_000, 100_000, None, false).await.unwrap();
    assert_eq!(first.stats().total_bids, 2);
}

#[tokio::test]
async fn test_watcher_follows_new_bids() {
    let h = harness().await;
    let lead_id = queued_lead(&h).await;
    let other_lead = h
        .engine
        .leads()
        .create_lead(&AuthContext::user("user-2"), lead_input("Need carpenter", "carpentry"))
        .await
        .unwrap()
        .lead_id;

    let viewer = AuthContext::company("owner-2", "tømrer");
    let mut watcher = h.engine.watch_bids(&viewer, &lead_id).await.unwrap();
    assert!(watcher.current().bids.is_empty());
    assert_eq!(h.backend.bid_subscriber_count(), 1);

    let mut elsewhere = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &other_lead)
        .await
        .unwrap();
    elsewhere.place_bid(40_000, 40_000, None, false).await.unwrap();

    let mut board = h
        .engine
        .bid_board(&AuthContext::company("owner-1", "snekker"), &lead_id)
        .await
        .unwrap();
    board.place_bid(50_000, 80_000, None, false).await.unwrap();

    let changed = tokio::time::timeout(Duration::from_secs(5), watcher.changed())
        .await
        .unwrap();
    assert!(changed);

    let snapshot = watcher.current();
    assert_eq!(snapshot.bids.len(), 1);
    assert_eq!(snapshot.bids[0].lead_id, lead_id);
    assert!(snapshot.my_bids.is_empty());
    assert_eq!(snapshot.stats.highest_bid, Some(50_000));
    assert_eq!(snapshot.stats.my_bid_rank, None);

    drop(watcher);
    for _ in 0..100 {
        if h.backend.bid_subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.backend.bid_subscriber_count(), 0);
}
