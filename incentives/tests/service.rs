use std::{sync::Arc, thread};

use incentives::{IncentiveService, LedgerErr, RewardRequest, TokenLedger, TransferRequest};

fn reward_request() -> RewardRequest {
    RewardRequest {
        user_id: 1,
        previous_metric: 0.5,
        current_metric: 0.4,
        scaling_factor: Some(10.0),
    }
}

#[test]
fn test_repeated_rewards_accumulate() {
    let service = IncentiveService::default();

    let first = service.submit_reward(&reward_request());
    let second = service.submit_reward(&reward_request());

    assert!((first.reward - 1.0).abs() < 1e-9);
    assert_eq!(first.new_balance, 1.0);
    assert_eq!(second.new_balance, 2.0);
    assert_eq!(service.ledger_of(1).transactions.len(), 2);
}

#[test]
fn test_requests_deserialize_with_optional_fields() {
    let request: RewardRequest =
        serde_json::from_str(r#"{"user_id": 3, "previous_metric": 1.0, "current_metric": 0.5}"#)
            .unwrap();
    assert_eq!(request.scaling_factor, None);

    let transfer: TransferRequest =
        serde_json::from_str(r#"{"sender_id": 1, "receiver_id": 2, "amount": 1.5}"#).unwrap();
    assert_eq!(transfer.description, "");
}

#[test]
fn test_ledger_response_serializes_utc_timestamps() {
    let service = IncentiveService::default();
    service.submit_reward(&reward_request());

    let json = serde_json::to_value(service.ledger_of(1)).unwrap();
    let timestamp = json["transactions"][0]["timestamp"].as_str().unwrap();

    assert!(timestamp.ends_with('Z'));
    assert_eq!(json["balance"], 1.0);
}

#[test]
fn test_transfer_through_service() {
    let service = IncentiveService::default();
    service.submit_reward(&reward_request());

    let request = TransferRequest {
        sender_id: 1,
        receiver_id: 2,
        amount: 0.25,
        description: "thanks".to_string(),
    };
    let sender = service.transfer(&request).unwrap();

    assert_eq!(sender.balance, 0.75);
    assert_eq!(service.ledger_of(2).balance, 0.25);

    let too_much = TransferRequest {
        amount: 5.0,
        ..request
    };
    let err = service.transfer(&too_much).unwrap_err();
    assert!(matches!(err, LedgerErr::InsufficientFunds { user_id: 1, .. }));
    assert_eq!(service.ledger_of(1).balance, 0.75);
}

#[test]
fn test_invalid_amounts_through_service_change_nothing() {
    let service = IncentiveService::default();
    service.submit_reward(&reward_request());
    let before = service.ledger_of(1).balance;

    let negative: TransferRequest =
        serde_json::from_str(r#"{"sender_id": 1, "receiver_id": 2, "amount": -5.0}"#).unwrap();
    let err = service.transfer(&negative).unwrap_err();
    assert!(matches!(err, LedgerErr::InvalidAmount { .. }));

    for amount in [0.0, f64::NAN] {
        let request = TransferRequest {
            amount,
            ..negative.clone()
        };
        let err = service.transfer(&request).unwrap_err();
        assert!(matches!(err, LedgerErr::InvalidAmount { .. }));
    }

    assert_eq!(service.ledger_of(1).balance, before);
    assert_eq!(service.ledger_of(1).transactions.len(), 1);
    assert!(service.ledger_of(2).transactions.is_empty());
}

#[test]
fn test_concurrent_transfers_never_overdraw() {
    const THREADS: usize = 8;
    const ATTEMPTS: usize = 50;

    let ledger = Arc::new(TokenLedger::new());
    ledger.record_transaction(1, 100.0, "seed");

    thread::scope(|s| {
        for t in 0..THREADS {
            let ledger = Arc::clone(&ledger);
            s.spawn(move || {
                for _ in 0..ATTEMPTS {
                    let _ = ledger.transfer_tokens(1, 2 + t as u64, 1.0, "drain");
                }
            });
        }
    });

    let sender = ledger.get_balance(1);
    let received: f64 = (0..THREADS).map(|t| ledger.get_balance(2 + t as u64)).sum();

    assert_eq!(sender, 0.0);
    assert_eq!(received, 100.0);
    assert_eq!(ledger.transactions(1).len(), 101);
}
