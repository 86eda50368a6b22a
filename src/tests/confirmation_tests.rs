//! Confirmation polling: hash stability, expiry and ledger failures

use super::{fast_confirm, one_token_transfer};
use crate::ledger::{Ledger, LedgerError};
use crate::pipeline::{
    attach_freshness, broadcast_and_confirm, build_token_transfer, confirm_with_strategy,
    request_signature, ConfirmOptions, ConfirmationStrategy, PipelineError, SignedTransaction,
    TokenProgram,
};
use crate::test_utils::{MockLedger, MockSigner, MOCK_START_HEIGHT};
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};

async fn signed_transfer(ledger: &MockLedger, signer: &MockSigner) -> SignedTransaction {
    let owner = signer.pubkey();
    let tx = build_token_transfer(&one_token_transfer(&owner), TokenProgram::Token2022).unwrap();
    let tx = attach_freshness(ledger, tx, &owner).await.unwrap();
    request_signature(signer, &tx, &owner).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_hash_independent_of_poll_count() {
    for polls in [1, 2, 5, 20] {
        let ledger = MockLedger::new().with_confirm_after(polls);
        let signer = MockSigner::new();
        let signed = signed_transfer(&ledger, &signer).await;

        let hash = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
            .await
            .unwrap();

        assert_eq!(hash, signed.signature(), "poll count {}", polls);
        assert_eq!(ledger.status_polls().await, polls as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn test_expires_past_height_ceiling() {
    let ledger = MockLedger::new().never_confirming().with_validity_window(5);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;
    assert_eq!(signed.last_valid_block_height(), MOCK_START_HEIGHT + 5);

    let err = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap_err();

    match err {
        PipelineError::TransactionExpired {
            signature,
            block_height,
            last_valid_block_height,
        } => {
            assert_eq!(signature, signed.signature().to_string());
            assert_eq!(last_valid_block_height, MOCK_START_HEIGHT + 5);
            assert!(block_height > last_valid_block_height);
        }
        other => panic!("expected expiry, got {:?}", other),
    }
    assert!(polled_until_ceiling(&ledger).await);
}

async fn polled_until_ceiling(ledger: &MockLedger) -> bool {
    // One send, then one status poll per block until the ceiling was passed
    ledger.send_count().await == 1 && ledger.status_polls().await == 6
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_at_the_ceiling_still_counts() {
    // Confirmation arrives on the poll where height first exceeds the ceiling
    let ledger = MockLedger::new().with_validity_window(3).with_confirm_after(4);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;

    let hash = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap();
    assert_eq!(hash, signed.signature());
}

#[tokio::test(start_paused = true)]
async fn test_onchain_failure_reported() {
    let ledger = MockLedger::new().with_onchain_error("custom program error: 0x1");
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;

    let err = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap_err();
    match err {
        PipelineError::TransactionFailed { reason, .. } => {
            assert!(reason.contains("0x1"));
        }
        other => panic!("expected on-chain failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_tolerated() {
    // max_poll_errors is 2 in fast_confirm
    let ledger = MockLedger::new().with_failing_polls(2);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;

    let hash = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap();
    assert_eq!(hash, signed.signature());
}

#[tokio::test(start_paused = true)]
async fn test_persistent_poll_failures_give_up() {
    let ledger = MockLedger::new().with_failing_polls(10);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;

    let err = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::LedgerUnavailable(_)));
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_signature_expires() {
    let ledger = MockLedger::new().with_validity_window(2);
    let latest = ledger.latest_blockhash().await.unwrap();
    let strategy = ConfirmationStrategy {
        blockhash: latest.blockhash,
        last_valid_block_height: latest.last_valid_block_height,
        signature: Signature::from([3u8; 64]),
    };

    let err = confirm_with_strategy(&ledger, &strategy, &fast_confirm())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_landed_transaction_outlives_ceiling_while_finalizing() {
    // Confirmed on the first poll, finalized only after the ceiling has passed
    let ledger = MockLedger::new()
        .with_validity_window(3)
        .with_finalize_after(6);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;
    let options = ConfirmOptions {
        commitment: CommitmentConfig::finalized(),
        ..fast_confirm()
    };

    let hash = broadcast_and_confirm(&ledger, &signed, &options)
        .await
        .unwrap();

    assert_eq!(hash, signed.signature());
    assert_eq!(ledger.send_count().await, 1);
    assert_eq!(ledger.status_polls().await, 6);
}

#[tokio::test(start_paused = true)]
async fn test_unlanded_transaction_still_expires_under_finalized() {
    let ledger = MockLedger::new().never_confirming().with_validity_window(3);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;
    let options = ConfirmOptions {
        commitment: CommitmentConfig::finalized(),
        ..fast_confirm()
    };

    let err = broadcast_and_confirm(&ledger, &signed, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::TransactionExpired { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_poll_error_fails_fast() {
    let ledger = MockLedger::new().with_poll_errors(
        1,
        LedgerError::InvalidResponse("unexpected status payload".to_string()),
    );
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;

    let err = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap_err();

    match err {
        PipelineError::LedgerUnavailable(message) => {
            assert!(message.contains("unexpected status payload"));
        }
        other => panic!("expected ledger failure, got {:?}", other),
    }
    assert_eq!(ledger.status_polls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_polls_are_retried() {
    let ledger = MockLedger::new().with_poll_errors(2, LedgerError::RateLimited);
    let signer = MockSigner::new();
    let signed = signed_transfer(&ledger, &signer).await;

    let hash = broadcast_and_confirm(&ledger, &signed, &fast_confirm())
        .await
        .unwrap();
    assert_eq!(hash, signed.signature());
    assert_eq!(ledger.status_polls().await, 3);
}
