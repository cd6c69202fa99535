//! Withdrawal integration tests.
//!
//! Covers lock status at the CSV boundary, route selection, signing through
//! both custody branches and broadcast via the indexer.

mod common;

use bitcoin::Sequence;
use common::*;
use custody_orchestrator::{UnconfirmedPolicy, WithdrawalOrchestrator, WithdrawalRoute};
use custody_types::CustodyError;

fn orchestrator(ctx: &TestContext) -> WithdrawalOrchestrator {
    WithdrawalOrchestrator::new(ctx.indexer.clone())
}

#[tokio::test]
async fn test_lock_boundary_routes_withdrawal() {
    // 100,000 sats on the 10-block address
    let ctx = TestContext::new(100);
    ctx.deposit(1, 100_000, 10, None).await;
    let withdrawals = orchestrator(&ctx);
    let destination = destination_address();

    // Unconfirmed: locked
    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    assert!(utxos[0].locked);
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination, None)
        .unwrap();
    assert_eq!(plan.route, WithdrawalRoute::CoSigned);

    // Mined in block 100; tip 108 is 9 confirmations: still locked
    let ctx = TestContext::new(108);
    ctx.deposit(1, 100_000, 10, Some(100)).await;
    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    assert!(utxos[0].confirmed);
    assert!(utxos[0].locked);
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination, None)
        .unwrap();
    assert_eq!(plan.route, WithdrawalRoute::CoSigned);

    // Tip 109 is 10 confirmations: unlocked, self path
    ctx.indexer.set_tip(109).await;
    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    assert!(!utxos[0].locked);
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination, None)
        .unwrap();
    assert_eq!(plan.route, WithdrawalRoute::SelfSigned);
    assert_eq!(plan.total_input_sats, 100_000);
}

#[tokio::test]
async fn test_self_signed_withdrawal_uses_unilateral_branch() {
    let ctx = TestContext::new(109);
    ctx.deposit(1, 100_000, 10, Some(100)).await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), None)
        .unwrap();
    let receipt = withdrawals
        .execute(&plan, &ctx.depositor_signer(), None)
        .await
        .unwrap();

    assert_eq!(receipt.route, WithdrawalRoute::SelfSigned);
    assert_eq!(receipt.amount + receipt.fee, 100_000);
    assert!(receipt.fee >= 300);

    let broadcasts = ctx.indexer.broadcasts().await;
    assert_eq!(broadcasts.len(), 1);
    let tx = &broadcasts[0];
    assert_eq!(tx.compute_txid().to_string(), receipt.txid);
    assert_eq!(tx.input[0].sequence, Sequence::from_height(10));
    // depositor sig, leaf script, control block
    assert_eq!(tx.input[0].witness.len(), 3);
    assert_eq!(tx.output[0].script_pubkey, destination_address().script_pubkey());
}

#[tokio::test]
async fn test_co_signed_withdrawal_uses_cooperative_branch() {
    let ctx = TestContext::new(100);
    ctx.deposit(1, 40_000, 100, Some(95)).await;
    ctx.deposit(2, 25_000, 1, None).await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), None)
        .unwrap();
    assert_eq!(plan.route, WithdrawalRoute::CoSigned);
    assert_eq!(plan.inputs.len(), 2);

    let operator = ctx.operator_signer();
    let receipt = withdrawals
        .execute(&plan, &ctx.depositor_signer(), Some(&operator))
        .await
        .unwrap();
    assert_eq!(receipt.inputs, 2);
    assert_eq!(receipt.amount + receipt.fee, 65_000);

    let tx = &ctx.indexer.broadcasts().await[0];
    for input in &tx.input {
        assert_eq!(input.sequence, Sequence::ENABLE_RBF_NO_LOCKTIME);
        // depositor sig, operator sig, leaf script, control block
        assert_eq!(input.witness.len(), 4);
    }
}

#[tokio::test]
async fn test_co_signed_plan_needs_operator() {
    let ctx = TestContext::new(100);
    ctx.deposit(1, 50_000, 10, None).await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), None)
        .unwrap();
    let err = withdrawals
        .execute(&plan, &ctx.depositor_signer(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Configuration(_)));

    let err = withdrawals
        .execute_self(&plan, &ctx.depositor_signer())
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::RefusedByPolicy { .. }));
    assert!(ctx.indexer.broadcasts().await.is_empty());
}

#[tokio::test]
async fn test_dust_only_account_has_nothing_to_withdraw() {
    let ctx = TestContext::new(200);
    ctx.deposit(1, 900, 1, Some(150)).await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let err = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), None)
        .unwrap_err();
    assert_eq!(err, CustodyError::NoUtxoAvailable { dust_floor: 1_000 });
}

#[tokio::test]
async fn test_unconfirmed_policy_refuses_input() {
    let ctx = TestContext::new(200);
    ctx.deposit(1, 30_000, 10, None).await;
    let withdrawals = orchestrator(&ctx).with_policy(UnconfirmedPolicy::RejectAll);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let err = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), None)
        .unwrap_err();
    assert!(matches!(err, CustodyError::RefusedByPolicy { .. }));
}

#[tokio::test]
async fn test_selection_stops_at_amount() {
    let ctx = TestContext::new(300);
    ctx.deposit(1, 60_000, 1, Some(200)).await;
    ctx.deposit(2, 60_000, 1, Some(210)).await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), Some(50_000))
        .unwrap();
    assert_eq!(plan.inputs.len(), 1);
    // Newest block first
    assert_eq!(plan.inputs[0].utxo.block_height, Some(210));

    let err = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), Some(500_000))
        .unwrap_err();
    assert!(matches!(
        err,
        CustodyError::InsufficientFunds {
            available: 120_000,
            ..
        }
    ));
}

#[tokio::test]
async fn test_zero_amount_is_rejected() {
    let ctx = TestContext::new(300);
    ctx.deposit(1, 60_000, 1, Some(200)).await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let err = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), Some(0))
        .unwrap_err();
    assert!(matches!(err, CustodyError::InvalidTransaction(_)));
}

#[tokio::test]
async fn test_broadcast_rejection_is_surfaced() {
    let ctx = TestContext::new(109);
    ctx.deposit(1, 100_000, 10, Some(100)).await;
    ctx.indexer
        .reject_broadcasts("non-BIP68-final, timelock not passed")
        .await;
    let withdrawals = orchestrator(&ctx);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    let plan = withdrawals
        .plan_withdrawal(&ctx.account, &utxos, &destination_address(), None)
        .unwrap();
    let err = withdrawals
        .execute(&plan, &ctx.depositor_signer(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::InvalidTransaction(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_protocol_balance_spans_all_locks() {
    let ctx = TestContext::new(300);
    ctx.deposit(1, 10_000, 1, Some(250)).await;
    ctx.deposit(2, 20_000, 10, Some(260)).await;
    ctx.deposit(3, 5_000, 100, None).await;

    let balance = ctx.account.balance(ctx.indexer.as_ref()).await.unwrap();
    assert_eq!(balance.confirmed, 30_000);
    assert_eq!(balance.unconfirmed, 5_000);
    assert_eq!(balance.total, 35_000);

    let utxos = ctx.account.scan(ctx.indexer.as_ref()).await.unwrap();
    assert_eq!(utxos.len(), 3);
    // Unconfirmed first
    assert!(!utxos[0].confirmed);
    assert_eq!(utxos[0].lock_blocks, 100);
}
