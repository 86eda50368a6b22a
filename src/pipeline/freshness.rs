use super::errors::PipelineResult;
use super::instructions::UnsignedTransaction;
use crate::ledger::Ledger;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// Fetch the latest blockhash and stamp it, its height ceiling and the fee
/// payer onto `tx`
///
/// Call this immediately before `request_signature`: the blockhash starts
/// ageing the moment it is fetched. Calling it again replaces the previous
/// freshness fields; instructions are left as they are.
pub async fn attach_freshness(
    ledger: &dyn Ledger,
    mut tx: UnsignedTransaction,
    payer: &Pubkey,
) -> PipelineResult<UnsignedTransaction> {
    let latest = ledger.latest_blockhash().await?;
    debug!(
        blockhash = %latest.blockhash,
        last_valid_block_height = latest.last_valid_block_height,
        fee_payer = %payer,
        "Attached freshness"
    );
    tx.set_freshness(latest.blockhash, latest.last_valid_block_height, *payer);
    Ok(tx)
}
