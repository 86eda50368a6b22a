//! Wallet queries and devnet funding

use crate::ledger::{Cluster, Ledger, LedgerError, LedgerResult, TokenBalance};
use crate::pipeline::{
    confirm_with_strategy, ConfirmOptions, ConfirmationStrategy, PipelineError, PipelineResult,
    TokenAmount, TransactionHash,
};
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tracing::{debug, info};

/// Decimal places of the native token
pub const SOL_DECIMALS: u8 = 9;

/// Default devnet airdrop: one SOL
pub const DEFAULT_AIRDROP_LAMPORTS: u64 = LAMPORTS_PER_SOL;

/// Native balance in lamports
pub async fn balance(ledger: &dyn Ledger, address: &Pubkey) -> LedgerResult<u64> {
    let lamports = ledger.balance(address).await?;
    debug!(address = %address, lamports, "Fetched balance");
    Ok(lamports)
}

/// Balance of an SPL token account
pub async fn token_balance(ledger: &dyn Ledger, token_account: &Pubkey) -> LedgerResult<TokenBalance> {
    let balance = ledger.token_account_balance(token_account).await?;
    debug!(
        token_account = %token_account,
        amount = balance.amount,
        decimals = balance.decimals,
        "Fetched token balance"
    );
    Ok(balance)
}

/// Human-readable SOL amount, e.g. `1.5`
pub fn format_sol(lamports: u64) -> String {
    match TokenAmount::from_base_units(lamports, SOL_DECIMALS) {
        Ok(amount) => amount.to_string(),
        Err(_) => lamports.to_string(),
    }
}

/// Request a faucet airdrop to `address` and wait for it to confirm
///
/// Refused on mainnet, which has no faucet.
pub async fn drop_tokens(
    ledger: &dyn Ledger,
    cluster: Cluster,
    address: &Pubkey,
    lamports: u64,
    options: &ConfirmOptions,
) -> PipelineResult<TransactionHash> {
    if !cluster.supports_airdrop() {
        return Err(PipelineError::construction(format!(
            "airdrops are not available on {}",
            cluster
        )));
    }
    if lamports == 0 {
        return Err(PipelineError::invalid_amount("airdrop amount must be positive"));
    }

    let signature = ledger
        .request_airdrop(address, lamports)
        .await
        .map_err(airdrop_request_error)?;
    let latest = ledger.latest_blockhash().await?;

    let strategy = ConfirmationStrategy {
        blockhash: latest.blockhash,
        last_valid_block_height: latest.last_valid_block_height,
        signature,
    };
    let hash = confirm_with_strategy(ledger, &strategy, options).await?;

    info!(
        address = %address,
        sol = %format_sol(lamports),
        signature = %hash,
        explorer = %cluster.tx_url(&hash.to_string()),
        "Airdrop confirmed"
    );
    Ok(hash)
}

/// Faucet request failures are never blockhash expiries
fn airdrop_request_error(err: LedgerError) -> PipelineError {
    if err.is_transient() {
        PipelineError::LedgerUnavailable(format!("airdrop request failed: {}", err))
    } else {
        PipelineError::BroadcastRejected(format!("airdrop request refused: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sol() {
        assert_eq!(format_sol(LAMPORTS_PER_SOL), "1");
        assert_eq!(format_sol(1_500_000_000), "1.5");
        assert_eq!(format_sol(1), "0.000000001");
        assert_eq!(format_sol(0), "0");
    }

    #[test]
    fn test_airdrop_request_error_mapping() {
        let refused = airdrop_request_error(LedgerError::BlockhashNotFound);
        assert!(matches!(refused, PipelineError::BroadcastRejected(_)));
        assert!(!refused.is_retryable());

        let unavailable = airdrop_request_error(LedgerError::RateLimited);
        assert!(matches!(unavailable, PipelineError::LedgerUnavailable(_)));
    }
}
