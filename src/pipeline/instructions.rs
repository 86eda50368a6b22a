//! Instruction construction
//!
//! Pure builders: nothing here touches the network. Each builder returns an
//! `UnsignedTransaction` with exactly one instruction and no freshness fields;
//! the blockhash and fee payer are attached later by `attach_freshness`.

use super::amount::TokenAmount;
use super::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account,
};
use spl_token::instruction::TokenInstruction;
use std::fmt;
use std::str::FromStr;

/// Token-2022 program id
pub const TOKEN_2022_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// Token program that owns the mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenProgram {
    /// Original SPL Token program
    Legacy,
    #[default]
    Token2022,
}

impl TokenProgram {
    pub fn id(self) -> Pubkey {
        match self {
            TokenProgram::Legacy => spl_token::id(),
            TokenProgram::Token2022 => TOKEN_2022_PROGRAM_ID,
        }
    }

    /// Associated token account of `owner` for `mint` under this program
    pub fn associated_token_address(self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        get_associated_token_address_with_program_id(owner, mint, &self.id())
    }
}

impl fmt::Display for TokenProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenProgram::Legacy => f.write_str("legacy"),
            TokenProgram::Token2022 => f.write_str("token-2022"),
        }
    }
}

impl FromStr for TokenProgram {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" | "spl-token" => Ok(TokenProgram::Legacy),
            "token-2022" | "token2022" => Ok(TokenProgram::Token2022),
            other => Err(format!("unknown token program '{}'", other)),
        }
    }
}

/// Instructions plus the freshness fields attached right before signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    instructions: Vec<Instruction>,
    recent_blockhash: Option<Hash>,
    last_valid_block_height: Option<u64>,
    fee_payer: Option<Pubkey>,
}

impl UnsignedTransaction {
    pub fn new(instructions: Vec<Instruction>) -> PipelineResult<Self> {
        if instructions.is_empty() {
            return Err(PipelineError::construction(
                "transaction needs at least one instruction",
            ));
        }
        Ok(Self {
            instructions,
            recent_blockhash: None,
            last_valid_block_height: None,
            fee_payer: None,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn recent_blockhash(&self) -> Option<Hash> {
        self.recent_blockhash
    }

    pub fn last_valid_block_height(&self) -> Option<u64> {
        self.last_valid_block_height
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.fee_payer
    }

    /// Overwrite freshness; instructions are untouched
    pub(crate) fn set_freshness(
        &mut self,
        blockhash: Hash,
        last_valid_block_height: u64,
        fee_payer: Pubkey,
    ) {
        self.recent_blockhash = Some(blockhash);
        self.last_valid_block_height = Some(last_valid_block_height);
        self.fee_payer = Some(fee_payer);
    }
}

/// Parameters of a checked token transfer between two token accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub sender_account: Pubkey,
    pub mint: Pubkey,
    pub recipient_account: Pubkey,
    pub owner_authority: Pubkey,
    pub amount: TokenAmount,
}

impl TokenTransfer {
    /// Transfer between the associated token accounts of two wallets
    pub fn between_wallets(
        sender_wallet: &Pubkey,
        recipient_wallet: &Pubkey,
        mint: &Pubkey,
        amount: TokenAmount,
        program: TokenProgram,
    ) -> Self {
        Self {
            sender_account: program.associated_token_address(sender_wallet, mint),
            mint: *mint,
            recipient_account: program.associated_token_address(recipient_wallet, mint),
            owner_authority: *sender_wallet,
            amount,
        }
    }
}

/// Parse a base58 account address
pub fn parse_address(label: &str, address: &str) -> PipelineResult<Pubkey> {
    let pubkey = Pubkey::from_str(address.trim()).map_err(|e| {
        PipelineError::construction(format!("{} '{}' is not a valid address: {}", label, address, e))
    })?;
    ensure_not_default(label, &pubkey)?;
    Ok(pubkey)
}

fn ensure_not_default(label: &str, key: &Pubkey) -> PipelineResult<()> {
    if *key == Pubkey::default() {
        return Err(PipelineError::construction(format!(
            "{} must not be the all-zero key",
            label
        )));
    }
    Ok(())
}

/// Single-instruction transaction creating `owner`'s associated token account
///
/// `token_account` must be the address derived from `(owner, mint, program)`;
/// the associated token program rejects anything else on-chain, so it is
/// caught here instead.
pub fn build_token_account_creation(
    payer: &Pubkey,
    token_account: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    program: TokenProgram,
) -> PipelineResult<UnsignedTransaction> {
    ensure_not_default("payer", payer)?;
    ensure_not_default("owner", owner)?;
    ensure_not_default("mint", mint)?;

    let expected = program.associated_token_address(owner, mint);
    if *token_account != expected {
        return Err(PipelineError::construction(format!(
            "token account {} is not the associated account of owner {} for mint {} (expected {})",
            token_account, owner, mint, expected
        )));
    }

    let ix = create_associated_token_account(payer, owner, mint, &program.id());
    UnsignedTransaction::new(vec![ix])
}

/// Single-instruction `TransferChecked` transaction
pub fn build_token_transfer(
    transfer: &TokenTransfer,
    program: TokenProgram,
) -> PipelineResult<UnsignedTransaction> {
    ensure_not_default("sender account", &transfer.sender_account)?;
    ensure_not_default("mint", &transfer.mint)?;
    ensure_not_default("recipient account", &transfer.recipient_account)?;
    ensure_not_default("owner authority", &transfer.owner_authority)?;

    UnsignedTransaction::new(vec![transfer_checked_instruction(transfer, program)])
}

/// Both token programs share the `TransferChecked` layout, so the instruction
/// is assembled here for whichever program owns the mint.
fn transfer_checked_instruction(transfer: &TokenTransfer, program: TokenProgram) -> Instruction {
    let data = TokenInstruction::TransferChecked {
        amount: transfer.amount.base_units(),
        decimals: transfer.amount.decimals(),
    }
    .pack();

    Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::new(transfer.sender_account, false),
            AccountMeta::new_readonly(transfer.mint, false),
            AccountMeta::new(transfer.recipient_account, false),
            AccountMeta::new_readonly(transfer.owner_authority, true),
        ],
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transfer(program: TokenProgram) -> TokenTransfer {
        let sender = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        TokenTransfer::between_wallets(
            &sender,
            &recipient,
            &mint,
            TokenAmount::from_whole(1, 9).unwrap(),
            program,
        )
    }

    #[test]
    fn test_transfer_has_one_instruction_and_no_freshness() {
        let tx = build_token_transfer(&sample_transfer(TokenProgram::Token2022), TokenProgram::Token2022)
            .unwrap();
        assert_eq!(tx.instructions().len(), 1);
        assert!(tx.recent_blockhash().is_none());
        assert!(tx.fee_payer().is_none());
        assert!(tx.last_valid_block_height().is_none());
        assert_eq!(tx.instructions()[0].program_id, TOKEN_2022_PROGRAM_ID);
    }

    #[test]
    fn test_legacy_transfer_matches_spl_token_builder() {
        let transfer = sample_transfer(TokenProgram::Legacy);
        let tx = build_token_transfer(&transfer, TokenProgram::Legacy).unwrap();

        let expected = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &transfer.sender_account,
            &transfer.mint,
            &transfer.recipient_account,
            &transfer.owner_authority,
            &[],
            1_000_000_000,
            9,
        )
        .unwrap();
        assert_eq!(tx.instructions()[0], expected);
    }

    #[test]
    fn test_transfer_owner_is_only_signer() {
        let transfer = sample_transfer(TokenProgram::Token2022);
        let tx = build_token_transfer(&transfer, TokenProgram::Token2022).unwrap();
        let signers: Vec<_> = tx.instructions()[0]
            .accounts
            .iter()
            .filter(|m| m.is_signer)
            .map(|m| m.pubkey)
            .collect();
        assert_eq!(signers, vec![transfer.owner_authority]);
    }

    #[test]
    fn test_account_creation_checks_derived_address() {
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ata = TokenProgram::Token2022.associated_token_address(&owner, &mint);

        let tx = build_token_account_creation(&payer, &ata, &owner, &mint, TokenProgram::Token2022)
            .unwrap();
        assert_eq!(tx.instructions().len(), 1);
        assert_eq!(tx.instructions()[0].program_id, spl_associated_token_account::id());

        // The legacy-program ATA differs from the Token-2022 one
        let legacy_ata = TokenProgram::Legacy.associated_token_address(&owner, &mint);
        let err = build_token_account_creation(
            &payer,
            &legacy_ata,
            &owner,
            &mint,
            TokenProgram::Token2022,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Construction(_)));
    }

    #[test]
    fn test_default_keys_rejected() {
        let mut transfer = sample_transfer(TokenProgram::Legacy);
        transfer.mint = Pubkey::default();
        assert!(matches!(
            build_token_transfer(&transfer, TokenProgram::Legacy),
            Err(PipelineError::Construction(_))
        ));
    }

    #[test]
    fn test_parse_address() {
        let key = Pubkey::new_unique();
        assert_eq!(parse_address("owner", &key.to_string()).unwrap(), key);
        assert!(parse_address("owner", "not-a-key").is_err());
        assert!(parse_address("owner", &Pubkey::default().to_string()).is_err());
    }

    #[test]
    fn test_empty_transaction_rejected() {
        assert!(UnsignedTransaction::new(vec![]).is_err());
    }

    #[test]
    fn test_token_program_parse() {
        assert_eq!("token-2022".parse::<TokenProgram>(), Ok(TokenProgram::Token2022));
        assert_eq!("legacy".parse::<TokenProgram>(), Ok(TokenProgram::Legacy));
        assert!("token-2023".parse::<TokenProgram>().is_err());
    }
}
