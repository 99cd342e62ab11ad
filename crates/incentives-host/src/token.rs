use async_trait::async_trait;
use incentives_types::{Address, ErrorKind, HasErrorKind, TokenAmount};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance for {account}: has {available}, needs {required}")]
    InsufficientBalance {
        account: Address,
        available: TokenAmount,
        required: TokenAmount,
    },

    #[error("Balance overflow for {0}")]
    Overflow(Address),
}

impl HasErrorKind for TokenError {
    fn kind(&self) -> ErrorKind {
        match self {
            TokenError::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            TokenError::Overflow(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// Fungible token the incentive components debit and credit.
///
/// `transfer` must be atomic: either both balances change or neither does.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn balance_of(&self, account: Address) -> TokenAmount;

    async fn transfer(&self, from: Address, to: Address, amount: TokenAmount) -> Result<()>;
}

/// In-memory token ledger
#[derive(Default)]
pub struct MemoryToken {
    balances: Arc<RwLock<HashMap<Address, TokenAmount>>>,
}

impl MemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued tokens to `account`
    pub async fn mint(&self, account: Address, amount: TokenAmount) -> Result<()> {
        let mut balances = self.balances.write().await;
        let current = balances.get(&account).copied().unwrap_or(TokenAmount::ZERO);
        let updated = current
            .checked_add(amount)
            .ok_or(TokenError::Overflow(account))?;
        balances.insert(account, updated);

        info!(
            account = %account.short(),
            amount = %amount,
            balance_after = %updated,
            "💰 Tokens minted"
        );
        Ok(())
    }

    /// Sum of all balances
    pub async fn total_supply(&self) -> TokenAmount {
        let balances = self.balances.read().await;
        balances
            .values()
            .fold(TokenAmount::ZERO, |acc, b| acc.saturating_add(*b))
    }
}

#[async_trait]
impl TokenLedger for MemoryToken {
    async fn balance_of(&self, account: Address) -> TokenAmount {
        let balances = self.balances.read().await;
        balances.get(&account).copied().unwrap_or(TokenAmount::ZERO)
    }

    async fn transfer(&self, from: Address, to: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let mut balances = self.balances.write().await;
        let from_balance = balances.get(&from).copied().unwrap_or(TokenAmount::ZERO);
        let from_after =
            from_balance
                .checked_sub(amount)
                .ok_or(TokenError::InsufficientBalance {
                    account: from,
                    available: from_balance,
                    required: amount,
                })?;

        if from == to {
            debug!(account = %from.short(), "Self transfer ignored");
            return Ok(());
        }

        let to_balance = balances.get(&to).copied().unwrap_or(TokenAmount::ZERO);
        let to_after = to_balance
            .checked_add(amount)
            .ok_or(TokenError::Overflow(to))?;

        balances.insert(from, from_after);
        balances.insert(to, to_after);

        info!(
            from = %from.short(),
            to = %to.short(),
            amount = %amount,
            "💸 Tokens transferred"
        );
        Ok(())
    }
}
