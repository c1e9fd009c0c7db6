//! # Liquidity Shares
//!
//! Pro-rata share ledger for instant-swap liquidity providers. The first
//! deposit permanently locks [`MINIMUM_LIQUIDITY`] shares so the reserves can
//! never be fully drained.

use std::collections::BTreeMap;

use ethnum::U256;

use crate::constants::MINIMUM_LIQUIDITY;
use crate::errors::{TwammError, TwammResult};
use crate::math::{mul_div_u128, safe_add_u128, safe_sub_u128, sqrt_u256, Rounding};
use crate::types::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiquidityLedger {
    total_supply: u128,
    balances: BTreeMap<AccountId, u128>,
}

/// Ledger values a call on one owner's shares can change
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LedgerCheckpoint {
    total_supply: u128,
    owner: AccountId,
    balance: Option<u128>,
}

impl LiquidityLedger {
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, owner: &AccountId) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    pub(crate) fn checkpoint(&self, owner: &AccountId) -> LedgerCheckpoint {
        LedgerCheckpoint {
            total_supply: self.total_supply,
            owner: owner.clone(),
            balance: self.balances.get(owner).copied(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: LedgerCheckpoint) {
        self.total_supply = checkpoint.total_supply;
        match checkpoint.balance {
            Some(balance) => self.balances.insert(checkpoint.owner, balance),
            None => self.balances.remove(&checkpoint.owner),
        };
    }

    /// Shares minted for depositing `amount0`/`amount1` into reserves that
    /// held `reserve0`/`reserve1` before the deposit.
    pub fn shares_for_deposit(
        &self,
        amount0: u128,
        amount1: u128,
        reserve0: u128,
        reserve1: u128,
    ) -> TwammResult<u128> {
        let shares = if self.total_supply == 0 {
            let product = U256::from(amount0) * U256::from(amount1);
            sqrt_u256(product).saturating_sub(MINIMUM_LIQUIDITY)
        } else {
            if reserve0 == 0 || reserve1 == 0 {
                return Err(TwammError::InsufficientLiquidity);
            }
            let by0 = mul_div_u128(amount0, self.total_supply, reserve0, Rounding::Down)?;
            let by1 = mul_div_u128(amount1, self.total_supply, reserve1, Rounding::Down)?;
            by0.min(by1)
        };
        if shares == 0 {
            return Err(TwammError::InsufficientLiquidityMinted);
        }
        Ok(shares)
    }

    pub(crate) fn mint(
        &mut self,
        owner: &AccountId,
        amount0: u128,
        amount1: u128,
        reserve0: u128,
        reserve1: u128,
    ) -> TwammResult<u128> {
        let shares = self.shares_for_deposit(amount0, amount1, reserve0, reserve1)?;
        if self.total_supply == 0 {
            self.total_supply = MINIMUM_LIQUIDITY;
        }
        self.total_supply = safe_add_u128(self.total_supply, shares)?;
        let balance = self.balances.entry(owner.clone()).or_insert(0);
        *balance = safe_add_u128(*balance, shares)?;
        Ok(shares)
    }

    /// Burn `shares` and return the token amounts they redeem
    pub(crate) fn burn(
        &mut self,
        owner: &AccountId,
        shares: u128,
        reserve0: u128,
        reserve1: u128,
    ) -> TwammResult<(u128, u128)> {
        let held = self.balance_of(owner);
        if shares == 0 || shares > held {
            return Err(TwammError::InsufficientShares {
                requested: shares,
                held,
            });
        }
        let amount0 = mul_div_u128(shares, reserve0, self.total_supply, Rounding::Down)?;
        let amount1 = mul_div_u128(shares, reserve1, self.total_supply, Rounding::Down)?;
        if amount0 == 0 || amount1 == 0 {
            return Err(TwammError::InsufficientLiquidityBurned);
        }

        self.total_supply = safe_sub_u128(self.total_supply, shares)?;
        let remaining = held - shares;
        if remaining == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(owner.clone(), remaining);
        }
        Ok((amount0, amount1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_deposit_locks_minimum() {
        let mut ledger = LiquidityLedger::default();
        let lp = AccountId::from("lp");
        let shares = ledger.mint(&lp, 1_000_000, 4_000_000, 0, 0).unwrap();
        assert_eq!(shares, 2_000_000 - MINIMUM_LIQUIDITY);
        assert_eq!(ledger.total_supply(), 2_000_000);
        assert_eq!(ledger.balance_of(&lp), shares);
    }

    #[test]
    fn test_proportional_mint_and_burn() {
        let mut ledger = LiquidityLedger::default();
        let a = AccountId::from("a");
        let b = AccountId::from("b");
        ledger.mint(&a, 1_000_000, 1_000_000, 0, 0).unwrap();
        let minted = ledger.mint(&b, 500_000, 900_000, 1_000_000, 1_000_000).unwrap();
        assert_eq!(minted, 500_000);

        let (out0, out1) = ledger.burn(&b, minted, 1_500_000, 1_900_000).unwrap();
        assert_eq!(out0, 500_000);
        assert_eq!(out1, 633_333);
        assert_eq!(ledger.balance_of(&b), 0);
    }

    #[test]
    fn test_restore_checkpoint_undoes_mint() {
        let mut ledger = LiquidityLedger::default();
        let a = AccountId::from("a");
        ledger.mint(&a, 1_000_000, 1_000_000, 0, 0).unwrap();
        let before = ledger.clone();

        let b = AccountId::from("b");
        let checkpoint = ledger.checkpoint(&b);
        ledger.mint(&b, 10_000, 10_000, 1_000_000, 1_000_000).unwrap();
        ledger.restore(checkpoint);
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_burn_errors() {
        let mut ledger = LiquidityLedger::default();
        let a = AccountId::from("a");
        assert!(matches!(
            ledger.burn(&a, 1, 10, 10),
            Err(TwammError::InsufficientShares { requested: 1, held: 0 })
        ));
        assert_eq!(
            ledger.mint(&a, 10, 10, 0, 0),
            Err(TwammError::InsufficientLiquidityMinted)
        );
    }
}
