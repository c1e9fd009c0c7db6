//! # Reserve Manager
//!
//! Owns the instant-swap reserves, the embedded (long-term order) reserves and
//! the pair fee. Both reserve sets are backed by the same token balances but
//! are accounted separately; their per-token sum is capped at [`MAX_RESERVE`].

use tracing::debug;

use crate::constants::MAX_RESERVE;
use crate::errors::{TwammError, TwammResult};
use crate::math::{
    amount_after_fee, get_amount_out, safe_add_u128, safe_sub_u128, validate_fee, VirtualTrade,
};
use crate::types::{Direction, SwapResult, TwammReserves};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveManager {
    reserve: [u128; 2],
    twamm_reserve: [u128; 2],
    fee_bps: u32,
}

impl ReserveManager {
    pub fn new(fee_bps: u32) -> TwammResult<Self> {
        validate_fee(fee_bps)?;
        Ok(Self {
            reserve: [0, 0],
            twamm_reserve: [0, 0],
            fee_bps,
        })
    }

    pub fn reserves(&self) -> (u128, u128) {
        (self.reserve[0], self.reserve[1])
    }

    pub fn twamm_reserves(&self) -> (u128, u128) {
        (self.twamm_reserve[0], self.twamm_reserve[1])
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    pub fn view(&self, last_virtual_order_timestamp: u64) -> TwammReserves {
        TwammReserves {
            reserve0: self.reserve[0],
            reserve1: self.reserve[1],
            last_virtual_order_timestamp,
            twamm_reserve0: self.twamm_reserve[0],
            twamm_reserve1: self.twamm_reserve[1],
            fee_bps: self.fee_bps,
        }
    }

    /// Price an instant swap against the current reserves
    pub fn quote(&self, direction: Direction, amount_in: u128) -> TwammResult<SwapResult> {
        let (reserve_in, reserve_out) = self.oriented(direction);
        let amount_out = get_amount_out(amount_in, reserve_in, reserve_out, self.fee_bps)?;
        let fee_amount = amount_in - amount_after_fee(amount_in, self.fee_bps)?;
        Ok(SwapResult {
            amount_in,
            amount_out,
            fee_amount,
        })
    }

    /// Execute an instant swap; the full input, fee included, joins the reserve
    pub(crate) fn instant_swap(&mut self, direction: Direction, amount_in: u128) -> TwammResult<SwapResult> {
        let result = self.quote(direction, amount_in)?;
        let (i, o) = (direction.token_in_index(), direction.token_out_index());
        self.reserve[i] = safe_add_u128(self.reserve[i], amount_in)?;
        self.reserve[o] = safe_sub_u128(self.reserve[o], result.amount_out)?;
        self.check_caps()?;
        Ok(result)
    }

    /// Move principal of a new long-term order into the embedded reserve
    pub(crate) fn deposit_twamm(&mut self, token: usize, amount: u128) -> TwammResult<()> {
        self.twamm_reserve[token] = safe_add_u128(self.twamm_reserve[token], amount)?;
        self.check_caps()
    }

    /// Pay refunds or proceeds out of the embedded reserve
    pub(crate) fn release_twamm(&mut self, token: usize, amount: u128) -> TwammResult<()> {
        self.twamm_reserve[token] = safe_sub_u128(self.twamm_reserve[token], amount)?;
        Ok(())
    }

    /// Apply one engine step: sold principal leaves the embedded reserve,
    /// purchased output enters it, and the instant reserves take the trade.
    pub(crate) fn settle_step(&mut self, sold: [u128; 2], trade: &VirtualTrade) -> TwammResult<()> {
        let purchased = [trade.amount_out0, trade.amount_out1];
        for token in 0..2 {
            let remaining = safe_sub_u128(self.twamm_reserve[token], sold[token])?;
            self.twamm_reserve[token] = safe_add_u128(remaining, purchased[token])?;
        }
        self.reserve = [trade.reserve0, trade.reserve1];
        debug!(
            reserve0 = self.reserve[0],
            reserve1 = self.reserve[1],
            twamm_reserve0 = self.twamm_reserve[0],
            twamm_reserve1 = self.twamm_reserve[1],
            "settled virtual order step"
        );
        self.check_caps()
    }

    pub(crate) fn add_liquidity(&mut self, amount0: u128, amount1: u128) -> TwammResult<()> {
        self.reserve[0] = safe_add_u128(self.reserve[0], amount0)?;
        self.reserve[1] = safe_add_u128(self.reserve[1], amount1)?;
        self.check_caps()
    }

    pub(crate) fn remove_liquidity(&mut self, amount0: u128, amount1: u128) -> TwammResult<()> {
        self.reserve[0] = safe_sub_u128(self.reserve[0], amount0)?;
        self.reserve[1] = safe_sub_u128(self.reserve[1], amount1)?;
        Ok(())
    }

    fn oriented(&self, direction: Direction) -> (u128, u128) {
        (
            self.reserve[direction.token_in_index()],
            self.reserve[direction.token_out_index()],
        )
    }

    fn check_caps(&self) -> TwammResult<()> {
        for token in 0..2 {
            let total = self.reserve[token]
                .checked_add(self.twamm_reserve[token])
                .ok_or(TwammError::ReserveOverflow)?;
            if total > MAX_RESERVE {
                return Err(TwammError::ReserveOverflow);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ReserveManager {
        let mut reserves = ReserveManager::new(30).unwrap();
        reserves.add_liquidity(1_000_000, 2_000_000).unwrap();
        reserves
    }

    #[test]
    fn test_instant_swap_updates_reserves() {
        let mut reserves = seeded();
        let result = reserves.instant_swap(Direction::ZeroForOne, 10_000).unwrap();
        assert_eq!(result.fee_amount, 30);
        assert_eq!(reserves.reserves(), (1_010_000, 2_000_000 - result.amount_out));
        // k never decreases on a swap
        let (r0, r1) = reserves.reserves();
        assert!(r0 * r1 >= 1_000_000 * 2_000_000);
    }

    #[test]
    fn test_reserve_cap() {
        let mut reserves = ReserveManager::new(30).unwrap();
        reserves.add_liquidity(MAX_RESERVE - 10, 1).unwrap();
        assert_eq!(reserves.deposit_twamm(0, 11), Err(TwammError::ReserveOverflow));
        assert!(reserves.deposit_twamm(0, 10).is_ok());
    }

    #[test]
    fn test_settle_step_moves_embedded_balances() {
        let mut reserves = seeded();
        reserves.deposit_twamm(0, 500).unwrap();
        let trade = VirtualTrade {
            reserve0: 1_000_500,
            reserve1: 1_999_002,
            amount_out0: 0,
            amount_out1: 998,
        };
        reserves.settle_step([500, 0], &trade).unwrap();
        assert_eq!(reserves.twamm_reserves(), (0, 998));
        assert_eq!(reserves.reserves(), (1_000_500, 1_999_002));
        assert_eq!(reserves.release_twamm(1, 999), Err(TwammError::MathUnderflow));
    }

    #[test]
    fn test_invalid_fee_rejected() {
        assert_eq!(ReserveManager::new(10_000), Err(TwammError::InvalidFee(10_000)));
    }
}
