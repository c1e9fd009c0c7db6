//! # Pair Factory
//!
//! Registry of pairs keyed by their sorted token pair. Every pair is created
//! with the factory's [`PairParams`] and admin.

use std::collections::BTreeMap;

use tracing::info;

use crate::engine::PairParams;
use crate::errors::{TwammError, TwammResult};
use crate::pair::TwammPair;
use crate::types::AccountId;

#[derive(Debug, Clone)]
pub struct PairFactory {
    admin: AccountId,
    params: PairParams,
    pairs: BTreeMap<(String, String), TwammPair>,
}

fn sort_tokens<'a>(token_a: &'a str, token_b: &'a str) -> TwammResult<(&'a str, &'a str)> {
    if token_a == token_b {
        return Err(TwammError::IdenticalTokens);
    }
    Ok(if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    })
}

impl PairFactory {
    pub fn new(admin: AccountId, params: PairParams) -> TwammResult<Self> {
        params.validate()?;
        Ok(Self {
            admin,
            params,
            pairs: BTreeMap::new(),
        })
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn params(&self) -> PairParams {
        self.params
    }

    /// Create the pair for two tokens in either order.
    /// The lexicographically smaller token becomes token0.
    pub fn create_pair(&mut self, token_a: &str, token_b: &str, created_at: u64) -> TwammResult<&mut TwammPair> {
        let (token0, token1) = sort_tokens(token_a, token_b)?;
        let key = (token0.to_string(), token1.to_string());
        if self.pairs.contains_key(&key) {
            return Err(TwammError::PairExists);
        }
        let pair = TwammPair::new(token0, token1, self.params, self.admin.clone(), created_at)?;
        info!(token0, token1, created_at, "pair created");
        Ok(self.pairs.entry(key).or_insert(pair))
    }

    pub fn get_pair(&self, token_a: &str, token_b: &str) -> TwammResult<&TwammPair> {
        let (token0, token1) = sort_tokens(token_a, token_b)?;
        self.pairs
            .get(&(token0.to_string(), token1.to_string()))
            .ok_or(TwammError::PairNotFound)
    }

    pub fn get_pair_mut(&mut self, token_a: &str, token_b: &str) -> TwammResult<&mut TwammPair> {
        let (token0, token1) = sort_tokens(token_a, token_b)?;
        self.pairs
            .get_mut(&(token0.to_string(), token1.to_string()))
            .ok_or(TwammError::PairNotFound)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &TwammPair> {
        self.pairs.values()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}
