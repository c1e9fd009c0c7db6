//! # Pause and Recovery Controller
//!
//! Pausing blocks new long-term orders only. Instant swaps, cancellation and
//! withdrawal stay available while paused, and the last two need only a
//! catch-up bounded by the order's own expiration. Together these let a pair
//! with an unprocessable backlog be drained order by order.

use tracing::info;

use crate::errors::{TwammError, TwammResult};
use crate::types::AccountId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseController {
    admin: AccountId,
    new_swaps_paused: bool,
}

impl PauseController {
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            new_swaps_paused: false,
        }
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn new_swaps_paused(&self) -> bool {
        self.new_swaps_paused
    }

    /// Flip the pause flag; only the admin may do so
    pub fn toggle(&mut self, caller: &AccountId) -> TwammResult<bool> {
        if caller != &self.admin {
            return Err(TwammError::Unauthorized);
        }
        self.new_swaps_paused = !self.new_swaps_paused;
        info!(paused = self.new_swaps_paused, admin = %self.admin, "new long-term swaps toggled");
        Ok(self.new_swaps_paused)
    }

    pub fn ensure_new_swaps_allowed(&self) -> TwammResult<()> {
        if self.new_swaps_paused {
            return Err(TwammError::SwapsPaused);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admin_toggles() {
        let admin = AccountId::from("admin");
        let mut pause = PauseController::new(admin.clone());
        assert!(pause.ensure_new_swaps_allowed().is_ok());

        assert_eq!(pause.toggle(&AccountId::from("mallory")), Err(TwammError::Unauthorized));
        assert!(!pause.new_swaps_paused());

        assert_eq!(pause.toggle(&admin), Ok(true));
        assert_eq!(pause.ensure_new_swaps_allowed(), Err(TwammError::SwapsPaused));
        assert_eq!(pause.toggle(&admin), Ok(false));
    }
}
