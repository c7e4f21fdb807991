//! Process-wide lifecycle state and the admin controller
//!
//! Admin and validator identities change only through the admin operations
//! below. Counters change only through `record_admission`, which the engine
//! calls after an admission has been fully staged.

use super::error::{LedgerError, LedgerResult};
use super::types::{Identity, ObservationId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLifecycleState {
    next_observation_id: ObservationId,
    total_observations: u64,
    admin: Identity,
    paused: bool,
    authorized_validator: Identity,
}

impl LedgerLifecycleState {
    pub fn new(admin: Identity, authorized_validator: Identity) -> Self {
        Self {
            next_observation_id: 1,
            total_observations: 0,
            admin,
            paused: false,
            authorized_validator,
        }
    }

    pub fn next_observation_id(&self) -> ObservationId {
        self.next_observation_id
    }

    /// Highest id handed out so far (0 on an empty ledger)
    pub fn max_observation_id(&self) -> ObservationId {
        self.next_observation_id - 1
    }

    pub fn total_observations(&self) -> u64 {
        self.total_observations
    }

    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    pub fn authorized_validator(&self) -> &Identity {
        &self.authorized_validator
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_admin(&self, caller: &Identity) -> bool {
        &self.admin == caller
    }

    pub fn require_admin(&self, caller: &Identity) -> LedgerResult<()> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    /// Consume the id returned by `next_observation_id`
    pub(crate) fn record_admission(&mut self) -> ObservationId {
        let id = self.next_observation_id;
        self.next_observation_id += 1;
        self.total_observations += 1;
        id
    }

    pub fn pause(&mut self, caller: &Identity) -> LedgerResult<()> {
        self.require_admin(caller)?;
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Identity) -> LedgerResult<()> {
        self.require_admin(caller)?;
        self.paused = false;
        Ok(())
    }

    /// Hand admin rights to `new_admin`. Returns the previous admin.
    pub fn transfer_admin(&mut self, caller: &Identity, new_admin: Identity) -> LedgerResult<Identity> {
        self.require_admin(caller)?;
        Ok(std::mem::replace(&mut self.admin, new_admin))
    }

    /// Replace the identity allowed to admit observations. Returns the previous one.
    pub fn set_authorized_validator(
        &mut self,
        caller: &Identity,
        new_validator: Identity,
    ) -> LedgerResult<Identity> {
        self.require_admin(caller)?;
        Ok(std::mem::replace(&mut self.authorized_validator, new_validator))
    }
}
