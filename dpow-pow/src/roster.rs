//! Notary roster lookups used by the difficulty override.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use dpow_types::constants::NOTARY_ELIGIBILITY_LOOKBACK;
use dpow_types::primitives::{Height, PubKey33};

use crate::error::RosterError;

/// Standing of a block producer key at one height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterStatus {
    /// Position in the roster, `None` for non-members.
    pub notary_id: Option<usize>,
    /// The height's rotation slot belongs to this notary.
    pub rotation_selected: bool,
    /// The notary has not produced any recent block.
    pub broadly_eligible: bool,
}

/// Source of notary membership and recent production history.
pub trait NotaryRoster: Send + Sync {
    fn status(&self, height: Height, pubkey: &PubKey33) -> Result<RosterStatus, RosterError>;
}

#[derive(Default)]
struct RosterState {
    /// Roster eras keyed by first height.
    eras: BTreeMap<Height, Vec<PubKey33>>,
    /// Notary id that produced each recorded height.
    miners: BTreeMap<Height, usize>,
}

/// In-process roster with explicit eras and a miner history.
pub struct StaticRoster {
    state: RwLock<RosterState>,
    lookback: u32,
}

impl StaticRoster {
    pub fn new(notaries: Vec<PubKey33>) -> Self {
        let mut state = RosterState::default();
        state.eras.insert(0, notaries);
        Self {
            state: RwLock::new(state),
            lookback: NOTARY_ELIGIBILITY_LOOKBACK,
        }
    }

    pub fn with_lookback(mut self, lookback: u32) -> Self {
        self.lookback = lookback;
        self
    }

    /// Replace the roster from `from_height` onward.
    pub fn set_notaries(&self, from_height: Height, notaries: Vec<PubKey33>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.eras.insert(from_height, notaries);
    }

    /// Record that notary `notary_id` produced the block at `height`.
    pub fn record_miner(&self, height: Height, notary_id: usize) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.miners.insert(height, notary_id);
    }

    /// Forget history below `height`.
    pub fn prune_below(&self, height: Height) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.miners = state.miners.split_off(&height);
    }
}

impl NotaryRoster for StaticRoster {
    fn status(&self, height: Height, pubkey: &PubKey33) -> Result<RosterStatus, RosterError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let roster = state
            .eras
            .range(..=height)
            .next_back()
            .map(|(_, notaries)| notaries.as_slice())
            .unwrap_or(&[]);

        let window = height.saturating_sub(self.lookback)..height;
        if let Some((mined_at, id)) = state
            .miners
            .range(window.clone())
            .find(|(_, id)| **id >= roster.len())
        {
            return Err(RosterError::Inconsistent {
                height,
                reason: format!(
                    "notary {} recorded at height {} outside a roster of {}",
                    id,
                    mined_at,
                    roster.len()
                ),
            });
        }

        let Some(id) = roster.iter().position(|key| key == pubkey) else {
            return Ok(RosterStatus::default());
        };
        let rotation_selected = id == height as usize % roster.len();
        let broadly_eligible = !state.miners.range(window).any(|(_, miner)| *miner == id);
        Ok(RosterStatus {
            notary_id: Some(id),
            rotation_selected,
            broadly_eligible,
        })
    }
}
