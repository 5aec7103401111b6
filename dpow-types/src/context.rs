use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::deposit::DepositRecord;
use crate::error::DpowError;
use crate::primitives::{Amount, Height};

/// Which side of the peg the local chain plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainRole {
    /// The base chain: deposits are redeemed into base units here.
    Base,
    /// An asset chain issuing pegged units.
    Issuer,
}

/// Parameters of the notary difficulty override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryParams {
    pub activation_height: Height,
    pub tightening_height: Height,
    pub min_diff_bits: u32,
    pub eligibility_lookback: u32,
    pub deposit_warning_height: Height,
}

impl Default for NotaryParams {
    fn default() -> Self {
        Self {
            activation_height: NOTARY_ACTIVATION_HEIGHT,
            tightening_height: NOTARY_TIGHTENING_HEIGHT,
            min_diff_bits: MIN_DIFF_BITS,
            eligibility_lookback: NOTARY_ELIGIBILITY_LOOKBACK,
            deposit_warning_height: DEPOSIT_WARNING_HEIGHT,
        }
    }
}

/// Consensus parameters of the standard difficulty retarget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowParams {
    pub averaging_window: u32,
    pub target_spacing: i64,
    pub max_adjust_up: i64,
    pub max_adjust_down: i64,
    /// Absolute ceiling on any target, big-endian.
    pub pow_limit: [u8; 32],
}

impl PowParams {
    pub fn averaging_window_timespan(&self) -> i64 {
        self.averaging_window as i64 * self.target_spacing
    }

    pub fn min_actual_timespan(&self) -> i64 {
        (self.averaging_window_timespan() * (100 - self.max_adjust_up)) / 100
    }

    pub fn max_actual_timespan(&self) -> i64 {
        (self.averaging_window_timespan() * (100 + self.max_adjust_down)) / 100
    }
}

impl Default for PowParams {
    fn default() -> Self {
        Self {
            averaging_window: POW_AVERAGING_WINDOW,
            target_spacing: POW_TARGET_SPACING,
            max_adjust_up: POW_MAX_ADJUST_UP,
            max_adjust_down: POW_MAX_ADJUST_DOWN,
            pow_limit: POW_LIMIT,
        }
    }
}

/// Process-wide chain context, built once at startup and read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    role: ChainRole,
    /// Local chain symbol; empty on the base chain.
    symbol: String,
    short_flag: bool,
    pub notary: NotaryParams,
    pub pow: PowParams,
}

impl ChainContext {
    /// Build the context for a chain symbol. An empty symbol or the base
    /// chain's own symbol selects the base-chain role.
    ///
    /// An issuer symbol is carried in every proof tail, so it must be
    /// exactly [`MAX_SYMBOL_LEN`] characters.
    pub fn new(symbol: &str, short_flag: bool) -> Result<Self, DpowError> {
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol == BASE_CHAIN_SYMBOL {
            return Ok(Self::base());
        }
        if !symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DpowError::InvalidSymbol {
                symbol: symbol.to_string(),
                reason: "only ASCII letters and digits are allowed".to_string(),
            });
        }
        if symbol.len() != MAX_SYMBOL_LEN {
            return Err(DpowError::InvalidSymbol {
                symbol: symbol.to_string(),
                reason: format!("issuer symbols are exactly {} characters", MAX_SYMBOL_LEN),
            });
        }
        Ok(Self {
            role: ChainRole::Issuer,
            symbol: symbol.to_string(),
            short_flag,
            notary: NotaryParams::default(),
            pow: PowParams::default(),
        })
    }

    /// Context of the base chain.
    pub fn base() -> Self {
        Self {
            role: ChainRole::Base,
            symbol: String::new(),
            short_flag: false,
            notary: NotaryParams::default(),
            pow: PowParams::default(),
        }
    }

    pub fn with_notary_params(mut self, notary: NotaryParams) -> Self {
        self.notary = notary;
        self
    }

    pub fn with_pow_params(mut self, pow: PowParams) -> Self {
        self.pow = pow;
        self
    }

    pub fn role(&self) -> ChainRole {
        self.role
    }

    pub fn is_issuer(&self) -> bool {
        self.role == ChainRole::Issuer
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Symbol used in logs: the base chain shows its own ticker.
    pub fn display_symbol(&self) -> &str {
        match self.role {
            ChainRole::Base => BASE_CHAIN_SYMBOL,
            ChainRole::Issuer => &self.symbol,
        }
    }

    pub fn short_flag(&self) -> bool {
        self.short_flag
    }

    /// Direction marker of the proofs this chain's coinbase carries.
    pub fn expected_opcode(&self) -> u8 {
        match self.role {
            ChainRole::Base => OPCODE_REDEEM,
            ChainRole::Issuer => OPCODE_ISSUE,
        }
    }

    /// Symbol expected in the tail of this chain's proof batches.
    pub fn expected_tail_symbol(&self) -> &str {
        self.display_symbol()
    }

    /// The amount field that is authoritative for this chain's role.
    pub fn authoritative_amount(&self, record: &DepositRecord) -> Amount {
        amount_for_role(self.role, record)
    }
}

/// Select the role-appropriate amount of a record.
pub fn amount_for_role(role: ChainRole, record: &DepositRecord) -> Amount {
    match role {
        ChainRole::Issuer => record.pegged_amount,
        ChainRole::Base => record.primary_amount,
    }
}
