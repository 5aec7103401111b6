use crate::primitives::Height;
use std::time::Duration;

// ─── Proof Markers ───────────────────────────────────────────────────────────

/// Leading byte of every data-carrier (OP_RETURN) script.
pub const OP_RETURN: u8 = 0x6a;

/// Direction marker for proofs that issue pegged units on an asset chain.
pub const OPCODE_ISSUE: u8 = b'I';

/// Direction marker for proofs that redeem back into base-chain units.
pub const OPCODE_REDEEM: u8 = b'X';

/// Marker for a single direct deposit attestation.
pub const OPCODE_DIRECT_DEPOSIT: u8 = b'D';

/// Marker byte flagging the short-form variant of a proof.
pub const SHORT_MARKER: u8 = b'-';

/// Symbol of the base chain, used as the tail of redemption proofs.
pub const BASE_CHAIN_SYMBOL: &str = "KMD";

/// Maximum length of an origin chain symbol carried in a proof.
pub const MAX_SYMBOL_LEN: usize = 3;

/// Maximum number of deposits in one issuance/redemption batch.
pub const MAX_PROOF_ENTRIES: usize = 64;

// ─── Gateway Parameters ──────────────────────────────────────────────────────

/// Compressed public key of the well-known notary verification key.
pub const NOTARY_VERIFIER_PUBKEY_HEX: &str =
    "020e46e79a2a8d12b9b5d12c7a91adb4e454edfae43c0a0cb805427d2ac7613fd9";

/// RIPEMD160 hash of the notary verification key.
pub const NOTARY_VERIFIER_RMD160_HEX: &str = "f1dce4182fce875748c4986b240ff7d7bc3fffb0";

/// Payload length of a coinbase price-feed data carrier.
pub const PRICE_FEED_PAYLOAD_LEN: usize = 149;

/// Transactions with at least this many outputs are ratification transactions.
pub const MIN_RATIFY_OUTPUTS: usize = 11;

/// Maximum number of external heights processed per gateway iteration.
pub const MAX_BLOCKS_PER_ITERATION: u32 = 1000;

/// Pause between consecutive external block fetches.
pub const INTER_BLOCK_DELAY: Duration = Duration::from_millis(10);

/// Back-off after the external endpoint fails to answer `getinfo`.
pub const ENDPOINT_ERROR_BACKOFF: Duration = Duration::from_secs(30);

// ─── Notary Parameters ───────────────────────────────────────────────────────

/// Height above which notaries may receive the reduced difficulty target.
pub const NOTARY_ACTIVATION_HEIGHT: Height = 34_000;

/// From this height rotation selection alone no longer grants the override.
pub const NOTARY_TIGHTENING_HEIGHT: Height = 70_000;

/// Compact encoding of the reduced target granted to notaries.
pub const MIN_DIFF_BITS: u32 = 0x200f_0f0f;

/// Number of previous blocks a notary must not have mined to stay eligible.
pub const NOTARY_ELIGIBILITY_LOOKBACK: u32 = 64;

/// Below this height deposit accounting mismatches are expected and silent.
pub const DEPOSIT_WARNING_HEIGHT: Height = 60_000;

// ─── Proof-of-Work Parameters ────────────────────────────────────────────────

/// Number of blocks averaged by the difficulty retarget.
pub const POW_AVERAGING_WINDOW: u32 = 17;

/// Target spacing between blocks in seconds.
pub const POW_TARGET_SPACING: i64 = 60;

/// Maximum percentage by which difficulty may rise in one retarget.
pub const POW_MAX_ADJUST_UP: i64 = 16;

/// Maximum percentage by which difficulty may fall in one retarget.
pub const POW_MAX_ADJUST_DOWN: i64 = 32;

/// Absolute proof-of-work ceiling (big-endian).
pub const POW_LIMIT: [u8; 32] = [0x0f; 32];
