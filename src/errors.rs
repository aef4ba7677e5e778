//! Error taxonomy for the execution core
//!
//! A closed set of typed reasons: every rejection and rollback the caller
//! can observe is one of these, never an ad hoc string. All in-unit
//! failures propagate to the terminal outcome rather than being absorbed;
//! nothing is retried inside the core.

use ethers::types::U256;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No pool exists for the pair/fee tier. Recoverable: try another tier.
    #[error("no pool for token pair at requested fee tier")]
    NotFound,

    /// Pool exists but cannot absorb the requested size.
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: U256, need: U256 },

    /// Actual output fell below the slippage floor; always a full rollback.
    #[error("slippage exceeded: actual {actual} below floor {floor}")]
    SlippageExceeded { actual: U256, floor: U256 },

    /// Final proceeds do not cover principal plus fee.
    #[error("unprofitable: proceeds {proceeds} below owed {owed}")]
    Unprofitable { proceeds: U256, owed: U256 },

    /// Pre-flight rejection: the facility cannot supply the principal.
    #[error("loan facility unavailable: {0}")]
    LoanFacilityUnavailable(String),

    /// The lending facility did not accept repayment.
    #[error("repayment rejected: {0}")]
    RepayRejected(String),

    /// Caller error in the supplied parameters or route.
    #[error("malformed request: {0}")]
    MalformedRoute(String),

    /// Fatal. Aborts the unit immediately; never coerced or truncated.
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// The executor is non-reentrant; one unit at a time.
    #[error("another execution is already in flight")]
    ExecutionInFlight,

    #[error("gas price {gas_price} wei above ceiling {ceiling} wei")]
    GasPriceAboveCeiling { gas_price: U256, ceiling: U256 },

    /// Failure surfaced by an external collaborator (registry, venue, ledger).
    #[error("venue error: {0}")]
    Venue(String),
}

impl CoreError {
    /// Fatal errors abort the unit unconditionally; everything else is a
    /// reason the caller may act on (retry smaller, approve first, ...).
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::ArithmeticOverflow(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
