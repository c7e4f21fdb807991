//! Ledger error codes
//!
//! Every rejection carries a stable numeric code. Consumers match on the code,
//! so the discriminants below must never be renumbered.

use thiserror::Error;

/// Why a ledger operation was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u16)]
pub enum LedgerError {
    /// Caller is not the admin, validator or corrector the operation requires
    #[error("caller is not authorized for this operation")]
    Unauthorized = 100,

    /// A field violates a length or range bound
    #[error("observation field violates a length or range bound")]
    InvalidObservation = 101,

    /// Species + timestamp key already taken
    #[error("an observation for this species and timestamp already exists")]
    AlreadyExists = 102,

    /// Malformed pagination or lookup request
    #[error("malformed query parameters")]
    InvalidQueryParams = 103,

    /// Referenced observation id does not exist
    #[error("observation not found")]
    NotFound = 104,

    /// Mutating call attempted while paused
    #[error("ledger is paused")]
    Paused = 105,

    /// Location bucket already holds its maximum number of ids
    #[error("location bucket capacity exceeded")]
    CapacityExceeded = 106,
}

impl LedgerError {
    pub const ALL: [LedgerError; 7] = [
        LedgerError::Unauthorized,
        LedgerError::InvalidObservation,
        LedgerError::AlreadyExists,
        LedgerError::InvalidQueryParams,
        LedgerError::NotFound,
        LedgerError::Paused,
        LedgerError::CapacityExceeded,
    ];

    #[must_use]
    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|err| err.code() == code)
    }

    /// Short machine-readable name used in response envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized => "unauthorized",
            LedgerError::InvalidObservation => "invalid_observation",
            LedgerError::AlreadyExists => "already_exists",
            LedgerError::InvalidQueryParams => "invalid_query_params",
            LedgerError::NotFound => "not_found",
            LedgerError::Paused => "paused",
            LedgerError::CapacityExceeded => "capacity_exceeded",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
