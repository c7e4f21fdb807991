//! Request/response envelope
//!
//! Every ledger operation can be expressed as a `LedgerRequest` and every
//! outcome as a `LedgerResponse`:
//!
//! ```text
//! {"op":"add_observation","caller":"validator","observation":{...}}
//!   -> {"ok":1}
//! {"op":"pause","caller":"someone"}
//!   -> {"err":{"code":100,"error":"unauthorized"}}
//! ```

use super::engine::LedgerEngine;
use super::error::{LedgerError, LedgerResult};
use super::hashing::RegionHash;
use super::types::{Identity, ObservationId, ObservationInput};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerRequest {
    AddObservation {
        caller: Identity,
        observation: ObservationInput,
    },
    AddCorrection {
        caller: Identity,
        observation_id: ObservationId,
        note: String,
    },
    Pause {
        caller: Identity,
    },
    Unpause {
        caller: Identity,
    },
    TransferAdmin {
        caller: Identity,
        new_admin: Identity,
    },
    SetAuthorizedValidator {
        caller: Identity,
        new_validator: Identity,
    },
    GetObservation {
        id: ObservationId,
    },
    GetSpeciesAggregate {
        species: String,
    },
    GetRegionAggregate {
        region_hash: RegionHash,
    },
    GetCorrection {
        id: ObservationId,
    },
    GetTotalObservations,
    IsPaused,
    GetAdmin,
    GetAuthorizedValidator,
    GetPaginatedObservations {
        start: ObservationId,
        /// Signed so that negative limits are reported, not rejected by the decoder
        limit: i64,
    },
    FindObservation {
        species: String,
        timestamp: u64,
    },
    GetLocationBucket {
        latitude: i64,
        longitude: i64,
    },
}

impl LedgerRequest {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            LedgerRequest::AddObservation { .. }
                | LedgerRequest::AddCorrection { .. }
                | LedgerRequest::Pause { .. }
                | LedgerRequest::Unpause { .. }
                | LedgerRequest::TransferAdmin { .. }
                | LedgerRequest::SetAuthorizedValidator { .. }
        )
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            LedgerRequest::AddObservation { .. } => "add_observation",
            LedgerRequest::AddCorrection { .. } => "add_correction",
            LedgerRequest::Pause { .. } => "pause",
            LedgerRequest::Unpause { .. } => "unpause",
            LedgerRequest::TransferAdmin { .. } => "transfer_admin",
            LedgerRequest::SetAuthorizedValidator { .. } => "set_authorized_validator",
            LedgerRequest::GetObservation { .. } => "get_observation",
            LedgerRequest::GetSpeciesAggregate { .. } => "get_species_aggregate",
            LedgerRequest::GetRegionAggregate { .. } => "get_region_aggregate",
            LedgerRequest::GetCorrection { .. } => "get_correction",
            LedgerRequest::GetTotalObservations => "get_total_observations",
            LedgerRequest::IsPaused => "is_paused",
            LedgerRequest::GetAdmin => "get_admin",
            LedgerRequest::GetAuthorizedValidator => "get_authorized_validator",
            LedgerRequest::GetPaginatedObservations { .. } => "get_paginated_observations",
            LedgerRequest::FindObservation { .. } => "find_observation",
            LedgerRequest::GetLocationBucket { .. } => "get_location_bucket",
        }
    }
}

/// Tagged result envelope: `{"ok": value}` or `{"err": {"code": n, "error": name}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerResponse {
    Ok(Value),
    Err { code: u16, error: String },
}

impl LedgerResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, LedgerResponse::Ok(_))
    }

    /// The ledger error carried by this response, if any
    pub fn error(&self) -> Option<LedgerError> {
        match self {
            LedgerResponse::Ok(_) => None,
            LedgerResponse::Err { code, .. } => LedgerError::from_code(*code),
        }
    }
}

impl From<LedgerResult<Value>> for LedgerResponse {
    fn from(result: LedgerResult<Value>) -> Self {
        match result {
            Ok(value) => LedgerResponse::Ok(value),
            Err(err) => LedgerResponse::Err {
                code: err.code(),
                error: err.as_str().to_string(),
            },
        }
    }
}

/// Run one request against the engine
pub fn apply_request(engine: &mut LedgerEngine, request: LedgerRequest) -> LedgerResponse {
    dispatch(engine, request).into()
}

fn dispatch(engine: &mut LedgerEngine, request: LedgerRequest) -> LedgerResult<Value> {
    let value = match request {
        LedgerRequest::AddObservation {
            caller,
            observation,
        } => json!(engine.add_observation(&caller, observation)?),
        LedgerRequest::AddCorrection {
            caller,
            observation_id,
            note,
        } => {
            engine.add_correction(&caller, observation_id, note)?;
            json!(true)
        }
        LedgerRequest::Pause { caller } => {
            engine.pause(&caller)?;
            json!(true)
        }
        LedgerRequest::Unpause { caller } => {
            engine.unpause(&caller)?;
            json!(true)
        }
        LedgerRequest::TransferAdmin { caller, new_admin } => {
            engine.transfer_admin(&caller, new_admin)?;
            json!(true)
        }
        LedgerRequest::SetAuthorizedValidator {
            caller,
            new_validator,
        } => {
            engine.set_authorized_validator(&caller, new_validator)?;
            json!(true)
        }
        LedgerRequest::GetObservation { id } => json!(engine.get_observation(id)),
        LedgerRequest::GetSpeciesAggregate { species } => {
            json!(engine.get_species_aggregate(&species))
        }
        LedgerRequest::GetRegionAggregate { region_hash } => {
            json!(engine.get_region_aggregate(&region_hash))
        }
        LedgerRequest::GetCorrection { id } => json!(engine.get_correction(id)),
        LedgerRequest::GetTotalObservations => json!(engine.get_total_observations()),
        LedgerRequest::IsPaused => json!(engine.is_paused()),
        LedgerRequest::GetAdmin => json!(engine.get_admin()),
        LedgerRequest::GetAuthorizedValidator => json!(engine.get_authorized_validator()),
        LedgerRequest::GetPaginatedObservations { start, limit } => {
            let limit = u32::try_from(limit).map_err(|_| LedgerError::InvalidQueryParams)?;
            json!(engine.get_paginated_observations(start, limit)?)
        }
        LedgerRequest::FindObservation { species, timestamp } => {
            json!(engine.find_observation(&species, timestamp))
        }
        LedgerRequest::GetLocationBucket {
            latitude,
            longitude,
        } => json!(engine.get_location_bucket(latitude, longitude)),
    };
    Ok(value)
}
