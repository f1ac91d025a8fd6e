//! Provider descriptor → [`TransactionRecord`] mapping.
//!
//! The descriptor is the Solana `getTransaction` result joined with its
//! `getSignaturesForAddress` listing entry:
//!
//! ```json
//! {
//!   "signature": "5h6x...",
//!   "blockTime": 1704067200,
//!   "err": null,
//!   "meta": { "err": null },
//!   "transaction": { "message": { "instructions": [ ... ] } }
//! }
//! ```
//!
//! Sparse descriptors are fine: missing `blockTime` becomes `None`, missing
//! instructions become an empty list, and missing error indicators mean
//! [`Outcome::Success`].

use serde_json::{Map, Value};

use crate::{NormalizationError, Operation, Outcome, RawTransaction, TransactionRecord, UtcDateTime};

pub fn normalize(raw: &RawTransaction) -> Result<TransactionRecord, NormalizationError> {
    let object = raw
        .as_value()
        .as_object()
        .ok_or(NormalizationError::NotAnObject)?;

    let id = extract_id(object)?;
    let occurred_at = extract_block_time(object)?;
    let operations = extract_operations(object)?;
    let meta_err = object.get("meta").and_then(|meta| meta.get("err"));
    let outcome = if has_error(object.get("err")) || has_error(meta_err) {
        Outcome::Failed
    } else {
        Outcome::Success
    };

    Ok(TransactionRecord::new(id, occurred_at, operations, outcome))
}

fn extract_id(object: &Map<String, Value>) -> Result<String, NormalizationError> {
    let listed = match object.get("signature") {
        None | Some(Value::Null) => None,
        Some(Value::String(signature)) => Some(signature.as_str()),
        Some(other) => {
            return Err(NormalizationError::InvalidField {
                field: "signature",
                reason: format!("expected string, found {}", type_name(other)),
            })
        }
    };

    let embedded = || {
        object
            .get("transaction")
            .and_then(|tx| tx.get("signatures"))
            .and_then(Value::as_array)
            .and_then(|signatures| signatures.first())
            .and_then(Value::as_str)
    };

    listed
        .or_else(embedded)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or(NormalizationError::MissingId)
}

fn extract_block_time(object: &Map<String, Value>) -> Result<Option<UtcDateTime>, NormalizationError> {
    match object.get("blockTime") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let seconds = value.as_i64().ok_or_else(|| NormalizationError::InvalidField {
                field: "blockTime",
                reason: format!("expected integer seconds, found {}", type_name(value)),
            })?;
            UtcDateTime::from_unix_seconds(seconds)
                .map(Some)
                .ok_or_else(|| NormalizationError::InvalidField {
                    field: "blockTime",
                    reason: format!("{seconds} is outside the representable range"),
                })
        }
    }
}

fn extract_operations(object: &Map<String, Value>) -> Result<Vec<Operation>, NormalizationError> {
    let instructions = object
        .get("transaction")
        .and_then(|tx| tx.get("message"))
        .and_then(|message| message.get("instructions"));

    match instructions {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().cloned().map(Operation::new).collect()),
        Some(other) => Err(NormalizationError::InvalidField {
            field: "instructions",
            reason: format!("expected array, found {}", type_name(other)),
        }),
    }
}

fn has_error(indicator: Option<&Value>) -> bool {
    indicator.is_some_and(|value| !value.is_null())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
