use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::UtcDateTime;

/// Execution result of a transaction as reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque instruction descriptor, kept exactly as the provider reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(Value);

impl Operation {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Program that executed the instruction, when the provider names it.
    pub fn program_id(&self) -> Option<&str> {
        self.0.get("programId").and_then(Value::as_str)
    }

    /// Parsed instruction type (e.g. `transfer`) for parsed encodings.
    pub fn kind(&self) -> Option<&str> {
        self.0.pointer("/parsed/type").and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Canonical transaction record shared by every provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Provider-unique id; for Solana this is the transaction signature.
    pub id: String,
    pub occurred_at: Option<UtcDateTime>,
    pub operations: Vec<Operation>,
    pub outcome: Outcome,
}

impl TransactionRecord {
    pub fn new(
        id: impl Into<String>,
        occurred_at: Option<UtcDateTime>,
        operations: Vec<Operation>,
        outcome: Outcome,
    ) -> Self {
        Self {
            id: id.into(),
            occurred_at,
            operations,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_camel_case_keys() {
        let record = TransactionRecord::new(
            "5sig",
            UtcDateTime::from_unix_seconds(1_704_067_200),
            vec![Operation::new(json!({ "programId": "11111111111111111111111111111111" }))],
            Outcome::Failed,
        );

        let value = serde_json::to_value(&record).expect("record serializes");
        assert_eq!(value["id"], "5sig");
        assert_eq!(value["occurredAt"], "2024-01-01T00:00:00Z");
        assert_eq!(value["outcome"], "Failed");
        assert_eq!(
            value["operations"][0]["programId"],
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn operation_exposes_program_and_parsed_type() {
        let op = Operation::new(json!({
            "programId": "11111111111111111111111111111111",
            "parsed": { "type": "transfer", "info": {} }
        }));
        assert_eq!(op.program_id(), Some("11111111111111111111111111111111"));
        assert_eq!(op.kind(), Some("transfer"));

        let raw = Operation::new(json!({ "data": "3Bxs4h24hBtQy9rw" }));
        assert_eq!(raw.program_id(), None);
        assert_eq!(raw.kind(), None);
    }
}
