//! JSON-RPC 2.0 envelopes shared by the stdio and HTTP transports.

use scope3_core::DecisionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    /// Structured detail, e.g. the rejected rows of an all-or-nothing batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Maps an engine error onto an error response. Bad input and out-of-range
    /// settings are caller errors; partitioner failures are internal.
    pub fn decision_error(id: Value, err: &DecisionError) -> Self {
        let (code, data) = match err {
            DecisionError::InvalidRecord(record) => {
                (INVALID_PARAMS, serde_json::to_value([record]).ok())
            }
            DecisionError::InvalidRecords(records) => {
                (INVALID_PARAMS, serde_json::to_value(records).ok())
            }
            DecisionError::ConfigOutOfRange { .. } => (INVALID_PARAMS, None),
            DecisionError::Partition(_) => (INTERNAL_ERROR, None),
        };
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: err.to_string(),
                data: data.map(|rejected| serde_json::json!({ "rejected": rejected })),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope3_core::{InvalidRecord, RecordField, Violation};

    #[test]
    fn out_of_range_price_is_invalid_params() {
        let err = DecisionError::ConfigOutOfRange {
            name: "carbon_price",
            value: 50.0,
            min: 1000.0,
            max: 15000.0,
        };
        let resp = JsonRpcResponse::decision_error(Value::from(3), &err);
        let body = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(body["error"]["code"], INVALID_PARAMS);
        assert_eq!(body["id"], 3);
        assert!(body["error"].get("data").is_none());
    }

    #[test]
    fn rejected_batch_carries_rows() {
        let err = DecisionError::InvalidRecords(vec![InvalidRecord {
            index: 2,
            supplier: "Eta".to_string(),
            field: RecordField::CostPerTon,
            violation: Violation::NotPositive(0.0),
        }]);
        let body = serde_json::to_value(JsonRpcResponse::decision_error(Value::Null, &err))
            .expect("serialize");
        assert_eq!(body["error"]["data"]["rejected"][0]["supplier"], "Eta");
        assert_eq!(body["error"]["data"]["rejected"][0]["field"], "cost_per_ton");
        assert_eq!(
            body["error"]["data"]["rejected"][0]["violation"]["kind"],
            "not_positive"
        );
    }
}
