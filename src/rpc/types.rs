// RPC types - JSON-RPC envelopes and stake-handler responses
use crate::types::{AccountId, Balance};
use serde::{Deserialize, Serialize};

/// JSON-RPC request
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: serde_json::Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: &'static str, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
    #[allow(dead_code)]
    pub id: u64,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Entry of `stake_getWeights`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub account: AccountId,
    pub weight: Balance,
}

/// Entry of `stake_getCandidateDeposits`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEntry {
    pub account: AccountId,
    pub deposit: Balance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_result() {
        let json = r#"{"jsonrpc":"2.0","result":[{"account":"0x0101010101010101010101010101010101010101","weight":250}],"id":3}"#;
        let response: JsonRpcResponse<Vec<WeightEntry>> = serde_json::from_str(json).unwrap();
        let entries = response.result.unwrap();
        assert_eq!(entries[0].account, AccountId::from_bytes([1; 20]));
        assert_eq!(entries[0].weight, 250);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_response_with_error() {
        let json = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":4}"#;
        let response: JsonRpcResponse<u64> = serde_json::from_str(json).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest::new("chain_getBestBlockNumber", serde_json::json!([]), 9);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "chain_getBestBlockNumber");
        assert_eq!(value["id"], 9);
    }
}
