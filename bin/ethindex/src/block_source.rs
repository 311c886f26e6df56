use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ethindex_types::block::BlockRecord;
use serde::Deserialize;
use serde_json::{Value, json};

/// Timeout for establishing the HTTP connection to the node.
const RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for a whole request, including the body download.
const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC {method} failed: {message}")]
    Rpc { method: String, message: String },
    #[error("block {0} not available from node")]
    MissingBlock(u64),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Where new blocks come from.
pub trait BlockSource {
    async fn latest_block_number(&self) -> Result<u64, SourceError>;

    async fn block(&self, number: u64) -> Result<BlockRecord, SourceError>;
}

/// Block source backed by an execution node's JSON-RPC endpoint.
///
/// Stores the header JSON returned by `eth_getBlockByNumber` as the opaque
/// header payload. Receipts and traces are left empty.
pub struct RpcBlockSource {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcBlockSource {
    pub fn new(url: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(RPC_CONNECT_TIMEOUT)
            .timeout(RPC_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response: Value = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.get("error") {
            return Err(SourceError::Rpc {
                method: method.to_string(),
                message: err.to_string(),
            });
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| SourceError::Malformed(format!("{method} response has no result")))
    }
}

impl BlockSource for RpcBlockSource {
    async fn latest_block_number(&self) -> Result<u64, SourceError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let value = result
            .as_str()
            .ok_or_else(|| SourceError::Malformed(format!("eth_blockNumber returned {result}")))?;
        parse_quantity(value)
    }

    async fn block(&self, number: u64) -> Result<BlockRecord, SourceError> {
        let result = self
            .call("eth_getBlockByNumber", json!([format!("{number:#x}"), false]))
            .await?;
        if result.is_null() {
            return Err(SourceError::MissingBlock(number));
        }
        block_from_json(result)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcHeader {
    number: String,
    hash: String,
    parent_hash: String,
    timestamp: String,
}

fn block_from_json(header: Value) -> Result<BlockRecord, SourceError> {
    let fields: RpcHeader = serde_json::from_value(header.clone())
        .map_err(|err| SourceError::Malformed(format!("block header: {err}")))?;
    Ok(BlockRecord {
        number: parse_quantity(&fields.number)?,
        hash: parse_data(&fields.hash)?,
        parent_hash: parse_data(&fields.parent_hash)?,
        timestamp: parse_quantity(&fields.timestamp)?,
        header: header.to_string().into_bytes(),
        receipts: Vec::new(),
        traces: Vec::new(),
    })
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn parse_quantity(value: &str) -> Result<u64, SourceError> {
    u64::from_str_radix(strip_hex_prefix(value), 16)
        .map_err(|err| SourceError::Malformed(format!("invalid quantity {value}: {err}")))
}

fn parse_data(value: &str) -> Result<Vec<u8>, SourceError> {
    hex::decode(strip_hex_prefix(value))
        .map_err(|err| SourceError::Malformed(format!("invalid hex data {value}: {err}")))
}
