use std::str::FromStr;

use alloy::primitives::{Address, FixedBytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RecoveryError, RecoveryResult};
use crate::request::{FulfillmentArgs, OracleRequest};

/// Schema version written by this build
pub const JOURNAL_VERSION: u32 = 2;

/// Record terminator kept from the original line format
const LINE_TERMINATOR: &str = ",\n";

/// The three logical journals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalKind {
    /// Written by the scanner, consumed by the submitter
    Pending,
    Unprofitable,
    Fulfilled,
}

impl JournalKind {
    pub fn file_name(self) -> &'static str {
        match self {
            JournalKind::Pending => "unfulfilled_requests",
            JournalKind::Unprofitable => "unprofitable_requests",
            JournalKind::Fulfilled => "fulfilled_requests",
        }
    }

    /// Misspelled name older scanners wrote pending requests to. Read, never
    /// written.
    pub fn legacy_file_name(self) -> Option<&'static str> {
        match self {
            JournalKind::Pending => Some("unfullfilled_requests"),
            JournalKind::Unprofitable | JournalKind::Fulfilled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub block_number: u64,
    pub transaction_hash: B256,
}

/// One journal line.
///
/// Pending entries carry the job id and the originating event; unprofitable
/// and fulfilled entries are the bare transaction arguments, plus the hash of
/// the fulfillment transaction when one was mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub version: u32,
    pub args: FulfillmentArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<RequestOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_tx: Option<B256>,
}

impl JournalEntry {
    pub fn pending(request: &OracleRequest) -> Self {
        Self {
            version: JOURNAL_VERSION,
            args: request.fulfillment_args(),
            job_id: Some(request.job_id),
            origin: Some(RequestOrigin {
                block_number: request.block_number,
                transaction_hash: request.transaction_hash,
            }),
            fulfillment_tx: None,
        }
    }

    pub fn resolved(args: FulfillmentArgs) -> Self {
        Self {
            version: JOURNAL_VERSION,
            args,
            job_id: None,
            origin: None,
            fulfillment_tx: None,
        }
    }

    pub fn with_fulfillment_tx(mut self, hash: B256) -> Self {
        self.fulfillment_tx = Some(hash);
        self
    }

    pub fn request_id(&self) -> B256 {
        self.args.request_id
    }

    /// JSON value followed by `,\n`
    pub fn encode_line(&self) -> RecoveryResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push_str(LINE_TERMINATOR);
        Ok(line)
    }

    /// Parse one complete record. Accepts the versioned object form and the
    /// positional array form written before versioning.
    pub fn decode_line(line: &str) -> RecoveryResult<Self> {
        let body = line.trim();
        let body = body.strip_suffix(',').unwrap_or(body);
        let value: Value = serde_json::from_str(body)?;

        match value {
            Value::Object(_) => {
                let entry: JournalEntry = serde_json::from_value(value)?;
                if entry.version != JOURNAL_VERSION {
                    return Err(RecoveryError::Decode(format!(
                        "unsupported journal version {}",
                        entry.version
                    )));
                }
                Ok(entry)
            }
            Value::Array(fields) => decode_positional(&fields),
            other => Err(RecoveryError::Decode(format!("unexpected journal record: {}", other))),
        }
    }
}

/// `[requestId, payment, callbackAddr, callbackFunctionId, cancelExpiration, data]`
fn decode_positional(fields: &[Value]) -> RecoveryResult<JournalEntry> {
    if fields.len() != 6 {
        return Err(RecoveryError::Decode(format!(
            "positional journal record has {} fields, expected 6",
            fields.len()
        )));
    }

    Ok(JournalEntry::resolved(FulfillmentArgs {
        request_id: parse_field::<B256>(&fields[0], "requestId")?,
        payment: parse_uint(&fields[1], "payment")?,
        callback_address: parse_field::<Address>(&fields[2], "callbackAddr")?,
        callback_function_id: parse_field::<FixedBytes<4>>(&fields[3], "callbackFunctionId")?,
        expiration: parse_uint(&fields[4], "cancelExpiration")?,
        data: parse_field::<B256>(&fields[5], "data")?,
    }))
}

fn parse_field<T: FromStr>(value: &Value, name: &str) -> RecoveryResult<T> {
    value
        .as_str()
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| RecoveryError::Decode(format!("invalid {} in journal record: {}", name, value)))
}

// web3 wrote uints as decimal strings; tolerate plain numbers too
fn parse_uint(value: &Value, name: &str) -> RecoveryResult<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => U256::from_str(s).ok(),
        _ => None,
    }
    .ok_or_else(|| RecoveryError::Decode(format!("invalid {} in journal record: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::gateway::testing::request_log;
    use crate::request::PLACEHOLDER_RESPONSE;

    fn sample_request() -> OracleRequest {
        OracleRequest::decode(&request_log(B256::repeat_byte(0xab), U256::from(2_000_000_000_000_000_000u128), 77))
            .unwrap()
    }

    #[test]
    fn test_line_framing() {
        let line = JournalEntry::pending(&sample_request()).encode_line().unwrap();
        assert!(line.ends_with(",\n"));
        assert_eq!(line.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(line.trim_end().trim_end_matches(',')).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["origin"]["block_number"], 77);
        assert!(value.get("fulfillment_tx").is_none());
    }

    #[test]
    fn test_pending_entry_decodes_back() {
        let entry = JournalEntry::pending(&sample_request());
        let decoded = JournalEntry::decode_line(&entry.encode_line().unwrap()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.request_id(), B256::repeat_byte(0xab));
    }

    #[test]
    fn test_positional_record() {
        let line = r#"["0xabababababababababababababababababababababababababababababababab","2000000000000000000","0x2222222222222222222222222222222222222222","0xdeadbeef","1700000000","0x000000000000000000000000000000000000000000000000000000c2797eab80"],"#;
        let entry = JournalEntry::decode_line(line).unwrap();

        assert_eq!(entry.args.request_id, B256::repeat_byte(0xab));
        assert_eq!(entry.args.payment, U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(entry.args.callback_address, Address::repeat_byte(0x22));
        assert_eq!(entry.args.expiration, U256::from(1_700_000_000u64));
        assert_eq!(entry.args.data, PLACEHOLDER_RESPONSE);
        assert_eq!(entry.job_id, None);
    }

    #[test]
    fn test_rejects_unknown_version_and_short_arrays() {
        let mut value = serde_json::to_value(JournalEntry::pending(&sample_request())).unwrap();
        value["version"] = Value::from(3);
        assert!(JournalEntry::decode_line(&format!("{},", value)).is_err());

        assert!(JournalEntry::decode_line(r#"["0xab", "1"],"#).is_err());
    }
}
