//! Normalization of the host's request document.
//!
//! The broker hands the matcher a single JSON document whose shape has
//! drifted across platform revisions: the current generation carries a
//! `requests` array with embedded or JSON-string payloads, the legacy
//! generation a `providers` array with JSON-string payloads only. Payloads
//! may additionally be wrapped in a compact signed token whose middle
//! segment holds the effective request. This module flattens all of that
//! into plain payload objects; no signatures are verified here (the host
//! has done any vetting before invoking the matcher).

use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::core::{base64url, dcql_query::DcqlQuery};

pub const PROTOCOL_OPENID4VP: &str = "openid4vp";
pub const PROTOCOL_OPENID4VP_1_0: &str = "openid4vp1.0";

fn is_supported_protocol(protocol: &str) -> bool {
    protocol == PROTOCOL_OPENID4VP || protocol == PROTOCOL_OPENID4VP_1_0
}

/// One presentation request extracted from the host request document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEntry {
    /// Position of the entry in the host document, before any filtering.
    /// Selections are correlated back to the host through this index.
    pub index: usize,
    pub protocol: String,
    pub payload: Json,
}

/// Extract the supported presentation-protocol entries of a request
/// document, across both document generations. Entries using other
/// protocols or carrying unparseable payloads are skipped, never an error.
pub fn entries(document: &Json) -> Vec<RequestEntry> {
    let (list, payload_key) = if let Some(requests) = document.get("requests") {
        (requests.as_array(), "data")
    } else if let Some(providers) = document.get("providers") {
        (providers.as_array(), "request")
    } else {
        debug!("request document has neither `requests` nor `providers`");
        return vec![];
    };

    let Some(list) = list else {
        return vec![];
    };

    list.iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let protocol = entry.get("protocol").and_then(Json::as_str)?;
            if !is_supported_protocol(protocol) {
                debug!(%protocol, index, "skipping entry with unsupported protocol");
                return None;
            }

            let raw = entry
                .get(payload_key)
                .or_else(|| entry.get("request"))?;
            let payload = match raw {
                // Legacy payloads (and some current ones) are JSON strings.
                Json::String(text) => match serde_json::from_str(text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        debug!(index, "entry payload was not valid JSON: {e}");
                        return None;
                    }
                },
                embedded => embedded.clone(),
            };

            Some(RequestEntry {
                index,
                protocol: protocol.to_string(),
                payload,
            })
        })
        .collect()
}

/// Decode the payload segment of a three-part compact token.
fn compact_token_payload(token: &str) -> Option<Json> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return None,
    };
    let bytes = match base64url::decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("compact token payload was not valid base64url: {e}");
            return None;
        }
    };
    serde_json::from_slice(&bytes).ok()
}

/// Unwrap a signed request: when the payload carries a `request` member
/// holding a compact token, the token's payload segment replaces the
/// wrapper. Payloads without one pass through unchanged.
pub fn effective_payload(payload: Json) -> Json {
    let Some(token) = payload.get("request").and_then(Json::as_str) else {
        return payload;
    };
    match compact_token_payload(token) {
        Some(inner) => inner,
        None => {
            warn!("signed request token could not be unwrapped");
            payload
        }
    }
}

/// The DCQL query of an effective payload. `vp_query` is the legacy name
/// for the same object.
pub fn dcql_query(payload: &Json) -> Option<DcqlQuery> {
    let value = payload.get("dcql_query").or_else(|| payload.get("vp_query"))?;
    match serde_json::from_value(value.clone()) {
        Ok(query) => Some(query),
        Err(e) => {
            debug!("payload carried a malformed DCQL query: {e}");
            None
        }
    }
}

/// Whether the payload signals a credential issuance offer.
pub fn is_issuance_offer(payload: &Json) -> bool {
    payload.get("offer").is_some()
}

/// Transaction context binding a presentation to a payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionData {
    pub merchant_name: Option<String>,
    pub amount: Option<String>,
    /// Credential-query ids this transaction is bound to; matches for any
    /// other query are suppressed while a transaction is present.
    pub credential_ids: Vec<String>,
}

/// Decode the payload's transaction data. Only single-entry
/// `transaction_data` arrays bind; anything else is ignored.
pub fn transaction_data(payload: &Json) -> Option<TransactionData> {
    let list = payload.get("transaction_data")?.as_array()?;
    if list.len() != 1 {
        debug!(
            entries = list.len(),
            "only single-entry transaction_data is supported"
        );
        return None;
    }

    let bytes = base64url::decode(list[0].as_str()?).ok()?;
    let decoded: Json = serde_json::from_slice(&bytes).ok()?;
    Some(TransactionData {
        merchant_name: decoded
            .get("merchant_name")
            .and_then(Json::as_str)
            .map(String::from),
        amount: decoded.get("amount").and_then(Json::as_str).map(String::from),
        credential_ids: decoded
            .get("credential_ids")
            .and_then(Json::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Json::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Aggregator consent attached to phone-number-verification candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentInfo {
    pub consent_text: Option<String>,
    pub policy_link: Option<String>,
    pub policy_text: Option<String>,
}

/// Extract consent data from a credential-authorization token: the token's
/// payload segment carries a `consent_data` member that is itself
/// base64url-encoded JSON.
pub fn consent_info(token: &str) -> Option<ConsentInfo> {
    let payload = compact_token_payload(token)?;
    let encoded = payload.get("consent_data")?.as_str()?;
    let bytes = base64url::decode(encoded).ok()?;
    let decoded: Json = serde_json::from_slice(&bytes).ok()?;
    Some(ConsentInfo {
        consent_text: decoded
            .get("consent_text")
            .and_then(Json::as_str)
            .map(String::from),
        policy_link: decoded
            .get("policy_link")
            .and_then(Json::as_str)
            .map(String::from),
        policy_text: decoded
            .get("policy_text")
            .and_then(Json::as_str)
            .map(String::from),
    })
}
