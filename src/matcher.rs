//! The matching engine the host invokes once per presentation request.
//!
//! A [`Matcher`] is built from the two buffers the broker supplies (the
//! request document and the credential store document), evaluates every
//! supported request entry against the store, and reports the results
//! through an [`EntrySink`]. It holds no state across invocations.

use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::core::{
    credential_store::{CredentialStore, IconRef},
    evaluator::{MatchPolicy, MatchedCandidate, QueryMatch},
    request::{self, ConsentInfo, TransactionData},
};

/// Correlation identifier for transaction-bound entries, serialized to JSON
/// so the host sink can trace a selection back to its credential query and
/// originating request entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryId {
    pub id: String,
    pub dcql_cred_id: String,
    pub provider_idx: usize,
}

impl EntryId {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One selectable entry reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A matched credential, offered with the labels of the claims the
    /// verifier asked for.
    Credential {
        id: String,
        title: String,
        subtitle: Option<String>,
        disclaimer: Option<String>,
        icon: Option<IconRef>,
        claim_labels: Vec<String>,
        consent: Option<ConsentInfo>,
    },
    /// A matched credential bound to a payment transaction.
    Payment {
        id: String,
        merchant_name: String,
        title: String,
        subtitle: Option<String>,
        icon: Option<IconRef>,
        amount: Option<String>,
    },
    /// A synthetic entry offering issuance when nothing matched but the
    /// request signaled an issuance offer.
    IssuanceOffer { merchant_name: String },
}

/// Where matches are reported. The host materializes entries into
/// selectable UI items; tests collect them into a `Vec`.
pub trait EntrySink {
    fn add_entry(&mut self, entry: Entry);
}

impl EntrySink for Vec<Entry> {
    fn add_entry(&mut self, entry: Entry) {
        self.push(entry);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    /// The request buffer was not valid JSON.
    #[error("request document was not valid JSON: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// The credential store buffer was not valid JSON.
    #[error("credential store document was not valid JSON: {0}")]
    InvalidStore(#[source] serde_json::Error),
}

/// One invocation's worth of matching state.
#[derive(Debug)]
pub struct Matcher {
    request: Json,
    store: CredentialStore,
    policy: MatchPolicy,
}

impl Matcher {
    /// Parse the two host-supplied documents. This is the only place a
    /// malformed input surfaces as an error; past this point, malformed
    /// structures degrade to empty results.
    pub fn new(request: &str, store: &str) -> Result<Self, MatcherError> {
        let request: Json = serde_json::from_str(request).map_err(MatcherError::InvalidRequest)?;
        let store: Json = serde_json::from_str(store).map_err(MatcherError::InvalidStore)?;
        Ok(Self {
            request,
            store: CredentialStore::from_document(&store),
            policy: MatchPolicy::default(),
        })
    }

    /// Override the acceptance policy (defaults to
    /// [`MatchPolicy::AtLeastOne`]).
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate every supported request entry and report matches to the
    /// sink. Runs to completion; the worst outcome of malformed input is
    /// that nothing is offered.
    pub fn process(&self, sink: &mut dyn EntrySink) {
        let mut matched_any = false;
        let mut offered = false;
        let mut offer_merchant: Option<String> = None;

        for entry in request::entries(&self.request) {
            let payload = request::effective_payload(entry.payload);
            let Some(query) = request::dcql_query(&payload) else {
                debug!(index = entry.index, "request entry carries no DCQL query");
                continue;
            };

            let transaction = request::transaction_data(&payload);
            if request::is_issuance_offer(&payload) {
                offered = true;
            }
            if offer_merchant.is_none() {
                if let Some(txn) = &transaction {
                    offer_merchant = txn.merchant_name.clone();
                }
            }

            for query_match in query.execute(&self.store, self.policy) {
                let consent = query_match
                    .query
                    .credential_authorization_jwt()
                    .and_then(request::consent_info);

                for matched in &query_match.candidates {
                    matched_any = true;
                    match &transaction {
                        Some(txn) => {
                            if txn.credential_ids.contains(&query_match.query.id) {
                                sink.add_entry(payment_entry(
                                    entry.index,
                                    &query_match,
                                    matched,
                                    txn,
                                ));
                            } else {
                                debug!(
                                    id = %query_match.query.id,
                                    "suppressing match not bound to the transaction"
                                );
                            }
                        }
                        None => {
                            sink.add_entry(credential_entry(matched, consent.clone()));
                        }
                    }
                }
            }
        }

        // An issuance offer is only surfaced when presentation came up
        // empty and the transaction told us who is asking.
        if !matched_any && offered {
            if let Some(merchant_name) = offer_merchant {
                sink.add_entry(Entry::IssuanceOffer { merchant_name });
            }
        }
    }
}

fn credential_entry(matched: &MatchedCandidate, consent: Option<ConsentInfo>) -> Entry {
    let candidate = matched.candidate;
    Entry::Credential {
        id: candidate.id.clone(),
        title: candidate.title.clone(),
        subtitle: candidate.subtitle.clone(),
        disclaimer: candidate.disclaimer.clone(),
        icon: candidate.icon,
        claim_labels: matched.claim_labels.clone(),
        consent,
    }
}

fn payment_entry(
    provider_idx: usize,
    query_match: &QueryMatch,
    matched: &MatchedCandidate,
    txn: &TransactionData,
) -> Entry {
    let candidate = matched.candidate;
    let id = EntryId {
        id: candidate.id.clone(),
        dcql_cred_id: query_match.query.id.clone(),
        provider_idx,
    };
    Entry::Payment {
        id: id.to_json(),
        merchant_name: txn.merchant_name.clone().unwrap_or_default(),
        title: candidate.title.clone(),
        subtitle: candidate.subtitle.clone(),
        icon: candidate.icon,
        amount: txn.amount.clone(),
    }
}
