//! DCQL credential matching for a platform credential broker.
//!
//! The broker invokes the matcher with two JSON documents: the verifier's
//! request (which may span several protocol entries, signed or plain) and
//! the wallet's credential store. The matcher evaluates every DCQL query in
//! the request against the store and reports each matched credential to an
//! [`EntrySink`] so the host can offer it for selection. Nothing is
//! verified cryptographically here and nothing is persisted; the matcher is
//! a pure function of its two inputs.
//!
//! ```ignore
//! use dcql_matcher::{Entry, Matcher};
//!
//! let matcher = Matcher::new(request_json, store_json)?;
//! let mut entries: Vec<Entry> = vec![];
//! matcher.process(&mut entries);
//! ```
//!
//! Malformed structures inside otherwise valid documents never abort a run:
//! an entry with an unsupported protocol, an unparseable payload, or a
//! claim the store cannot resolve simply contributes no matches.

pub mod core;
pub mod matcher;
pub mod utils;

pub use crate::core::{
    credential_store::CredentialStore,
    dcql_query::DcqlQuery,
    evaluator::MatchPolicy,
    request::{ConsentInfo, TransactionData},
};
pub use crate::matcher::{Entry, EntryId, EntrySink, Matcher, MatcherError};
