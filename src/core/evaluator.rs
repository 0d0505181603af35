//! Evaluation of a DCQL query against the credential store.
//!
//! Matching is pure: the store and query are read-only, failures of any
//! kind (missing formats, unresolvable claims, value mismatches) shrink the
//! result instead of raising errors.

use serde_json::Value as Json;
use tracing::debug;

use crate::core::{
    credential_format::CredentialFormat,
    credential_store::{Candidate, CredentialStore},
    dcql_query::{ClaimAddress, ClaimQuery, CredentialQuery, DcqlQuery},
};

/// How many credential queries of a request must produce matches before any
/// results are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// One satisfied credential query suffices; every query that matched is
    /// reported.
    #[default]
    AtLeastOne,
    /// Results are reported only when every credential query in the request
    /// matched at least one candidate.
    RequireAll,
}

/// The matches produced by one credential query.
#[derive(Debug, Clone)]
pub struct QueryMatch<'a> {
    /// The credential query these candidates satisfy.
    pub query: &'a CredentialQuery,
    /// Satisfying candidates, in store order.
    pub candidates: Vec<MatchedCandidate<'a>>,
}

/// One candidate that satisfied a credential query, with the display labels
/// of the claims that matched, in claims (or accepted claim set) order.
#[derive(Debug, Clone)]
pub struct MatchedCandidate<'a> {
    pub candidate: &'a Candidate,
    pub claim_labels: Vec<String>,
}

impl DcqlQuery {
    /// Evaluate every credential query against the store, returning the
    /// matching queries in declaration order.
    pub fn execute<'a>(
        &'a self,
        store: &'a CredentialStore,
        policy: MatchPolicy,
    ) -> Vec<QueryMatch<'a>> {
        let mut matched = vec![];
        for query in self.credentials.iter() {
            let candidates: Vec<MatchedCandidate> = select_candidates(query, store)
                .into_iter()
                .filter_map(|candidate| {
                    match_candidate(query, candidate).map(|claim_labels| MatchedCandidate {
                        candidate,
                        claim_labels,
                    })
                })
                .collect();

            if candidates.is_empty() {
                debug!(id = %query.id, "credential query matched no candidates");
            } else {
                matched.push(QueryMatch { query, candidates });
            }
        }

        match policy {
            MatchPolicy::AtLeastOne => matched,
            MatchPolicy::RequireAll => {
                if matched.len() == self.credentials.len() {
                    matched
                } else {
                    vec![]
                }
            }
        }
    }
}

/// Narrow the store to the candidates a credential query may match: the
/// query's format bucket, filtered by the format-specific meta constraint.
fn select_candidates<'a>(
    query: &CredentialQuery,
    store: &'a CredentialStore,
) -> Vec<&'a Candidate> {
    let format = query.format.name();
    if matches!(query.format, CredentialFormat::Other(_)) {
        debug!(%format, "unsupported credential format");
        return vec![];
    }
    if !store.has_format(format) {
        debug!(%format, "no stored credentials for requested format");
        return vec![];
    }

    if query.format.is_namespaced() {
        // mdoc: a single doctype narrows to one bucket.
        let Some(doctype) = query.doctype_value() else {
            debug!(%format, "query has no doctype_value meta; nothing to match");
            return vec![];
        };
        store.bucket(format, doctype).iter().collect()
    } else {
        // SD-JWT: the union of the acceptable vct buckets, in declared
        // order, duplicates preserved.
        let Some(vct_values) = query.vct_values() else {
            debug!(%format, "query has no vct_values meta; nothing to match");
            return vec![];
        };
        vct_values
            .into_iter()
            .flat_map(|vct| store.bucket(format, vct))
            .collect()
    }
}

/// Decide whether a candidate satisfies a credential query; on success,
/// return the claim display labels to offer for it.
fn match_candidate(query: &CredentialQuery, candidate: &Candidate) -> Option<Vec<String>> {
    // No claims requested: every candidate passes, offering all of its
    // labelled claims.
    let Some(claims) = &query.claims else {
        let mut labels = vec![];
        candidate.claims.collect_labels(&mut labels);
        return Some(labels);
    };

    if let Some(claim_sets) = &query.claim_sets {
        // Satisfaction is computed once per claim id, then claim sets are
        // tried in declared order; the first fully satisfied set wins.
        let satisfied: Vec<(&str, Option<String>)> = claims
            .iter()
            .filter_map(|claim| {
                let id = claim.id.as_deref()?;
                match_claim(claim, candidate).map(|label| (id, label))
            })
            .collect();

        for claim_set in claim_sets.iter() {
            let mut labels = vec![];
            let all_present = claim_set.iter().all(|id| {
                match satisfied.iter().find(|entry| entry.0 == id.as_str()) {
                    Some((_, label)) => {
                        labels.extend(label.clone());
                        true
                    }
                    None => false,
                }
            });
            if all_present {
                return Some(labels);
            }
        }
        return None;
    }

    // Plain claims list: conjunction over every claim query.
    let mut labels = vec![];
    for claim in claims.iter() {
        let label = match_claim(claim, candidate)?;
        labels.extend(label);
    }
    Some(labels)
}

/// Evaluate one claim query against one candidate. `Some(label)` means the
/// claim is satisfied; the inner option is its display label, when the
/// resolved claim carries one.
fn match_claim(claim: &ClaimQuery, candidate: &Candidate) -> Option<Option<String>> {
    let node = match claim.address()? {
        ClaimAddress::Namespaced {
            namespace,
            claim_name,
        } => candidate.claims.resolve([namespace, claim_name])?,
        ClaimAddress::Path(path) => candidate
            .claims
            .resolve(path.iter().map(String::as_str))?,
    };

    let leaf = node.as_leaf();
    if let Some(values) = &claim.values {
        // Deep structural equality against any declared value; a resolved
        // node without a value can never match.
        let resolved: &Json = &leaf?.value;
        if !values.iter().any(|expected| expected == resolved) {
            return None;
        }
    }

    Some(leaf.and_then(|leaf| leaf.display.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn store() -> CredentialStore {
        CredentialStore::from_document(&json!({
            "credentials": {
                "mso_mdoc": {
                    "org.iso.18013.5.1.mDL": [{
                        "id": "mdl1",
                        "title": "Driving Licence",
                        "namespaces": {
                            "org.iso.18013.5.1": {
                                "family_name": { "value": "Mustermann", "display": "Family name" },
                                "given_name": { "value": "Erika", "display": "Given name" },
                                "age_over_18": { "value": true, "display": "Over 18" }
                            }
                        }
                    }]
                },
                "dc+sd-jwt": {
                    "https://example.com/pid": [{
                        "id": "pid1",
                        "title": "Person ID",
                        "paths": {
                            "given_name": { "value": "Erika", "display": "Given name" },
                            "nationality": { "value": "UT", "display": "Nationality" }
                        }
                    }],
                    "https://example.com/pid-v2": [{
                        "id": "pid2",
                        "title": "Person ID v2",
                        "paths": {
                            "given_name": { "value": "Erika", "display": "Given name" }
                        }
                    }]
                }
            }
        }))
    }

    fn query(value: Json) -> DcqlQuery {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn matches_mdoc_claim_by_namespace_and_name() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc",
                "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                "claims": [
                    { "namespace": "org.iso.18013.5.1", "claim_name": "family_name" }
                ]
            }]
        }));

        let store = store();
        let results = query.execute(&store, MatchPolicy::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query.id, "c1");
        assert_eq!(results[0].candidates.len(), 1);
        assert_eq!(results[0].candidates[0].candidate.id, "mdl1");
        assert_eq!(results[0].candidates[0].claim_labels, ["Family name"]);
    }

    #[test]
    fn missing_claim_fails_the_whole_conjunction() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc",
                "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                "claims": [
                    { "namespace": "org.iso.18013.5.1", "claim_name": "family_name" },
                    { "namespace": "org.iso.18013.5.1", "claim_name": "portrait" }
                ]
            }]
        }));

        assert!(query.execute(&store(), MatchPolicy::default()).is_empty());
    }

    #[test]
    fn value_constraint_matches_any_declared_value() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "dc+sd-jwt",
                "meta": { "vct_values": ["https://example.com/pid"] },
                "claims": [
                    { "path": ["nationality"], "values": ["XX", "UT"] }
                ]
            }]
        }));

        let store = store();
        let results = query.execute(&store, MatchPolicy::default());
        assert_eq!(results[0].candidates[0].claim_labels, ["Nationality"]);
    }

    #[test]
    fn value_constraint_requires_deep_equality() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc",
                "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                "claims": [
                    // The stored value is the boolean true, not the string.
                    { "namespace": "org.iso.18013.5.1", "claim_name": "age_over_18", "values": ["true"] }
                ]
            }]
        }));

        assert!(query.execute(&store(), MatchPolicy::default()).is_empty());
    }

    #[test]
    fn first_satisfiable_claim_set_wins() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc",
                "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                "claims": [
                    { "id": "a", "namespace": "org.iso.18013.5.1", "claim_name": "portrait" },
                    { "id": "b", "namespace": "org.iso.18013.5.1", "claim_name": "given_name" },
                    { "id": "c", "namespace": "org.iso.18013.5.1", "claim_name": "family_name" }
                ],
                "claim_sets": [["a"], ["b", "c"], ["c"]]
            }]
        }));

        // "a" is unsatisfied, so the second set is accepted; the third is
        // never consulted even though it would also be satisfiable.
        let store = store();
        let results = query.execute(&store, MatchPolicy::default());
        assert_eq!(
            results[0].candidates[0].claim_labels,
            ["Given name", "Family name"]
        );
    }

    #[test]
    fn claim_set_referencing_unknown_id_is_skipped() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc",
                "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                "claims": [
                    { "id": "a", "namespace": "org.iso.18013.5.1", "claim_name": "family_name" }
                ],
                "claim_sets": [["a", "ghost"], ["a"]]
            }]
        }));

        let store = store();
        let results = query.execute(&store, MatchPolicy::default());
        assert_eq!(results[0].candidates[0].claim_labels, ["Family name"]);
    }

    #[test]
    fn no_claims_accepts_all_candidates_with_all_labels() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc",
                "meta": { "doctype_value": "org.iso.18013.5.1.mDL" }
            }]
        }));

        let store = store();
        let results = query.execute(&store, MatchPolicy::default());
        assert_eq!(
            results[0].candidates[0].claim_labels,
            ["Family name", "Given name", "Over 18"]
        );
    }

    #[test]
    fn vct_union_preserves_declared_order() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "dc+sd-jwt",
                "meta": { "vct_values": ["https://example.com/pid-v2", "https://example.com/pid"] },
                "claims": [
                    { "path": ["given_name"] }
                ]
            }]
        }));

        let store = store();
        let results = query.execute(&store, MatchPolicy::default());
        let ids: Vec<&str> = results[0]
            .candidates
            .iter()
            .map(|m| m.candidate.id.as_str())
            .collect();
        assert_eq!(ids, ["pid2", "pid1"]);
    }

    #[test]
    fn unsupported_format_yields_no_candidates() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "ldp_vc",
                "meta": { "doctype_value": "irrelevant" }
            }]
        }));

        assert!(query.execute(&store(), MatchPolicy::default()).is_empty());
    }

    #[test]
    fn unknown_format_is_rejected_even_when_stored() {
        // The store holds a bucket for the format, but the matcher does not
        // evaluate it; the query must not fall through to the SD-JWT path.
        let store = CredentialStore::from_document(&json!({
            "credentials": {
                "ldp_vc": {
                    "https://example.com/vc": [{
                        "id": "vc1",
                        "title": "Linked Data VC",
                        "paths": {
                            "given_name": { "value": "Erika", "display": "Given name" }
                        }
                    }]
                }
            }
        }));
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "ldp_vc",
                "meta": { "vct_values": ["https://example.com/vc"] },
                "claims": [{ "path": ["given_name"] }]
            }]
        }));

        assert!(query.execute(&store, MatchPolicy::default()).is_empty());
    }

    #[test]
    fn missing_meta_yields_no_candidates() {
        let query = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "mso_mdoc"
            }]
        }));

        assert!(query.execute(&store(), MatchPolicy::default()).is_empty());
    }

    #[test]
    fn at_least_one_policy_reports_partial_matches() {
        let query = query(json!({
            "credentials": [
                {
                    "id": "c1",
                    "format": "mso_mdoc",
                    "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                    "claims": [{ "namespace": "org.iso.18013.5.1", "claim_name": "family_name" }]
                },
                {
                    "id": "c2",
                    "format": "mso_mdoc",
                    "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                    "claims": [{ "namespace": "org.iso.18013.5.1", "claim_name": "portrait" }]
                }
            ]
        }));

        let store = store();
        let results = query.execute(&store, MatchPolicy::AtLeastOne);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query.id, "c1");
    }

    #[test]
    fn require_all_policy_suppresses_partial_matches() {
        let query = query(json!({
            "credentials": [
                {
                    "id": "c1",
                    "format": "mso_mdoc",
                    "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                    "claims": [{ "namespace": "org.iso.18013.5.1", "claim_name": "family_name" }]
                },
                {
                    "id": "c2",
                    "format": "mso_mdoc",
                    "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
                    "claims": [{ "namespace": "org.iso.18013.5.1", "claim_name": "portrait" }]
                }
            ]
        }));

        assert!(query.execute(&store(), MatchPolicy::RequireAll).is_empty());
    }

    #[test]
    fn dropping_a_value_constraint_never_shrinks_the_matched_set() {
        let constrained = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "dc+sd-jwt",
                "meta": { "vct_values": ["https://example.com/pid"] },
                "claims": [{ "path": ["nationality"], "values": ["UT"] }]
            }]
        }));
        let unconstrained = query(json!({
            "credentials": [{
                "id": "c1",
                "format": "dc+sd-jwt",
                "meta": { "vct_values": ["https://example.com/pid"] },
                "claims": [{ "path": ["nationality"] }]
            }]
        }));

        let store = store();
        let constrained = constrained.execute(&store, MatchPolicy::default());
        let unconstrained = unconstrained.execute(&store, MatchPolicy::default());
        assert!(constrained[0].candidates.len() <= unconstrained[0].candidates.len());
    }
}
