use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{core::credential_format::CredentialFormat, utils::NonEmptyVec};

/// A DCQL query object.
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DcqlQuery {
    /// REQUIRED. Credential Queries that specify the requested credentials.
    pub credentials: NonEmptyVec<CredentialQuery>,
}

/// A Credential Query object.
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialQuery {
    /// REQUIRED. Identifies the Credential in the response; unique within
    /// the DCQL query.
    pub id: String,

    /// REQUIRED. The requested credential format.
    pub format: CredentialFormat,

    /// OPTIONAL. Format-specific metadata constraints: `doctype_value` for
    /// `mso_mdoc`, `vct_values` (and, for the phone-number-verification
    /// profile, `credential_authorization_jwt`) for SD-JWT formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, Json>>,

    /// OPTIONAL. Claims requested from the credential. When absent, every
    /// candidate of the requested format and meta passes, with all of its
    /// claims offered for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<NonEmptyVec<ClaimQuery>>,

    /// OPTIONAL. Alternative combinations of claim-query ids; satisfying any
    /// one combination suffices. MUST NOT be present if `claims` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_sets: Option<NonEmptyVec<Vec<String>>>,
}

impl CredentialQuery {
    /// The `doctype_value` meta constraint (mdoc formats).
    pub fn doctype_value(&self) -> Option<&str> {
        self.meta.as_ref()?.get("doctype_value")?.as_str()
    }

    /// The `vct_values` meta constraint (SD-JWT formats), in declared order.
    pub fn vct_values(&self) -> Option<Vec<&str>> {
        let values = self.meta.as_ref()?.get("vct_values")?.as_array()?;
        Some(values.iter().filter_map(Json::as_str).collect())
    }

    /// The compact credential-authorization token carried in meta by the
    /// phone-number-verification profile.
    pub fn credential_authorization_jwt(&self) -> Option<&str> {
        self.meta
            .as_ref()?
            .get("credential_authorization_jwt")?
            .as_str()
    }
}

/// A Claims Query object.
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.3>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClaimQuery {
    /// REQUIRED if the Credential Query uses `claim_sets`, OPTIONAL
    /// otherwise. Identifies this claim within the Credential Query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Namespace of the claim (flat formats such as `mso_mdoc`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Claim name within the namespace (flat formats).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,

    /// Claims path pointer into the credential's claims tree (nested
    /// formats such as SD-JWT).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<NonEmptyVec<String>>,

    /// OPTIONAL. Expected claim values; the claim matches when its resolved
    /// value deep-equals any entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<NonEmptyVec<Json>>,
}

/// How a claim query addresses a claim inside a candidate's claims tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAddress<'a> {
    /// Two-level namespace/name lookup (flat formats).
    Namespaced {
        namespace: &'a str,
        claim_name: &'a str,
    },
    /// Ordered walk of path segments (nested formats).
    Path(&'a [String]),
}

impl ClaimQuery {
    /// The claim's addressing scheme. A claim query that declares neither a
    /// namespace/name pair nor a path cannot address anything and is never
    /// satisfied.
    pub fn address(&self) -> Option<ClaimAddress<'_>> {
        if let (Some(namespace), Some(claim_name)) = (&self.namespace, &self.claim_name) {
            return Some(ClaimAddress::Namespaced {
                namespace,
                claim_name,
            });
        }
        self.path.as_deref().map(ClaimAddress::Path)
    }
}
