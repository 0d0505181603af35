use core::fmt;
use std::{borrow::Cow, str::FromStr};

use serde::{Deserialize, Serialize};

const FORMAT_MSO_MDOC: &str = "mso_mdoc";
const FORMAT_DC_SD_JWT: &str = "dc+sd-jwt";
const FORMAT_DC_SD_JWT_PNV: &str = "dc+sd-jwt-pnv";

/// The credential format requested by a credential query.
///
/// The format determines how claims are addressed: ISO mdoc credentials use
/// a flat namespace/element scheme, while SD-JWT credentials carry an
/// arbitrarily nested claims tree addressed by path arrays.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CredentialFormat {
    /// ISO/IEC 18013-5 mobile documents (`mso_mdoc`).
    MsoMdoc,

    /// IETF SD-JWT Verifiable Credentials (`dc+sd-jwt`).
    DcSdJwt,

    /// SD-JWT phone number verification credentials (`dc+sd-jwt-pnv`),
    /// which additionally carry aggregator consent data in the query meta.
    DcSdJwtPnv,

    /// A format this matcher does not evaluate. Queries for such formats
    /// yield zero candidates rather than an error.
    Other(String),
}

impl CredentialFormat {
    pub fn from_name(name: Cow<str>) -> Self {
        match name.as_ref() {
            FORMAT_MSO_MDOC => Self::MsoMdoc,
            FORMAT_DC_SD_JWT => Self::DcSdJwt,
            FORMAT_DC_SD_JWT_PNV => Self::DcSdJwtPnv,
            _ => Self::Other(name.into_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::MsoMdoc => FORMAT_MSO_MDOC,
            Self::DcSdJwt => FORMAT_DC_SD_JWT,
            Self::DcSdJwtPnv => FORMAT_DC_SD_JWT_PNV,
            Self::Other(other) => other,
        }
    }

    /// Whether claims are addressed as flat namespace/name pairs rather than
    /// nested path arrays.
    pub fn is_namespaced(&self) -> bool {
        matches!(self, Self::MsoMdoc)
    }
}

impl From<&str> for CredentialFormat {
    fn from(s: &str) -> Self {
        Self::from_name(Cow::Borrowed(s))
    }
}

impl From<String> for CredentialFormat {
    fn from(value: String) -> Self {
        Self::from_name(Cow::Owned(value))
    }
}

impl FromStr for CredentialFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl Serialize for CredentialFormat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CredentialFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Into::into)
    }
}
