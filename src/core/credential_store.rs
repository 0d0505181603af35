use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

/// Byte range of a candidate's icon within the host-owned icon blob.
///
/// The matcher never dereferences the range; it is passed through to the
/// registration sink, which owns the blob and its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconRef {
    pub start: usize,
    pub length: usize,
}

/// A leaf claim: the stored value and the label shown when it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimLeaf {
    pub value: Json,
    pub display: Option<String>,
}

/// One node of a candidate's claims tree.
///
/// Leafness is decided once, when the store is built: an object carrying a
/// `display` or `value` member is a leaf, any other object is a branch.
/// Traversal never has to re-inspect raw JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimNode {
    Leaf(ClaimLeaf),
    Branch(Vec<(String, ClaimNode)>),
    List(Vec<ClaimNode>),
}

impl ClaimNode {
    /// Build a claims tree from a flat `namespaces` object
    /// (namespace → claim name → `{value, display}`).
    fn from_namespaces(value: &Json) -> Self {
        let Some(namespaces) = value.as_object() else {
            return Self::Branch(vec![]);
        };
        let branches = namespaces
            .iter()
            .map(|(namespace, claims)| {
                let leaves = claims
                    .as_object()
                    .map(|claims| {
                        claims
                            .iter()
                            .map(|(name, claim)| (name.clone(), Self::leaf_from(claim)))
                            .collect()
                    })
                    .unwrap_or_default();
                (namespace.clone(), Self::Branch(leaves))
            })
            .collect();
        Self::Branch(branches)
    }

    /// Build a claims tree from a nested `paths` object, deciding leafness
    /// per node.
    fn from_paths(value: &Json) -> Self {
        let Some(members) = value.as_object() else {
            return Self::Branch(vec![]);
        };
        let nodes = members
            .iter()
            .map(|(segment, node)| (segment.clone(), Self::node_from(node)))
            .collect();
        Self::Branch(nodes)
    }

    fn node_from(value: &Json) -> Self {
        match value {
            Json::Object(members) => {
                if members.contains_key("display") || members.contains_key("value") {
                    Self::leaf_from(value)
                } else {
                    Self::from_paths(value)
                }
            }
            Json::Array(items) => Self::List(items.iter().map(Self::node_from).collect()),
            other => Self::Leaf(ClaimLeaf {
                value: other.clone(),
                display: None,
            }),
        }
    }

    fn leaf_from(value: &Json) -> Self {
        let members = value.as_object();
        Self::Leaf(ClaimLeaf {
            value: members
                .and_then(|m| m.get("value"))
                .cloned()
                .unwrap_or(Json::Null),
            display: members
                .and_then(|m| m.get("display"))
                .and_then(Json::as_str)
                .map(String::from),
        })
    }

    /// Look up a direct child by segment name. Only branches have children.
    pub fn get(&self, segment: &str) -> Option<&ClaimNode> {
        match self {
            Self::Branch(children) => children
                .iter()
                .find(|(name, _)| name == segment)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Walk the tree one segment at a time, failing on the first segment
    /// that is absent from the current node.
    pub fn resolve<'a, I>(&self, segments: I) -> Option<&ClaimNode>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    pub fn as_leaf(&self) -> Option<&ClaimLeaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Collect every reachable leaf display label, in tree order. Branches
    /// are recursed into, lists are iterated, and leaves without a label
    /// contribute nothing.
    pub fn collect_labels(&self, labels: &mut Vec<String>) {
        match self {
            Self::Leaf(leaf) => {
                if let Some(display) = &leaf.display {
                    labels.push(display.clone());
                }
            }
            Self::Branch(children) => {
                for (_, child) in children {
                    child.collect_labels(labels);
                }
            }
            Self::List(items) => {
                for item in items {
                    item.collect_labels(labels);
                }
            }
        }
    }
}

/// A locally stored credential considered for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub disclaimer: Option<String>,
    pub icon: Option<IconRef>,
    pub claims: ClaimNode,
}

impl Candidate {
    /// Parse one candidate entry of the store document. Entries missing an
    /// id or title are dropped; they could never be offered for selection.
    fn from_value(value: &Json) -> Option<Self> {
        let members = value.as_object()?;
        let id = members.get("id")?.as_str()?.to_string();
        let title = members.get("title")?.as_str()?.to_string();

        let claims = if let Some(namespaces) = members.get("namespaces") {
            ClaimNode::from_namespaces(namespaces)
        } else if let Some(paths) = members.get("paths") {
            ClaimNode::from_paths(paths)
        } else {
            ClaimNode::Branch(vec![])
        };

        Some(Self {
            id,
            title,
            subtitle: members
                .get("subtitle")
                .and_then(Json::as_str)
                .map(String::from),
            disclaimer: members
                .get("disclaimer")
                .and_then(Json::as_str)
                .map(String::from),
            icon: members
                .get("icon")
                .and_then(|icon| serde_json::from_value(icon.clone()).ok()),
            claims,
        })
    }
}

/// The wallet's credential store, indexed by format and then by the
/// format-specific type key (doctype for mdoc, vct for SD-JWT).
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    formats: Vec<FormatIndex>,
}

#[derive(Debug, Clone)]
struct FormatIndex {
    format: String,
    buckets: Vec<(String, Vec<Candidate>)>,
}

impl CredentialStore {
    /// Build the store index from the host's credential-store document.
    ///
    /// Construction never fails: entries that do not have the expected
    /// shape are dropped, leaving the affected bucket empty.
    pub fn from_document(document: &Json) -> Self {
        let Some(credentials) = document.get("credentials").and_then(Json::as_object) else {
            debug!("credential store document has no `credentials` object");
            return Self::default();
        };

        let formats = credentials
            .iter()
            .filter_map(|(format, index)| {
                let index = index.as_object()?;
                let buckets = index
                    .iter()
                    .filter_map(|(type_key, candidates)| {
                        let candidates = candidates
                            .as_array()?
                            .iter()
                            .filter_map(Candidate::from_value)
                            .collect::<Vec<_>>();
                        Some((type_key.clone(), candidates))
                    })
                    .collect();
                Some(FormatIndex {
                    format: format.clone(),
                    buckets,
                })
            })
            .collect();

        Self { formats }
    }

    /// The candidates stored under one format/type-key pair, in store
    /// order. An unknown format or type key yields an empty slice.
    pub fn bucket(&self, format: &str, type_key: &str) -> &[Candidate] {
        self.formats
            .iter()
            .find(|index| index.format == format)
            .and_then(|index| {
                index
                    .buckets
                    .iter()
                    .find(|(key, _)| key == type_key)
                    .map(|(_, candidates)| candidates.as_slice())
            })
            .unwrap_or(&[])
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.formats.iter().any(|index| index.format == format)
    }
}
