//! Entity kinds and their fixed lookup table.
//!
//! Each kind carries its collection path, default populate shape and the
//! order in which an opaque identifier is interpreted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::query::{Populate, QuerySpec, Relation};

/// Catalog entity kinds served by the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Product,
    Category,
    Version,
    ProductImage,
}

impl EntityKind {
    /// Every kind.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Product,
        EntityKind::Category,
        EntityKind::Version,
        EntityKind::ProductImage,
    ];

    /// Machine name.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Category => "category",
            EntityKind::Version => "version",
            EntityKind::ProductImage => "productImage",
        }
    }

    /// Collection path on the content store.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Category => "product-categories",
            EntityKind::Version => "product-versions",
            EntityKind::ProductImage => "product-images",
        }
    }

    /// Identifier interpretations, in the order they are tried.
    pub fn candidate_fields(self) -> &'static [CandidateField] {
        use CandidateField::{DocumentId, NumericId, Slug};
        match self {
            EntityKind::Product | EntityKind::Version => &[DocumentId, NumericId, Slug],
            EntityKind::Category => &[NumericId, Slug, DocumentId],
            EntityKind::ProductImage => &[DocumentId],
        }
    }

    /// Relations every lookup of this kind populates.
    pub fn default_populate(self) -> Populate {
        match self {
            EntityKind::Product => {
                Populate::list(["product_category", "product_version", "productimages"])
            }
            EntityKind::Category => Populate::map([("images", file_relation())]),
            EntityKind::Version => Populate::map([
                ("product", Relation::Include),
                ("productImages", file_relation()),
                ("specs", Relation::Include),
            ]),
            EntityKind::ProductImage => Populate::map([("file", Relation::populate_all())]),
        }
    }

    /// Candidates for `identifier`, in priority order.
    ///
    /// The numeric candidate is left out when the identifier is not an
    /// integer; such a filter could never match.
    pub fn candidates(self, identifier: &str) -> Vec<Candidate> {
        self.candidate_fields()
            .iter()
            .filter_map(|field| field.candidate(identifier))
            .collect()
    }
}

/// `{populate: {file: {populate: "*"}}}`.
fn file_relation() -> Relation {
    Relation::nested(QuerySpec::new().with_populate(Populate::map([(
        "file",
        Relation::populate_all(),
    )])))
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

/// One way of reading an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateField {
    DocumentId,
    NumericId,
    Slug,
}

impl CandidateField {
    /// Field name filtered on.
    pub fn field_name(self) -> &'static str {
        match self {
            CandidateField::DocumentId => "documentId",
            CandidateField::NumericId => "id",
            CandidateField::Slug => "slug",
        }
    }

    fn candidate(self, identifier: &str) -> Option<Candidate> {
        match self {
            CandidateField::DocumentId => Some(Candidate::DocumentId(identifier.to_string())),
            CandidateField::NumericId => identifier.parse().ok().map(Candidate::NumericId),
            CandidateField::Slug => Some(Candidate::Slug(identifier.to_string())),
        }
    }
}

/// An identifier bound to one interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    DocumentId(String),
    NumericId(i64),
    Slug(String),
}

impl Candidate {
    /// Field name filtered on.
    pub fn field_name(&self) -> &'static str {
        match self {
            Candidate::DocumentId(_) => CandidateField::DocumentId.field_name(),
            Candidate::NumericId(_) => CandidateField::NumericId.field_name(),
            Candidate::Slug(_) => CandidateField::Slug.field_name(),
        }
    }

    /// `{$eq: value}` condition for this candidate.
    pub fn condition(&self) -> Value {
        match self {
            Candidate::DocumentId(v) | Candidate::Slug(v) => json!({ "$eq": v }),
            Candidate::NumericId(v) => json!({ "$eq": v }),
        }
    }
}
