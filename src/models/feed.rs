//! Feed identity hashing

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::models::Feed;

/// A feed attribute that participates in the identity hash
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum IdentityField {
    #[strum(serialize = "name")]
    #[serde(rename = "name")]
    Name,
    #[strum(serialize = "url")]
    #[serde(rename = "url")]
    Url,
    #[strum(serialize = "tvg_id")]
    #[serde(rename = "tvg_id")]
    GuideId,
}

impl IdentityField {
    /// Parse a comma separated field list such as `name,url,tvg_id` into
    /// canonical order. Duplicates collapse; unknown names are dropped with
    /// a warning.
    pub fn parse_list(raw: &str) -> Vec<IdentityField> {
        let mut fields = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse::<IdentityField>() {
                Ok(field) if !fields.contains(&field) => fields.push(field),
                Ok(_) => {}
                Err(_) => warn!("Ignoring unknown identity field '{}'", part),
            }
        }
        fields.sort();
        fields
    }

    pub fn join(fields: &[IdentityField]) -> String {
        fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// SHA-256 over the canonical JSON of the selected fields (keys sorted,
/// missing values as `null`), hex encoded.
pub fn compute_identity_hash(
    fields: &[IdentityField],
    name: &str,
    url: &str,
    guide_id: Option<&str>,
) -> String {
    let mut parts: BTreeMap<String, Option<&str>> = BTreeMap::new();
    for field in fields {
        let value = match field {
            IdentityField::Name => Some(name),
            IdentityField::Url => Some(url),
            IdentityField::GuideId => guide_id,
        };
        parts.insert(field.to_string(), value);
    }

    // A BTreeMap of plain strings always serializes
    let canonical = serde_json::to_string(&parts).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

impl Feed {
    pub fn compute_identity_hash(&self, fields: &[IdentityField]) -> String {
        compute_identity_hash(fields, &self.name, &self.url, self.guide_id.as_deref())
    }
}
