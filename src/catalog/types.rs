//! Directory catalog and business-profile types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Coarse importance ranking for a directory.
///
/// Orders both job execution (high-tier jobs drain first) and health-check
/// frequency (high-tier directories are checked far more often).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Checked least frequently, drained last
    Low,
    /// Middle of the road
    Medium,
    /// Checked most frequently, drained first
    High,
}

impl Tier {
    /// Returns a human-readable label for the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

/// How difficult a directory's submission flow is to automate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

/// Requirement flags recorded for a directory.
///
/// These describe obstacles the submission flow must expect; they do not by
/// themselves exclude a directory from the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementFlags {
    /// The directory requires an authenticated account to submit.
    #[serde(default)]
    pub requires_login: bool,
    /// Known anti-bot defenses on the submission page.
    #[serde(default)]
    pub has_anti_bot: bool,
    /// A CAPTCHA gates the submission form.
    #[serde(default)]
    pub has_captcha: bool,
}

/// One known directory, loaded from the catalog file.
///
/// Immutable after load; refreshed only by an explicit catalog reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryDescriptor {
    /// Stable identifier, unique within the catalog
    pub id: String,
    /// Display name
    pub name: String,
    /// URL of the submission form page
    pub submission_url: String,
    /// Business category the directory serves
    pub category: String,
    /// Priority tier
    pub tier: Tier,
    /// Logical field name → CSS locator for the submission form.
    /// A `BTreeMap` keeps iteration order stable across runs.
    pub field_mapping: BTreeMap<String, String>,
    /// Requirement flags
    #[serde(default)]
    pub flags: RequirementFlags,
    /// Automation difficulty
    pub difficulty: Difficulty,
    /// Domain-authority score, used for tie-breaking within a tier
    #[serde(default)]
    pub domain_authority: u32,
}

/// The business-data payload submitted to each directory.
///
/// Field names mirror the logical keys used in catalog field mappings, so a
/// mapping key resolves to a payload value by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub business_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl BusinessProfile {
    /// Resolves a logical field name to its payload value.
    ///
    /// Returns `None` for unknown field names so callers can decide whether a
    /// missing value is an error for the directory at hand.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "business_name" | "name" => &self.business_name,
            "address" => &self.address,
            "city" => &self.city,
            "region" | "state" => &self.region,
            "postal_code" | "zip" => &self.postal_code,
            "phone" => &self.phone,
            "email" => &self.email,
            "website" | "url" => &self.website,
            "description" => &self.description,
            "category" => &self.category,
            _ => return None,
        };
        Some(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        // High must sort above Medium above Low for priority queues built on
        // the derived Ord.
        assert!(Tier::High > Tier::Medium);
        assert!(Tier::Medium > Tier::Low);
    }

    #[test]
    fn test_tier_serde_lowercase() {
        let t: Tier = serde_json::from_str("\"high\"").expect("tier should parse");
        assert_eq!(t, Tier::High);
        assert_eq!(serde_json::to_string(&Tier::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn test_profile_field_lookup() {
        let profile = BusinessProfile {
            business_name: "Acme Plumbing".into(),
            phone: "555-0100".into(),
            ..Default::default()
        };
        assert_eq!(profile.field("business_name"), Some("Acme Plumbing"));
        assert_eq!(profile.field("name"), Some("Acme Plumbing"));
        assert_eq!(profile.field("phone"), Some("555-0100"));
        assert_eq!(profile.field("fax"), None);
    }

    #[test]
    fn test_requirement_flags_default() {
        let flags = RequirementFlags::default();
        assert!(!flags.requires_login);
        assert!(!flags.has_anti_bot);
        assert!(!flags.has_captcha);
    }
}
