//! # Region Catalog
//!
//! Provider → region id → display name lookup, plus the text heuristics the
//! RSS normalizer uses to pull region hints out of free-form titles.
//!
//! - Built-in seed covers the regions the dashboard plots.
//! - Extra entries can be merged from configuration.
//! - Lookups never fail: an unknown id resolves to itself.

use crate::model::{Provider, GLOBAL_REGION};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    names: HashMap<Provider, BTreeMap<String, String>>,
}

impl RegionCatalog {
    /// Empty catalog; every lookup falls back to the raw token.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in seed.
    pub fn builtin() -> Self {
        let mut cat = Self::default();
        for (id, name) in [
            ("us-east-1", "US East (N. Virginia)"),
            ("us-east-2", "US East (Ohio)"),
            ("us-west-1", "US West (N. California)"),
            ("us-west-2", "US West (Oregon)"),
            ("ca-central-1", "Canada (Central)"),
            ("sa-east-1", "South America (Sao Paulo)"),
            ("eu-west-1", "Europe (Ireland)"),
            ("eu-west-2", "Europe (London)"),
            ("eu-west-3", "Europe (Paris)"),
            ("eu-central-1", "Europe (Frankfurt)"),
            ("eu-north-1", "Europe (Stockholm)"),
            ("ap-southeast-1", "Asia Pacific (Singapore)"),
            ("ap-southeast-2", "Asia Pacific (Sydney)"),
            ("ap-northeast-1", "Asia Pacific (Tokyo)"),
            ("ap-northeast-2", "Asia Pacific (Seoul)"),
            ("ap-south-1", "Asia Pacific (Mumbai)"),
            ("af-south-1", "Africa (Cape Town)"),
            ("me-south-1", "Middle East (Bahrain)"),
        ] {
            cat.insert(Provider::Aws, id, name);
        }
        for (id, name) in [
            ("eastus", "East US"),
            ("eastus2", "East US 2"),
            ("westus", "West US"),
            ("westus2", "West US 2"),
            ("centralus", "Central US"),
            ("northeurope", "North Europe"),
            ("westeurope", "West Europe"),
            ("uksouth", "UK South"),
            ("ukwest", "UK West"),
            ("francecentral", "France Central"),
            ("eastasia", "East Asia"),
            ("southeastasia", "Southeast Asia"),
            ("japaneast", "Japan East"),
            ("japanwest", "Japan West"),
            ("australiaeast", "Australia East"),
            ("canadacentral", "Canada Central"),
            ("brazilsouth", "Brazil South"),
            ("southafricanorth", "South Africa North"),
            ("uaenorth", "UAE North"),
        ] {
            cat.insert(Provider::Azure, id, name);
        }
        for (id, name) in [
            ("us-central1", "Iowa"),
            ("us-east1", "South Carolina"),
            ("us-east4", "Northern Virginia"),
            ("us-west1", "Oregon"),
            ("us-west2", "Los Angeles"),
            ("us-west3", "Salt Lake City"),
            ("us-west4", "Las Vegas"),
            ("europe-west1", "Belgium"),
            ("europe-west2", "London"),
            ("europe-west3", "Frankfurt"),
            ("europe-west4", "Netherlands"),
            ("europe-west6", "Zurich"),
            ("europe-north1", "Finland"),
            ("asia-east1", "Taiwan"),
            ("asia-east2", "Hong Kong"),
            ("asia-northeast1", "Tokyo"),
            ("asia-northeast2", "Osaka"),
            ("asia-northeast3", "Seoul"),
            ("asia-south1", "Mumbai"),
            ("asia-southeast1", "Singapore"),
            ("asia-southeast2", "Jakarta"),
            ("australia-southeast1", "Sydney"),
        ] {
            cat.insert(Provider::Gcp, id, name);
        }
        for (id, name) in [
            ("us-ashburn-1", "US East (Ashburn)"),
            ("us-phoenix-1", "US West (Phoenix)"),
            ("us-sanjose-1", "US West (San Jose)"),
            ("eu-frankfurt-1", "Germany Central (Frankfurt)"),
            ("eu-zurich-1", "Switzerland North (Zurich)"),
            ("uk-london-1", "UK South (London)"),
            ("ap-tokyo-1", "Japan East (Tokyo)"),
            ("ap-osaka-1", "Japan Central (Osaka)"),
            ("ap-sydney-1", "Australia East (Sydney)"),
            ("ap-melbourne-1", "Australia Southeast (Melbourne)"),
            ("ca-toronto-1", "Canada Southeast (Toronto)"),
            ("sa-saopaulo-1", "Brazil East (Sao Paulo)"),
            ("me-jeddah-1", "Saudi Arabia West (Jeddah)"),
            ("af-johannesburg-1", "South Africa Central (Johannesburg)"),
        ] {
            cat.insert(Provider::Oci, id, name);
        }
        cat
    }

    pub fn insert(&mut self, provider: Provider, id: &str, name: &str) {
        self.names
            .entry(provider)
            .or_default()
            .insert(id.trim().to_ascii_lowercase(), name.trim().to_string());
    }

    /// Merge `(provider → id → name)` entries, overriding existing ones.
    pub fn extend(&mut self, extra: &HashMap<Provider, BTreeMap<String, String>>) {
        for (p, entries) in extra {
            for (id, name) in entries {
                self.insert(*p, id, name);
            }
        }
    }

    /// Display name for a region id; the raw token when unmapped.
    pub fn resolve_name(&self, provider: Provider, region_id: &str) -> String {
        let key = region_id.trim().to_ascii_lowercase();
        self.names
            .get(&provider)
            .and_then(|m| m.get(&key))
            .cloned()
            .unwrap_or_else(|| region_id.to_string())
    }

    pub fn is_known(&self, provider: Provider, region_id: &str) -> bool {
        self.names
            .get(&provider)
            .is_some_and(|m| m.contains_key(&region_id.to_ascii_lowercase()))
    }

    pub fn known_ids(&self, provider: Provider) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .get(&provider)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Region hints found in RSS text, in order of discovery.
    ///
    /// 1. `[region]` bracket token
    /// 2. known region ids (as whole words)
    /// 3. known display names (Azure titles use "East US" style names)
    /// 4. provider-specific id shape
    ///
    /// Falls back to `global`.
    pub fn hints_from_text(&self, provider: Provider, text: &str) -> Vec<String> {
        let lower = text.to_ascii_lowercase();
        let mut out: Vec<String> = Vec::new();

        static RE_BRACKET: OnceCell<Regex> = OnceCell::new();
        let re_bracket = RE_BRACKET.get_or_init(|| Regex::new(r"\[([\w-]+)\]").unwrap());
        for caps in re_bracket.captures_iter(&lower) {
            // "[RESOLVED]" style tags are not regions.
            let token = &caps[1];
            if token.chars().any(|c| c.is_ascii_digit()) || self.is_known(provider, token) {
                push_unique(&mut out, token);
            }
        }

        for (id, _) in self.known_ids(provider) {
            if contains_word(&lower, id) {
                push_unique(&mut out, id);
            }
        }

        if provider == Provider::Azure {
            // Longest names first so "East US 2" wins over "East US".
            let mut by_name: Vec<(&str, &str)> = self.known_ids(provider).collect();
            by_name.sort_by_key(|(_, name)| std::cmp::Reverse(name.len()));
            let mut consumed = lower.clone();
            for (id, name) in by_name {
                let n = name.to_ascii_lowercase();
                if contains_word(&consumed, &n) {
                    push_unique(&mut out, id);
                    consumed = consumed.replace(&n, " ");
                }
            }
        }

        if let Some(re) = id_shape(provider) {
            for m in re.find_iter(&lower) {
                push_unique(&mut out, m.as_str());
            }
        }

        if out.is_empty() {
            out.push(GLOBAL_REGION.to_string());
        }
        out
    }
}

/// Pull `region` out of `"Product name (region)"`; lowercase, spaces → `-`.
pub fn parenthesized_region(name: &str) -> Option<String> {
    static RE_PAREN: OnceCell<Regex> = OnceCell::new();
    let re = RE_PAREN.get_or_init(|| Regex::new(r"\(([^)]+)\)").unwrap());
    re.captures(name).and_then(|c| {
        let ws = c[1].split_whitespace().collect::<Vec<_>>().join("-");
        let id = ws.to_ascii_lowercase();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    })
}

/// Strip a trailing `(region)` from a component name.
pub fn strip_parenthesized(name: &str) -> String {
    match name.find('(') {
        Some(i) if i > 0 => name[..i].trim().to_string(),
        _ => name.trim().to_string(),
    }
}

fn id_shape(provider: Provider) -> Option<&'static Regex> {
    static AWS: OnceCell<Regex> = OnceCell::new();
    static GCP: OnceCell<Regex> = OnceCell::new();
    static OCI: OnceCell<Regex> = OnceCell::new();
    match provider {
        Provider::Aws => Some(AWS.get_or_init(|| {
            Regex::new(r"\b(?:us|eu|ap|sa|ca|me|af|il|mx)(?:-gov)?-[a-z]+-\d\b").unwrap()
        })),
        Provider::Gcp => Some(GCP.get_or_init(|| {
            Regex::new(r"\b(?:us|europe|asia|australia|northamerica|southamerica|me|africa)-[a-z]+\d\b")
                .unwrap()
        })),
        Provider::Oci => Some(OCI.get_or_init(|| {
            Regex::new(r"\b(?:us|eu|uk|ap|ca|sa|me|af|il|mx)-[a-z]+-\d\b").unwrap()
        })),
        Provider::Azure => None,
    }
}

fn push_unique(out: &mut Vec<String>, id: &str) {
    if !out.iter().any(|x| x == id) {
        out.push(id.to_string());
    }
}

/// Case-sensitive whole-word containment; callers lowercase both sides.
/// Hyphens count as word characters so `us-east-1` does not match `us-east-12`.
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '-' || c == '_';
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return true;
        }
        from = start + needle.len().max(1);
        if from >= haystack.len() {
            break;
        }
    }
    false
}
