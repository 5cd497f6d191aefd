//! Caller number resolution
//!
//! [`NumberResolver`] drives the reverse lookup over the [`ProbeSequence`] of
//! a normalized number and keeps the [`NotFoundStore`] up to date, so numbers
//! without a name are not looked up again on later calls.

pub mod not_found;
pub mod probe;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::collaborators::ReverseLookup;
use crate::number::{AreaCodeTable, NormalizedNumber};

pub use not_found::NotFoundStore;
pub use probe::{generalize, is_fixed_range, ProbeSequence};

/// Outcome of resolving one caller number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCaller {
    /// Digits as received
    pub original_number: String,
    /// Full national number, area code included
    pub normalized_number: String,
    pub resolved_name: Option<String>,
    /// The probe the name was found for
    pub matched_number: Option<String>,
    /// Lookups performed
    pub probes: usize,
    variants: Vec<String>,
}

impl ResolvedCaller {
    fn unresolved(normalized: &NormalizedNumber, full: &str, probes: usize) -> Self {
        Self {
            original_number: normalized.original().to_string(),
            normalized_number: full.to_string(),
            resolved_name: None,
            matched_number: None,
            probes,
            variants: normalized.variants().into_iter().map(String::from).collect(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_name.is_some()
    }

    /// Every distinct number the resolved name belongs to: the matched probe,
    /// the full number and the forms it was received in. Empty when
    /// unresolved.
    pub fn aliases(&self) -> Vec<&str> {
        let Some(matched) = &self.matched_number else {
            return Vec::new();
        };
        let mut aliases = vec![matched.as_str()];
        let rest = std::iter::once(self.normalized_number.as_str())
            .chain(self.variants.iter().map(String::as_str));
        for alias in rest {
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        aliases
    }
}

/// Reverse lookup with progressive generalization and a negative cache
pub struct NumberResolver {
    lookup: Arc<dyn ReverseLookup>,
    area_codes: Arc<AreaCodeTable>,
    not_found: Arc<NotFoundStore>,
}

impl NumberResolver {
    pub fn new(
        lookup: Arc<dyn ReverseLookup>,
        area_codes: Arc<AreaCodeTable>,
        not_found: Arc<NotFoundStore>,
    ) -> Self {
        Self {
            lookup,
            area_codes,
            not_found,
        }
    }

    pub fn not_found(&self) -> &Arc<NotFoundStore> {
        &self.not_found
    }

    /// Resolve one number.
    ///
    /// International numbers are never looked up; they go straight to the
    /// not-found set, as do numbers too short to probe. A failing lookup
    /// counts as "not found" for that probe.
    pub async fn resolve(&self, normalized: &NormalizedNumber) -> ResolvedCaller {
        let full = match normalized {
            NormalizedNumber::International(number) => {
                info!("Ignoring international number {}", number);
                self.not_found.insert(number).await;
                return ResolvedCaller::unresolved(normalized, number, 0);
            }
            NormalizedNumber::National { full, .. } => full,
        };

        let prefix_len = self.area_codes.prefix_len(full);
        let mut probes = 0;
        let mut variants_recorded = false;

        for probe in ProbeSequence::new(full, prefix_len) {
            probes += 1;
            match self.lookup.lookup(&probe).await {
                Ok(Some(name)) if !name.trim().is_empty() => {
                    info!("{} = {}", probe, name);
                    let mut resolved = ResolvedCaller::unresolved(normalized, full, probes);
                    resolved.resolved_name = Some(name.trim().to_string());
                    resolved.matched_number = Some(probe);
                    return resolved;
                }
                Ok(_) => info!("{} not found", probe),
                Err(e) => warn!("Lookup of {} failed, treating as not found: {}", probe, e),
            }

            self.not_found.insert(&probe).await;
            if !variants_recorded {
                for variant in normalized.variants() {
                    self.not_found.insert(variant).await;
                }
                variants_recorded = true;
            }
        }

        // Too short to probe at all
        if !variants_recorded {
            for variant in normalized.variants() {
                self.not_found.insert(variant).await;
            }
        }
        debug!("{} remains unresolved after {} probe(s)", full, probes);
        ResolvedCaller::unresolved(normalized, full, probes)
    }

    /// Resolve several numbers into one number → name mapping keyed by every
    /// alias of every resolved caller
    pub async fn resolve_all(&self, numbers: &[NormalizedNumber]) -> BTreeMap<String, String> {
        let mut found = BTreeMap::new();
        for number in numbers {
            let resolved = self.resolve(number).await;
            if let Some(name) = &resolved.resolved_name {
                for alias in resolved.aliases() {
                    found.insert(alias.to_string(), name.clone());
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::number::NumberNormalizer;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedLookup {
        names: HashMap<String, String>,
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedLookup {
        fn with(names: &[(&str, &str)]) -> Self {
            Self {
                names: names
                    .iter()
                    .map(|(n, name)| (n.to_string(), name.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReverseLookup for ScriptedLookup {
        async fn lookup(&self, number: &str) -> Result<Option<String>> {
            self.calls.lock().unwrap().push(number.to_string());
            if self.failing.iter().any(|n| n == number) {
                return Err(Error::lookup(number, "connection reset"));
            }
            Ok(self.names.get(number).cloned())
        }
    }

    fn resolver(lookup: Arc<ScriptedLookup>, table: AreaCodeTable) -> NumberResolver {
        NumberResolver::new(lookup, Arc::new(table), Arc::new(NotFoundStore::in_memory()))
    }

    #[tokio::test]
    async fn test_international_never_looked_up() {
        let lookup = Arc::new(ScriptedLookup::default());
        let resolver = resolver(lookup.clone(), AreaCodeTable::default());
        let normalized = NumberNormalizer::new("06131").normalize("0041441234567").unwrap();

        let first = resolver.resolve(&normalized).await;
        let second = resolver.resolve(&normalized).await;

        assert!(!first.is_resolved() && !second.is_resolved());
        assert!(lookup.calls().is_empty());
        assert_eq!(resolver.not_found().snapshot().await, vec!["0041441234567"]);
    }

    #[tokio::test]
    async fn test_local_number_generalized_until_found() {
        let lookup = Arc::new(ScriptedLookup::with(&[("0613134560", "Firma Beispiel")]));
        let resolver = resolver(lookup.clone(), AreaCodeTable::default());
        let normalized = NumberNormalizer::new("06131").normalize("3456789").unwrap();

        let resolved = resolver.resolve(&normalized).await;

        assert_eq!(lookup.calls(), vec!["061313456789", "06131345670", "0613134560"]);
        assert_eq!(resolved.resolved_name.as_deref(), Some("Firma Beispiel"));
        assert_eq!(resolved.probes, 3);
        assert_eq!(
            resolved.aliases(),
            vec!["0613134560", "061313456789", "3456789"]
        );
        assert_eq!(
            resolver.not_found().snapshot().await,
            vec!["061313456789", "3456789", "06131345670"]
        );
    }

    #[tokio::test]
    async fn test_walk_stops_at_prefix_bound() {
        let lookup = Arc::new(ScriptedLookup::default());
        let resolver = resolver(lookup.clone(), AreaCodeTable::parse("06131\tMainz"));
        let normalized = NumberNormalizer::new("06131").normalize("3456789").unwrap();

        let resolved = resolver.resolve(&normalized).await;

        // prefix length 5: probes while longer than 8 digits
        assert_eq!(
            lookup.calls(),
            vec!["061313456789", "06131345670", "0613134560", "061313450"]
        );
        assert!(resolved.aliases().is_empty());
    }

    #[tokio::test]
    async fn test_mobile_probed_once() {
        let lookup = Arc::new(ScriptedLookup::default());
        let resolver = resolver(lookup.clone(), AreaCodeTable::default());
        let normalized = NumberNormalizer::new("06131").normalize("0151234567").unwrap();

        let resolved = resolver.resolve(&normalized).await;

        assert_eq!(lookup.calls(), vec!["0151234567"]);
        assert_eq!(resolved.probes, 1);
        assert!(resolver.not_found().contains("0151234567").await);
    }

    #[tokio::test]
    async fn test_lookup_failure_does_not_abort() {
        let mut scripted = ScriptedLookup::with(&[("06131345670", "Praxis Dr. Muster")]);
        scripted.failing.push("061313456789".into());
        let lookup = Arc::new(scripted);
        let resolver = resolver(lookup.clone(), AreaCodeTable::default());
        let normalized = NumberNormalizer::new("06131").normalize("3456789").unwrap();

        let resolved = resolver.resolve(&normalized).await;

        assert_eq!(resolved.matched_number.as_deref(), Some("06131345670"));
        assert!(resolver.not_found().contains("061313456789").await);
    }

    #[tokio::test]
    async fn test_found_mapping_keeps_original_and_normalized() {
        let lookup = Arc::new(ScriptedLookup::with(&[("061313456789", "Meier")]));
        let resolver = resolver(lookup, AreaCodeTable::default());
        let normalizer = NumberNormalizer::new("06131");
        let numbers = vec![
            normalizer.normalize("3456789").unwrap(),
            normalizer.normalize("004930123").unwrap(),
        ];

        let found = resolver.resolve_all(&numbers).await;

        assert_eq!(found.len(), 2);
        assert_eq!(found.get("3456789").map(String::as_str), Some("Meier"));
        assert_eq!(found.get("061313456789").map(String::as_str), Some("Meier"));
    }
}
