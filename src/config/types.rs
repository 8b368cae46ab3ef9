//! Configuration type definitions
//!
//! These structs map directly to the YAML configuration file. Every table the
//! scheduler consults lives here so that one compilation's policy is a value,
//! not ambient state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::types::{FailureHandling, RetryPolicy};

// =============================================================================
// TOP-LEVEL CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlannerConfig {
    pub version: String,
    /// Typed verb registry keyed by full verb name
    pub verbs: BTreeMap<String, VerbSpec>,
    pub domains: BTreeMap<String, DomainSpec>,
    pub default_domain: DomainSpec,
    /// Resource catalog keyed by resource type
    pub resources: BTreeMap<String, ResourceSpec>,
    pub timing: TimingConfig,
    pub strength: StrengthConfig,
    pub scheduling: SchedulingConfig,
    pub recovery: RecoveryConfig,
}

/// Partial configuration as read from YAML. Present maps are merged over the
/// defaults key by key; present sections replace the default section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    pub version: Option<String>,
    #[serde(default)]
    pub verbs: BTreeMap<String, VerbSpec>,
    #[serde(default)]
    pub domains: BTreeMap<String, DomainSpec>,
    pub default_domain: Option<DomainSpec>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSpec>,
    pub timing: Option<TimingConfig>,
    pub strength: Option<StrengthConfig>,
    pub scheduling: Option<SchedulingConfig>,
    pub recovery: Option<RecoveryConfig>,
}

// =============================================================================
// VERB REGISTRY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VerbSpec {
    /// Verbs that must complete first when they appear earlier in the source
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Milestone attributes this verb always produces
    #[serde(default)]
    pub produces: Vec<String>,
    /// Attributes this verb always consumes
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default = "default_true")]
    pub parallel_safe: bool,
    #[serde(default = "default_true")]
    pub retryable: bool,
    /// External approver that must sign off after this verb runs
    #[serde(default)]
    pub approval: Option<String>,
}

impl Default for VerbSpec {
    fn default() -> Self {
        Self {
            depends_on: vec![],
            produces: vec![],
            consumes: vec![],
            duration_ms: None,
            resource_type: None,
            parallel_safe: true,
            retryable: true,
            approval: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainSpec {
    /// Higher runs first within a phase
    pub priority: u8,
    pub overhead_ms: u64,
}

// =============================================================================
// RESOURCE CATALOG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub creation_verb: Option<String>,
    #[serde(default)]
    pub wait_condition: Option<String>,
    #[serde(default)]
    pub failure_handling: FailureHandling,
    pub creation_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_resource_priority")]
    pub priority: u8,
    #[serde(default)]
    pub exclusive_access: bool,
}

fn default_resource_priority() -> u8 {
    5
}

// =============================================================================
// POLICIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Used for verbs with no registry duration
    pub default_verb_ms: u64,
    /// Per-operation cost of the naive fully-sequential baseline
    pub sequential_baseline_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StrengthRule {
    /// Substring matched against the attribute id
    pub contains: String,
    pub weight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StrengthConfig {
    pub default_weight: u8,
    /// First matching rule wins
    #[serde(default)]
    pub rules: Vec<StrengthRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchedulingConfig {
    /// Action prefixes marking a resource-creating verb
    pub creation_patterns: Vec<String>,
    pub sync_timeout_ms: u64,
    pub phase_timeout_floor_ms: u64,
    pub phase_timeout_multiplier: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecoveryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub notification_targets: Vec<String>,
}

// =============================================================================
// LOOKUPS
// =============================================================================

/// Domain of a verb: everything before the first dot
pub fn domain_of(verb: &str) -> &str {
    verb.split_once('.').map(|(domain, _)| domain).unwrap_or(verb)
}

impl PlannerConfig {
    pub fn verb(&self, verb: &str) -> Option<&VerbSpec> {
        self.verbs.get(verb)
    }

    pub fn domain(&self, domain: &str) -> DomainSpec {
        self.domains
            .get(domain)
            .copied()
            .unwrap_or(self.default_domain)
    }

    pub fn resource(&self, resource_type: &str) -> Option<&ResourceSpec> {
        self.resources.get(resource_type)
    }

    /// Edge strength for an attribute
    pub fn strength_for(&self, attribute: &str) -> u8 {
        self.strength
            .rules
            .iter()
            .find(|rule| attribute.contains(rule.contains.as_str()))
            .map(|rule| rule.weight)
            .unwrap_or(self.strength.default_weight)
    }

    /// Duration of one operation: verb lookup plus domain overhead
    pub fn operation_duration(&self, verb: &str) -> u64 {
        let base = self
            .verb(verb)
            .and_then(|spec| spec.duration_ms)
            .unwrap_or(self.timing.default_verb_ms);
        base.saturating_add(self.domain(domain_of(verb)).overhead_ms)
    }

    /// Merge a YAML overlay over this configuration
    pub fn apply(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(version) = overlay.version {
            self.version = version;
        }
        self.verbs.extend(overlay.verbs);
        self.domains.extend(overlay.domains);
        self.resources.extend(overlay.resources);
        if let Some(default_domain) = overlay.default_domain {
            self.default_domain = default_domain;
        }
        if let Some(timing) = overlay.timing {
            self.timing = timing;
        }
        if let Some(strength) = overlay.strength {
            self.strength = strength;
        }
        if let Some(scheduling) = overlay.scheduling {
            self.scheduling = scheduling;
        }
        if let Some(recovery) = overlay.recovery {
            self.recovery = recovery;
        }
        self
    }

    /// Check internal consistency.
    ///
    /// Every operation duration must fit inside the sequential baseline, which
    /// is what keeps an optimized plan from ever exceeding it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for verb in self.verbs.keys() {
            match verb.split_once('.') {
                Some((domain, action)) if !domain.is_empty() && !action.is_empty() => {}
                _ => {
                    return Err(ConfigError::InvalidVerbName { verb: verb.clone() });
                }
            }
        }

        let weights = self
            .strength
            .rules
            .iter()
            .map(|rule| (rule.contains.as_str(), rule.weight))
            .chain(std::iter::once(("<default>", self.strength.default_weight)));
        for (pattern, weight) in weights {
            if !(1..=10).contains(&weight) {
                return Err(ConfigError::StrengthOutOfRange {
                    pattern: pattern.to_string(),
                    weight,
                });
            }
        }

        let max_overhead = self
            .domains
            .values()
            .map(|d| d.overhead_ms)
            .chain(std::iter::once(self.default_domain.overhead_ms))
            .max()
            .unwrap_or(0);
        let baseline = self.timing.sequential_baseline_ms;
        let durations = self
            .verbs
            .iter()
            .filter_map(|(verb, spec)| spec.duration_ms.map(|ms| (verb.as_str(), ms)))
            .chain(std::iter::once(("<default>", self.timing.default_verb_ms)));
        for (name, duration_ms) in durations {
            let fits = duration_ms
                .checked_add(max_overhead)
                .is_some_and(|total| total <= baseline);
            if !fits {
                return Err(ConfigError::DurationExceedsBaseline {
                    name: name.to_string(),
                    duration_ms,
                    overhead_ms: max_overhead,
                    baseline_ms: baseline,
                });
            }
        }

        for (resource, spec) in &self.resources {
            if let Some(verb) = &spec.creation_verb {
                if !self.verbs.contains_key(verb) {
                    return Err(ConfigError::UnknownCreationVerb {
                        resource: resource.clone(),
                        verb: verb.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("kyc.verify"), "kyc");
        assert_eq!(domain_of("resources.create-custody-account"), "resources");
        assert_eq!(domain_of("a.b.c"), "a");
        assert_eq!(domain_of("bare"), "bare");
    }

    #[test]
    fn test_default_config_is_valid() {
        PlannerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_strength_rules_first_match_wins() {
        let config = PlannerConfig::default();
        assert_eq!(config.strength_for("ubo-verification-complete"), 10);
        assert_eq!(config.strength_for("kyc-verified-flag"), 9);
        assert_eq!(config.strength_for("investor-name"), 5);
    }

    #[test]
    fn test_operation_duration_uses_registry_and_overhead() {
        let config = PlannerConfig::default();
        let verify = config.verb("kyc.verify").and_then(|v| v.duration_ms).unwrap();
        let kyc_overhead = config.domain("kyc").overhead_ms;
        assert_eq!(config.operation_duration("kyc.verify"), verify + kyc_overhead);

        let unknown = config.operation_duration("mystery.thing");
        assert_eq!(
            unknown,
            config.timing.default_verb_ms + config.default_domain.overhead_ms
        );
    }

    #[test]
    fn test_validate_rejects_slow_verb() {
        let mut config = PlannerConfig::default();
        config.verbs.insert(
            "slow.verb".into(),
            VerbSpec {
                duration_ms: Some(config.timing.sequential_baseline_ms),
                ..VerbSpec::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DurationExceedsBaseline { .. }));
    }

    #[test]
    fn test_validate_rejects_duration_overflowing_overhead() {
        let mut config = PlannerConfig::default();
        config.verbs.insert(
            "x.big".into(),
            VerbSpec {
                duration_ms: Some(u64::MAX),
                ..VerbSpec::default()
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationExceedsBaseline {
                duration_ms: u64::MAX,
                ..
            })
        ));
        assert_eq!(config.operation_duration("x.big"), u64::MAX);
    }

    #[test]
    fn test_validate_rejects_undotted_verb() {
        let mut config = PlannerConfig::default();
        config.verbs.insert("nodot".into(), VerbSpec::default());
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InvalidVerbName {
                verb: "nodot".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_strength() {
        let mut config = PlannerConfig::default();
        config.strength.rules.push(StrengthRule {
            contains: "x".into(),
            weight: 11,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StrengthOutOfRange { weight: 11, .. })
        ));
    }

    #[test]
    fn test_overlay_merges_maps_and_replaces_sections() {
        let mut overlay = ConfigOverlay::default();
        overlay.verbs.insert(
            "kyc.verify".into(),
            VerbSpec {
                duration_ms: Some(100),
                ..VerbSpec::default()
            },
        );
        overlay.recovery = Some(RecoveryConfig {
            max_retries: 1,
            retry_delay_ms: 10,
            notification_targets: vec!["pager".into()],
        });

        let base = PlannerConfig::default();
        let verb_count = base.verbs.len();
        let merged = base.apply(overlay);

        assert_eq!(merged.verbs.len(), verb_count);
        assert_eq!(merged.verb("kyc.verify").unwrap().duration_ms, Some(100));
        assert!(merged.verb("kyc.start").is_some());
        assert_eq!(merged.recovery.max_retries, 1);
    }
}
