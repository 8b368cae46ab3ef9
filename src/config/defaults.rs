//! Built-in onboarding catalog
//!
//! Verb ordering, milestone attributes, resource contracts and timings for
//! the investor onboarding / KYC / provisioning DSL.

use std::collections::BTreeMap;

use super::types::*;
use crate::types::{Backoff, FailureHandling, RetryPolicy};

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            verbs: default_verbs(),
            domains: default_domains(),
            default_domain: DomainSpec {
                priority: 5,
                overhead_ms: 100,
            },
            resources: default_resources(),
            timing: TimingConfig {
                default_verb_ms: 1_000,
                sequential_baseline_ms: 3_000,
            },
            strength: StrengthConfig {
                default_weight: 5,
                rules: vec![
                    rule("complete", 10),
                    rule("approved", 10),
                    rule("verif", 9),
                    rule("approval", 9),
                    rule("screening", 8),
                    rule("created", 7),
                ],
            },
            scheduling: SchedulingConfig {
                creation_patterns: vec![
                    "create-".to_string(),
                    "provision-".to_string(),
                    "open-".to_string(),
                ],
                sync_timeout_ms: 300_000,
                phase_timeout_floor_ms: 30_000,
                phase_timeout_multiplier: 3,
            },
            recovery: RecoveryConfig {
                max_retries: 3,
                retry_delay_ms: 5_000,
                notification_targets: vec![
                    "operations-team".to_string(),
                    "compliance-team".to_string(),
                ],
            },
        }
    }
}

fn rule(contains: &str, weight: u8) -> StrengthRule {
    StrengthRule {
        contains: contains.to_string(),
        weight,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct VerbDef<'a> {
    name: &'a str,
    depends_on: &'a [&'a str],
    consumes: &'a [&'a str],
    produces: &'a [&'a str],
    duration_ms: u64,
}

impl VerbDef<'_> {
    fn into_spec(self) -> (String, VerbSpec) {
        (
            self.name.to_string(),
            VerbSpec {
                depends_on: strings(self.depends_on),
                consumes: strings(self.consumes),
                produces: strings(self.produces),
                duration_ms: Some(self.duration_ms),
                ..VerbSpec::default()
            },
        )
    }
}

fn default_verbs() -> BTreeMap<String, VerbSpec> {
    let defs = [
        // Case lifecycle
        VerbDef {
            name: "case.create",
            depends_on: &[],
            consumes: &[],
            produces: &["case-opened"],
            duration_ms: 500,
        },
        VerbDef {
            name: "case.close",
            depends_on: &["case.create"],
            consumes: &["case-opened"],
            produces: &["case-closed"],
            duration_ms: 500,
        },
        // KYC
        VerbDef {
            name: "kyc.start",
            depends_on: &[],
            consumes: &[],
            produces: &["kyc-case-opened"],
            duration_ms: 500,
        },
        VerbDef {
            name: "kyc.collect",
            depends_on: &["kyc.start"],
            consumes: &["kyc-case-opened"],
            produces: &["kyc-documents-collected"],
            duration_ms: 1_500,
        },
        VerbDef {
            name: "kyc.verify",
            depends_on: &["kyc.collect", "kyc.start"],
            consumes: &["kyc-documents-collected"],
            produces: &["kyc-verification-complete"],
            duration_ms: 2_000,
        },
        VerbDef {
            name: "kyc.screen",
            depends_on: &["kyc.start"],
            consumes: &["kyc-case-opened"],
            produces: &["kyc-screening-result"],
            duration_ms: 1_500,
        },
        VerbDef {
            name: "kyc.complete",
            depends_on: &["kyc.verify", "kyc.screen"],
            consumes: &["kyc-verification-complete"],
            produces: &["kyc-complete"],
            duration_ms: 500,
        },
        // Beneficial ownership
        VerbDef {
            name: "ubo.discover",
            depends_on: &[],
            consumes: &[],
            produces: &["ubo-candidates"],
            duration_ms: 1_500,
        },
        VerbDef {
            name: "ubo.calculate",
            depends_on: &["ubo.discover"],
            consumes: &["ubo-candidates"],
            produces: &["ubo-ownership-calculated"],
            duration_ms: 2_000,
        },
        VerbDef {
            name: "ubo.verify",
            depends_on: &["ubo.discover", "ubo.calculate"],
            consumes: &[],
            produces: &["ubo-verification-complete"],
            duration_ms: 2_000,
        },
        // Documents
        VerbDef {
            name: "document.request",
            depends_on: &[],
            consumes: &[],
            produces: &["document-requested"],
            duration_ms: 500,
        },
        VerbDef {
            name: "document.receive",
            depends_on: &["document.request"],
            consumes: &["document-requested"],
            produces: &["document-received"],
            duration_ms: 1_000,
        },
        // Compliance
        VerbDef {
            name: "compliance.review",
            depends_on: &[],
            consumes: &["kyc-complete"],
            produces: &["compliance-review-complete"],
            duration_ms: 1_500,
        },
        VerbDef {
            name: "compliance.approve",
            depends_on: &["compliance.review"],
            consumes: &["compliance-review-complete"],
            produces: &["compliance-approved"],
            duration_ms: 1_000,
        },
        // Investor register
        VerbDef {
            name: "investor.register",
            depends_on: &[],
            consumes: &[],
            produces: &["investor-registered"],
            duration_ms: 1_000,
        },
        VerbDef {
            name: "investor.update",
            depends_on: &["investor.register"],
            consumes: &["investor-registered"],
            produces: &[],
            duration_ms: 500,
        },
        // Resource provisioning
        VerbDef {
            name: "resources.create-custody-account",
            depends_on: &[],
            consumes: &[],
            produces: &["custody-account-created"],
            duration_ms: 2_500,
        },
        VerbDef {
            name: "resources.create-cash-account",
            depends_on: &[],
            consumes: &[],
            produces: &["cash-account-created"],
            duration_ms: 2_000,
        },
        VerbDef {
            name: "resources.create-authority-record",
            depends_on: &[],
            consumes: &[],
            produces: &["authority-record-created"],
            duration_ms: 1_500,
        },
        VerbDef {
            name: "resources.provision-settlement-instructions",
            depends_on: &[],
            consumes: &[],
            produces: &["settlement-instructions-provisioned"],
            duration_ms: 1_500,
        },
    ];

    let mut verbs: BTreeMap<String, VerbSpec> =
        defs.into_iter().map(VerbDef::into_spec).collect();

    // Verb-specific flags that don't fit the table above
    if let Some(spec) = verbs.get_mut("kyc.complete") {
        spec.approval = Some("compliance-officer".to_string());
    }
    if let Some(spec) = verbs.get_mut("compliance.approve") {
        spec.approval = Some("mlro".to_string());
        spec.retryable = false;
    }
    if let Some(spec) = verbs.get_mut("investor.register") {
        spec.resource_type = Some("investor-register-entry".to_string());
    }
    if let Some(spec) = verbs.get_mut("case.close") {
        spec.parallel_safe = false;
    }
    for (verb, resource) in [
        ("resources.create-custody-account", "custody-account"),
        ("resources.create-cash-account", "cash-account"),
        ("resources.create-authority-record", "authority-record"),
        (
            "resources.provision-settlement-instructions",
            "settlement-instructions",
        ),
    ] {
        if let Some(spec) = verbs.get_mut(verb) {
            spec.resource_type = Some(resource.to_string());
        }
    }

    verbs
}

fn default_domains() -> BTreeMap<String, DomainSpec> {
    [
        ("ubo", 9, 250),
        ("kyc", 8, 200),
        ("compliance", 7, 300),
        ("resources", 6, 300),
        ("case", 5, 100),
        ("investor", 5, 100),
        ("document", 4, 100),
    ]
    .into_iter()
    .map(|(name, priority, overhead_ms)| {
        (
            name.to_string(),
            DomainSpec {
                priority,
                overhead_ms,
            },
        )
    })
    .collect()
}

fn default_resources() -> BTreeMap<String, ResourceSpec> {
    let mut resources = BTreeMap::new();

    resources.insert(
        "custody-account".to_string(),
        ResourceSpec {
            prerequisites: strings(&["ubo-verification-complete", "kyc-complete"]),
            creation_verb: Some("resources.create-custody-account".to_string()),
            wait_condition: Some("custody-account-active".to_string()),
            failure_handling: FailureHandling::RollbackPartialResources,
            creation_ms: 5_000,
            retry: RetryPolicy::default(),
            priority: 9,
            exclusive_access: true,
        },
    );
    resources.insert(
        "cash-account".to_string(),
        ResourceSpec {
            prerequisites: strings(&["custody-account-created"]),
            creation_verb: Some("resources.create-cash-account".to_string()),
            wait_condition: Some("cash-account-active".to_string()),
            failure_handling: FailureHandling::RollbackPartialResources,
            creation_ms: 4_000,
            retry: RetryPolicy::default(),
            priority: 8,
            exclusive_access: true,
        },
    );
    resources.insert(
        "authority-record".to_string(),
        ResourceSpec {
            prerequisites: strings(&["custody-account-created"]),
            creation_verb: Some("resources.create-authority-record".to_string()),
            wait_condition: Some("authority-record-registered".to_string()),
            failure_handling: FailureHandling::RetryThenRollback,
            creation_ms: 2_000,
            retry: RetryPolicy {
                max_attempts: 5,
                delay_ms: 1_000,
                backoff: Backoff::Fixed,
            },
            priority: 7,
            exclusive_access: false,
        },
    );
    resources.insert(
        "settlement-instructions".to_string(),
        ResourceSpec {
            prerequisites: strings(&["cash-account-created"]),
            creation_verb: Some("resources.provision-settlement-instructions".to_string()),
            wait_condition: Some("ssi-validated".to_string()),
            failure_handling: FailureHandling::RollbackPartialResources,
            creation_ms: 3_000,
            retry: RetryPolicy::default(),
            priority: 6,
            exclusive_access: false,
        },
    );
    resources.insert(
        "investor-register-entry".to_string(),
        ResourceSpec {
            prerequisites: strings(&["kyc-complete"]),
            creation_verb: Some("investor.register".to_string()),
            wait_condition: Some("register-entry-confirmed".to_string()),
            failure_handling: FailureHandling::ManualIntervention,
            creation_ms: 1_500,
            retry: RetryPolicy {
                max_attempts: 2,
                delay_ms: 5_000,
                backoff: Backoff::Fixed,
            },
            priority: 5,
            exclusive_access: true,
        },
    );

    resources
}
