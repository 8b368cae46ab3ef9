//! Compiler configuration
//!
//! Verb registry, resource catalog, timing tables and scheduling policy.
//! A [`PlannerConfig`] is passed into the compiler, so two compilations can
//! run side by side with different policies.

mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    domain_of, ConfigOverlay, DomainSpec, PlannerConfig, RecoveryConfig, ResourceSpec,
    SchedulingConfig, StrengthConfig, StrengthRule, TimingConfig, VerbSpec,
};
