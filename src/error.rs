//! Error types for scene composition.
//!
//! Every wiring failure is a programmer error detected while a scene is being
//! composed. None of them are caught inside the crate: they travel up to
//! whatever drives [`RootOrchestrator::start`] and abort scene startup.
//!
//! [`RootOrchestrator::start`]: crate::systems::orchestrator::RootOrchestrator::start

use std::fmt;

use thiserror::Error;

/// Lifetime tier of a dependency registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Lives as long as the process. Never cleared automatically.
    Global,
    /// Lives as long as a scene. Recreated at scene start, cleared at teardown.
    Local,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Global => f.write_str("global"),
            Tier::Local => f.write_str("local"),
        }
    }
}

/// Where a failed lookup searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Tier(Tier),
    /// Global first, then Local.
    Either,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Tier(tier) => write!(f, "{tier} tier"),
            Lookup::Either => f.write_str("global or local tier"),
        }
    }
}

/// Failures raised while wiring and driving a scene.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// A type key was registered twice in the same tier.
    #[error("dependency `{dependency}` is already registered in the {tier} tier")]
    DuplicateRegistration {
        dependency: &'static str,
        tier: Tier,
    },

    /// A type key was looked up but never registered.
    #[error("dependency `{dependency}` is not registered in the {lookup}")]
    UnregisteredDependency {
        dependency: &'static str,
        lookup: Lookup,
    },

    /// Zero or several factories are registered for an injection target.
    #[error("type `{target}` must have exactly one constructor, found {found}")]
    AmbiguousConstructor { target: &'static str, found: usize },

    /// A constructor or injection method parameter could not be resolved.
    #[error("missing dependency `{parameter}` for `{member}` of `{target}`")]
    UnresolvedParameter {
        target: String,
        member: &'static str,
        parameter: &'static str,
    },

    /// The orchestrator was asked to do something its current state forbids.
    #[error("cannot {action} while the scene is {state}")]
    InvalidTransition { action: &'static str, state: String },

    /// A composite root reported a failure from one of its phase methods.
    #[error("composite root `{root}` failed during {phase}: {reason}")]
    PhaseFailed {
        root: String,
        phase: &'static str,
        reason: String,
    },
}

impl CompositionError {
    /// Build a [`CompositionError::PhaseFailed`] from any displayable reason.
    pub fn phase_failed(
        root: impl Into<String>,
        phase: &'static str,
        reason: impl fmt::Display,
    ) -> Self {
        CompositionError::PhaseFailed {
            root: root.into(),
            phase,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompositionError>;

/// Failures while reading or writing a [`SceneConfig`](crate::resources::sceneconfig::SceneConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    Load(String),
    #[error("failed to save config file: {0}")]
    Save(#[from] std::io::Error),
}
