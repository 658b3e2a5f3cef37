//! Error and warning types for the engine.
//!
//! Fatal conditions are [`SynthError`]s: the trigger that raised one makes no
//! sound, every other voice keeps playing. Non-fatal conditions are logged
//! and recorded as [`EngineWarning`]s, which callers drain with
//! [`EngineContext::take_warnings`](crate::EngineContext::take_warnings).

use dough_core::{GraphError, NodeId, NodeKind};
use thiserror::Error;

/// Errors raised while compiling an event into a voice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// No source generator is registered under this name.
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// The event is not a record, or a control has the wrong type.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A modulator targets a role the voice does not have.
    #[error("control '{control}' targets role '{role}', which this voice does not have")]
    UnresolvedTarget {
        /// Control the modulator asked for.
        control: String,
        /// Role the control-target table resolved it to.
        role: &'static str,
    },

    /// The trigger time had already passed when the event arrived.
    #[error("trigger at {trigger:.4}s arrived late (now {now:.4}s)")]
    LateTrigger {
        /// Requested trigger time in seconds.
        trigger: f64,
        /// Clock time when the event was compiled.
        now: f64,
    },

    /// An effect stage was requested but could not be built.
    #[error("effect stage '{stage}' skipped: {reason}")]
    MissingRoleForEffect {
        /// Stage name.
        stage: &'static str,
        /// Why it was skipped.
        reason: String,
    },

    /// The control has no entry in the control-target table.
    #[error("control '{0}' cannot be modulated")]
    NotModulatable(String),

    /// Graph mutation failed.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Pool release failed.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errors from the resource pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The node's kind is not one the pool knows how to recycle.
    #[error("node {node} of kind '{kind}' is not a recognized processing node")]
    Unrecognized {
        /// Node handed to `release`.
        node: NodeId,
        /// Its kind.
        kind: NodeKind,
    },

    /// The node is already on a free list.
    #[error("node {0} was released twice")]
    DoubleRelease(NodeId),
}

/// Errors from loading or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A field is outside its valid range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Non-fatal condition recorded during compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineWarning {
    /// Component that raised it (`compiler`, `router`, ...).
    pub component: &'static str,
    /// The condition.
    pub error: SynthError,
}

impl EngineWarning {
    /// True for a dropped late trigger.
    pub fn is_late_trigger(&self) -> bool {
        matches!(self.error, SynthError::LateTrigger { .. })
    }

    /// True for a skipped modulator.
    pub fn is_unresolved_target(&self) -> bool {
        matches!(self.error, SynthError::UnresolvedTarget { .. })
    }
}

impl core::fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}] {}", self.component, self.error)
    }
}
