//! Error types for the Tether framework.
//!
//! Organized by failure kind: construction-time configuration errors,
//! per-call encoding errors, and transport errors. Spurious wakeups and
//! interrupted reads are retried internally and never appear here.

use std::error::Error;
use std::fmt;
use std::io;

use crate::id::ActionId;

/// Invalid setup detected at construction time.
///
/// Fatal: a component that fails validation is never built, and nothing
/// attempts to recover from these at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A state encoder was given no discretizers.
    NoDiscretizers,
    /// A discretizer was configured with zero bins.
    ZeroBins,
    /// A discretizer range is non-finite or inverted.
    InvalidRange {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },
    /// The product of all bin counts does not fit in a `u64` state id.
    StateSpaceOverflow,
    /// An exploration policy was given an empty action set.
    NoActions,
    /// The same action appears twice in a legal action set.
    DuplicateAction {
        /// The repeated action.
        action: ActionId,
    },
    /// Epsilon is NaN or outside `[0, 1]`.
    EpsilonOutOfRange {
        /// The rejected value.
        value: f64,
    },
    /// An epsilon schedule violates its invariants.
    InvalidSchedule {
        /// Description of the violated invariant.
        reason: String,
    },
    /// A control or learner loop configuration is invalid.
    InvalidLoopConfig {
        /// Description of the violated invariant.
        reason: String,
    },
    /// A link retry policy violates its invariants.
    InvalidRetry {
        /// Description of the violated invariant.
        reason: String,
    },
    /// A background thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDiscretizers => write!(f, "state encoder needs at least one discretizer"),
            Self::ZeroBins => write!(f, "discretizer needs at least one bin"),
            Self::InvalidRange { min, max } => {
                write!(f, "discretizer range [{min}, {max}] is not a finite, ordered range")
            }
            Self::StateSpaceOverflow => write!(f, "number of states exceeds u64::MAX"),
            Self::NoActions => write!(f, "legal action set is empty"),
            Self::DuplicateAction { action } => {
                write!(f, "action {action} appears more than once in the legal set")
            }
            Self::EpsilonOutOfRange { value } => {
                write!(f, "epsilon must be within [0, 1], got {value}")
            }
            Self::InvalidSchedule { reason } => write!(f, "invalid epsilon schedule: {reason}"),
            Self::InvalidLoopConfig { reason } => write!(f, "invalid loop config: {reason}"),
            Self::InvalidRetry { reason } => write!(f, "invalid retry policy: {reason}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Errors from encoding an observation into a state id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// The observation length differs from the encoder's dimensionality.
    DimensionMismatch {
        /// Number of discretizers in the encoder.
        expected: usize,
        /// Length of the offending observation.
        got: usize,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "observation has {got} dimensions, encoder expects {expected}")
            }
        }
    }
}

impl Error for EncodeError {}

/// Transport and protocol failures on the link between device and host.
#[derive(Debug)]
pub enum LinkError {
    /// The underlying byte stream failed.
    Io(io::Error),
    /// The peer closed the connection.
    Disconnected,
    /// A frame started with an opcode this build does not understand.
    UnknownOpcode {
        /// The opcode read from the stream.
        found: i32,
    },
    /// A frame could not be decoded (truncated or corrupt data).
    MalformedFrame {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// Connecting failed on every attempt allowed by the retry policy.
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last: Box<LinkError>,
    },
    /// The link was set up with an invalid configuration.
    Config(ConfigError),
}

impl LinkError {
    /// Whether this error means the peer is gone (as opposed to a
    /// protocol violation).
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "link I/O error: {e}"),
            Self::Disconnected => write!(f, "peer disconnected"),
            Self::UnknownOpcode { found } => write!(f, "unknown opcode {found}"),
            Self::MalformedFrame { detail } => write!(f, "malformed frame: {detail}"),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Config(e) => write!(f, "link configuration: {e}"),
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::RetriesExhausted { last, .. } => Some(last.as_ref()),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for LinkError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
