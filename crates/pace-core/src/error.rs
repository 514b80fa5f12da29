use std::fmt;

/// Rejected construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidTargetRate(f64),
    EmptyRing,
    ZeroErrorLimit,
    InvalidBudget { name: String, value: f64 },
    ZeroStreak(&'static str),
    InvalidMonitoring(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTargetRate(rate) => {
                write!(f, "target rate must be finite and positive, got {rate}")
            }
            ConfigError::EmptyRing => write!(f, "ring size must be at least 1"),
            ConfigError::ZeroErrorLimit => {
                write!(f, "max subsystem errors must be at least 1")
            }
            ConfigError::InvalidBudget { name, value } => {
                write!(f, "budget for '{name}' must be finite and non-negative, got {value}")
            }
            ConfigError::ZeroStreak(which) => write!(f, "streak '{which}' must be at least 1"),
            ConfigError::InvalidMonitoring(msg) => write!(f, "invalid monitoring settings: {msg}"),
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Begin/end pairing mistakes. Never fatal; the frame carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// `subsystem_end` without a matching `subsystem_begin` this frame.
    TimerMissing(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TimerMissing(name) => {
                write!(f, "no timer running for subsystem '{name}'")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Failure raised by a deferred job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TaskError {}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        TaskError::new(s)
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        TaskError::new(s)
    }
}
