use std::process::ExitCode;

/// Failures that end an agent run, each with its own exit status so cron
/// wrappers can tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent: invalid configuration: {0}")]
    Config(String),

    #[error("Agent: network error: {0}")]
    Network(String),

    #[error("Agent: unexpected response code: {0}")]
    Response(u16),

    #[error("Agent: environment error: {0}")]
    Env(String),
}

impl AgentError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::from(1),
            Self::Network(_) => ExitCode::from(2),
            Self::Response(_) => ExitCode::from(3),
            Self::Env(_) => ExitCode::from(4),
        }
    }
}
