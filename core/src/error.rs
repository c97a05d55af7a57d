use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to start `{program}`: {error}")]
    Spawn {
        program: String,
        #[source]
        error: std::io::Error,
    },
    #[error("terminal write failed: {error}")]
    Terminal {
        #[source]
        error: std::io::Error,
    },
    #[error("relay session already consumed its event subscription")]
    AlreadySubscribed,
}

impl RelayError {
    pub(crate) fn spawn(program: &str, error: std::io::Error) -> Self {
        Self::Spawn {
            program: program.to_string(),
            error,
        }
    }

    pub(crate) fn terminal(error: std::io::Error) -> Self {
        Self::Terminal { error }
    }
}
