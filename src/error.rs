use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("metrics API not available")]
    MetricsApiUnavailable,

    #[error("only one of NAME or --selector can be provided")]
    NameWithSelector,

    #[error("a pod cannot be retrieved by name across all namespaces")]
    NameAcrossNamespaces,

    #[error("--sort-by accepts only cpu or memory, got '{0}'")]
    InvalidSortKey(String),

    #[error("--type accepts only {allowed}, got '{token}'")]
    UnsupportedDimension { token: String, allowed: String },

    #[error("failed to {context}")]
    Kube {
        context: String,
        #[source]
        source: kube::Error,
    },

    #[error("operation timed out - too many nodes or slow API response")]
    Timeout,

    #[error("resource worker did not finish")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl ViewError {
    pub fn kube(context: impl Into<String>, source: kube::Error) -> Self {
        Self::Kube {
            context: context.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
