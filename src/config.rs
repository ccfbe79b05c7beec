//! Construction options shared by all combinators.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Configuration for a combinator stage.
///
/// # Example
///
/// ```rust,ignore
/// let token = CancellationToken::new();
/// let config = StageConfig::named("fetch")
///     .with_cancellation(token.clone())
///     .with_job_spans(true);
/// let pages = Transform::with_config(urls, fetch_page, config)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct StageConfig {
    /// Label used in logs, metrics and error context.
    pub name: Option<String>,
    /// Parent token; the stage cancels when it does.
    pub cancellation: Option<CancellationToken>,
    /// Cancel outstanding work when the stage value is dropped.
    pub cancel_on_drop: bool,
    /// Create a tracing span for every job. Can be expensive.
    pub job_spans: bool,
}

impl StageConfig {
    /// Create a config with a stage name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Attach a parent cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Cancel outstanding work when the stage is dropped.
    pub fn cancel_on_drop(mut self, enabled: bool) -> Self {
        self.cancel_on_drop = enabled;
        self
    }

    /// Enable per-job tracing spans.
    pub fn with_job_spans(mut self, enabled: bool) -> Self {
        self.job_spans = enabled;
        self
    }

    /// Check the configuration before any work is issued.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::Config("stage name must not be empty".into()));
            }
            if name.chars().any(char::is_control) {
                return Err(Error::Config(format!(
                    "stage name {name:?} contains control characters"
                )));
            }
        }
        Ok(())
    }

    /// The stage name, falling back to `default`.
    pub fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }

    /// Token owned by the stage: a child of the configured parent, if any.
    pub(crate) fn stage_token(&self) -> CancellationToken {
        match &self.cancellation {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        }
    }
}
