//! Configuration types for the filter compiler.

use std::time::Duration;

/// Default name of the root subquery.
pub const DEFAULT_ROOT_NAME: &str = "f";

/// Default id of the structural cohort-selection term.
pub const DEFAULT_COHORT_TERM_ID: &str = "subcohort";

/// Configuration for the filter compiler.
///
/// # Example
///
/// ```rust
/// use cohort_filter_compiler::CompilerConfig;
/// use std::time::Duration;
///
/// let config = CompilerConfig::builder()
///     .with_parallel_providers(true)
///     .with_provider_timeout(Duration::from_secs(30))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Name of the root subquery; children are named `root_0`, `root_1`, ...
    pub root_name: String,
    /// Term id used purely for cohort selection, ignored when collecting sample types.
    pub cohort_term_id: String,
    /// Compile sibling nodes concurrently so provider calls overlap.
    pub parallel_providers: bool,
    /// Time limit for each provider call (None = no limit).
    ///
    /// Enforced with `tokio::time`, so compilation must run inside a tokio
    /// runtime when this is set.
    pub provider_timeout: Option<Duration>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            cohort_term_id: DEFAULT_COHORT_TERM_ID.to_string(),
            parallel_providers: false,
            provider_timeout: None,
        }
    }
}

impl CompilerConfig {
    /// Creates a new builder for CompilerConfig.
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }
}

/// Builder for CompilerConfig.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    /// Sets the root subquery name.
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.config.root_name = name.into();
        self
    }

    /// Sets the cohort-selection term id.
    pub fn with_cohort_term_id(mut self, term_id: impl Into<String>) -> Self {
        self.config.cohort_term_id = term_id.into();
        self
    }

    /// Enables or disables concurrent compilation of siblings.
    pub fn with_parallel_providers(mut self, parallel: bool) -> Self {
        self.config.parallel_providers = parallel;
        self
    }

    /// Sets the per-call provider time limit.
    ///
    /// The limit uses `tokio::time`; compiling with it set outside a tokio
    /// runtime with the time driver enabled panics. Without a limit the
    /// compiler runs on any executor.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = Some(timeout);
        self
    }

    /// Builds the CompilerConfig.
    pub fn build(self) -> CompilerConfig {
        self.config
    }
}
