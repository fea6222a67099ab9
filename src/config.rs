//! Run configuration for PDF export.
//!
//! [`ExportConfig`] holds the page options plus every knob that decides how
//! conversions are scheduled: how browser sessions are obtained, how many
//! may run at once, when a record is forwarded, and what a failure does to
//! the stream. It is built via [`ExportConfigBuilder`].
//!
//! # Why the page options are a builder argument
//! The export adapter defines no page defaults. A build that forgets to pick
//! a paper size should not silently get one, so [`ExportConfig::builder`]
//! takes the [`ExportOptions`] up front and everything else is optional.

use crate::error::ExportError;
use crate::options::ExportOptions;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for a PDF export run.
///
/// # Example
/// ```rust
/// use sitepdf::{ExportConfig, ExportOptions, Length, Margin, PaperFormat};
///
/// let options = ExportOptions::new(PaperFormat::Letter, Margin::uniform(Length::cm(1.0)));
/// let config = ExportConfig::builder(options)
///     .max_sessions(Some(2))
///     .navigation_timeout_secs(15)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Page format, margins and print settings.
    pub options: ExportOptions,

    /// How browser sessions are obtained. Default: [`SessionStrategy::Pooled`].
    pub session_strategy: SessionStrategy,

    /// Maximum number of browser sessions in use at once. Default: 4.
    ///
    /// Every headless Chrome is a few hundred MB of resident memory. `None`
    /// lifts the cap entirely, so a site with 200 pages may start 200
    /// browsers at once.
    pub max_sessions: Option<usize>,

    /// When a record is forwarded downstream. Default: [`ForwardMode::AfterExport`].
    pub forward: ForwardMode,

    /// What a failed record does to the stream. Default: [`FailurePolicy::BestEffort`].
    pub failure_policy: FailurePolicy,

    /// Readiness condition awaited before printing. Default: [`LoadCondition::NetworkAlmostIdle`].
    pub wait_until: LoadCondition,

    /// Upper bound on navigation plus readiness wait, in seconds. Default: 30.
    pub navigation_timeout_secs: u64,

    /// Optional per-file progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("options", &self.options)
            .field("session_strategy", &self.session_strategy)
            .field("max_sessions", &self.max_sessions)
            .field("forward", &self.forward)
            .field("failure_policy", &self.failure_policy)
            .field("wait_until", &self.wait_until)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a builder around the mandatory page options.
    pub fn builder(options: ExportOptions) -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self {
                options,
                session_strategy: SessionStrategy::default(),
                max_sessions: Some(4),
                forward: ForwardMode::default(),
                failure_policy: FailurePolicy::default(),
                wait_until: LoadCondition::default(),
                navigation_timeout_secs: 30,
                progress_callback: None,
            },
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn is_fail_fast(&self) -> bool {
        self.failure_policy == FailurePolicy::FailFast
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn session_strategy(mut self, strategy: SessionStrategy) -> Self {
        self.config.session_strategy = strategy;
        self
    }

    pub fn max_sessions(mut self, n: Option<usize>) -> Self {
        self.config.max_sessions = n;
        self
    }

    pub fn forward(mut self, mode: ForwardMode) -> Self {
        self.config.forward = mode;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn wait_until(mut self, condition: LoadCondition) -> Self {
        self.config.wait_until = condition;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// The classic build-plugin behaviour: one fresh browser per
    /// file, no cap, records forwarded before their PDF exists.
    pub fn legacy(self) -> Self {
        self.session_strategy(SessionStrategy::PerFile)
            .max_sessions(None)
            .forward(ForwardMode::Immediate)
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        c.options.validate()?;
        if c.max_sessions == Some(0) {
            return Err(ExportError::InvalidConfig(
                "max_sessions must be ≥ 1 (use None for unbounded)".into(),
            ));
        }
        if c.navigation_timeout_secs == 0 {
            return Err(ExportError::InvalidConfig(
                "navigation timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a conversion obtains its browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStrategy {
    /// Launch a browser for each record and close it afterwards.
    PerFile,
    /// Keep idle browsers and hand them to the next record. (default)
    #[default]
    Pooled,
}

/// When a record leaves the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForwardMode {
    /// Forward at once with a pending handle; the PDF may not exist yet.
    Immediate,
    /// Forward once the PDF is written or has failed, carrying the outcome. (default)
    #[default]
    AfterExport,
}

/// What a failed record does to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Log and report the failure, keep going. (default)
    #[default]
    BestEffort,
    /// Yield the first failure as an error item and end the stream.
    FailFast,
}

/// Page readiness condition awaited before printing.
///
/// These map onto Chrome's page lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadCondition {
    /// The `load` event fired.
    Load,
    /// At most 2 network connections for at least 500 ms. (default)
    #[default]
    NetworkAlmostIdle,
    /// No network connections for at least 500 ms.
    NetworkIdle,
}

impl LoadCondition {
    /// Name of the Chrome lifecycle event that signals this condition.
    pub fn lifecycle_event(self) -> &'static str {
        match self {
            LoadCondition::Load => "load",
            LoadCondition::NetworkAlmostIdle => "networkAlmostIdle",
            LoadCondition::NetworkIdle => "networkIdle",
        }
    }
}
