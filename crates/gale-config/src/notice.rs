//! Notices accumulated during configuration resolution
//!
//! Resolution never prints. Anything recoverable is recorded as a [`Notice`]
//! and logged through `tracing` at the matching level; the caller gets the
//! ordered log back beside the resolved configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a resolution notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational, nothing was changed on the caller's behalf
    Info,

    /// A setting was adjusted or deserves the caller's attention
    Warning,
}

/// A single notice emitted while resolving a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity of the notice
    pub level: NoticeLevel,

    /// The option or feature the notice is about
    pub feature: String,

    /// Human-readable explanation
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        };
        write!(f, "[{}] {}: {}", level, self.feature, self.message)
    }
}

/// Ordered log of notices for one resolution pass
///
/// Notices keep their emission order, which follows the fixed resolution
/// pipeline order, so two identical resolutions produce identical logs.
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Vec<Notice>,
}

impl NoticeLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational notice
    pub fn info(&mut self, feature: impl Into<String>, message: impl Into<String>) {
        let notice = Notice {
            level: NoticeLevel::Info,
            feature: feature.into(),
            message: message.into(),
        };
        tracing::info!(feature = %notice.feature, "{}", notice.message);
        self.notices.push(notice);
    }

    /// Record a warning notice
    pub fn warning(&mut self, feature: impl Into<String>, message: impl Into<String>) {
        let notice = Notice {
            level: NoticeLevel::Warning,
            feature: feature.into(),
            message: message.into(),
        };
        tracing::warn!(feature = %notice.feature, "{}", notice.message);
        self.notices.push(notice);
    }

    /// Notices recorded so far, in emission order
    pub fn as_slice(&self) -> &[Notice] {
        &self.notices
    }

    /// Whether no notice has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    /// Number of notices recorded so far
    pub fn len(&self) -> usize {
        self.notices.len()
    }

    /// Consume the log, yielding the ordered notices
    pub fn into_notices(self) -> Vec<Notice> {
        self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_keep_emission_order() {
        let mut log = NoticeLog::new();
        log.warning("enable_prefix_caching", "disabled for multimodal models");
        log.info("runtime", "configuration is compatible with the next-generation runtime");
        log.warning("lora", "not fully validated with quantization");

        let notices = log.into_notices();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].feature, "enable_prefix_caching");
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(notices[1].level, NoticeLevel::Info);
        assert_eq!(notices[2].feature, "lora");
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice {
            level: NoticeLevel::Warning,
            feature: "num_scheduler_steps".to_string(),
            message: "multi-step scheduling disabled on this device".to_string(),
        };
        assert_eq!(
            notice.to_string(),
            "[warning] num_scheduler_steps: multi-step scheduling disabled on this device"
        );
    }

    #[test]
    fn test_empty_log() {
        let log = NoticeLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(log.into_notices().is_empty());
    }
}
