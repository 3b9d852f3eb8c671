//! Explicit reporting sink handed to lifecycle components.
//!
//! # Responsibility
//! - Carry step completions and recoverable warnings out of the deletion
//!   cascade, export job and contact import without global state.
//! - Keep an ordered in-memory record when the caller wants an audit trail.
//!
//! # Invariants
//! - Reporting never fails and never panics.
//! - Messages are sanitized before they reach the log backend.

use crate::deletion::DeletionStep;
use crate::logging::sanitize_message;
use log::{info, warn};
use std::cell::RefCell;

const MAX_REPORT_MESSAGE_CHARS: usize = 240;

/// Sink for lifecycle progress and warnings.
pub trait Reporter {
    /// One deletion step finished; `affected` counts rows removed or scrubbed.
    fn step(&self, step: DeletionStep, affected: usize);
    /// A recoverable problem the component handled locally.
    fn warn(&self, component: &'static str, message: &str);
    /// A notable outcome that is not a problem.
    fn info(&self, component: &'static str, message: &str);
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn step(&self, step: DeletionStep, affected: usize) {
        (**self).step(step, affected);
    }

    fn warn(&self, component: &'static str, message: &str) {
        (**self).warn(component, message);
    }

    fn info(&self, component: &'static str, message: &str) {
        (**self).info(component, message);
    }
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn step(&self, step: DeletionStep, affected: usize) {
        info!(
            "event=deletion_step module=deletion status=ok step={} affected={}",
            step.as_str(),
            affected
        );
    }

    fn warn(&self, component: &'static str, message: &str) {
        warn!(
            "event={component}_warning module={component} status=warn detail={}",
            sanitize_message(message, MAX_REPORT_MESSAGE_CHARS)
        );
    }

    fn info(&self, component: &'static str, message: &str) {
        info!(
            "event={component}_notice module={component} status=ok detail={}",
            sanitize_message(message, MAX_REPORT_MESSAGE_CHARS)
        );
    }
}

/// One recorded report entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    Step {
        step: DeletionStep,
        affected: usize,
    },
    Warning {
        component: &'static str,
        message: String,
    },
    Info {
        component: &'static str,
        message: String,
    },
}

/// Ordered in-memory record that also forwards to `LogReporter`.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: RefCell<Vec<ReportEntry>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.borrow().clone()
    }

    /// Completed deletion steps in invocation order.
    pub fn steps(&self) -> Vec<DeletionStep> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                ReportEntry::Step { step, .. } => Some(*step),
                _ => None,
            })
            .collect()
    }

    /// Warning messages in emission order.
    pub fn warnings(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                ReportEntry::Warning { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Reporter for MemoryReporter {
    fn step(&self, step: DeletionStep, affected: usize) {
        LogReporter.step(step, affected);
        self.entries
            .borrow_mut()
            .push(ReportEntry::Step { step, affected });
    }

    fn warn(&self, component: &'static str, message: &str) {
        LogReporter.warn(component, message);
        self.entries.borrow_mut().push(ReportEntry::Warning {
            component,
            message: message.to_string(),
        });
    }

    fn info(&self, component: &'static str, message: &str) {
        LogReporter.info(component, message);
        self.entries.borrow_mut().push(ReportEntry::Info {
            component,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryReporter, ReportEntry, Reporter};
    use crate::deletion::DeletionStep;

    #[test]
    fn memory_reporter_keeps_order_and_splits_views() {
        let reporter = MemoryReporter::new();
        reporter.step(DeletionStep::DeleteContactsOfMe, 3);
        reporter.warn("contact_import", "aspect \"Family\" is missing");
        reporter.step(DeletionStep::TombstonePersonAndProfile, 1);

        assert_eq!(
            reporter.steps(),
            vec![
                DeletionStep::DeleteContactsOfMe,
                DeletionStep::TombstonePersonAndProfile
            ]
        );
        assert_eq!(reporter.warnings(), vec!["aspect \"Family\" is missing"]);
        assert_eq!(
            reporter.entries()[0],
            ReportEntry::Step {
                step: DeletionStep::DeleteContactsOfMe,
                affected: 3
            }
        );

        reporter.clear();
        assert!(reporter.entries().is_empty());
    }

    #[test]
    fn reference_forwards_to_inner_reporter() {
        let reporter = MemoryReporter::new();
        let by_ref = &reporter;
        by_ref.info("export", "export complete");
        assert_eq!(reporter.entries().len(), 1);
    }
}
