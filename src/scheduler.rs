//! Cooperative task scheduler with a per-tick time budget.
//!
//! Replaces ad hoc "is the display update still running" flags.  Each
//! control loop iteration the scheduler walks its task slots round-robin
//! and asks a [`TaskDelegate`] to run the ones that are due.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  slots:  [control*] [heater*] [display] [mqtt] [web] ...     │
//! │                                  ▲                           │
//! │                          cursor ─┘ (after last non-critical) │
//! │                                                              │
//! │  * critical: run whenever due, budget or not                 │
//! │  others: run while the reported cost is under budget;        │
//! │          a skipped task stays due for the next tick          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::app::ports::TaskDelegate;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════
//  Task types
// ═══════════════════════════════════════════════════════════════

/// A periodic unit of cooperative work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    /// Name passed back to the delegate.
    pub label: &'static str,
    pub period_ms: u64,
    /// Critical tasks are never deferred for budget reasons.
    pub critical: bool,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ran: u8,
    /// Due tasks deferred because the budget was spent.
    pub deferred: u8,
    pub spent_us: u32,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of task slots (stack-allocated).
pub const MAX_TASKS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct TaskEntry {
    task: Task,
    last_run_ms: Option<u64>,
}

impl TaskEntry {
    fn is_due(&self, now_ms: u64) -> bool {
        self.last_run_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.task.period_ms)
    }
}

pub struct CooperativeScheduler {
    slots: [Option<TaskEntry>; MAX_TASKS],
    /// Slot the next round-robin walk starts from.
    cursor: usize,
    enabled: bool,
}

impl Default for CooperativeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CooperativeScheduler {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_TASKS],
            cursor: 0,
            enabled: true,
        }
    }

    /// Add a task.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, task: Task) -> Option<usize> {
        let (i, slot) = self.slots.iter_mut().enumerate().find(|(_, s)| s.is_none())?;
        info!(
            "scheduler: added '{}' at slot {} (every {} ms{})",
            task.label,
            i,
            task.period_ms,
            if task.critical { ", critical" } else { "" }
        );
        *slot = Some(TaskEntry {
            task,
            last_run_ms: None,
        });
        Some(i)
    }

    pub fn remove(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot).and_then(Option::take) {
            info!("scheduler: removed '{}' from slot {}", entry.task.label, slot);
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the tasks that are due at `now_ms`.
    ///
    /// `delegate.run()` reports each task's cost in µs.  Non-critical
    /// tasks only start while the accumulated cost is below `budget_us`.
    pub fn tick(&mut self, now_ms: u64, budget_us: u32, delegate: &mut dyn TaskDelegate) -> TickReport {
        let mut report = TickReport::default();
        if !self.enabled {
            return report;
        }

        let start = self.cursor;
        let mut next_cursor = self.cursor;

        for offset in 0..MAX_TASKS {
            let idx = (start + offset) % MAX_TASKS;
            let Some(entry) = self.slots[idx].as_mut() else {
                continue;
            };
            if !entry.is_due(now_ms) {
                continue;
            }

            if !entry.task.critical && report.spent_us >= budget_us {
                debug!("scheduler: '{}' deferred, budget spent", entry.task.label);
                report.deferred += 1;
                continue;
            }

            let cost = delegate.run(entry.task.label);
            entry.last_run_ms = Some(now_ms);
            report.spent_us = report.spent_us.saturating_add(cost);
            report.ran += 1;

            if !entry.task.critical {
                next_cursor = (idx + 1) % MAX_TASKS;
            }
        }

        self.cursor = next_cursor;
        report
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
