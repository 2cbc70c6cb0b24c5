//! Step scheduling
//!
//! Two modes:
//!
//! - **Backward**: steps already carry a priority. Sorted by (priority
//!   rank, step number) and packed backwards from the requirement due
//!   date, so the last step in that order finishes exactly on it.
//! - **Forward**: a flat plan walked forward from an injected "now",
//!   flagging (never rejecting) steps that overrun the due date.
//!
//! Neither mode reads the wall clock.

use chrono::{DateTime, Duration, Utc};
use compliance_types::{CompanyComplianceStep, Complexity, Priority, StepCategory, StepSchedule};
use serde::{Deserialize, Serialize};

/// Working days needed for a number of hours (8h days, at least one)
pub fn duration_days(hours: u32) -> i64 {
    (hours.div_ceil(8) as i64).max(1)
}

// ── Backward ─────────────────────────────────────────────────────────

/// Buffer days for a priority in backward mode
pub fn backward_buffer(priority: Priority, duration: i64) -> i64 {
    match priority {
        Priority::Critical => (duration / 2).max(2),
        Priority::High => (duration / 3).max(1),
        Priority::Medium | Priority::Low => (duration / 4).max(1),
    }
}

/// Schedule prioritized steps backwards from `due_date`.
///
/// Returns the steps sorted by (priority rank, step number) with a
/// schedule assigned to each.
pub fn backward_schedule(
    mut steps: Vec<CompanyComplianceStep>,
    due_date: DateTime<Utc>,
) -> Vec<CompanyComplianceStep> {
    steps.sort_by_key(|s| (s.effective_priority().rank(), s.step_number));

    let mut cursor = due_date;
    for step in steps.iter_mut().rev() {
        let duration = duration_days(step.estimated_hours);
        let buffer = backward_buffer(step.effective_priority(), duration);
        let due = cursor;
        let start = due - Duration::days(duration + buffer);
        step.schedule = Some(StepSchedule {
            start_date: start,
            due_date: due,
            duration_days: duration,
            buffer_days: buffer,
        });
        cursor = start - Duration::days(1);
    }

    steps
}

// ── Forward ──────────────────────────────────────────────────────────

/// Timeline risk of a forward-scheduled step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineRisk {
    Low,
    Medium,
    High,
}

/// What forward scheduling needs to know about a step
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleItem {
    pub step_number: u32,
    pub category: StepCategory,
    pub complexity: Complexity,
    pub hours: u32,
}

/// Forward scheduling parameters
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardOptions {
    pub now: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub buffer_pct: u32,
    pub allow_parallel: bool,
}

/// One forward-scheduled slot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForwardSlot {
    pub step_number: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_days: i64,
    pub buffer_days: i64,
    pub total_days: i64,
    pub timeline_risk: TimelineRisk,
}

/// Schedule items forward from `options.now`.
///
/// Slots come back sorted by (step number, complexity high first).
pub fn forward_schedule(items: &[ScheduleItem], options: &ForwardOptions) -> Vec<ForwardSlot> {
    let mut sorted: Vec<&ScheduleItem> = items.iter().collect();
    sorted.sort_by_key(|item| (item.step_number, item.complexity.schedule_rank()));

    let mut slots: Vec<ForwardSlot> = Vec::with_capacity(sorted.len());
    for item in &sorted {
        let duration = duration_days(item.hours);
        let buffer = ((duration as f64 * options.buffer_pct as f64 / 100.0).round() as i64).max(1);
        let total = duration + buffer;

        let start = match (slots.first(), slots.last()) {
            (Some(first), Some(previous)) => {
                if options.allow_parallel && item.category != StepCategory::Assessment {
                    first.end_date + Duration::days(1)
                } else {
                    previous.end_date + Duration::days(1)
                }
            }
            _ => options.now,
        };
        let end = start + Duration::days(total);

        slots.push(ForwardSlot {
            step_number: item.step_number,
            start_date: start,
            end_date: end,
            duration_days: duration,
            buffer_days: buffer,
            total_days: total,
            timeline_risk: timeline_risk(end, options.due_date),
        });
    }

    slots
}

fn timeline_risk(end: DateTime<Utc>, due: DateTime<Utc>) -> TimelineRisk {
    if end > due {
        TimelineRisk::High
    } else if (due - end).num_days() < 7 {
        TimelineRisk::Medium
    } else {
        TimelineRisk::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use compliance_types::{CompanyId, ComplianceStepTemplate, Framework, RecordId, SizeClass};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap()
    }

    fn step(number: u32, hours: u32, priority: Priority) -> CompanyComplianceStep {
        let template = ComplianceStepTemplate::new(
            number,
            format!("Step {}", number),
            StepCategory::Implementation,
            Complexity::Medium,
            hours,
        );
        let mut s = CompanyComplianceStep::from_template(
            &RecordId::new("r"),
            &CompanyId::new("c"),
            &Framework::new("GDPR"),
            &template,
            SizeClass::Medium,
            at(1),
        );
        s.priority = Some(priority);
        s
    }

    #[test]
    fn test_duration_days() {
        assert_eq!(duration_days(0), 1);
        assert_eq!(duration_days(8), 1);
        assert_eq!(duration_days(9), 2);
        assert_eq!(duration_days(80), 10);
    }

    #[test]
    fn test_backward_buffers() {
        assert_eq!(backward_buffer(Priority::Critical, 1), 2);
        assert_eq!(backward_buffer(Priority::Critical, 10), 5);
        assert_eq!(backward_buffer(Priority::High, 2), 1);
        assert_eq!(backward_buffer(Priority::High, 9), 3);
        assert_eq!(backward_buffer(Priority::Low, 8), 2);
    }

    #[test]
    fn test_backward_schedule_orders_and_anchors() {
        let due = at(31);
        let steps = vec![
            step(1, 16, Priority::Medium),
            step(2, 24, Priority::Critical),
            step(3, 8, Priority::High),
        ];
        let scheduled = backward_schedule(steps, due);
        let order: Vec<u32> = scheduled.iter().map(|s| s.step_number).collect();
        assert_eq!(order, vec![2, 3, 1]);

        let last = scheduled.last().unwrap().schedule.clone().unwrap();
        assert_eq!(last.due_date, due);
        // step 1: 2 days + max(1, 2/4) = 3
        assert_eq!(last.start_date, due - Duration::days(3));

        let middle = scheduled[1].schedule.clone().unwrap();
        assert_eq!(middle.due_date, last.start_date - Duration::days(1));

        for s in &scheduled {
            let sched = s.schedule.as_ref().unwrap();
            assert!(sched.start_date < sched.due_date);
        }
    }

    #[test]
    fn test_unscored_step_schedules_as_medium() {
        let mut unscored = step(2, 8, Priority::Medium);
        unscored.priority = None;
        let steps = vec![step(1, 8, Priority::Low), unscored, step(3, 8, Priority::High)];
        let scheduled = backward_schedule(steps, at(31));
        let order: Vec<u32> = scheduled.iter().map(|s| s.step_number).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(scheduled[1].priority, None);
    }

    #[test]
    fn test_backward_schedule_empty() {
        assert!(backward_schedule(Vec::new(), at(31)).is_empty());
    }

    #[test]
    fn test_forward_schedule_sequential() {
        let items = vec![
            ScheduleItem { step_number: 2, category: StepCategory::Assessment, complexity: Complexity::High, hours: 24 },
            ScheduleItem { step_number: 1, category: StepCategory::Assessment, complexity: Complexity::Medium, hours: 16 },
        ];
        let options = ForwardOptions { now: at(1), due_date: at(31), buffer_pct: 20, allow_parallel: true };
        let slots = forward_schedule(&items, &options);

        assert_eq!(slots[0].step_number, 1);
        assert_eq!(slots[0].start_date, at(1));
        // 2 days + max(1, round(0.4)) = 3
        assert_eq!(slots[0].end_date, at(4));
        // assessment steps never run in parallel
        assert_eq!(slots[1].start_date, at(5));
        assert_eq!(slots[1].end_date, at(9));
        assert_eq!(slots[1].timeline_risk, TimelineRisk::Low);
    }

    #[test]
    fn test_forward_schedule_parallel_after_first() {
        let items = vec![
            ScheduleItem { step_number: 1, category: StepCategory::Assessment, complexity: Complexity::Medium, hours: 16 },
            ScheduleItem { step_number: 2, category: StepCategory::Implementation, complexity: Complexity::High, hours: 80 },
            ScheduleItem { step_number: 3, category: StepCategory::Training, complexity: Complexity::Medium, hours: 24 },
        ];
        let options = ForwardOptions { now: at(1), due_date: at(20), buffer_pct: 20, allow_parallel: true };
        let slots = forward_schedule(&items, &options);

        assert_eq!(slots[1].start_date, at(5));
        assert_eq!(slots[2].start_date, at(5));
        // 10 days + 2 buffer from Jan 5 ends Jan 17: within 7 days of Jan 20
        assert_eq!(slots[1].timeline_risk, TimelineRisk::Medium);

        let strict = ForwardOptions { allow_parallel: false, ..options };
        let slots = forward_schedule(&items, &strict);
        assert_eq!(slots[2].start_date, slots[1].end_date + Duration::days(1));
        assert_eq!(slots[2].timeline_risk, TimelineRisk::High);
    }

    #[test]
    fn test_forward_tie_break_on_complexity() {
        let items = vec![
            ScheduleItem { step_number: 1, category: StepCategory::Planning, complexity: Complexity::Low, hours: 8 },
            ScheduleItem { step_number: 1, category: StepCategory::Planning, complexity: Complexity::High, hours: 8 },
        ];
        let options = ForwardOptions { now: at(1), due_date: at(31), buffer_pct: 20, allow_parallel: false };
        let slots = forward_schedule(&items, &options);
        assert_eq!(slots[0].start_date, at(1));
        assert_eq!(slots.len(), 2);
    }
}
