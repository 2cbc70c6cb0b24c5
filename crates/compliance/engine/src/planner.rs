//! Requirement planning
//!
//! Builds a flat, forward-scheduled plan for one framework: step hours
//! adjusted for company size, a priority per step, resource assignment
//! and a timeline walked forward from "now" toward the due date.

use crate::assignment::{assign, Assignment};
use crate::catalog::ComplianceCatalog;
use crate::config::SchedulingConfig;
use crate::priority::PriorityCalculator;
use crate::scheduler::{forward_schedule, ForwardOptions, ForwardSlot, ScheduleItem, TimelineRisk};
use chrono::{DateTime, Utc};
use compliance_types::{Complexity, Framework, Priority, SizeClass, StepCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// What to plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanRequest {
    pub framework: Framework,
    #[serde(default)]
    pub size: SizeClass,
    pub due_date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step_number: u32,
    pub title: String,
    pub category: StepCategory,
    pub complexity: Complexity,
    pub estimated_hours: u32,
    pub priority: Priority,
    pub assignment: Assignment,
    pub timeline: ForwardSlot,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_steps: usize,
    pub total_hours: u32,
    /// Sum of allocated days (duration plus buffer) over all steps
    pub total_days: i64,
    pub unique_roles: usize,
    pub complexity_distribution: BTreeMap<String, u32>,
    pub category_distribution: BTreeMap<String, u32>,
    /// Steps whose timeline overruns the due date
    pub at_risk_steps: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequirementPlan {
    pub framework: Framework,
    pub size: SizeClass,
    pub due_date: DateTime<Utc>,
    pub steps: Vec<PlannedStep>,
    pub summary: PlanSummary,
    pub recommendations: Vec<String>,
}

/// Plans requirements from catalog step templates
#[derive(Clone, Debug)]
pub struct RequirementPlanner {
    catalog: Arc<ComplianceCatalog>,
    calculator: PriorityCalculator,
    scheduling: SchedulingConfig,
}

impl RequirementPlanner {
    pub fn new(catalog: Arc<ComplianceCatalog>, scheduling: SchedulingConfig) -> Self {
        Self {
            catalog,
            calculator: PriorityCalculator::default(),
            scheduling,
        }
    }

    /// Plan a framework. `None` when the catalog has no step templates for it.
    pub fn plan(&self, request: &PlanRequest, now: DateTime<Utc>) -> Option<RequirementPlan> {
        let templates = self.catalog.steps_for(&request.framework)?;

        let items: Vec<ScheduleItem> = templates
            .iter()
            .map(|t| ScheduleItem {
                step_number: t.step_number,
                category: t.category,
                complexity: t.complexity,
                hours: t.adjusted_hours(request.size),
            })
            .collect();
        let slots = forward_schedule(
            &items,
            &ForwardOptions {
                now,
                due_date: request.due_date,
                buffer_pct: self.scheduling.buffer_pct,
                allow_parallel: self.scheduling.allow_parallel,
            },
        );

        let steps: Vec<PlannedStep> = slots
            .into_iter()
            .filter_map(|slot| {
                let template = templates.iter().find(|t| t.step_number == slot.step_number)?;
                let hours = template.adjusted_hours(request.size);
                let priority = self
                    .calculator
                    .score_parts(template.step_number, template.base_hours, &template.accountable_role)
                    .priority;
                Some(PlannedStep {
                    step_number: template.step_number,
                    title: template.title.clone(),
                    category: template.category,
                    complexity: template.complexity,
                    estimated_hours: hours,
                    priority,
                    assignment: assign(&self.catalog, &template.required_skills, hours),
                    timeline: slot,
                })
            })
            .collect();

        let summary = summarize(&steps);
        tracing::debug!(
            framework = %request.framework,
            steps = summary.total_steps,
            total_hours = summary.total_hours,
            at_risk = summary.at_risk_steps,
            "Requirement planned"
        );

        let mut recommendations = vec![
            "Review resource assignments against team availability".to_string(),
            "Hold regular checkpoint meetings to monitor progress".to_string(),
            "Prepare tools and templates before step execution".to_string(),
        ];
        if summary.at_risk_steps > 0 {
            recommendations.insert(
                0,
                format!(
                    "{} step(s) overrun the due date; extend the deadline or add resources",
                    summary.at_risk_steps
                ),
            );
        } else if !self.scheduling.allow_parallel {
            recommendations.push("Consider parallel execution to shorten the timeline".to_string());
        }

        Some(RequirementPlan {
            framework: request.framework.clone(),
            size: request.size,
            due_date: request.due_date,
            steps,
            summary,
            recommendations,
        })
    }
}

fn summarize(steps: &[PlannedStep]) -> PlanSummary {
    let mut complexity_distribution = BTreeMap::new();
    let mut category_distribution = BTreeMap::new();
    for step in steps {
        *complexity_distribution
            .entry(step.complexity.to_string())
            .or_insert(0) += 1;
        *category_distribution
            .entry(step.category.to_string())
            .or_insert(0) += 1;
    }

    let roles: BTreeSet<&str> = steps
        .iter()
        .map(|s| s.assignment.assigned_role.as_str())
        .collect();

    PlanSummary {
        total_steps: steps.len(),
        total_hours: steps.iter().map(|s| s.estimated_hours).sum(),
        total_days: steps.iter().map(|s| s.timeline.total_days).sum(),
        unique_roles: roles.len(),
        complexity_distribution,
        category_distribution,
        at_risk_steps: steps
            .iter()
            .filter(|s| s.timeline.timeline_risk == TimelineRisk::High)
            .count() as u32,
    }
}
