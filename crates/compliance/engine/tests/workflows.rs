//! End-to-end runs of the four workflows against in-memory collaborators

use chrono::{DateTime, Duration, TimeZone, Utc};
use compliance_engine::collaborators::{RecordStorage, StepStorage};
use compliance_engine::config::EvidenceConfig;
use compliance_engine::progress::Urgency;
use compliance_engine::{
    ActivityEnv, Channel, CompanyOnboardingInput, CompanyOnboardingOutput, ComplianceCatalog,
    ComplianceReportingInput, EngineConfig, EngineError, ErrorKind, Gate, InMemoryNotifier,
    InMemoryStorage, ManualClock, MemoryCheckpointStore, ProvenanceEventType, ReportType,
    RuleBasedEvidenceValidator, RunResult, RunStatus, StepCompletionInput, StepCompletionOutput,
    StepGenerationInput, StepGenerationOutput, WorkflowInput, WorkflowOutput, WorkflowRuntime,
    EVIDENCE_SUBMITTED,
};
use compliance_types::{
    Company, CompanyId, EvidenceSubmission, Framework, Priority, RecordId, RecordStatus,
    RequirementId, RiskLevel, RunId, StepId, StepStatus,
};
use serde_json::json;
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

struct Harness {
    runtime: WorkflowRuntime,
    storage: InMemoryStorage,
    notifier: InMemoryNotifier,
    clock: Arc<ManualClock>,
}

async fn harness() -> Harness {
    harness_with(|env| env).await
}

async fn harness_with(configure: impl FnOnce(ActivityEnv) -> ActivityEnv) -> Harness {
    let storage = InMemoryStorage::new()
        .with_company(
            Company::new("acme", "Acme Bank")
                .with_industry("Finance")
                .with_location("Australia"),
        )
        .await
        .with_company(
            Company::new("tiny", "Tiny Farm")
                .with_industry("Agriculture")
                .with_location("Atlantis"),
        )
        .await;
    let notifier = InMemoryNotifier::new();
    let clock = Arc::new(ManualClock::new(t0()));
    let env = configure(ActivityEnv::new(
        Arc::new(ComplianceCatalog::builtin()),
        Arc::new(storage.clone()),
        Arc::new(notifier.clone()),
        clock.clone(),
        EngineConfig::for_tests(),
    ));
    Harness {
        runtime: WorkflowRuntime::new(env, Arc::new(MemoryCheckpointStore::new())),
        storage,
        notifier,
        clock,
    }
}

fn gdpr_record() -> RecordId {
    RecordId::for_pair(&CompanyId::new("acme"), &RequirementId::new("1"))
}

fn onboarding_output(result: RunResult) -> CompanyOnboardingOutput {
    match result.data {
        Some(WorkflowOutput::CompanyOnboarding(output)) => output,
        other => panic!("unexpected onboarding result: {:?} / {:?}", other, result.error),
    }
}

fn generation_output(result: RunResult) -> StepGenerationOutput {
    match result.data {
        Some(WorkflowOutput::StepGeneration(output)) => output,
        other => panic!("unexpected generation result: {:?} / {:?}", other, result.error),
    }
}

fn completion_output(result: RunResult) -> StepCompletionOutput {
    match result.data {
        Some(WorkflowOutput::StepCompletion(output)) => output,
        other => panic!("unexpected completion result: {:?} / {:?}", other, result.error),
    }
}

async fn onboard(h: &Harness) -> CompanyOnboardingOutput {
    let result = h
        .runtime
        .execute(WorkflowInput::CompanyOnboarding(CompanyOnboardingInput {
            company_id: CompanyId::new("acme"),
        }))
        .await
        .unwrap();
    onboarding_output(result)
}

async fn generate(h: &Harness, record_id: &RecordId) -> RunResult {
    h.runtime
        .execute(WorkflowInput::StepGeneration(StepGenerationInput {
            record_id: record_id.clone(),
        }))
        .await
        .unwrap()
}

fn completion(step_number: u32, completed_by: &str) -> StepCompletionInput {
    StepCompletionInput {
        step_id: StepId::for_step(&gdpr_record(), step_number),
        record_id: gdpr_record(),
        completed_by: completed_by.to_string(),
        evidence: None,
        await_evidence: false,
    }
}

async fn complete(h: &Harness, input: StepCompletionInput) -> RunResult {
    h.runtime
        .execute(WorkflowInput::StepCompletion(input))
        .await
        .unwrap()
}

// ── Onboarding ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_onboarding_finance_australia() {
    let h = harness().await;
    let output = onboard(&h).await;

    let frameworks: Vec<&str> = output.match_result.frameworks.iter().map(Framework::as_str).collect();
    for expected in ["GDPR", "SOX", "ISO27001", "PCI-DSS", "Basel III", "Privacy Act", "ACSC", "APRA"] {
        assert!(frameworks.contains(&expected), "missing {}", expected);
    }
    for mandatory in ["GDPR", "SOX", "PCI-DSS"] {
        assert!(output.match_result.mandatory.iter().any(|f| f.is(mandatory)));
    }
    assert_eq!(output.match_result.risk_level, RiskLevel::Critical);

    // GDPR, SOX, ISO27001 and PCI-DSS have requirement templates
    assert_eq!(output.records.len(), 4);
    assert_eq!(h.storage.record_count().await, 4);
    assert_eq!(output.counts_by_priority[&Priority::Critical], 1);
    assert_eq!(output.counts_by_priority[&Priority::High], 3);

    let sox = output.records.iter().find(|r| r.framework.is("SOX")).unwrap();
    assert_eq!(sox.due_date, Some(t0() + Duration::days(30)));
    let gdpr = output.records.iter().find(|r| r.framework.is("GDPR")).unwrap();
    assert_eq!(gdpr.due_date, Some(t0() + Duration::days(60)));
    assert_eq!(gdpr.days_to_complete, Some(60));

    // team summary plus three channels per High/Critical record
    assert_eq!(output.notifications_sent, 13);
    assert_eq!(h.notifier.sent_on(Channel::Email).await, 5);
    assert_eq!(h.notifier.sent_on(Channel::Dashboard).await, 4);
}

#[tokio::test]
async fn test_onboarding_twice_keeps_records() {
    let h = harness().await;
    onboard(&h).await;
    h.clock.advance(Duration::days(3));
    let again = onboard(&h).await;

    assert_eq!(h.storage.record_count().await, 4);
    let gdpr = again.records.iter().find(|r| r.framework.is("GDPR")).unwrap();
    assert_eq!(gdpr.created_at, t0());
    assert_eq!(gdpr.due_date, Some(t0() + Duration::days(60)));
    // deliveries are deduplicated per channel
    assert_eq!(h.notifier.sent().await.len(), 13);
}

#[tokio::test]
async fn test_onboarding_without_requirements_is_gated() {
    let h = harness().await;
    let run_id = h
        .runtime
        .start_named("company_onboarding", json!({"company_id": "tiny"}))
        .await
        .unwrap();
    let result = h.runtime.wait(&run_id).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status(), RunStatus::GateFailed);
    let gate = result.data.as_ref().and_then(WorkflowOutput::gate).unwrap();
    assert!(matches!(gate.gate, Gate::NoRequirements { frameworks_matched: 0, .. }));
    assert!(!gate.action_required.is_empty());
    assert_eq!(h.storage.record_count().await, 0);

    let status = h.runtime.get_status(&run_id).await.unwrap();
    assert_eq!(status.status, RunStatus::GateFailed);
}

// ── Step Generation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_step_generation_schedules_against_due_date() {
    let h = harness().await;
    onboard(&h).await;
    let output = generation_output(generate(&h, &gdpr_record()).await);

    assert_eq!(output.steps.len(), 4);
    assert_eq!(output.steps_created, 4);
    assert_eq!(h.storage.step_count().await, 4);

    let due = t0() + Duration::days(60);
    let last = output.steps.last().unwrap().schedule.as_ref().unwrap();
    assert_eq!(last.due_date, due);
    assert_eq!(output.schedule_end, Some(due));
    for step in &output.steps {
        let schedule = step.schedule.as_ref().unwrap();
        assert!(schedule.start_date < schedule.due_date);
        assert!(step.priority.is_some());
        assert!(step.assigned_to.is_some());
    }

    let mapping = output.steps.iter().find(|s| s.step_number == 1).unwrap();
    assert_eq!(mapping.assigned_role.as_deref(), Some("Data Analyst"));
    assert_eq!(mapping.assigned_to.as_deref(), Some("data.analyst@company.com"));
    assert_eq!(mapping.supporting_roles, vec!["Business Analyst".to_string()]);

    let record = h.storage.get_record(&gdpr_record()).await.unwrap().unwrap();
    assert_eq!(record.total_steps, 4);
    assert_eq!(record.status, RecordStatus::NotStarted);
}

#[tokio::test]
async fn test_step_generation_without_templates_is_gated() {
    let h = harness().await;
    onboard(&h).await;
    let pci = RecordId::for_pair(&CompanyId::new("acme"), &RequirementId::new("5"));
    let result = generate(&h, &pci).await;

    assert_eq!(result.status(), RunStatus::GateFailed);
    let gate = result.data.as_ref().and_then(WorkflowOutput::gate).unwrap();
    assert!(matches!(&gate.gate, Gate::NoStepTemplates { framework } if framework.is("PCI-DSS")));
    assert_eq!(h.storage.step_count().await, 0);
}

#[tokio::test]
async fn test_regeneration_preserves_progress() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;
    completion_output(complete(&h, completion(1, "dpo@acme.test")).await);

    let output = generation_output(generate(&h, &gdpr_record()).await);
    assert_eq!(output.steps_preserved, 4);
    let first = output.steps.iter().find(|s| s.step_number == 1).unwrap();
    assert_eq!(first.status, StepStatus::Completed);
    assert_eq!(first.completed_by.as_deref(), Some("dpo@acme.test"));
}

// ── Step Completion ──────────────────────────────────────────────────

#[tokio::test]
async fn test_prerequisites_block_out_of_order_completion() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;
    completion_output(complete(&h, completion(1, "dpo@acme.test")).await);

    let result = complete(&h, completion(3, "legal@acme.test")).await;
    assert_eq!(result.status(), RunStatus::GateFailed);
    let gate = result.data.as_ref().and_then(WorkflowOutput::gate).unwrap();
    match &gate.gate {
        Gate::PrerequisitesNotMet {
            blocking_steps,
            can_proceed,
            ..
        } => {
            assert!(!can_proceed);
            assert_eq!(blocking_steps.len(), 1);
            assert_eq!(blocking_steps[0].step_number, 2);
        }
        other => panic!("unexpected gate {:?}", other),
    }

    let step = h
        .storage
        .get_step(&StepId::for_step(&gdpr_record(), 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(step.status, StepStatus::Pending);
}

#[tokio::test]
async fn test_recompleting_a_step_keeps_completion_metadata() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let first = completion_output(complete(&h, completion(1, "dpo@acme.test")).await);
    assert!(first.newly_completed);
    assert_eq!(first.progress.status, RecordStatus::InProgress);
    assert_eq!(first.progress.completion_percentage, 25.0);

    h.clock.advance(Duration::days(2));
    let second = completion_output(complete(&h, completion(1, "someone-else@acme.test")).await);
    assert!(!second.newly_completed);
    assert_eq!(second.step.completed_by.as_deref(), Some("dpo@acme.test"));
    assert_eq!(second.step.completed_at, Some(t0()));
    assert_eq!(second.progress.completed_steps, 1);
}

#[tokio::test]
async fn test_completing_all_steps_produces_report() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let mut last = None;
    for n in 1..=4 {
        h.clock.advance(Duration::days(5));
        let step = h
            .storage
            .get_step(&StepId::for_step(&gdpr_record(), n))
            .await
            .unwrap()
            .unwrap();
        let deliverables: Vec<&str> = step.deliverables.iter().map(String::as_str).collect();
        let mut input = completion(n, "dpo@acme.test");
        input.evidence = Some(
            EvidenceSubmission::new(format!("evidence/gdpr/step-{}.pdf", n))
                .with_size(4096)
                .covering(&deliverables),
        );
        let output = completion_output(complete(&h, input).await);
        assert!(output.evidence_validation.as_ref().unwrap().is_acceptable);
        last = Some(output);
    }

    let output = last.unwrap();
    assert_eq!(output.progress.status, RecordStatus::Completed);
    assert_eq!(output.progress.completion_percentage, 100.0);
    assert!(output.completion_check.all_steps_complete);
    assert!(output.completion_check.ready_for_final_review);

    let report = output.completion_report.unwrap();
    assert_eq!(report.summary.completed_steps, 4);
    assert!(report.summary.certification_ready);
    assert_eq!(report.summary.on_time, Some(true));
    assert_eq!(report.step_details.len(), 4);

    let record = h.storage.get_record(&gdpr_record()).await.unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.completed_at, Some(t0() + Duration::days(20)));
}

#[tokio::test]
async fn test_rejected_evidence_leaves_step_open() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let mut input = completion(1, "dpo@acme.test");
    input.evidence = Some(EvidenceSubmission::new("scan.exe").with_size(0));
    let result = complete(&h, input).await;

    assert_eq!(result.status(), RunStatus::GateFailed);
    let gate = result.data.as_ref().and_then(WorkflowOutput::gate).unwrap();
    match &gate.gate {
        Gate::EvidenceRejected {
            validation,
            requires_revision,
            ..
        } => {
            assert!(requires_revision);
            assert!(!validation.is_acceptable);
            assert!(validation.score < 70);
        }
        other => panic!("unexpected gate {:?}", other),
    }

    let step = h
        .storage
        .get_step(&StepId::for_step(&gdpr_record(), 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(step.status, StepStatus::InProgress);
}

#[tokio::test]
async fn test_configured_evidence_validator_decides() {
    let spreadsheets_only = EvidenceConfig {
        allowed_extensions: vec!["xlsx".to_string()],
        ..EvidenceConfig::default()
    };
    let h = harness_with(|env| {
        env.with_evidence_validator(Arc::new(RuleBasedEvidenceValidator::new(spreadsheets_only)))
    })
    .await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let mut input = completion(1, "dpo@acme.test");
    input.evidence = Some(
        EvidenceSubmission::new("evidence/gdpr/inventory.pdf")
            .with_size(2048)
            .covering(&["Data flow diagrams", "Processing records", "Data inventory"]),
    );
    let result = complete(&h, input).await;
    assert_eq!(result.status(), RunStatus::GateFailed);
    let gate = result.data.as_ref().and_then(WorkflowOutput::gate).unwrap();
    match &gate.gate {
        Gate::EvidenceRejected { validation, .. } => {
            assert!(validation.failed_checks().any(|c| c.name == "file_format"));
        }
        other => panic!("unexpected gate {:?}", other),
    }
}

#[tokio::test]
async fn test_evidence_arrives_as_event() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let mut input = completion(1, "dpo@acme.test");
    input.await_evidence = true;
    let run_id = h.runtime.start(WorkflowInput::StepCompletion(input)).await.unwrap();

    let err = h
        .runtime
        .raise_event(&run_id, "approval_granted", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownEvent { .. }));

    let err = h
        .runtime
        .raise_event(&run_id, EVIDENCE_SUBMITTED, json!({"path": "x.pdf"}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    h.runtime
        .raise_event(
            &run_id,
            EVIDENCE_SUBMITTED,
            json!({
                "file_path": "evidence/gdpr/inventory.pdf",
                "size_bytes": 2048,
                "covered_deliverables": ["Data flow diagrams", "Processing records", "Data inventory"]
            }),
        )
        .await
        .unwrap();

    let output = completion_output(h.runtime.wait(&run_id).await.unwrap());
    assert_eq!(
        output.step.evidence_file_path.as_deref(),
        Some("evidence/gdpr/inventory.pdf")
    );
    assert_eq!(output.evidence_validation.unwrap().score, 100);

    let trail = h.runtime.provenance(&run_id).await;
    assert!(trail
        .iter()
        .any(|r| matches!(&r.event_type, ProvenanceEventType::EventReceived { name } if name == EVIDENCE_SUBMITTED)));
}

#[tokio::test]
async fn test_terminate_waiting_run() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let mut input = completion(1, "dpo@acme.test");
    input.await_evidence = true;
    let run_id = h.runtime.start(WorkflowInput::StepCompletion(input)).await.unwrap();
    h.runtime.terminate(&run_id, "withdrawn by operator").await.unwrap();

    let result = h.runtime.wait(&run_id).await.unwrap();
    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.error_kind, ErrorKind::Terminated);
    assert_eq!(failure.message, "withdrawn by operator");

    let err = h.runtime.terminate(&run_id, "again").await.unwrap_err();
    assert!(matches!(err, EngineError::RunFinished(_)));
    assert!(h.runtime.active_runs().await.is_empty());
}

#[tokio::test]
async fn test_step_from_another_record_is_inconsistent() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;

    let mut input = completion(1, "dpo@acme.test");
    input.record_id = RecordId::for_pair(&CompanyId::new("acme"), &RequirementId::new("2"));
    let result = complete(&h, input).await;

    assert_eq!(result.status(), RunStatus::Failed);
    let failure = result.error.unwrap();
    assert_eq!(failure.error_kind, ErrorKind::DataInconsistency);
    assert_eq!(failure.activity.as_deref(), Some("validate_prerequisites"));
}

// ── Reporting ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_report_lists_overdue_items() {
    let h = harness().await;
    onboard(&h).await;
    generate(&h, &gdpr_record()).await;
    completion_output(complete(&h, completion(1, "dpo@acme.test")).await);

    h.clock.advance(Duration::days(75));
    let result = h
        .runtime
        .execute(WorkflowInput::ComplianceReporting(ComplianceReportingInput {
            company_id: CompanyId::new("acme"),
            report_type: ReportType::Comprehensive,
            channels: None,
        }))
        .await
        .unwrap();
    let output = match result.data {
        Some(WorkflowOutput::ComplianceReporting(output)) => output,
        other => panic!("unexpected reporting result: {:?}", other),
    };

    let report = &output.report;
    assert!(report.metadata.report_id.starts_with("rpt-acme-"));
    assert_eq!(report.sections.compliance_status.len(), 4);
    assert!(report.sections.step_progress.is_some());

    let overdue = &report.sections.overdue_analysis;
    assert_eq!(overdue.len(), 4);
    assert!(overdue[0].framework.is("SOX"));
    assert_eq!(overdue[0].days_overdue, 45);
    assert_eq!(overdue[0].urgency, Urgency::Critical);
    assert!(overdue[1..].iter().all(|item| item.urgency == Urgency::High));
    assert_eq!(report.executive_summary.overdue_count, 4);
    assert_eq!(report.executive_summary.immediate_actions_required, 1);
    assert!(!report.sections.completion_metrics.performance.no_overdue_items);

    assert_eq!(output.channels_sent, 2);
    assert_eq!(output.distribution.len(), 2);
}

#[tokio::test]
async fn test_executive_report_on_failing_channel() {
    let storage = InMemoryStorage::new()
        .with_company(Company::new("acme", "Acme Bank").with_industry("Finance"))
        .await;
    let notifier = InMemoryNotifier::new().failing_on(Channel::Chat);
    let env = ActivityEnv::new(
        Arc::new(ComplianceCatalog::builtin()),
        Arc::new(storage),
        Arc::new(notifier),
        Arc::new(ManualClock::new(t0())),
        EngineConfig::for_tests(),
    );
    let runtime = WorkflowRuntime::new(env, Arc::new(MemoryCheckpointStore::new()));

    let run_id = runtime
        .start_named(
            "compliance_reporting",
            json!({"company_id": "acme", "report_type": "executive", "channels": ["email", "chat"]}),
        )
        .await
        .unwrap();
    let result = runtime.wait(&run_id).await.unwrap();
    let output = match result.data {
        Some(WorkflowOutput::ComplianceReporting(output)) => output,
        other => panic!("unexpected reporting result: {:?}", other),
    };

    assert!(output.report.sections.compliance_status.is_empty());
    assert!(output.report.sections.step_progress.is_none());
    assert_eq!(output.channels_sent, 1);
    assert_eq!(output.channels_failed, 1);
}

// ── Entry Points ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_entry_rejects_unknown_workflow_and_fields() {
    let h = harness().await;
    let err = h.runtime.start_named("payroll", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownWorkflow(_)));

    let err = h
        .runtime
        .start_named("step_generation", json!({"record_id": "r", "dry_run": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = h.runtime.get_status(&RunId::new("missing")).await.unwrap_err();
    assert!(matches!(err, EngineError::RunNotFound(_)));
}

#[tokio::test]
async fn test_status_lists_completed_activities() {
    let h = harness().await;
    let run_id = h
        .runtime
        .start_named("company_onboarding", json!({"company_id": "acme"}))
        .await
        .unwrap();
    h.runtime.wait(&run_id).await.unwrap();

    let status = h.runtime.get_status(&run_id).await.unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(
        status.completed_activities,
        vec![
            "analyze_company",
            "find_requirements",
            "create_compliance_records",
            "set_due_dates",
            "notify_stakeholders",
        ]
    );
    assert!(status.current_activity.is_none());
}
