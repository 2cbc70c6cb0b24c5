//! Report distribution contract

use super::notifier::{Channel, DeliveryStatus, Notification, Notifier, NotifyError};
use crate::report::ComplianceReport;
use async_trait::async_trait;
use compliance_types::Priority;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStatus {
    Sent,
    Failed,
}

/// Outcome of distributing a report on one channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub channel: Channel,
    pub status: DistributionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Publish a report to each channel. Per-channel failures are recorded,
    /// not raised.
    async fn publish(
        &self,
        report: &ComplianceReport,
        channels: &[Channel],
    ) -> Result<Vec<DistributionRecord>, NotifyError>;
}

/// Publishes reports through a [`Notifier`], one send per channel
#[derive(Clone)]
pub struct NotifierPublisher {
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
}

impl NotifierPublisher {
    pub fn new(notifier: Arc<dyn Notifier>, recipients: Vec<String>) -> Self {
        Self {
            notifier,
            recipients,
        }
    }

    fn location(&self, channel: Channel, report: &ComplianceReport) -> String {
        match channel {
            Channel::Email => self.recipients.join(", "),
            Channel::Chat => "#compliance".to_string(),
            Channel::Dashboard => format!("/reports/compliance/{}", report.metadata.report_id),
        }
    }
}

#[async_trait]
impl ReportPublisher for NotifierPublisher {
    async fn publish(
        &self,
        report: &ComplianceReport,
        channels: &[Channel],
    ) -> Result<Vec<DistributionRecord>, NotifyError> {
        let summary = &report.executive_summary;
        let notification = Notification::new(
            self.recipients.join(", "),
            format!("Compliance report for {}", summary.company_name),
            Priority::Medium,
            format!("report:{}", report.metadata.report_id),
        )
        .with_body(format!(
            "Overall completion {:.1}%, risk {}, {} overdue item(s)",
            summary.overall_completion_rate, summary.risk_level, summary.overdue_count
        ));

        let sends = channels.iter().map(|channel| {
            let notification = &notification;
            async move { (*channel, self.notifier.send(*channel, notification).await) }
        });
        let results = futures::future::join_all(sends).await;

        let records = results
            .into_iter()
            .map(|(channel, result)| match result {
                Ok(DeliveryStatus::Delivered) => DistributionRecord {
                    channel,
                    status: DistributionStatus::Sent,
                    location: Some(self.location(channel, report)),
                    error: None,
                },
                Ok(DeliveryStatus::Failed { reason }) => DistributionRecord {
                    channel,
                    status: DistributionStatus::Failed,
                    location: None,
                    error: Some(reason),
                },
                Err(e) => DistributionRecord {
                    channel,
                    status: DistributionStatus::Failed,
                    location: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        Ok(records)
    }
}
