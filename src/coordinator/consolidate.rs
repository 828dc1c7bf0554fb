//! Fan-in: the task group's reports become exactly one consolidated alert
//! per coordination run, even when nothing fired.

use chrono::Utc;
use uuid::Uuid;

use crate::alerts::{AgentSection, ConsolidatedAlert, Severity};

use super::tasks::{TaskReport, TaskStatus};

pub fn consolidate(wallet: &str, reports: &[TaskReport]) -> ConsolidatedAlert {
    let mut raw_alerts = Vec::new();
    let mut agent_sections = Vec::with_capacity(reports.len());
    let mut recommendations: Vec<String> = Vec::new();

    for report in reports {
        let summary = match report.status {
            TaskStatus::Completed if report.alerts.is_empty() => {
                format!("{} (no alerts)", report.summary)
            }
            TaskStatus::Completed => report.summary.clone(),
            TaskStatus::Failed => format!(
                "analysis failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            ),
        };
        agent_sections.push(AgentSection {
            agent: report.agent.clone(),
            summary,
            alerts_triggered: report.alerts.len(),
            metrics: report.metrics.clone(),
        });

        // union, duplicates removed, first-seen order
        for rec in &report.recommendations {
            if !recommendations.iter().any(|seen| seen == rec) {
                recommendations.push(rec.clone());
            }
        }
        raw_alerts.extend(report.alerts.iter().cloned());
    }

    let overall_severity = raw_alerts
        .iter()
        .map(|a| a.severity)
        .max()
        .unwrap_or(Severity::Info);

    ConsolidatedAlert {
        alert_id: Uuid::new_v4().to_string(),
        wallet_address: wallet.to_string(),
        title: format!(
            "Portfolio Analysis - {} Alert(s) Triggered",
            raw_alerts.len()
        ),
        overall_severity,
        agent_sections,
        recommendations,
        total_alerts_triggered: raw_alerts.len(),
        timestamp: Utc::now(),
        raw_alerts,
    }
}
