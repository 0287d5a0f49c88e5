//! Best-effort outcome notification.
//!
//! Posts a short summary of each run to the configured webhook. Delivery
//! is strictly fire-and-forget: transport failures and error statuses are
//! logged and otherwise ignored, and every timeout is bounded so a dead
//! endpoint cannot stall the scheduler.

use std::time::Duration;

use crate::archive::RunReport;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts the run summary to `webhook_url`. No-op when the URL is empty.
pub fn notify(webhook_url: &str, report: &RunReport) {
    if webhook_url.is_empty() {
        return;
    }

    let status = if report.success && report.warnings.is_empty() {
        "Backup completed successfully"
    } else if report.success {
        "Backup completed with warnings"
    } else {
        "Backup failed"
    };
    let content = if report.success {
        format!(
            "**{status}**\nFile: `{}`\nTime: {}\nWarnings: {}\nSize: {:.2} MB",
            report.zip_filename,
            report.timestamp,
            report.warnings.len(),
            report.size_mb
        )
    } else {
        format!(
            "**{status}**\nFile: `{}`\nTime: {}\nWarnings: {}",
            report.zip_filename,
            report.timestamp,
            report.warnings.len()
        )
    };

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(WEBHOOK_TIMEOUT)
        .timeout_read(WEBHOOK_TIMEOUT)
        .timeout_write(WEBHOOK_TIMEOUT)
        .build();
    match agent
        .post(webhook_url)
        .send_json(serde_json::json!({ "content": content }))
    {
        Ok(resp) => {
            let code = resp.status();
            if !(200..300).contains(&code) {
                tracing::warn!("webhook returned non-2xx status: {code}");
            }
        }
        Err(ureq::Error::Status(code, _)) => {
            tracing::warn!("webhook returned non-2xx status: {code}");
        }
        Err(e) => {
            tracing::error!("failed to send webhook notification: {e}");
        }
    }
}
