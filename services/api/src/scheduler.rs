//! Background generation of payroll periods

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::services::{GenerationWindow, PayrollService};

/// Run period generation for every organization on `schedule`.
///
/// The returned scheduler must be kept alive for the job to keep firing.
pub async fn start_period_generation(
    payroll: PayrollService,
    schedule: &str,
    window: GenerationWindow,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let payroll = payroll.clone();
        Box::pin(async move {
            info!("Payroll period generation job executed");
            match payroll.generate(None, Utc::now().date_naive(), window).await {
                Ok(created) => info!(created, "Scheduled payroll period generation finished"),
                Err(e) => error!("Scheduled payroll period generation failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started payroll period scheduler with schedule: {}", schedule);
    Ok(scheduler)
}
