use crate::config::{ReportConfig, SchedulerConfig, WindowMode};
use crate::context::PipelineContext;
use crate::db::models::{HealthStatus, LogQuery};
use crate::error::Result;
use crate::generator::LogGenerator;
use crate::report::build_reports;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of one simulate -> persist -> report cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed {
        logs_written: usize,
        reports_upserted: usize,
    },
    /// No eligible crops; nothing generated or written.
    Idle,
    LookupFailed,
    /// The batch was dropped.
    WriteFailed,
    ReportFailed {
        logs_written: usize,
    },
}

pub struct Scheduler {
    settings: SchedulerConfig,
    report: ReportConfig,
    context: PipelineContext,
    generator: LogGenerator,
    log_counter: u64,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerConfig,
        report: ReportConfig,
        context: PipelineContext,
        generator: LogGenerator,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            report,
            context,
            generator,
            log_counter: Utc::now().timestamp().max(0) as u64,
            shutdown_rx,
        }
    }

    /// Start log numbering after `counter` instead of the current UNIX time.
    pub fn with_log_counter(mut self, counter: u64) -> Self {
        self.log_counter = counter;
        self
    }

    pub async fn run(&mut self) -> Result<()> {
        let initial_delay = Duration::from_secs(self.settings.initial_delay_seconds);
        let interval = Duration::from_secs(self.settings.interval_seconds);
        let retry_delay = Duration::from_secs(self.settings.retry_delay_seconds);

        info!(
            "Scheduler starting with {}s initial delay, {}s interval",
            self.settings.initial_delay_seconds, self.settings.interval_seconds
        );

        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {},
            _ = self.shutdown_rx.changed() => {
                info!("Shutdown received during initial delay");
                return Ok(());
            }
        }

        loop {
            let wait = match self.run_cycle().await {
                CycleOutcome::LookupFailed => {
                    warn!(
                        "Crop lookup failed, retrying in {}s",
                        self.settings.retry_delay_seconds
                    );
                    retry_delay
                }
                outcome => {
                    debug!("Cycle outcome: {:?}", outcome);
                    info!(
                        "Cycle complete. Waiting {}s",
                        self.settings.interval_seconds
                    );
                    interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run a single cycle. Errors are logged and reported through the outcome.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let crop_ids = match self.context.crops.eligible_crop_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Error reading active crops: {}", e);
                return CycleOutcome::LookupFailed;
            }
        };

        if crop_ids.is_empty() {
            info!("No active crops found, skipping generation");
            return CycleOutcome::Idle;
        }

        info!("Starting data generation cycle for {} crops", crop_ids.len());

        let mut batch = Vec::with_capacity(crop_ids.len());
        for crop_id in &crop_ids {
            self.log_counter += 1;
            batch.push(self.generator.generate(crop_id, self.log_counter, Utc::now()));
        }

        let logs_written = match self.context.logs.insert_logs(&batch).await {
            Ok(result) => result.inserted,
            Err(e) => {
                error!("Error writing {} logs: {}", batch.len(), e);
                return CycleOutcome::WriteFailed;
            }
        };
        info!("Stored {} new logs", logs_written);

        match self.refresh_reports(&crop_ids).await {
            Ok(reports_upserted) => CycleOutcome::Completed {
                logs_written,
                reports_upserted,
            },
            Err(e) => {
                error!("Error generating health reports: {}", e);
                CycleOutcome::ReportFailed { logs_written }
            }
        }
    }

    /// Classify the configured log window and upsert one report per crop in it.
    ///
    /// `crop_ids` scopes the per-crop window and is ignored by the global one.
    pub async fn refresh_reports(&self, crop_ids: &[String]) -> Result<usize> {
        let limit = self.report.window_size;
        let logs = match self.report.window {
            WindowMode::Global => {
                self.context
                    .logs
                    .recent_logs(&LogQuery::latest(limit))
                    .await?
            }
            WindowMode::PerCrop => {
                let mut logs = Vec::new();
                for crop_id in crop_ids {
                    logs.extend(
                        self.context
                            .logs
                            .recent_logs(&LogQuery::latest_for_crop(crop_id, limit))
                            .await?,
                    );
                }
                logs
            }
        };

        if logs.is_empty() {
            warn!("No recent logs found, no reports generated");
            return Ok(0);
        }

        debug!("Classifying {} recent logs", logs.len());
        let reports = build_reports(self.context.classifier.as_ref(), &logs, Utc::now());

        for report in &reports {
            self.context.reports.upsert_report(report).await?;
            match report.status {
                HealthStatus::Warning => warn!(
                    "{}: {} ({}) -> {}",
                    report.crop_id, report.status, report.reason, report.recommended_action
                ),
                HealthStatus::Healthy => info!("{}: {}", report.crop_id, report.status),
            }
        }

        info!("Saved/updated {} consolidated health reports", reports.len());
        Ok(reports.len())
    }
}
