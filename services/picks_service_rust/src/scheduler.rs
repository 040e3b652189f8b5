//! Daily jobs: save today's picks in the morning, grade yesterday overnight.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use picks_rust_core::grading::ResultsSource;
use picks_rust_core::{backfill, CalibrationParams, PicksPipeline, Sport};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    SavePicks,
    Backfill,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SavePicks => "save_picks",
            Self::Backfill => "backfill",
        }
    }
}

pub struct Scheduler {
    pub pipeline: Arc<PicksPipeline>,
    pub results: Arc<dyn ResultsSource>,
    pub calibration: CalibrationParams,
    pub timezone: Tz,
    pub save_picks_at: NaiveTime,
    pub backfill_at: NaiveTime,
    pub sport: Sport,
}

/// Next instant strictly after `now` when the local clock in `tz` reads `at`.
///
/// A time skipped by a DST jump fires an hour later on that day.
pub fn next_fire(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
    let mut day = now.with_timezone(&tz).date_naive();
    loop {
        if let Some(fire) = local_instant(tz, day, at) {
            if fire > now {
                return fire;
            }
        }
        day += Duration::days(1);
    }
}

fn local_instant(tz: Tz, day: NaiveDate, at: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = day.and_time(at);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Job due first after `now`, with its fire time
pub fn next_job(now: DateTime<Utc>, tz: Tz, save_at: NaiveTime, backfill_at: NaiveTime) -> (Job, DateTime<Utc>) {
    let save = next_fire(now, tz, save_at);
    let grade = next_fire(now, tz, backfill_at);
    if grade <= save {
        (Job::Backfill, grade)
    } else {
        (Job::SavePicks, save)
    }
}

impl Scheduler {
    pub async fn run(&self) {
        info!(
            "Scheduler started ({}): save at {}, backfill at {}",
            self.timezone, self.save_picks_at, self.backfill_at
        );
        loop {
            let now = Utc::now();
            let (job, at) = next_job(now, self.timezone, self.save_picks_at, self.backfill_at);
            let wait = (at - now).to_std().unwrap_or_default();
            info!(
                "Next job {} at {} ({}s)",
                job.as_str(),
                at.with_timezone(&self.timezone),
                wait.as_secs()
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Scheduler shutting down");
                    return;
                }
            }

            let today = at.with_timezone(&self.timezone).date_naive();
            self.run_job(job, today).await;
        }
    }

    pub async fn run_job(&self, job: Job, today: NaiveDate) {
        match job {
            Job::SavePicks => match self.pipeline.save_daily(today, self.sport).await {
                Ok(daily) => info!(
                    "Saved {} {} picks for {}",
                    daily.picks.len(),
                    self.sport,
                    today
                ),
                Err(e) => error!("Scheduled save for {} failed: {:#}", today, e),
            },
            Job::Backfill => {
                let date = today - Duration::days(1);
                match backfill(
                    self.pipeline.store().as_ref(),
                    self.results.as_ref(),
                    date,
                    self.calibration,
                )
                .await
                {
                    Ok(summary) => info!(
                        "Backfilled {}: {}/{} hits, calibrated={}",
                        date, summary.hits, summary.total, summary.calibrated
                    ),
                    Err(e) => error!("Scheduled backfill for {} failed: {:#}", date, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_fire_later_today() {
        // 09:00 EDT
        let now = utc(2024, 6, 1, 13, 0);
        assert_eq!(next_fire(now, New_York, hm(11, 0)), utc(2024, 6, 1, 15, 0));
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        // 12:00 EDT, past the 11:00 slot
        let now = utc(2024, 6, 1, 16, 0);
        assert_eq!(next_fire(now, New_York, hm(11, 0)), utc(2024, 6, 2, 15, 0));
        // Exactly at the slot fires the next day
        let at_slot = utc(2024, 6, 1, 15, 0);
        assert_eq!(next_fire(at_slot, New_York, hm(11, 0)), utc(2024, 6, 2, 15, 0));
    }

    #[test]
    fn test_next_fire_uses_local_date_not_utc() {
        // 2024-06-02 02:00 UTC is still 2024-06-01 22:00 EDT
        let now = utc(2024, 6, 2, 2, 0);
        assert_eq!(next_fire(now, New_York, hm(23, 0)), utc(2024, 6, 2, 3, 0));
    }

    #[test]
    fn test_next_fire_dst_gap() {
        // 2024-03-10 02:30 does not exist in New York
        let now = utc(2024, 3, 10, 5, 0);
        assert_eq!(next_fire(now, New_York, hm(2, 30)), utc(2024, 3, 10, 7, 30));
    }

    #[test]
    fn test_next_job_picks_earliest() {
        // 03:00 EDT: backfill at 05:00 comes before save at 11:00
        let now = utc(2024, 6, 1, 7, 0);
        let (job, at) = next_job(now, New_York, hm(11, 0), hm(5, 0));
        assert_eq!(job, Job::Backfill);
        assert_eq!(at, utc(2024, 6, 1, 9, 0));

        // 06:00 EDT: save is next
        let now = utc(2024, 6, 1, 10, 0);
        let (job, at) = next_job(now, New_York, hm(11, 0), hm(5, 0));
        assert_eq!(job, Job::SavePicks);
        assert_eq!(at, utc(2024, 6, 1, 15, 0));
    }
}
