//! Daily analysis trigger.
//!
//! A single background timer thread computes the next local occurrence of
//! the configured run time, sleeps until then, and runs the combined
//! analysis. Overlapping runs are not serialized: a long-running analysis
//! can still be in flight when the next trigger fires.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};

use codegauge_core::{AnalysisService, Settings};

/// Spawn the scheduler thread.
pub fn spawn(settings: Settings) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("codegauge-scheduler".to_string())
        .spawn(move || run_loop(settings))
}

fn run_loop(settings: Settings) {
    log::info!(
        "daily analysis scheduled at {:02}:{:02} local time",
        settings.schedule.hour,
        settings.schedule.minute
    );
    loop {
        let delay = until_next_run(Local::now(), settings.schedule.hour, settings.schedule.minute);
        log::info!("next scheduled analysis in {}s", delay.as_secs());
        thread::sleep(delay);

        log::info!("scheduled analysis starting");
        let outcome = AnalysisService::new(settings.clone()).run_all();
        log::info!(
            "scheduled analysis finished: uncommented={}, duplicate={}",
            outcome.uncommented.status,
            outcome.duplicate.status
        );
    }
}

/// Time until the next local occurrence of `hour:minute`. A target at or
/// before `now` rolls over to tomorrow.
fn until_next_run(now: DateTime<Local>, hour: u32, minute: u32) -> Duration {
    let Some(mut target) = now
        .date_naive()
        .and_hms_opt(hour.min(23), minute.min(59), 0)
    else {
        return Duration::from_secs(3600);
    };
    let now = now.naive_local();
    if target <= now {
        target += chrono::Duration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::until_next_run;
    use chrono::{Local, TimeZone};

    #[test]
    fn later_today_waits_until_today() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).single().expect("time");
        let delay = until_next_run(now, 7, 0);
        assert_eq!(delay.as_secs(), 3600);
    }

    #[test]
    fn earlier_today_rolls_over_to_tomorrow() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single().expect("time");
        let delay = until_next_run(now, 7, 0);
        assert_eq!(delay.as_secs(), 23 * 3600);
    }

    #[test]
    fn exactly_now_rolls_over_to_tomorrow() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).single().expect("time");
        let delay = until_next_run(now, 7, 0);
        assert_eq!(delay.as_secs(), 24 * 3600);
    }

    #[test]
    fn out_of_range_schedule_is_clamped() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single().expect("time");
        let delay = until_next_run(now, 99, 99);
        assert_eq!(delay.as_secs(), 23 * 3600 + 59 * 60);
    }
}
