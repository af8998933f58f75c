use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, Local, NaiveDateTime, TimeZone, Timelike};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::config::ScheduleConfig;
use crate::error::ScheduleError;

/// Period between two eligibility checks while the scheduler runs
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// Validated form of a [`ScheduleConfig`], with times as minutes since midnight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    start: u32,
    end: u32,
    days: BTreeSet<u8>,
}

impl TimeWindow {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ScheduleError> {
        let start = parse_time("startTime", &config.start_time)?;
        let end = parse_time("endTime", &config.end_time)?;

        let mut days = BTreeSet::new();
        for &day in &config.days {
            if day > 6 {
                return Err(ScheduleError::InvalidDay(day));
            }
            days.insert(day);
        }

        Ok(Self { start, end, days })
    }

    fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    fn has_day(&self, day: u32) -> bool {
        self.days.contains(&((day % 7) as u8))
    }

    /// Whether `now` falls inside the window.
    ///
    /// For a window that crosses midnight, the part after midnight belongs
    /// to the day the window started on.
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let weekday = now.weekday().num_days_from_sunday();
        let minutes = now.hour() * 60 + now.minute();

        if !self.crosses_midnight() {
            return self.has_day(weekday) && self.start <= minutes && minutes <= self.end;
        }

        (minutes >= self.start && self.has_day(weekday))
            || (minutes <= self.end && self.has_day(weekday + 6))
    }

    /// `now` if inside the window, otherwise the next window start within a week
    pub fn next_start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.days.is_empty() {
            return None;
        }
        if self.contains(now) {
            return Some(now);
        }

        (0..=7u64).find_map(|offset| {
            let date = now.date().checked_add_days(Days::new(offset))?;
            if !self.has_day(date.weekday().num_days_from_sunday()) {
                return None;
            }
            let start = date.and_hms_opt(self.start / 60, self.start % 60, 0)?;
            (start > now).then_some(start)
        })
    }
}

/// Parse `HH:MM` (hour may be a single digit) into minutes since midnight
fn parse_time(field: &'static str, value: &str) -> Result<u32, ScheduleError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ScheduleError::MissingTime(field));
    }

    let invalid = || ScheduleError::InvalidTime {
        field,
        value: value.to_string(),
    };

    let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
    let well_formed = (1..=2).contains(&hours.len())
        && minutes.len() == 2
        && hours.chars().all(|c| c.is_ascii_digit())
        && minutes.chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(invalid());
    }

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    Ok(hours * 60 + minutes)
}

/// Hook invoked on every tick that falls inside the schedule window
#[async_trait]
pub trait ScheduleTrigger: Send + Sync {
    async fn on_schedule(&self) {}
}

/// Trigger that does nothing
#[derive(Debug, Default)]
pub struct NoopTrigger;

impl ScheduleTrigger for NoopTrigger {}

/// Snapshot reported by [`Scheduler::status`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatus {
    pub is_active: bool,
    pub is_in_schedule: bool,
    pub next_schedule: Option<DateTime<Local>>,
}

/// Runs a trigger once immediately and then every minute while inside the
/// configured window
pub struct Scheduler {
    config: ScheduleConfig,
    window: TimeWindow,
    trigger: Arc<dyn ScheduleTrigger>,
    tick_period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig) -> Result<Self, ScheduleError> {
        Self::with_trigger(config, Arc::new(NoopTrigger))
    }

    pub fn with_trigger(
        config: ScheduleConfig,
        trigger: Arc<dyn ScheduleTrigger>,
    ) -> Result<Self, ScheduleError> {
        let window = TimeWindow::from_config(&config)?;
        Ok(Self {
            config,
            window,
            trigger,
            tick_period: TICK_PERIOD,
            task: None,
        })
    }

    /// Override the tick period. Takes effect on the next start.
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    /// Start ticking. Does nothing if already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let window = self.window.clone();
        let trigger = Arc::clone(&self.trigger);
        let period = self.tick_period;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // The first tick completes immediately
                ticker.tick().await;
                if window.contains(Local::now().naive_local()) {
                    ::log::debug!("Inside schedule window, triggering");
                    trigger.on_schedule().await;
                } else {
                    ::log::trace!("Outside schedule window");
                }
            }
        }));

        ::log::info!(
            "Scheduler started ({}-{} on days {:?})",
            self.config.start_time,
            self.config.end_time,
            self.config.days
        );
    }

    /// Stop ticking. Does nothing if already stopped.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            ::log::info!("Scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Replace the configuration. A running scheduler is restarted and
    /// re-evaluates immediately; an invalid config leaves everything unchanged.
    pub fn update_config(&mut self, config: ScheduleConfig) -> Result<(), ScheduleError> {
        let window = TimeWindow::from_config(&config)?;
        let was_running = self.is_running();

        self.stop();
        self.config = config;
        self.window = window;

        if was_running {
            self.start();
        }
        Ok(())
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn is_in_schedule(&self) -> bool {
        self.is_in_schedule_at(Local::now().naive_local())
    }

    pub fn is_in_schedule_at(&self, now: NaiveDateTime) -> bool {
        self.window.contains(now)
    }

    /// Now if inside the window, otherwise the next window start
    pub fn next_schedule_time(&self) -> Option<DateTime<Local>> {
        let next = self.next_schedule_time_from(Local::now().naive_local())?;
        Local
            .from_local_datetime(&next)
            .earliest()
            .or_else(|| Local.from_local_datetime(&(next + chrono::Duration::hours(1))).earliest())
    }

    pub fn next_schedule_time_from(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.window.next_start(now)
    }

    pub fn status(&self) -> ScheduleStatus {
        ScheduleStatus {
            is_active: self.is_running(),
            is_in_schedule: self.is_in_schedule(),
            next_schedule: self.next_schedule_time(),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 2024-01-01 was a Monday
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_same_day_window() {
        let scheduler = Scheduler::new(ScheduleConfig::new("09:00", "17:30", [1, 2, 3, 4, 5])).unwrap();
        assert!(scheduler.is_in_schedule_at(at(1, 9, 0)));
        assert!(scheduler.is_in_schedule_at(at(1, 17, 30)));
        assert!(!scheduler.is_in_schedule_at(at(1, 17, 31)));
        assert!(!scheduler.is_in_schedule_at(at(1, 8, 59)));
        // Sunday
        assert!(!scheduler.is_in_schedule_at(at(7, 12, 0)));
    }

    #[test]
    fn test_window_crossing_midnight() {
        let scheduler = Scheduler::new(ScheduleConfig::new("22:00", "06:00", [1])).unwrap();
        // Monday 23:00 and the following Tuesday 02:00
        assert!(scheduler.is_in_schedule_at(at(1, 23, 0)));
        assert!(scheduler.is_in_schedule_at(at(2, 2, 0)));
        // Monday noon
        assert!(!scheduler.is_in_schedule_at(at(1, 12, 0)));
        // Monday 02:00 belongs to Sunday night
        assert!(!scheduler.is_in_schedule_at(at(1, 2, 0)));
        // Tuesday 23:00 is a new window on a day that is not configured
        assert!(!scheduler.is_in_schedule_at(at(2, 23, 0)));
    }

    #[test]
    fn test_no_days_is_never_in_schedule() {
        let scheduler = Scheduler::new(ScheduleConfig::new("00:00", "23:59", [])).unwrap();
        for day in 1..=7 {
            for hour in [0, 6, 12, 18, 23] {
                assert!(!scheduler.is_in_schedule_at(at(day, hour, 30)));
            }
        }
        assert_eq!(scheduler.next_schedule_time_from(at(1, 12, 0)), None);
        assert_eq!(scheduler.next_schedule_time(), None);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let cases = [
            (ScheduleConfig::new("", "06:00", [1]), ScheduleError::MissingTime("startTime")),
            (ScheduleConfig::new("09:00", " ", [1]), ScheduleError::MissingTime("endTime")),
            (
                ScheduleConfig::new("24:00", "06:00", [1]),
                ScheduleError::InvalidTime { field: "startTime", value: "24:00".into() },
            ),
            (
                ScheduleConfig::new("09:00", "09:60", [1]),
                ScheduleError::InvalidTime { field: "endTime", value: "09:60".into() },
            ),
            (
                ScheduleConfig::new("9am", "10:00", [1]),
                ScheduleError::InvalidTime { field: "startTime", value: "9am".into() },
            ),
            (
                ScheduleConfig::new("09:00", "10:0", [1]),
                ScheduleError::InvalidTime { field: "endTime", value: "10:0".into() },
            ),
            (ScheduleConfig::new("09:00", "10:00", [1, 7]), ScheduleError::InvalidDay(7)),
        ];

        for (config, expected) in cases {
            assert_eq!(Scheduler::new(config).err(), Some(expected));
        }
        assert!(Scheduler::new(ScheduleConfig::new("9:05", "23:59", [0, 6])).is_ok());
    }

    #[test]
    fn test_next_schedule_time() {
        let scheduler = Scheduler::new(ScheduleConfig::new("09:00", "17:00", [1, 3])).unwrap();

        // Inside the window: now
        assert_eq!(scheduler.next_schedule_time_from(at(1, 10, 0)), Some(at(1, 10, 0)));
        // Before today's window: today's start
        assert_eq!(scheduler.next_schedule_time_from(at(1, 7, 0)), Some(at(1, 9, 0)));
        // After today's window: next configured day
        assert_eq!(scheduler.next_schedule_time_from(at(1, 18, 0)), Some(at(3, 9, 0)));
        // Saturday: next Monday
        assert_eq!(scheduler.next_schedule_time_from(at(6, 12, 0)), Some(at(8, 9, 0)));
    }

    #[test]
    fn test_next_schedule_time_same_weekday_next_week() {
        let scheduler = Scheduler::new(ScheduleConfig::new("09:00", "10:00", [1])).unwrap();
        assert_eq!(scheduler.next_schedule_time_from(at(1, 11, 0)), Some(at(8, 9, 0)));
    }

    #[test]
    fn test_next_schedule_time_crossing_midnight() {
        let scheduler = Scheduler::new(ScheduleConfig::new("22:00", "06:00", [1])).unwrap();

        // Tuesday 02:00 is the tail of Monday's window
        assert_eq!(scheduler.next_schedule_time_from(at(2, 2, 0)), Some(at(2, 2, 0)));
        // Monday morning: that evening
        assert_eq!(scheduler.next_schedule_time_from(at(1, 7, 0)), Some(at(1, 22, 0)));
        // Monday 02:00 belongs to Sunday night, which is not configured
        assert_eq!(scheduler.next_schedule_time_from(at(1, 2, 0)), Some(at(1, 22, 0)));
        // Tuesday after the window closed: next Monday evening
        assert_eq!(scheduler.next_schedule_time_from(at(2, 6, 1)), Some(at(8, 22, 0)));
    }

    #[test]
    fn test_update_config_validates() {
        let mut scheduler = Scheduler::new(ScheduleConfig::default()).unwrap();
        assert!(scheduler.update_config(ScheduleConfig::new("xx", "10:00", [1])).is_err());
        assert_eq!(scheduler.config(), &ScheduleConfig::default());

        scheduler
            .update_config(ScheduleConfig::new("22:00", "06:00", [1]))
            .unwrap();
        assert!(scheduler.is_in_schedule_at(at(2, 2, 0)));
    }

    struct CountingTrigger(AtomicUsize);

    #[async_trait]
    impl ScheduleTrigger for CountingTrigger {
        async fn on_schedule(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn always_open() -> ScheduleConfig {
        ScheduleConfig::new("00:00", "23:59", 0..=6)
    }

    #[tokio::test]
    async fn test_start_triggers_immediately() {
        let trigger = Arc::new(CountingTrigger(AtomicUsize::new(0)));
        let mut scheduler = Scheduler::with_trigger(always_open(), trigger.clone()).unwrap();

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(trigger.0.load(Ordering::SeqCst), 1);
        assert!(scheduler.status().is_active);

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(!scheduler.status().is_active);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let trigger = Arc::new(CountingTrigger(AtomicUsize::new(0)));
        let mut scheduler = Scheduler::with_trigger(always_open(), trigger.clone())
            .unwrap()
            .with_tick_period(Duration::from_millis(20));

        scheduler.start();
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(90)).await;
        scheduler.stop();
        scheduler.stop();

        let fired = trigger.0.load(Ordering::SeqCst);
        assert!(fired >= 2, "expected repeated ticks, got {}", fired);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(trigger.0.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn test_update_config_restarts_running_scheduler() {
        let trigger = Arc::new(CountingTrigger(AtomicUsize::new(0)));
        let mut scheduler = Scheduler::with_trigger(always_open(), trigger.clone()).unwrap();

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.update_config(always_open()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(scheduler.is_running());
        assert_eq!(trigger.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_trigger_outside_window() {
        let trigger = Arc::new(CountingTrigger(AtomicUsize::new(0)));
        let mut scheduler = Scheduler::with_trigger(ScheduleConfig::new("09:00", "10:00", []), trigger.clone())
            .unwrap()
            .with_tick_period(Duration::from_millis(10));

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop();
        assert_eq!(trigger.0.load(Ordering::SeqCst), 0);
    }
}
