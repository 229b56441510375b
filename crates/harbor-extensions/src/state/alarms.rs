//! Alarm scheduling.
//!
//! Each alarm is one tokio task sleeping until its deadline. Replacing or
//! clearing an alarm aborts the task, and every firing re-checks the
//! alarm's generation under the table lock, so a task that already woke
//! up cannot fire for an alarm that has since been replaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harbor_common::ExtensionId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::background::HostEvent;
use crate::sync::lock;

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub name: String,
    /// Epoch milliseconds.
    pub scheduled_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_in_minutes: Option<f64>,
}

/// `alarmInfo` of `alarms.create`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlarmSpec {
    pub when: Option<f64>,
    pub delay_in_minutes: Option<f64>,
    pub period_in_minutes: Option<f64>,
}

impl AlarmSpec {
    /// Delay before the first firing. With neither `when` nor a delay the
    /// alarm fires right away.
    fn initial_delay_ms(&self, now_ms: f64) -> f64 {
        let delay = match (self.when, self.delay_in_minutes) {
            (Some(when), _) => when - now_ms,
            (None, Some(minutes)) => minutes * MS_PER_MINUTE,
            (None, None) => 0.0,
        };
        delay.max(0.0)
    }
}

type AlarmKey = (ExtensionId, String);

struct Scheduled {
    alarm: Alarm,
    generation: u64,
    task: JoinHandle<()>,
}

pub struct AlarmScheduler {
    table: Arc<Mutex<HashMap<AlarmKey, Scheduled>>>,
    events: mpsc::UnboundedSender<HostEvent>,
    generations: AtomicU64,
}

impl AlarmScheduler {
    pub fn new(events: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            events,
            generations: AtomicU64::new(1),
        }
    }

    /// Schedule `name`, replacing any alarm with the same name.
    /// Must be called from within a tokio runtime.
    pub fn create(&self, extension: &ExtensionId, name: &str, spec: &AlarmSpec) -> Alarm {
        let now = now_ms();
        let delay_ms = spec.initial_delay_ms(now);
        let period = spec.period_in_minutes.filter(|p| *p > 0.0);
        let alarm = Alarm {
            name: name.to_string(),
            scheduled_time: now + delay_ms,
            period_in_minutes: period,
        };
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let key: AlarmKey = (extension.clone(), name.to_string());

        let mut table = lock(&self.table);
        if let Some(previous) = table.remove(&key) {
            previous.task.abort();
            debug!(extension = %extension, alarm = name, "alarm replaced");
        }
        let task = tokio::spawn(run_alarm(
            Arc::clone(&self.table),
            self.events.clone(),
            key.clone(),
            generation,
            duration_from_ms(delay_ms),
            period,
        ));
        table.insert(
            key,
            Scheduled {
                alarm: alarm.clone(),
                generation,
                task,
            },
        );
        info!(extension = %extension, alarm = name, delay_ms, ?period, "alarm scheduled");
        alarm
    }

    pub fn get(&self, extension: &ExtensionId, name: &str) -> Option<Alarm> {
        lock(&self.table)
            .get(&(extension.clone(), name.to_string()))
            .map(|s| s.alarm.clone())
    }

    pub fn all(&self, extension: &ExtensionId) -> Vec<Alarm> {
        let mut alarms: Vec<Alarm> = lock(&self.table)
            .iter()
            .filter(|((ext, _), _)| ext == extension)
            .map(|(_, s)| s.alarm.clone())
            .collect();
        alarms.sort_by(|a, b| a.name.cmp(&b.name));
        alarms
    }

    /// Returns whether an alarm was cancelled.
    pub fn clear(&self, extension: &ExtensionId, name: &str) -> bool {
        match lock(&self.table).remove(&(extension.clone(), name.to_string())) {
            Some(scheduled) => {
                scheduled.task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every alarm of one extension. Returns how many were live.
    pub fn clear_all(&self, extension: &ExtensionId) -> usize {
        let mut table = lock(&self.table);
        let keys: Vec<AlarmKey> = table
            .keys()
            .filter(|(ext, _)| ext == extension)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(scheduled) = table.remove(key) {
                scheduled.task.abort();
            }
        }
        keys.len()
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        for (_, scheduled) in lock(&self.table).drain() {
            scheduled.task.abort();
        }
    }
}

async fn run_alarm(
    table: Arc<Mutex<HashMap<AlarmKey, Scheduled>>>,
    events: mpsc::UnboundedSender<HostEvent>,
    key: AlarmKey,
    generation: u64,
    first_delay: Duration,
    period: Option<f64>,
) {
    let mut wait = first_delay;
    loop {
        tokio::time::sleep(wait).await;

        let fired = {
            let mut table = lock(&table);
            let Some(scheduled) = table.get_mut(&key) else {
                return;
            };
            if scheduled.generation != generation {
                return;
            }
            let fired = scheduled.alarm.clone();
            match period {
                Some(minutes) => scheduled.alarm.scheduled_time = now_ms() + minutes * MS_PER_MINUTE,
                None => {
                    table.remove(&key);
                }
            }
            fired
        };

        debug!(extension = %key.0, alarm = %fired.name, "alarm fired");
        let _ = events.send(HostEvent::Alarm {
            extension: key.0.clone(),
            alarm: fired,
        });

        match period {
            Some(minutes) => wait = duration_from_ms(minutes * MS_PER_MINUTE),
            None => return,
        }
    }
}

fn duration_from_ms(ms: f64) -> Duration {
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
}

fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}
