#![allow(dead_code)]

use chrono::{FixedOffset, NaiveDate, TimeZone};
use parkwidget_core::schedule::{AlarmFacility, ScheduleError, ScheduleHandle, TimerKind};
use parkwidget_core::store::{KeyValueStore, StoreError, StoreResult};
use parkwidget_core::{InstanceId, ManualClock, RenderError, RenderTarget, SurfaceVariant, WidgetView};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Epoch ms of a KST wall-clock instant.
pub fn kst_ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> i64 {
    let naive = NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_milli_opt(h, mi, s, ms)
        .unwrap();
    kst().from_local_datetime(&naive).unwrap().timestamp_millis()
}

pub fn manual_clock(now_ms: i64) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(kst(), now_ms))
}

/// In-memory store that can be switched offline.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    offline: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Sleeps inside every write before applying it.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock().unwrap() = delay;
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("store offline")));
        }
        Ok(())
    }

    fn pause_before_write(&self) {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }
}

/// Shares one `MemoryStore` between a repository and the test body.
pub struct SharedStore(pub Arc<MemoryStore>);

impl KeyValueStore for SharedStore {
    fn label(&self) -> &'static str {
        "memory"
    }

    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<String>>> {
        self.0.check()?;
        let entries = self.0.entries.lock().unwrap();
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        self.0.check()?;
        self.0.writes.fetch_add(1, Ordering::SeqCst);
        self.0.pause_before_write();
        let mut map = self.0.entries.lock().unwrap();
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        self.0.check()?;
        self.0.writes.fetch_add(1, Ordering::SeqCst);
        let mut map = self.0.entries.lock().unwrap();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Render target that records every push.
#[derive(Default)]
pub struct RecordingTarget {
    instances: Mutex<HashMap<SurfaceVariant, Vec<InstanceId>>>,
    gone: Mutex<HashSet<InstanceId>>,
    unavailable: Mutex<HashSet<SurfaceVariant>>,
    pushes: Mutex<Vec<(SurfaceVariant, InstanceId, WidgetView)>>,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// One instance per variant: wide=1, medium=2, square=3.
    pub fn with_one_of_each() -> Arc<Self> {
        let target = Self::new();
        target.place(SurfaceVariant::Wide, &[1]);
        target.place(SurfaceVariant::Medium, &[2]);
        target.place(SurfaceVariant::Square, &[3]);
        target
    }

    pub fn place(&self, variant: SurfaceVariant, ids: &[InstanceId]) {
        self.instances.lock().unwrap().insert(variant, ids.to_vec());
    }

    pub fn mark_gone(&self, id: InstanceId) {
        self.gone.lock().unwrap().insert(id);
    }

    pub fn mark_unavailable(&self, variant: SurfaceVariant) {
        self.unavailable.lock().unwrap().insert(variant);
    }

    pub fn pushes(&self) -> Vec<(SurfaceVariant, InstanceId, WidgetView)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn take_pushes(&self) -> Vec<(SurfaceVariant, InstanceId, WidgetView)> {
        std::mem::take(&mut *self.pushes.lock().unwrap())
    }

    pub fn last_view(&self, instance: InstanceId) -> Option<WidgetView> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, id, _)| *id == instance)
            .map(|(_, _, view)| view.clone())
    }
}

impl RenderTarget for RecordingTarget {
    fn active_instances(&self, variant: SurfaceVariant) -> Result<Vec<InstanceId>, RenderError> {
        if self.unavailable.lock().unwrap().contains(&variant) {
            return Err(RenderError::TargetUnavailable(variant.as_str().to_string()));
        }
        Ok(self
            .instances
            .lock()
            .unwrap()
            .get(&variant)
            .cloned()
            .unwrap_or_default())
    }

    fn push(
        &self,
        variant: SurfaceVariant,
        instance: InstanceId,
        view: &WidgetView,
    ) -> Result<(), RenderError> {
        if self.gone.lock().unwrap().contains(&instance) {
            return Err(RenderError::InstanceGone(instance));
        }
        self.pushes
            .lock()
            .unwrap()
            .push((variant, instance, view.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCall {
    Schedule(ScheduleHandle),
    Cancel(TimerKind),
}

/// Alarm facility that records calls and can reject registrations.
#[derive(Default)]
pub struct RecordingAlarms {
    calls: Mutex<Vec<AlarmCall>>,
    reject: AtomicBool,
    reject_kind: Mutex<Option<TimerKind>>,
}

impl RecordingAlarms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Rejects registrations of `kind` only.
    pub fn reject_kind(&self, kind: Option<TimerKind>) {
        *self.reject_kind.lock().unwrap() = kind;
    }

    pub fn calls(&self) -> Vec<AlarmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancels(&self, kind: TimerKind) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == AlarmCall::Cancel(kind))
            .count()
    }
}

impl AlarmFacility for RecordingAlarms {
    fn schedule(&self, handle: &ScheduleHandle) -> Result<(), ScheduleError> {
        let rejected_kind = *self.reject_kind.lock().unwrap() == Some(handle.kind);
        if rejected_kind || self.reject.load(Ordering::SeqCst) {
            return Err(ScheduleError::Rejected {
                kind: handle.kind,
                reason: "exact alarms not permitted".to_string(),
            });
        }
        self.calls.lock().unwrap().push(AlarmCall::Schedule(*handle));
        Ok(())
    }

    fn cancel(&self, kind: TimerKind) {
        self.calls.lock().unwrap().push(AlarmCall::Cancel(kind));
    }
}
