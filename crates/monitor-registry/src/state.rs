use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use pagewatch_core_types::{MonitorId, Zone, ZoneId};

use crate::errors::RegistryError;
use crate::model::{ConfigPatch, MonitorConfig, MonitorEntry, MonitorList, MonitorStatus};

/// Owns all live monitors. Lookups are O(1) by id; per-entry state sits
/// behind its own lock so monitors never contend with each other.
///
/// This is an explicit handle passed to collaborators, never ambient state.
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: DashMap<MonitorId, Arc<RwLock<MonitorEntry>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        target: impl Into<String>,
        config: MonitorConfig,
    ) -> (MonitorId, Arc<RwLock<MonitorEntry>>) {
        let entry = MonitorEntry::new(target, config);
        let id = entry.id.clone();
        let handle = Arc::new(RwLock::new(entry));
        self.monitors.insert(id.clone(), Arc::clone(&handle));
        info!(monitor = %id, "monitor registered");
        (id, handle)
    }

    pub fn ensure(&self, id: &MonitorId) -> Result<Arc<RwLock<MonitorEntry>>, RegistryError> {
        self.monitors
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::MonitorNotFound(id.clone()))
    }

    /// Lookup that additionally rejects terminal monitors. Used by every
    /// mutating operation; history queries and export go through `ensure`.
    pub fn ensure_live(&self, id: &MonitorId) -> Result<Arc<RwLock<MonitorEntry>>, RegistryError> {
        let handle = self.ensure(id)?;
        if handle.read().status == MonitorStatus::Stopped {
            return Err(RegistryError::MonitorStopped(id.clone()));
        }
        Ok(handle)
    }

    /// `ACTIVE|ERROR -> PAUSED`. Returns the new schedule epoch.
    pub fn pause(&self, id: &MonitorId) -> Result<u64, RegistryError> {
        let handle = self.ensure_live(id)?;
        let mut entry = handle.write();
        match entry.status {
            MonitorStatus::Active | MonitorStatus::Error => {
                entry.status = MonitorStatus::Paused;
                let epoch = entry.bump_epoch();
                debug!(monitor = %id, epoch, "monitor paused");
                Ok(epoch)
            }
            MonitorStatus::Paused => Err(RegistryError::InvalidTransition {
                action: "pause",
                status: entry.status.as_str(),
            }),
            MonitorStatus::Stopped => unreachable!("ensure_live rejects stopped monitors"),
        }
    }

    /// `PAUSED -> ACTIVE`. Returns the new schedule epoch.
    pub fn resume(&self, id: &MonitorId) -> Result<u64, RegistryError> {
        let handle = self.ensure_live(id)?;
        let mut entry = handle.write();
        match entry.status {
            MonitorStatus::Paused => {
                entry.status = MonitorStatus::Active;
                let epoch = entry.bump_epoch();
                debug!(monitor = %id, epoch, "monitor resumed");
                Ok(epoch)
            }
            status => Err(RegistryError::InvalidTransition {
                action: "resume",
                status: status.as_str(),
            }),
        }
    }

    /// Terminal transition. History stays queryable afterwards.
    pub fn stop(&self, id: &MonitorId) -> Result<(), RegistryError> {
        let handle = self.ensure_live(id)?;
        let mut entry = handle.write();
        entry.status = MonitorStatus::Stopped;
        entry.bump_epoch();
        info!(monitor = %id, "monitor stopped");
        Ok(())
    }

    /// Merge a partial configuration. Returns whether the interval changed
    /// (the caller reschedules in that case) and the monitor status.
    pub fn configure(
        &self,
        id: &MonitorId,
        patch: ConfigPatch,
    ) -> Result<(bool, MonitorStatus), RegistryError> {
        let handle = self.ensure_live(id)?;
        let mut entry = handle.write();

        let mut interval_changed = false;
        if let Some(methods) = patch.methods {
            entry.config.methods = methods;
        }
        if let Some(interval) = patch.interval {
            interval_changed = interval != entry.config.interval;
            entry.config.interval = interval;
        }
        if let Some(threshold) = patch.threshold {
            entry.config.threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(notify) = patch.notify_on_change {
            entry.config.notify_on_change = notify;
        }
        if let Some(screenshots) = patch.capture_screenshots {
            entry.config.capture_screenshots = screenshots;
        }
        if let Some(keep) = patch.keep_history {
            entry.config.keep_history = keep;
        }
        if let Some(cap) = patch.max_history_size {
            entry.config.max_history_size = cap.max(1);
            entry.history.set_cap(cap);
        }
        if interval_changed {
            entry.bump_epoch();
        }
        debug!(monitor = %id, interval_changed, "monitor reconfigured");
        Ok((interval_changed, entry.status))
    }

    /// Fails with `DuplicateZone` before any mutation when the selector is
    /// already present.
    pub fn add_zone(&self, id: &MonitorId, zone: Zone) -> Result<ZoneId, RegistryError> {
        let handle = self.ensure_live(id)?;
        let mut entry = handle.write();
        if entry
            .config
            .zones
            .iter()
            .any(|existing| existing.selector == zone.selector)
        {
            return Err(RegistryError::DuplicateZone {
                selector: zone.selector,
            });
        }
        let zone_id = zone.id.clone();
        entry.config.zones.push(zone);
        Ok(zone_id)
    }

    pub fn remove_zone(&self, id: &MonitorId, zone_id: &ZoneId) -> Result<Zone, RegistryError> {
        let handle = self.ensure_live(id)?;
        let mut entry = handle.write();
        let position = entry
            .config
            .zones
            .iter()
            .position(|zone| &zone.id == zone_id)
            .ok_or_else(|| RegistryError::ZoneNotFound(zone_id.clone()))?;
        Ok(entry.config.zones.remove(position))
    }

    pub fn list(&self) -> MonitorList {
        let mut monitors: Vec<_> = self
            .monitors
            .iter()
            .map(|entry| entry.value().read().summary())
            .collect();
        monitors.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        let active = monitors
            .iter()
            .filter(|m| m.status == MonitorStatus::Active)
            .count();
        let paused = monitors
            .iter()
            .filter(|m| m.status == MonitorStatus::Paused)
            .count();
        MonitorList {
            total: monitors.len(),
            active,
            paused,
            monitors,
        }
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_monitor() -> (MonitorRegistry, MonitorId) {
        let registry = MonitorRegistry::new();
        let (id, _) = registry.insert("https://example.com", MonitorConfig::default());
        (registry, id)
    }

    #[test]
    fn unknown_monitor_is_not_found() {
        let registry = MonitorRegistry::new();
        let err = registry.ensure(&MonitorId::new()).unwrap_err();
        assert!(matches!(err, RegistryError::MonitorNotFound(_)));
    }

    #[test]
    fn pause_resume_cycle() {
        let (registry, id) = registry_with_monitor();
        registry.pause(&id).unwrap();
        assert_eq!(
            registry.ensure(&id).unwrap().read().status,
            MonitorStatus::Paused
        );
        // Pausing twice is an invalid transition.
        assert!(matches!(
            registry.pause(&id).unwrap_err(),
            RegistryError::InvalidTransition { .. }
        ));
        registry.resume(&id).unwrap();
        assert_eq!(
            registry.ensure(&id).unwrap().read().status,
            MonitorStatus::Active
        );
    }

    #[test]
    fn stop_is_terminal() {
        let (registry, id) = registry_with_monitor();
        registry.stop(&id).unwrap();
        assert!(matches!(
            registry.pause(&id).unwrap_err(),
            RegistryError::MonitorStopped(_)
        ));
        assert!(matches!(
            registry.configure(&id, ConfigPatch::default()).unwrap_err(),
            RegistryError::MonitorStopped(_)
        ));
        // Lookup for queries still works.
        assert!(registry.ensure(&id).is_ok());
    }

    #[test]
    fn duplicate_zone_selector_is_rejected_without_mutation() {
        let (registry, id) = registry_with_monitor();
        registry
            .add_zone(&id, Zone::new("#prices", "Prices"))
            .unwrap();
        let before: Vec<Zone> = registry.ensure(&id).unwrap().read().config.zones.clone();

        let err = registry
            .add_zone(&id, Zone::new("#prices", "Prices again"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateZone { .. }));

        let after = registry.ensure(&id).unwrap().read().config.zones.clone();
        assert_eq!(before, after);
    }

    #[test]
    fn remove_unknown_zone_fails() {
        let (registry, id) = registry_with_monitor();
        let err = registry.remove_zone(&id, &ZoneId::new()).unwrap_err();
        assert!(matches!(err, RegistryError::ZoneNotFound(_)));
    }

    #[test]
    fn configure_reports_interval_change() {
        let (registry, id) = registry_with_monitor();
        let (changed, _) = registry
            .configure(
                &id,
                ConfigPatch {
                    threshold: Some(0.5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!changed);

        let (changed, _) = registry
            .configure(
                &id,
                ConfigPatch {
                    interval: Some(std::time::Duration::from_secs(30)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(changed);
    }

    #[test]
    fn list_counts_active_and_paused() {
        let registry = MonitorRegistry::new();
        let (a, _) = registry.insert("https://a.example", MonitorConfig::default());
        let (_b, _) = registry.insert("https://b.example", MonitorConfig::default());
        registry.pause(&a).unwrap();

        let list = registry.list();
        assert_eq!(list.total, 2);
        assert_eq!(list.active, 1);
        assert_eq!(list.paused, 1);
    }
}
