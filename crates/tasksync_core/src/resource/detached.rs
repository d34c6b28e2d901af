//! No-op resource managers for processes that own no alarms, timers,
//! notifications or geofences (headless maintenance runs).

use super::{
    AlarmScheduler, GeofenceRegistrar, NotificationPresenter, ResourceResult, TimerController,
};
use crate::model::task::TaskId;
use log::debug;

/// Stand-in for managers that are not running in this process (headless
/// maintenance). Every release succeeds without side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl AlarmScheduler for Detached {
    fn cancel(&self, task: TaskId) -> ResourceResult {
        debug!("event=release module=resource status=skipped resource=alarm task={task}");
        Ok(())
    }
}

impl NotificationPresenter for Detached {
    fn cancel(&self, task: TaskId) -> ResourceResult {
        debug!("event=release module=resource status=skipped resource=notification task={task}");
        Ok(())
    }
}

impl TimerController for Detached {
    fn cancel(&self, task: TaskId) -> ResourceResult {
        debug!("event=release module=resource status=skipped resource=timer task={task}");
        Ok(())
    }

    fn update_notifications(&self) -> ResourceResult {
        Ok(())
    }
}

impl GeofenceRegistrar for Detached {
    fn update(&self, _place: &str) -> ResourceResult {
        debug!("event=release module=resource status=skipped resource=geofence");
        Ok(())
    }
}
