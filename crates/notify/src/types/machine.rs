//! Monitoring-machine notification variant.
//!
//! All four machine alerts (offline, disk, CPU, memory) share one struct;
//! the event name in the metadata selects the wording.

use chainpulse_core::events::EventName;

use super::{NotificationBody, NotificationFormat, NotificationMetadata};

/// A monitored machine crossed one of its alert predicates.
#[derive(Debug, Clone)]
pub struct MachineEventNotification {
    pub meta: NotificationMetadata,
    pub machine: String,
}

impl NotificationBody for MachineEventNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        self.meta.event_name.label().to_string()
    }

    fn info(&self, _format: NotificationFormat) -> String {
        match self.meta.event_name {
            EventName::MonitoringMachineOffline => {
                format!("Your staking machine \"{}\" is offline", self.machine)
            }
            EventName::MonitoringMachineDiskAlmostFull => format!(
                "The disk of your staking machine \"{}\" is almost full",
                self.machine
            ),
            EventName::MonitoringMachineCpuLoad => format!(
                "The CPU usage of your staking machine \"{}\" is high",
                self.machine
            ),
            EventName::MonitoringMachineMemoryUsage => format!(
                "The memory usage of your staking machine \"{}\" is high",
                self.machine
            ),
            other => format!("Machine event {} on \"{}\"", other, self.machine),
        }
    }
}
