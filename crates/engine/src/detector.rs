//! Transition detection for the infection and availability dimensions.
//!
//! Both dimensions are driven by the persisted dedup state of a site. An
//! observation either moves the state (possibly yielding one alert) or is a
//! self-loop that changes nothing.

use sitewatch_core::{AlertKind, AvailabilityStatus, Reachability, Site, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DedupState {
    pub infection_alert_sent: bool,
    pub last_known_availability: Option<Reachability>,
}

impl DedupState {
    pub fn from_site(site: &Site) -> Self {
        DedupState {
            infection_alert_sent: site.infection_alert_sent,
            last_known_availability: site.last_known_availability,
        }
    }

    /// NotAlerted + Infected sends one alert; Alerted + Clean re-arms silently.
    pub fn observe_infection(&mut self, combined: Status) -> Option<AlertKind> {
        match (self.infection_alert_sent, combined) {
            (false, Status::Infected) => {
                self.infection_alert_sent = true;
                Some(AlertKind::Infection)
            }
            (true, Status::Clean) => {
                self.infection_alert_sent = false;
                None
            }
            _ => None,
        }
    }

    /// Compare against the baseline. Indeterminate readings are ignored and
    /// the first determinate reading only seeds the baseline.
    pub fn observe_availability(&mut self, current: AvailabilityStatus) -> Option<AlertKind> {
        let now = current.normalize()?;
        match self.last_known_availability {
            None => {
                self.last_known_availability = Some(now);
                None
            }
            Some(prev) if prev == now => None,
            Some(_) => {
                self.last_known_availability = Some(now);
                Some(match now {
                    Reachability::Down => AlertKind::AvailabilityDown,
                    Reachability::Up => AlertKind::AvailabilityUp,
                })
            }
        }
    }
}
