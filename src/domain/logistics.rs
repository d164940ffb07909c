//! Delivery and installation details captured at the counter

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::ServiceType;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsDetails {
    pub delivery_address: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time_window: Option<String>,
    pub delivery_notes: Option<String>,
    pub installation_address: Option<String>,
    pub installation_contact_name: Option<String>,
    pub installation_contact_phone: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub installation_time_window: Option<String>,
    pub installation_wall_type: Option<String>,
    pub installation_notes: Option<String>,
}

impl LogisticsDetails {
    pub fn is_empty(&self) -> bool { self == &Self::default() }
}

/// Which services the cashier has switched on for this sale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceToggles {
    pub delivery: bool,
    pub installation: bool,
    pub warranty: bool,
}

impl ServiceToggles {
    pub fn set(&mut self, service: ServiceType, enabled: bool) {
        match service {
            ServiceType::Delivery => self.delivery = enabled,
            ServiceType::Installation => self.installation = enabled,
            ServiceType::Warranty => self.warranty = enabled,
        }
    }

    pub fn any(&self) -> bool { self.delivery || self.installation || self.warranty }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_empty_logistics() {
        let mut l = LogisticsDetails::default();
        assert!(l.is_empty());
        l.installation_notes = Some("drywall".into());
        assert!(!l.is_empty());
    }
    #[test]
    fn test_toggles() {
        let mut t = ServiceToggles::default();
        t.set(ServiceType::Installation, true);
        assert!(t.installation && !t.delivery);
        assert!(t.any());
        t.set(ServiceType::Installation, false);
        assert!(!t.any());
    }
}
