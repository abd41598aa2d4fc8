use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Subscription tier of a tenant.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Premium,
}

impl Plan {
    /// `None` means unlimited.
    pub fn max_employees(self) -> Option<i64> {
        match self {
            Plan::Free => Some(10),
            Plan::Basic => Some(50),
            Plan::Premium => None,
        }
    }

    pub fn allows_geofence(self) -> bool {
        !matches!(self, Plan::Free)
    }

    pub fn allows_tasks(self) -> bool {
        matches!(self, Plan::Premium)
    }

    /// Unknown values stored in the database degrade to the free tier.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Plan::Free)
    }

    pub fn can_add_employee(self, current: i64) -> bool {
        match self.max_employees() {
            Some(max) => current < max,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_per_tier() {
        assert!(Plan::Free.can_add_employee(9));
        assert!(!Plan::Free.can_add_employee(10));
        assert!(Plan::Basic.can_add_employee(49));
        assert!(!Plan::Basic.can_add_employee(50));
        assert!(Plan::Premium.can_add_employee(10_000));
    }

    #[test]
    fn feature_gates() {
        assert!(!Plan::Free.allows_geofence());
        assert!(Plan::Basic.allows_geofence());
        assert!(!Plan::Basic.allows_tasks());
        assert!(Plan::Premium.allows_tasks());
    }

    #[test]
    fn lenient_parse_defaults_to_free() {
        assert_eq!(Plan::parse_lenient("premium"), Plan::Premium);
        assert_eq!(Plan::parse_lenient("enterprise"), Plan::Free);
    }
}
