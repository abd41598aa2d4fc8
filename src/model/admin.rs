use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::plan::Plan;
use crate::utils::geo::{GeoPoint, Geofence};

/// Tenant owner row. `password` never leaves the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Admin {
    pub id: u64,
    pub company_name: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub plan: String,
    pub office_latitude: Option<f64>,
    pub office_longitude: Option<f64>,
    pub allowed_radius_m: f64,
    pub device_lock_enabled: bool,
    pub location_check_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn plan(&self) -> Plan {
        Plan::parse_lenient(&self.plan)
    }

    /// The geofence to enforce, if location checks are active for this tenant.
    pub fn active_geofence(&self) -> Option<Geofence> {
        if !self.location_check_enabled || !self.plan().allows_geofence() {
            return None;
        }
        let (lat, lon) = (self.office_latitude?, self.office_longitude?);
        Some(Geofence {
            center: GeoPoint { latitude: lat, longitude: lon },
            radius_m: self.allowed_radius_m,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "company_name": "Acme Ltd",
    "name": "Jane Owner",
    "email": "owner@acme.test",
    "plan": "premium",
    "office_latitude": 23.8103,
    "office_longitude": 90.4125,
    "allowed_radius_m": 150.0,
    "device_lock_enabled": true,
    "location_check_enabled": true,
    "created_at": "2026-01-01T00:00:00Z"
}))]
pub struct AdminProfile {
    pub id: u64,
    pub company_name: String,
    pub name: String,
    pub email: String,
    pub plan: Plan,
    pub office_latitude: Option<f64>,
    pub office_longitude: Option<f64>,
    pub allowed_radius_m: f64,
    pub device_lock_enabled: bool,
    pub location_check_enabled: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl From<Admin> for AdminProfile {
    fn from(a: Admin) -> Self {
        let plan = a.plan();
        Self {
            id: a.id,
            company_name: a.company_name,
            name: a.name,
            email: a.email,
            plan,
            office_latitude: a.office_latitude,
            office_longitude: a.office_longitude,
            allowed_radius_m: a.allowed_radius_m,
            device_lock_enabled: a.device_lock_enabled,
            location_check_enabled: a.location_check_enabled,
            created_at: a.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_admin() -> Admin {
    Admin {
        id: 1,
        company_name: "Acme Ltd".into(),
        name: "Jane Owner".into(),
        email: "owner@acme.test".into(),
        password: String::new(),
        plan: "premium".into(),
        office_latitude: Some(23.8103),
        office_longitude: Some(90.4125),
        allowed_radius_m: 150.0,
        device_lock_enabled: true,
        location_check_enabled: true,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geofence_requires_flag_plan_and_office() {
        let admin = sample_admin();
        assert!(admin.active_geofence().is_some());

        let disabled = Admin { location_check_enabled: false, ..sample_admin() };
        assert!(disabled.active_geofence().is_none());

        let free = Admin { plan: "free".into(), ..sample_admin() };
        assert!(free.active_geofence().is_none());

        let no_office = Admin { office_longitude: None, ..sample_admin() };
        assert!(no_office.active_geofence().is_none());
    }

    #[test]
    fn profile_drops_password() {
        let profile = AdminProfile::from(Admin { password: "hash".into(), ..sample_admin() });
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["plan"], "premium");
    }
}
