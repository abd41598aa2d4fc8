use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 23.8103)]
    pub latitude: f64,
    #[schema(example = 90.4125)]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance in metres.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    pub center: GeoPoint,
    pub radius_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationVerdict {
    /// No geofence configured for the tenant.
    NotEnforced,
    Inside { distance_m: f64, radius_m: f64 },
    Outside { distance_m: f64, radius_m: f64 },
    /// Enforcement is on but the request carried no usable coordinates.
    Missing,
}

impl LocationVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LocationVerdict::NotEnforced | LocationVerdict::Inside { .. })
    }
}

pub fn check_location(fence: Option<&Geofence>, point: Option<&GeoPoint>) -> LocationVerdict {
    let Some(fence) = fence else {
        return LocationVerdict::NotEnforced;
    };
    let Some(point) = point.filter(|p| p.is_valid()) else {
        return LocationVerdict::Missing;
    };

    let distance_m = fence.center.distance_m(point);
    if distance_m <= fence.radius_m {
        LocationVerdict::Inside { distance_m, radius_m: fence.radius_m }
    } else {
        LocationVerdict::Outside { distance_m, radius_m: fence.radius_m }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFICE: GeoPoint = GeoPoint { latitude: 23.8103, longitude: 90.4125 };

    #[test]
    fn zero_distance_to_self() {
        assert!(OFFICE.distance_m(&OFFICE) < 1e-6);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111km() {
        let north = GeoPoint { latitude: 24.8103, longitude: 90.4125 };
        let d = OFFICE.distance_m(&north);
        assert!((d - 111_195.0).abs() < 200.0, "distance was {d}");
    }

    #[test]
    fn verdicts() {
        let fence = Geofence { center: OFFICE, radius_m: 150.0 };
        // ~100 m north
        let near = GeoPoint { latitude: 23.8112, longitude: 90.4125 };
        // ~1.1 km north
        let far = GeoPoint { latitude: 23.8203, longitude: 90.4125 };

        assert!(matches!(check_location(Some(&fence), Some(&near)), LocationVerdict::Inside { .. }));
        assert!(matches!(check_location(Some(&fence), Some(&far)), LocationVerdict::Outside { .. }));
        assert_eq!(check_location(Some(&fence), None), LocationVerdict::Missing);
        assert_eq!(check_location(None, Some(&far)), LocationVerdict::NotEnforced);
    }

    #[test]
    fn out_of_range_coordinates_count_as_missing() {
        let fence = Geofence { center: OFFICE, radius_m: 150.0 };
        let bogus = GeoPoint { latitude: 123.0, longitude: 0.0 };
        assert_eq!(check_location(Some(&fence), Some(&bogus)), LocationVerdict::Missing);
        assert!(!LocationVerdict::Missing.is_allowed());
        assert!(LocationVerdict::NotEnforced.is_allowed());
    }
}
