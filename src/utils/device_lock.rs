/// Outcome of comparing a presented device id with the one bound to an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDecision {
    /// Lock disabled, or presented id matches the binding.
    Allowed,
    /// No device bound yet; the presented id should be bound.
    Bind,
    /// Lock enabled but the request carried no device id.
    Missing,
    Mismatch,
}

fn normalize(device_id: Option<&str>) -> Option<&str> {
    device_id.map(str::trim).filter(|d| !d.is_empty())
}

pub fn check_device(lock_enabled: bool, bound: Option<&str>, presented: Option<&str>) -> DeviceDecision {
    if !lock_enabled {
        return DeviceDecision::Allowed;
    }

    match (normalize(bound), normalize(presented)) {
        (_, None) => DeviceDecision::Missing,
        (None, Some(_)) => DeviceDecision::Bind,
        (Some(b), Some(p)) if b == p => DeviceDecision::Allowed,
        (Some(_), Some(_)) => DeviceDecision::Mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_lock_allows_anything() {
        assert_eq!(check_device(false, Some("a"), None), DeviceDecision::Allowed);
        assert_eq!(check_device(false, Some("a"), Some("b")), DeviceDecision::Allowed);
    }

    #[test]
    fn first_device_binds() {
        assert_eq!(check_device(true, None, Some("phone-1")), DeviceDecision::Bind);
        assert_eq!(check_device(true, Some("  "), Some("phone-1")), DeviceDecision::Bind);
    }

    #[test]
    fn bound_device_must_match() {
        assert_eq!(check_device(true, Some("phone-1"), Some("phone-1")), DeviceDecision::Allowed);
        assert_eq!(check_device(true, Some("phone-1"), Some(" phone-1 ")), DeviceDecision::Allowed);
        assert_eq!(check_device(true, Some("phone-1"), Some("phone-2")), DeviceDecision::Mismatch);
    }

    #[test]
    fn missing_device_id_is_rejected() {
        assert_eq!(check_device(true, Some("phone-1"), None), DeviceDecision::Missing);
        assert_eq!(check_device(true, None, Some("")), DeviceDecision::Missing);
    }
}
