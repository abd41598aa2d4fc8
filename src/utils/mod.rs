pub mod calendar;
pub mod db_utils;
pub mod device_lock;
pub mod email_filter;
pub mod gate_cache;
pub mod geo;
pub mod pagination;
pub mod payroll_calc;
pub mod revocation_cache;
