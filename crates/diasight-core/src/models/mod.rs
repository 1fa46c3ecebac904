//! Domain models for the DiaSight assessment pipeline.

mod audit;
mod classification;
mod clinician;
mod features;
mod record;

pub use audit::*;
pub use classification::*;
pub use clinician::*;
pub use features::*;
pub use record::*;

pub use diasight_classifier::RiskClass;

/// Current UTC time as RFC 3339 with fixed microsecond precision, so that
/// stored timestamps sort lexically in chronological order.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_chronologically() {
        let first = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = now_timestamp();
        assert!(second > first);
        assert!(first.ends_with('Z'));
        assert_eq!(first.len(), second.len());
    }
}
