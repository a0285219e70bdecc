use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod chat;
pub mod game;
pub mod health;
pub mod rooms;
pub mod snapshot;
pub mod sse;
pub mod validation;

/// Render a store-clock timestamp (epoch milliseconds) as RFC 3339.
fn format_epoch_ms(ms: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_ms_renders_as_rfc3339() {
        assert_eq!(format_epoch_ms(0), "1970-01-01T00:00:00Z");
        assert!(format_epoch_ms(1_500).starts_with("1970-01-01T00:00:01"));
    }
}
