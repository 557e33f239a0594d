//! User-visible alert and sharing texts.
//!
//! The SOS strings are read by contacts on their phones and by tooling that
//! parses them; keep them byte-for-byte stable.

use crate::position::Position;

pub const SOS_PREFIX: &str = "SOS! I need help!";
pub const SOS_LOCATION_UNAVAILABLE: &str = "SOS! I need help! Location not available.";

/// Compose the SOS message sent to every trusted contact
pub fn compose_sos_message(position: Option<&Position>) -> String {
    match position {
        Some(pos) => format!("{} My current location: {}", SOS_PREFIX, pos.maps_link()),
        None => SOS_LOCATION_UNAVAILABLE.to_string(),
    }
}

/// Compose the notice sent to recipients when a sharing session starts
pub fn compose_sharing_notice(duration_minutes: u32) -> String {
    if duration_minutes == 0 {
        "I'm sharing my live location with you until I stop sharing.".to_string()
    } else {
        format!(
            "I'm sharing my live location with you for {}.",
            describe_duration(duration_minutes)
        )
    }
}

/// Describe a sharing duration the way the duration picker labels it
pub fn describe_duration(duration_minutes: u32) -> String {
    match duration_minutes {
        0 => "Indefinitely".to_string(),
        60 => "1 hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{} minutes", m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sos_message_with_position() {
        let pos = Position::new(40.7128, -74.006);
        assert_eq!(
            compose_sos_message(Some(&pos)),
            "SOS! I need help! My current location: https://www.google.com/maps?q=40.7128,-74.006"
        );
    }

    #[test]
    fn test_sos_message_without_position() {
        assert_eq!(
            compose_sos_message(None),
            "SOS! I need help! Location not available."
        );
    }

    #[test]
    fn test_sharing_notice() {
        assert_eq!(
            compose_sharing_notice(30),
            "I'm sharing my live location with you for 30 minutes."
        );
        assert_eq!(
            compose_sharing_notice(120),
            "I'm sharing my live location with you for 2 hours."
        );
        assert_eq!(
            compose_sharing_notice(0),
            "I'm sharing my live location with you until I stop sharing."
        );
    }

    #[test]
    fn test_describe_duration() {
        assert_eq!(describe_duration(15), "15 minutes");
        assert_eq!(describe_duration(60), "1 hour");
        assert_eq!(describe_duration(1), "1 minute");
        assert_eq!(describe_duration(0), "Indefinitely");
    }
}
