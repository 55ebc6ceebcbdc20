use serde::{Deserialize, Serialize};

/// Delivery mode requested from the notification server.
///
/// In `Debug` mode the server redirects notifications to its debug recipient
/// instead of the requested one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    Production,
    Staging,
    #[default]
    Debug,
}

impl NotificationMode {
    /// All supported modes.
    pub const ALL: [NotificationMode; 3] = [
        NotificationMode::Production,
        NotificationMode::Staging,
        NotificationMode::Debug,
    ];
}

impl std::fmt::Display for NotificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationMode::Production => write!(f, "production"),
            NotificationMode::Staging => write!(f, "staging"),
            NotificationMode::Debug => write!(f, "debug"),
        }
    }
}

impl std::str::FromStr for NotificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "production" => Ok(NotificationMode::Production),
            "staging" => Ok(NotificationMode::Staging),
            "debug" => Ok(NotificationMode::Debug),
            other => Err(format!(
                "invalid mode '{}'; supported modes are production, staging, debug",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_default_is_debug() {
        assert_eq!(NotificationMode::default(), NotificationMode::Debug);
    }

    #[test]
    fn test_mode_parse_and_display() {
        for mode in NotificationMode::ALL {
            let parsed: NotificationMode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert_eq!(
            " staging ".parse::<NotificationMode>().unwrap(),
            NotificationMode::Staging
        );
    }

    #[test]
    fn test_mode_rejects_unknown() {
        for bad in ["", " ", "unknown_mode", "productionstagingdebug", "DEBUG"] {
            let err = bad.parse::<NotificationMode>().unwrap_err();
            assert!(err.contains("mode"), "error for {bad:?} was {err}");
        }
    }

    #[test]
    fn test_mode_serde_lowercase() {
        let json = serde_json::to_string(&NotificationMode::Production).unwrap();
        assert_eq!(json, "\"production\"");
    }
}
