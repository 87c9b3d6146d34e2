//! Common serde utilities for human-readable durations and bool-like flags.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '6s', '5m', '3days')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
            }

            fn visit_f64<E>(self, seconds: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Duration::try_from_secs_f64(seconds)
                    .map_err(|e| de::Error::custom(format!("Invalid duration {seconds}: {e}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// Bool-like flags that also accept the string forms operators tend to write
/// into settings (`"true"`, `"True"`, `"1"`, `"yes"`, `"on"`).
pub mod truthy {
    use super::*;

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bool(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TruthyVisitor;

        impl<'de> Visitor<'de> for TruthyVisitor {
            type Value = bool;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a boolean or a boolean-like string")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value != 0)
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value != 0)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(is_truthy(value))
            }
        }

        deserializer.deserialize_any(TruthyVisitor)
    }
}

/// Interpret a stored setting value as a boolean. Anything unrecognised is false.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(with = "duration")]
        wait: Duration,
        #[serde(with = "truthy")]
        enabled: bool,
    }

    #[test]
    fn test_duration_accepts_strings_and_numbers() {
        let parsed: Sample = toml::from_str("wait = \"1m 30s\"\nenabled = true").unwrap();
        assert_eq!(parsed.wait, Duration::from_secs(90));

        let parsed: Sample = toml::from_str("wait = 6\nenabled = false").unwrap();
        assert_eq!(parsed.wait, Duration::from_secs(6));
    }

    #[test]
    fn test_truthy_accepts_string_forms() {
        for raw in ["\"true\"", "\"True\"", "\"1\"", "\"yes\"", "true"] {
            let parsed: Sample = toml::from_str(&format!("wait = 1\nenabled = {raw}")).unwrap();
            assert!(parsed.enabled, "{raw} should be truthy");
        }
        for raw in ["\"false\"", "\"False\"", "\"0\"", "\"nope\"", "false"] {
            let parsed: Sample = toml::from_str(&format!("wait = 1\nenabled = {raw}")).unwrap();
            assert!(!parsed.enabled, "{raw} should be falsy");
        }
    }
}
