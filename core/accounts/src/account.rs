//! Account records as stored in `accounts.yaml`.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// On-disk timestamp format. Always UTC, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Sentinel written for an unset `exceed_time`.
pub const UNSET_SENTINEL: &str = "Null";

/// Current time truncated to what the on-disk format can hold.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// A stored credential.
///
/// The password only ever exists here as a sealed box; unsealing needs the
/// vault's private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Base64 sealed box of the password.
    pub encrypted_password: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Whether the account is currently over its quota.
    pub exceed_quota: bool,
    /// When the quota was exceeded, if it is.
    #[serde(with = "optional_timestamp", default)]
    pub exceed_time: Option<DateTime<Utc>>,
}

impl Account {
    pub(crate) fn new(encrypted_password: String) -> Self {
        Self {
            encrypted_password,
            created_at: now(),
            exceed_quota: false,
            exceed_time: None,
        }
    }

    /// Whether the account can be handed out by selection.
    pub fn is_available(&self) -> bool {
        !self.exceed_quota
    }
}

/// Quota state to apply with
/// [`AccountRegistry::update_quota`](crate::AccountRegistry::update_quota).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    /// The account hit its quota at `at`.
    Exceeded { at: DateTime<Utc> },
    /// The account may be used again.
    Available,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::{parse_timestamp, TIMESTAMP_FORMAT};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(D::Error::custom)
    }
}

mod optional_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::{parse_timestamp, TIMESTAMP_FORMAT, UNSET_SENTINEL};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.collect_str(&at.format(TIMESTAMP_FORMAT)),
            None => serializer.serialize_str(UNSET_SENTINEL),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw == UNSET_SENTINEL || raw.is_empty() => Ok(None),
            Some(raw) => parse_timestamp(&raw).map(Some).map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Account {
        Account {
            encrypted_password: "c2VhbGVk".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
            exceed_quota: false,
            exceed_time: None,
        }
    }

    #[test]
    fn test_unset_exceed_time_written_as_sentinel() {
        let yaml = serde_yaml::to_string(&sample()).unwrap();

        assert!(yaml.contains("2024-03-01T12:30:05"));
        assert!(yaml.contains("Null"));
        let back: Account = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_unset_exceed_time_read_from_any_form() {
        let base = "encrypted_password: abc\ncreated_at: 2024-03-01T12:30:05\nexceed_quota: false\n";

        for extra in ["", "exceed_time: Null\n", "exceed_time: null\n", "exceed_time: ~\n"] {
            let account: Account = serde_yaml::from_str(&format!("{}{}", base, extra)).unwrap();
            assert_eq!(account.exceed_time, None, "input: {:?}", extra);
        }
    }

    #[test]
    fn test_exceed_time_parsed_as_utc() {
        let yaml = "encrypted_password: abc\ncreated_at: 2024-03-01T12:30:05\nexceed_quota: true\nexceed_time: 2024-03-02T00:00:00\n";
        let account: Account = serde_yaml::from_str(yaml).unwrap();

        assert!(account.exceed_quota);
        assert_eq!(
            account.exceed_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        let yaml = "encrypted_password: abc\ncreated_at: yesterday\nexceed_quota: false\n";
        assert!(serde_yaml::from_str::<Account>(yaml).is_err());
    }

    #[test]
    fn test_now_has_second_precision() {
        assert_eq!(now().timestamp_subsec_nanos(), 0);
    }
}
