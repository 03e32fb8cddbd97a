use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string literal is also the serde representation, which matches
/// the values the assessment service accepts and returns.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    User => "user",
    Assistant => "assistant",
});

str_enum!(Gender {
    Male => "maschio",
    Female => "femmina",
    Other => "altro",
    PreferNotToSay => "preferisco-non-dire",
});

str_enum!(AgeBracket {
    Under12 => "<12",
    From12To18 => "12-18",
    From19To30 => "19-30",
    From31To50 => "31-50",
    From51To70 => "51-70",
    Over70 => ">70",
});

str_enum!(DurationBucket {
    OneDay => "1-giorno",
    TwoToThreeDays => "2-3-giorni",
    MoreThanThreeDays => "piu-3-giorni",
    Chronic => "cronico",
});

str_enum!(SessionStatus {
    Active => "active",
    Completed => "completed",
    Abandoned => "abandoned",
});

// ═══════════════════════════════════════════
// Urgency tier
// ═══════════════════════════════════════════

/// Ordinal urgency classification attached to assistant turns.
///
/// Parsing is lenient: anything the service sends that is not one of the
/// three known tiers (including a missing value) becomes `Unknown`, which
/// orders below `Low` so it never wins a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum UrgencyTier {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("medium") => Self::Medium,
            Some("high") => Self::High,
            _ => Self::Unknown,
        }
    }

    /// Highest tier in the sequence, `Unknown` for an empty sequence.
    pub fn max_of<I>(tiers: I) -> Self
    where
        I: IntoIterator<Item = UrgencyTier>,
    {
        tiers.into_iter().max().unwrap_or_default()
    }
}

impl std::fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UrgencyTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UrgencyTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_wire(raw.as_deref()))
    }
}
