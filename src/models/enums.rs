use serde::{Deserialize, Serialize};

/// Raised when a string does not name any variant of an intake enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The wire and storage form of each variant is its display label.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
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

str_enum!(Sex {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

str_enum!(BiopsyStage {
    F0 => "F0",
    F1 => "F1",
    F2 => "F2",
    F3 => "F3",
    F4 => "F4",
});

str_enum!(DiagnosisGroup {
    Healthy => "Healthy",
    Mafl => "MAFL",
    MashWithoutFibrosis => "MASH w/o fibrosis",
    MashWithFibrosis => "MASH w/ fibrosis",
});

str_enum!(ReportType {
    BloodReport => "Blood Report",
    Ultrasound => "Ultrasound",
    Fibroscan => "Fibroscan",
    Biopsy => "Biopsy",
    Other => "Other",
});
