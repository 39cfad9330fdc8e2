//! The closed enumeration of tracked flag series.
//!
//! A series is an independently tracked flag set, one per product client.
//! The enumeration is closed: requests referencing any other name are
//! rejected before any store access. Adding a new product means adding a
//! variant here and nothing else -- the stores key rows by the string form.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A named, independently tracked flag set.
///
/// The string form used in URLs, query parameters, and database rows is
/// the variant name exactly as written (`PcDesktopClient`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub enum Series {
    /// Windows desktop client settings.
    PcDesktopClient,
    /// macOS desktop client settings.
    MacDesktopClient,
    /// Android app settings.
    AndroidApp,
    /// iOS app settings.
    IosApp,
    /// Studio (editor) settings.
    StudioApp,
}

impl Series {
    /// Every member of the enumeration, in tracking order.
    pub const ALL: [Self; 5] = [
        Self::PcDesktopClient,
        Self::MacDesktopClient,
        Self::AndroidApp,
        Self::IosApp,
        Self::StudioApp,
    ];

    /// The canonical string form of this series.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PcDesktopClient => "PcDesktopClient",
            Self::MacDesktopClient => "MacDesktopClient",
            Self::AndroidApp => "AndroidApp",
            Self::IosApp => "IosApp",
            Self::StudioApp => "StudioApp",
        }
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A series name outside the closed enumeration was requested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown series: {0}")]
pub struct UnknownSeriesError(pub String);

impl std::str::FromStr for Series {
    type Err = UnknownSeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|series| series.as_str() == s)
            .ok_or_else(|| UnknownSeriesError(s.to_owned()))
    }
}
