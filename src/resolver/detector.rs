//! Classifies a modern-driver failure as "file is an older format revision".
//!
//! Drivers report this only through message text, which varies by driver
//! version and locale, so the check is a heuristic and is kept swappable.

use crate::error::Error;

/// Decides whether a failed open means the file is a legacy-format revision.
pub trait LegacyFormatDetector: Send + Sync {
    fn is_legacy_format(&self, error: &Error) -> bool;
}

/// Matches configured substrings against the error message, ignoring case.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    markers: Vec<String>,
}

impl MarkerDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl LegacyFormatDetector for MarkerDetector {
    fn is_legacy_format(&self, error: &Error) -> bool {
        let message = error.to_string().to_lowercase();
        self.markers.iter().any(|m| message.contains(m.as_str()))
    }
}
