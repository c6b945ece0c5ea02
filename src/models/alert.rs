use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert categories. At most one alert exists per trade hash, of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Trade by a top-ranked trader worth mirroring.
    Copyable,
    /// Outsized trade by an infrequent trader in a thin market.
    IsolatedContact,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Copyable => "copyable",
            AlertKind::IsolatedContact => "isolated_contact",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert the engine wants to insert. Whether it is actually new is only
/// known from the rows the ignore-duplicates upsert returns.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub tx_hash: String,
    pub kind: AlertKind,
    pub message: String,
}
