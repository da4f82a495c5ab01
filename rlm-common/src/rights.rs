//! Right type registry
//!
//! Fixed set of royalty income categories that every split calculation is
//! keyed on. Adding a category means adding a variant here, a field to
//! [`ShareSet`], and nothing else: the validator and resolver iterate
//! [`RightType::all_variants`].

use serde::{Deserialize, Serialize};

/// Royalty right categories
///
/// Percentages are tracked independently per right type: a party may hold
/// 100% mechanical and 0% performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightType {
    /// Public performance (broadcast, live, streaming performance)
    Performance,
    /// Mechanical reproduction (physical, downloads, interactive streams)
    Mechanical,
    /// Printed music (sheet music, folios)
    Print,
    /// Synchronization with visual media
    Synch,
    /// Dramatic works performed on stage
    GrandRights,
    /// Karaoke and lyric-display reproduction
    Karaoke,
}

impl RightType {
    /// Parse right type from string (from database or import files)
    ///
    /// Accepts the canonical names plus common aliases:
    /// - 'sync', 'synchronization' (Synch)
    /// - 'grand', 'grand-rights', 'grandrights' (GrandRights)
    /// - 'perf' (Performance), 'mech' (Mechanical)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "performance" | "perf" => Some(RightType::Performance),
            "mechanical" | "mech" => Some(RightType::Mechanical),
            "print" => Some(RightType::Print),
            "synch" | "sync" | "synchronization" => Some(RightType::Synch),
            "grand_rights" | "grand-rights" | "grandrights" | "grand" => {
                Some(RightType::GrandRights)
            }
            "karaoke" => Some(RightType::Karaoke),
            _ => None,
        }
    }

    /// Canonical database value (lowercase, underscored)
    pub fn to_db_string(&self) -> &'static str {
        match self {
            RightType::Performance => "performance",
            RightType::Mechanical => "mechanical",
            RightType::Print => "print",
            RightType::Synch => "synch",
            RightType::GrandRights => "grand_rights",
            RightType::Karaoke => "karaoke",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            RightType::Performance => "Performance",
            RightType::Mechanical => "Mechanical",
            RightType::Print => "Print",
            RightType::Synch => "Synch",
            RightType::GrandRights => "Grand Rights",
            RightType::Karaoke => "Karaoke",
        }
    }

    /// All right types, in registry order
    pub fn all_variants() -> &'static [RightType] {
        &[
            RightType::Performance,
            RightType::Mechanical,
            RightType::Print,
            RightType::Synch,
            RightType::GrandRights,
            RightType::Karaoke,
        ]
    }
}

impl std::fmt::Display for RightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One percentage per right type
///
/// Values are stored raw. Range checking belongs to the split validator so
/// that out-of-range values typed mid-edit stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSet {
    pub performance: f64,
    pub mechanical: f64,
    pub print: f64,
    pub synch: f64,
    pub grand_rights: f64,
    pub karaoke: f64,
}

impl ShareSet {
    /// Share set with every right type at the same percentage
    pub fn uniform(percentage: f64) -> Self {
        Self {
            performance: percentage,
            mechanical: percentage,
            print: percentage,
            synch: percentage,
            grand_rights: percentage,
            karaoke: percentage,
        }
    }

    pub fn get(&self, right: RightType) -> f64 {
        match right {
            RightType::Performance => self.performance,
            RightType::Mechanical => self.mechanical,
            RightType::Print => self.print,
            RightType::Synch => self.synch,
            RightType::GrandRights => self.grand_rights,
            RightType::Karaoke => self.karaoke,
        }
    }

    pub fn set(&mut self, right: RightType, percentage: f64) {
        let slot = match right {
            RightType::Performance => &mut self.performance,
            RightType::Mechanical => &mut self.mechanical,
            RightType::Print => &mut self.print,
            RightType::Synch => &mut self.synch,
            RightType::GrandRights => &mut self.grand_rights,
            RightType::Karaoke => &mut self.karaoke,
        };
        *slot = percentage;
    }

    /// Iterate (right type, percentage) pairs in registry order
    pub fn iter(&self) -> impl Iterator<Item = (RightType, f64)> + '_ {
        RightType::all_variants().iter().map(move |r| (*r, self.get(*r)))
    }

    /// Largest percentage held across all right types
    pub fn max_share(&self) -> f64 {
        self.iter().map(|(_, pct)| pct).fold(0.0_f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_round_trip() {
        for right in RightType::all_variants() {
            let parsed = RightType::from_str(right.to_db_string()).unwrap();
            assert_eq!(*right, parsed, "Round-trip failed for {:?}", right);
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(RightType::from_str("sync"), Some(RightType::Synch));
        assert_eq!(RightType::from_str("Synchronization"), Some(RightType::Synch));
        assert_eq!(RightType::from_str("grand-rights"), Some(RightType::GrandRights));
        assert_eq!(RightType::from_str(" MECH "), Some(RightType::Mechanical));
        assert_eq!(RightType::from_str("neighbouring"), None);
        assert_eq!(RightType::from_str(""), None);
    }

    #[test]
    fn test_serde_names_match_db_strings() {
        for right in RightType::all_variants() {
            let json = serde_json::to_string(right).unwrap();
            assert_eq!(json, format!("\"{}\"", right.to_db_string()));
        }
    }

    #[test]
    fn test_share_set_independent_per_right() {
        let mut shares = ShareSet::default();
        shares.set(RightType::Mechanical, 100.0);
        assert_eq!(shares.get(RightType::Mechanical), 100.0);
        assert_eq!(shares.get(RightType::Performance), 0.0);
        assert_eq!(shares.max_share(), 100.0);
    }

    #[test]
    fn test_share_set_iter_covers_registry() {
        let shares = ShareSet::uniform(10.0);
        let collected: Vec<_> = shares.iter().collect();
        assert_eq!(collected.len(), RightType::all_variants().len());
        assert!(collected.iter().all(|(_, pct)| *pct == 10.0));
    }

    #[test]
    fn test_max_share_of_empty_set_is_zero() {
        assert_eq!(ShareSet::default().max_share(), 0.0);
    }
}
