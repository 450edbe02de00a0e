//! Per-type counters for a run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

/// Counters for one resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    /// Resources imported from the source.
    pub imported: usize,
    /// Resources created in the destination.
    pub created: usize,
    /// Resources updated in the destination.
    pub updated: usize,
    /// Resources left untouched because nothing differed.
    pub skipped: usize,
    /// Resources that failed, including unresolved references.
    pub failed: usize,
    /// Destination resources deleted by cleanup.
    pub deleted: usize,
}

impl AddAssign for TypeSummary {
    fn add_assign(&mut self, other: Self) {
        self.imported += other.imported;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.deleted += other.deleted;
    }
}

/// Counters for every type touched by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Counters keyed by type.
    pub types: BTreeMap<String, TypeSummary>,
}

impl RunSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters of a type, creating them if needed.
    pub fn entry(&mut self, resource_type: &str) -> &mut TypeSummary {
        self.types.entry(resource_type.to_string()).or_default()
    }

    /// Returns the counters of a type.
    #[must_use]
    pub fn get(&self, resource_type: &str) -> TypeSummary {
        self.types.get(resource_type).copied().unwrap_or_default()
    }

    /// Sums every type.
    #[must_use]
    pub fn total(&self) -> TypeSummary {
        let mut total = TypeSummary::default();
        for summary in self.types.values() {
            total += *summary;
        }
        total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ty, s) in &self.types {
            writeln!(
                f,
                "{ty}: imported={} created={} updated={} skipped={} failed={} deleted={}",
                s.imported, s.created, s.updated, s.skipped, s.failed, s.deleted
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sums_types() {
        let mut summary = RunSummary::new();
        summary.entry("monitors").created += 2;
        summary.entry("monitors").failed += 1;
        summary.entry("roles").created += 1;

        let total = summary.total();
        assert_eq!(total.created, 3);
        assert_eq!(total.failed, 1);
        assert_eq!(summary.get("dashboards"), TypeSummary::default());
        assert!(summary.to_string().contains("monitors: imported=0 created=2"));
    }
}
