//! Checkpoint policy consulted at every epoch boundary

use serde::Serialize;

use deepmdp_schema::{constraints::positive, reader::choice, Collector, ObjectReader};

use crate::DomainError;

/// When the trainer persists a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// Every epoch
    All,
    /// Only the final epoch
    Last,
    /// Every `snapshot_gap` epochs, starting at epoch 0
    Gap,
    /// Both [`SnapshotMode::Gap`] and [`SnapshotMode::Last`]
    GapAndLast,
    /// Never
    #[serde(rename = "none")]
    Never,
}

impl SnapshotMode {
    const VARIANTS: [(&'static str, Self); 5] = [
        ("all", Self::All),
        ("last", Self::Last),
        ("gap", Self::Gap),
        ("gap_and_last", Self::GapAndLast),
        ("none", Self::Never),
    ];

    /// Identifier as written in the document
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Last => "last",
            Self::Gap => "gap",
            Self::GapAndLast => "gap_and_last",
            Self::Never => "none",
        }
    }

    /// Whether the mode consults `snapshot_gap`
    #[must_use]
    pub fn uses_gap(self) -> bool {
        matches!(self, Self::Gap | Self::GapAndLast)
    }
}

impl std::fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `snapshot_config` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotConfig {
    snapshot_mode: SnapshotMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_gap: Option<usize>,
}

impl SnapshotConfig {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let mode_path = r.field_path("snapshot_mode");
        let mode = r
            .string("snapshot_mode", &[], out)
            .and_then(|s| choice(s, &mode_path, &SnapshotMode::VARIANTS, out));
        let gap = r.optional_integer("snapshot_gap", &[positive()], out);

        let mut consistent = true;
        if let (Some(mode), Some(None)) = (mode, gap) {
            if mode.uses_gap() {
                out.schema(
                    r.field_path("snapshot_gap"),
                    format!("missing required field (snapshot_mode is `{mode}`)"),
                );
                consistent = false;
            }
        }
        r.finish(out);

        let config = Self {
            snapshot_mode: mode?,
            snapshot_gap: gap?,
        };
        consistent.then_some(config)
    }

    /// Configured mode
    #[must_use]
    pub fn mode(&self) -> SnapshotMode {
        self.snapshot_mode
    }

    /// Gap in epochs, when configured
    #[must_use]
    pub fn gap(&self) -> Option<usize> {
        self.snapshot_gap
    }

    /// Whether epoch `epoch` (0-based) of a `total`-epoch run is persisted
    ///
    /// # Errors
    ///
    /// [`DomainError::NoEpochs`] when `total` is zero.
    pub fn should_snapshot(&self, epoch: usize, total: usize) -> Result<bool, DomainError> {
        if total == 0 {
            return Err(DomainError::NoEpochs);
        }
        let last = epoch == total - 1;
        // gap modes always carry a gap once constructed
        let on_gap = self.snapshot_gap.is_some_and(|gap| epoch % gap == 0);

        Ok(match self.snapshot_mode {
            SnapshotMode::All => true,
            SnapshotMode::Last => last,
            SnapshotMode::Gap => on_gap,
            SnapshotMode::GapAndLast => on_gap || last,
            SnapshotMode::Never => false,
        })
    }

    /// Every epoch of a `total`-epoch run that is persisted, ascending
    ///
    /// # Errors
    ///
    /// [`DomainError::NoEpochs`] when `total` is zero.
    pub fn snapshot_epochs(&self, total: usize) -> Result<Vec<usize>, DomainError> {
        if total == 0 {
            return Err(DomainError::NoEpochs);
        }
        let mut epochs = Vec::new();
        for epoch in 0..total {
            if self.should_snapshot(epoch, total)? {
                epochs.push(epoch);
            }
        }
        Ok(epochs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepmdp_schema::ViolationKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn parse(value: &serde_json::Value) -> (Option<SnapshotConfig>, Collector) {
        let mut out = Collector::new();
        let s = ObjectReader::open(value, "snapshot_config", &mut out)
            .and_then(|r| SnapshotConfig::from_reader(r, &mut out));
        (s, out)
    }

    fn config(mode: SnapshotMode, gap: Option<usize>) -> SnapshotConfig {
        SnapshotConfig {
            snapshot_mode: mode,
            snapshot_gap: gap,
        }
    }

    #[test]
    fn test_gap_and_last() {
        let s = config(SnapshotMode::GapAndLast, Some(10));
        for epoch in [0, 10, 19] {
            assert!(s.should_snapshot(epoch, 20).unwrap(), "epoch {epoch}");
        }
        assert!(!s.should_snapshot(5, 20).unwrap());
        assert_eq!(s.snapshot_epochs(20).unwrap(), vec![0, 10, 19]);
    }

    #[test]
    fn test_every_mode() {
        assert_eq!(config(SnapshotMode::All, None).snapshot_epochs(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(config(SnapshotMode::Last, None).snapshot_epochs(3).unwrap(), vec![2]);
        assert_eq!(config(SnapshotMode::Gap, Some(2)).snapshot_epochs(5).unwrap(), vec![0, 2, 4]);
        assert!(config(SnapshotMode::Never, Some(2)).snapshot_epochs(5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_total_is_domain_error() {
        let s = config(SnapshotMode::All, None);
        assert_eq!(s.should_snapshot(0, 0), Err(DomainError::NoEpochs));
        assert_eq!(s.snapshot_epochs(0), Err(DomainError::NoEpochs));
    }

    #[test]
    fn test_parses_modes() {
        let (s, out) = parse(&json!({ "snapshot_mode": "gap_and_last", "snapshot_gap": 10 }));
        assert!(out.is_empty());
        assert_eq!(s, Some(config(SnapshotMode::GapAndLast, Some(10))));

        let (s, out) = parse(&json!({ "snapshot_mode": "last" }));
        assert!(out.is_empty());
        assert_eq!(s, Some(config(SnapshotMode::Last, None)));
    }

    #[test]
    fn test_unknown_mode() {
        let (s, out) = parse(&json!({ "snapshot_mode": "sometimes" }));
        assert!(s.is_none());
        let err = out.finish().unwrap_err();
        assert_eq!(err.violations()[0].kind(), ViolationKind::UnknownEnum);
        assert_eq!(err.violations()[0].path(), "snapshot_config.snapshot_mode");
    }

    #[test]
    fn test_gap_mode_requires_gap() {
        let (s, out) = parse(&json!({ "snapshot_mode": "gap" }));
        assert!(s.is_none());
        let err = out.finish().unwrap_err();
        assert_eq!(err.violations()[0].kind(), ViolationKind::Schema);
        assert!(err.mentions("snapshot_config.snapshot_gap"));
    }

    #[test]
    fn test_zero_gap_is_range_error() {
        let (s, out) = parse(&json!({ "snapshot_mode": "last", "snapshot_gap": 0 }));
        assert!(s.is_none());
        assert_eq!(out.finish().unwrap_err().violations()[0].kind(), ViolationKind::Range);
    }

    fn any_config() -> impl Strategy<Value = SnapshotConfig> {
        (1usize..50).prop_flat_map(|gap| {
            prop_oneof![
                Just(config(SnapshotMode::Last, None)),
                Just(config(SnapshotMode::GapAndLast, Some(gap))),
                Just(config(SnapshotMode::All, Some(gap))),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_last_epoch_always_snapshotted(s in any_config(), total in 1usize..1000) {
            prop_assert!(s.should_snapshot(total - 1, total).unwrap());
        }

        #[test]
        fn prop_gap_mode_hits_multiples(gap in 1usize..50, k in 0usize..20) {
            let s = config(SnapshotMode::Gap, Some(gap));
            prop_assert!(s.should_snapshot(gap * k, gap * k + 1).unwrap());
        }
    }
}
