//! Diagnostic plots requested by the experiment

use std::collections::BTreeSet;

use serde::Serialize;

use deepmdp_schema::{reader, Collector, ObjectReader};

/// A plot the plotting subsystem knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    /// Per-episode return and length
    EpisodicalStats,
    /// Weight histograms of the Q-network
    WeightPlot,
    /// Correlation between latent features and true state
    LatentSpaceCorrelationPlot,
}

impl PlotKind {
    const VARIANTS: [(&'static str, Self); 3] = [
        ("episodical_stats", Self::EpisodicalStats),
        ("weight_plot", Self::WeightPlot),
        ("latent_space_correlation_plot", Self::LatentSpaceCorrelationPlot),
    ];

    /// Identifier as written in the document
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EpisodicalStats => "episodical_stats",
            Self::WeightPlot => "weight_plot",
            Self::LatentSpaceCorrelationPlot => "latent_space_correlation_plot",
        }
    }
}

/// Set of requested plots, serialized as a JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlotSet(BTreeSet<PlotKind>);

impl PlotSet {
    /// Read the `plots` array of `r`
    pub(crate) fn read(r: &mut ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let elements = r.elements("plots", &[], out)?;
        let before = out.len();
        let mut set = BTreeSet::new();
        for (path, value) in elements {
            let Some(name) = reader::as_str(value, &path, &[], out) else {
                continue;
            };
            let Some(kind) = reader::choice(name, &path, &PlotKind::VARIANTS, out) else {
                continue;
            };
            if !set.insert(kind) {
                out.consistency(path, format!("plot `{name}` is listed more than once"));
            }
        }
        (out.len() == before).then_some(Self(set))
    }

    /// Whether `kind` was requested
    #[must_use]
    pub fn contains(&self, kind: PlotKind) -> bool {
        self.0.contains(&kind)
    }

    /// Requested plots in a stable order
    pub fn iter(&self) -> impl Iterator<Item = PlotKind> + '_ {
        self.0.iter().copied()
    }

    /// Number of requested plots
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no plot was requested
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepmdp_schema::ViolationKind;
    use serde_json::json;

    fn parse(plots: serde_json::Value) -> (Option<PlotSet>, Collector) {
        let doc = json!({ "plots": plots });
        let mut out = Collector::new();
        let mut r = ObjectReader::open(&doc, "exp_config", &mut out).unwrap();
        let set = PlotSet::read(&mut r, &mut out);
        r.finish(&mut out);
        (set, out)
    }

    #[test]
    fn test_known_plots() {
        let (set, out) = parse(json!(["weight_plot", "episodical_stats"]));
        assert!(out.is_empty());
        let set = set.unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(PlotKind::WeightPlot));
        assert!(!set.contains(PlotKind::LatentSpaceCorrelationPlot));
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!(["episodical_stats", "weight_plot"])
        );
    }

    #[test]
    fn test_empty_is_allowed() {
        let (set, out) = parse(json!([]));
        assert!(out.is_empty());
        assert!(set.unwrap().is_empty());
    }

    #[test]
    fn test_unknown_plot_is_named() {
        let (set, out) = parse(json!(["weight_plot", "heatmap"]));
        assert!(set.is_none());
        let err = out.finish().unwrap_err();
        let v = &err.violations()[0];
        assert_eq!(v.kind(), ViolationKind::UnknownEnum);
        assert_eq!(v.path(), "exp_config.plots[1]");
        assert!(v.to_string().contains("heatmap"));
    }

    #[test]
    fn test_duplicate_plot() {
        let (set, out) = parse(json!(["weight_plot", "weight_plot"]));
        assert!(set.is_none());
        let err = out.finish().unwrap_err();
        assert_eq!(err.violations()[0].kind(), ViolationKind::Consistency);
        assert!(err.mentions("exp_config.plots[1]"));
    }

    #[test]
    fn test_non_string_entry() {
        let (set, out) = parse(json!([3]));
        assert!(set.is_none());
        assert_eq!(out.finish().unwrap_err().violations()[0].kind(), ViolationKind::Schema);
    }
}
