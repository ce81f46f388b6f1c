//! Loss weighting and the DeepMDP switch

use serde::Serialize;

use deepmdp_schema::{constraints::non_negative, Collector, ObjectReader};

/// Weights of the linear loss combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossWeights {
    q_loss: f64,
    r_loss: f64,
    t_loss: f64,
}

/// Per-term losses of one optimization step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossTerms {
    /// Temporal-difference loss of the Q-network
    pub q_loss: f64,
    /// Reward prediction loss
    pub r_loss: f64,
    /// Latent transition loss
    pub t_loss: f64,
}

impl LossWeights {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let q_loss = r.float("q_loss", &[non_negative()], out);
        let r_loss = r.float("r_loss", &[non_negative()], out);
        let t_loss = r.float("t_loss", &[non_negative()], out);
        r.finish(out);

        Some(Self {
            q_loss: q_loss?,
            r_loss: r_loss?,
            t_loss: t_loss?,
        })
    }

    /// Weight of the Q-learning loss
    #[must_use]
    pub fn q_loss(&self) -> f64 {
        self.q_loss
    }

    /// Weight of the reward auxiliary loss
    #[must_use]
    pub fn r_loss(&self) -> f64 {
        self.r_loss
    }

    /// Weight of the transition auxiliary loss
    #[must_use]
    pub fn t_loss(&self) -> f64 {
        self.t_loss
    }

    /// Weights the trainer actually applies
    ///
    /// The auxiliary weights stay in the document when DeepMDP is off but
    /// are not consulted, so they are zeroed here.
    #[must_use]
    pub fn effective(&self, deepmdp: &DeepMdpSpec) -> Self {
        if deepmdp.enabled() {
            *self
        } else {
            Self {
                q_loss: self.q_loss,
                r_loss: 0.0,
                t_loss: 0.0,
            }
        }
    }

    /// Linear combination of the per-term losses
    #[must_use]
    pub fn combine(&self, terms: LossTerms) -> f64 {
        self.q_loss * terms.q_loss + self.r_loss * terms.r_loss + self.t_loss * terms.t_loss
    }
}

/// Whether the DeepMDP auxiliary objectives are trained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeepMdpSpec {
    #[serde(rename = "use")]
    enabled: bool,
}

impl DeepMdpSpec {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let enabled = r.boolean("use", out);
        r.finish(out);
        Some(Self { enabled: enabled? })
    }

    /// Whether reward and transition losses are active
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn weights(value: &serde_json::Value) -> (Option<LossWeights>, Collector) {
        let mut out = Collector::new();
        let w = ObjectReader::open(value, "loss_weights", &mut out)
            .and_then(|r| LossWeights::from_reader(r, &mut out));
        (w, out)
    }

    fn deepmdp(enabled: bool) -> DeepMdpSpec {
        DeepMdpSpec { enabled }
    }

    #[test]
    fn test_combine() {
        let (w, _) = weights(&json!({ "q_loss": 1.0, "r_loss": 0.5, "t_loss": 2 }));
        let w = w.unwrap();
        let total = w.combine(LossTerms { q_loss: 0.2, r_loss: 0.4, t_loss: 0.1 });
        assert_relative_eq!(total, 0.2 + 0.2 + 0.2);
    }

    #[test]
    fn test_effective_zeroes_auxiliary_weights_when_disabled() {
        let (w, _) = weights(&json!({ "q_loss": 1.0, "r_loss": 1.0, "t_loss": 1.0 }));
        let w = w.unwrap();
        assert_eq!(w.effective(&deepmdp(true)), w);

        let off = w.effective(&deepmdp(false));
        assert_relative_eq!(off.q_loss(), 1.0);
        assert_relative_eq!(off.r_loss(), 0.0);
        assert_relative_eq!(off.t_loss(), 0.0);
    }

    #[test]
    fn test_rejects_negative_and_unknown_terms() {
        let (w, out) = weights(&json!({ "q_loss": -1.0, "r_loss": 1.0, "t_loss": 1.0, "z_loss": 3.0 }));
        assert!(w.is_none());
        let err = out.finish().unwrap_err();
        assert!(err.mentions("loss_weights.q_loss"));
        assert!(err.mentions("loss_weights.z_loss"));
    }
}
