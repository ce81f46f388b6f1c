//! Epsilon-greedy exploration decay

use serde::Serialize;

use deepmdp_schema::{
    constraints::{max, non_negative, positive},
    Collector, ObjectReader,
};

use super::Schedule;
use crate::DomainError;

/// What one tick of the decay index counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayUnit {
    /// One environment step
    Step,
    /// One finished episode
    Episode,
}

/// The `epsilon_greedy` section
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpsilonSchedule {
    exponential_decay_rate: f64,
    episodical_decay: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_epsilon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_epsilon: Option<f64>,
}

impl EpsilonSchedule {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let rate = r.float("exponential_decay_rate", &[positive(), max(1.0)], out);
        let episodical = r.boolean("episodical_decay", out);
        let max_epsilon = r.optional_float("max_epsilon", &[positive(), max(1.0)], out);
        let min_epsilon = r.optional_float("min_epsilon", &[non_negative(), max(1.0)], out);

        let consistent = match (max_epsilon, min_epsilon) {
            (Some(None), Some(Some(_))) => {
                out.consistency(r.field_path("min_epsilon"), "min_epsilon requires max_epsilon");
                false
            }
            (Some(Some(initial)), Some(Some(floor))) if floor > initial => {
                out.consistency(
                    r.field_path("min_epsilon"),
                    format!("min_epsilon ({floor}) must not exceed max_epsilon ({initial})"),
                );
                false
            }
            _ => true,
        };
        r.finish(out);

        let schedule = Self {
            exponential_decay_rate: rate?,
            episodical_decay: episodical?,
            max_epsilon: max_epsilon?,
            min_epsilon: min_epsilon?,
        };
        consistent.then_some(schedule)
    }

    /// Multiplicative decay per tick, in (0, 1]
    #[must_use]
    pub fn decay_rate(&self) -> f64 {
        self.exponential_decay_rate
    }

    /// Whether the decay ticks once per episode rather than once per step
    #[must_use]
    pub fn episodical_decay(&self) -> bool {
        self.episodical_decay
    }

    /// What one tick of the decay index counts
    #[must_use]
    pub fn unit(&self) -> DecayUnit {
        if self.episodical_decay {
            DecayUnit::Episode
        } else {
            DecayUnit::Step
        }
    }

    /// Bounds written in the document, if any
    #[must_use]
    pub fn bounds(&self) -> Option<EpsilonBounds> {
        self.max_epsilon.map(|initial| EpsilonBounds {
            initial,
            floor: self.min_epsilon.unwrap_or(0.0),
        })
    }

    /// Resolve the decay curve
    ///
    /// The initial value and floor come from exactly one place: the
    /// document's `max_epsilon` / `min_epsilon`, or `supplied`.
    ///
    /// # Errors
    ///
    /// [`DomainError::MissingInitialEpsilon`] if neither source has bounds,
    /// [`DomainError::ConflictingEpsilonBounds`] if both do.
    pub fn decay(&self, supplied: Option<EpsilonBounds>) -> Result<EpsilonDecay, DomainError> {
        let bounds = match (self.bounds(), supplied) {
            (Some(_), Some(_)) => return Err(DomainError::ConflictingEpsilonBounds),
            (None, None) => return Err(DomainError::MissingInitialEpsilon),
            (Some(b), None) | (None, Some(b)) => b,
        };
        Ok(EpsilonDecay {
            rate: self.exponential_decay_rate,
            bounds,
            unit: self.unit(),
        })
    }
}

/// Initial value and floor of epsilon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonBounds {
    initial: f64,
    floor: f64,
}

impl EpsilonBounds {
    /// Bounds supplied by the caller
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] unless `0 < initial <= 1` and
    /// `0 <= floor <= initial`.
    pub fn new(initial: f64, floor: f64) -> Result<Self, DomainError> {
        if !(initial > 0.0 && initial <= 1.0) {
            return Err(DomainError::InitialEpsilon(initial));
        }
        if !(floor >= 0.0 && floor <= initial) {
            return Err(DomainError::EpsilonFloor { floor, initial });
        }
        Ok(Self { initial, floor })
    }

    /// Value at index 0
    #[must_use]
    pub fn initial(&self) -> f64 {
        self.initial
    }

    /// Lowest value epsilon decays to
    #[must_use]
    pub fn floor(&self) -> f64 {
        self.floor
    }
}

/// Exponential epsilon decay clamped to a floor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonDecay {
    rate: f64,
    bounds: EpsilonBounds,
    unit: DecayUnit,
}

impl EpsilonDecay {
    /// `max(initial * rate^index, floor)`
    #[must_use]
    pub fn epsilon(&self, index: usize) -> f64 {
        self.value(index)
    }

    /// Bounds in effect
    #[must_use]
    pub fn bounds(&self) -> EpsilonBounds {
        self.bounds
    }

    /// What one index tick counts
    #[must_use]
    pub fn unit(&self) -> DecayUnit {
        self.unit
    }

    /// Stateful counter starting at index 0
    #[must_use]
    pub fn tracker(&self) -> EpsilonTracker {
        EpsilonTracker {
            decay: *self,
            index: 0,
        }
    }
}

impl Schedule for EpsilonDecay {
    #[allow(clippy::cast_precision_loss)]
    fn value(&self, t: usize) -> f64 {
        let value = self.bounds.initial * self.rate.powf(t as f64);
        value.max(self.bounds.floor)
    }
}

/// Decay index owned by an action-selection policy
///
/// Steps advance it only for per-step decay, finished episodes only for
/// per-episode decay.
#[derive(Debug, Clone)]
pub struct EpsilonTracker {
    decay: EpsilonDecay,
    index: usize,
}

impl EpsilonTracker {
    /// Record one environment step and return the current epsilon
    pub fn on_step(&mut self) -> f64 {
        if self.decay.unit == DecayUnit::Step {
            self.index += 1;
        }
        self.current()
    }

    /// Record a finished episode and return the current epsilon
    pub fn on_episode_end(&mut self) -> f64 {
        if self.decay.unit == DecayUnit::Episode {
            self.index += 1;
        }
        self.current()
    }

    /// Epsilon at the current index
    #[must_use]
    pub fn current(&self) -> f64 {
        self.decay.epsilon(self.index)
    }

    /// Ticks counted so far
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}
