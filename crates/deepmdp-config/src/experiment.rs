//! The validated experiment document
//!
//! [`validate`] is the single construction path. It walks the whole
//! document, collects every violation it finds (including layer plan
//! failures) and only then decides whether an [`Experiment`] exists.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use deepmdp_schema::{
    constraints::positive, Collector, ObjectReader, ValidationResult, Violation,
};

use crate::{
    architecture::LayerPlan,
    env::EnvSpec,
    error::{DomainError, LoadError},
    loss::{DeepMdpSpec, LossWeights},
    network::QNetSpec,
    plots::PlotSet,
    schedule::{EpsilonBounds, EpsilonDecay, EpsilonSchedule, SnapshotConfig, TrainingCadence},
};

/// The `exp_config` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentConfig {
    env: EnvSpec,
    learning_rate: f64,
    loss_weights: LossWeights,
    replay_buffer_size: usize,
    buffer_batch_size: usize,
    n_train_steps: usize,
    n_epochs: usize,
    sampler_batch_size: usize,
    steps_per_epoch: usize,
    min_buffer_size: usize,
    target_network_update_freq: usize,
    #[serde(rename = "q-net")]
    q_net: QNetSpec,
    epsilon_greedy: EpsilonSchedule,
    deepmdp: DeepMdpSpec,
    plots: PlotSet,
    #[serde(skip)]
    layers: LayerPlan,
}

impl ExperimentConfig {
    fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let env = r.object("env", out).and_then(|o| EnvSpec::from_reader(o, out));
        let learning_rate = r.float("learning_rate", &[positive()], out);
        let loss_weights = r
            .object("loss_weights", out)
            .and_then(|o| LossWeights::from_reader(o, out));
        let replay_buffer_size = r.integer("replay_buffer_size", &[positive()], out);
        let buffer_batch_size = r.integer("buffer_batch_size", &[positive()], out);
        let n_train_steps = r.integer("n_train_steps", &[positive()], out);
        let n_epochs = r.integer("n_epochs", &[positive()], out);
        let sampler_batch_size = r.integer("sampler_batch_size", &[positive()], out);
        let steps_per_epoch = r.integer("steps_per_epoch", &[positive()], out);
        // zero means training starts with the first transition
        let min_buffer_size = r.integer("min_buffer_size", &[], out);
        let target_network_update_freq = r.integer("target_network_update_freq", &[positive()], out);
        let q_net = r.object("q-net", out).and_then(|o| QNetSpec::from_reader(o, out));
        let epsilon_greedy = r
            .object("epsilon_greedy", out)
            .and_then(|o| EpsilonSchedule::from_reader(o, out));
        let deepmdp = r.object("deepmdp", out).and_then(|o| DeepMdpSpec::from_reader(o, out));
        let plots = PlotSet::read(&mut r, out);

        let mut consistent = true;
        if let Some(replay) = replay_buffer_size {
            for (key, value) in [
                ("buffer_batch_size", buffer_batch_size),
                ("min_buffer_size", min_buffer_size),
            ] {
                if let Some(value) = value.filter(|&v| v > replay) {
                    out.consistency(
                        r.field_path(key),
                        format!("{key} ({value}) exceeds replay_buffer_size ({replay})"),
                    );
                    consistent = false;
                }
            }
        }

        let layers = match q_net.as_ref().map(QNetSpec::describe) {
            Some(Ok(plan)) => Some(plan),
            Some(Err(err)) => {
                out.extend(err.into_violations());
                None
            }
            None => None,
        };
        r.finish(out);

        let config = Self {
            env: env?,
            learning_rate: learning_rate?,
            loss_weights: loss_weights?,
            replay_buffer_size: replay_buffer_size?,
            buffer_batch_size: buffer_batch_size?,
            n_train_steps: n_train_steps?,
            n_epochs: n_epochs?,
            sampler_batch_size: sampler_batch_size?,
            steps_per_epoch: steps_per_epoch?,
            min_buffer_size: min_buffer_size?,
            target_network_update_freq: target_network_update_freq?,
            q_net: q_net?,
            epsilon_greedy: epsilon_greedy?,
            deepmdp: deepmdp?,
            plots: plots?,
            layers: layers?,
        };
        consistent.then_some(config)
    }

    /// Environment to build
    #[must_use]
    pub fn env(&self) -> &EnvSpec {
        &self.env
    }

    /// Optimizer step size
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Loss weights exactly as written
    #[must_use]
    pub fn loss_weights(&self) -> LossWeights {
        self.loss_weights
    }

    /// Loss weights with the auxiliary terms zeroed when DeepMDP is off
    #[must_use]
    pub fn effective_loss_weights(&self) -> LossWeights {
        self.loss_weights.effective(&self.deepmdp)
    }

    /// Replay buffer capacity in transitions
    #[must_use]
    pub fn replay_buffer_size(&self) -> usize {
        self.replay_buffer_size
    }

    /// Transitions per optimizer batch
    #[must_use]
    pub fn buffer_batch_size(&self) -> usize {
        self.buffer_batch_size
    }

    /// Optimizer updates per sampler step
    #[must_use]
    pub fn n_train_steps(&self) -> usize {
        self.n_train_steps
    }

    /// Number of epochs in the run
    #[must_use]
    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    /// Parallel environment instances per sampler step
    #[must_use]
    pub fn sampler_batch_size(&self) -> usize {
        self.sampler_batch_size
    }

    /// Sampler steps per epoch
    #[must_use]
    pub fn steps_per_epoch(&self) -> usize {
        self.steps_per_epoch
    }

    /// Stored transitions required before training starts
    #[must_use]
    pub fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }

    /// Target network sync period in epochs
    #[must_use]
    pub fn target_network_update_freq(&self) -> usize {
        self.target_network_update_freq
    }

    /// Q-network description
    #[must_use]
    pub fn q_net(&self) -> &QNetSpec {
        &self.q_net
    }

    /// Ordered layer plan derived from [`Self::q_net`]
    #[must_use]
    pub fn layers(&self) -> &LayerPlan {
        &self.layers
    }

    /// Exploration decay section
    #[must_use]
    pub fn epsilon_greedy(&self) -> &EpsilonSchedule {
        &self.epsilon_greedy
    }

    /// DeepMDP switch
    #[must_use]
    pub fn deepmdp(&self) -> &DeepMdpSpec {
        &self.deepmdp
    }

    /// Requested diagnostic plots
    #[must_use]
    pub fn plots(&self) -> &PlotSet {
        &self.plots
    }

    /// Depth of the observation frame stack
    #[must_use]
    pub fn frame_stack(&self) -> usize {
        self.q_net.encoder().input_shape().channels
    }

    /// No-op steps used to prefill the frame stack after a reset
    #[must_use]
    pub fn noop_prefill(&self) -> usize {
        self.env.noop_prefill(self.frame_stack())
    }

    /// Loop cadence derived from the counting fields
    #[must_use]
    pub fn cadence(&self) -> TrainingCadence {
        TrainingCadence {
            n_epochs: self.n_epochs,
            steps_per_epoch: self.steps_per_epoch,
            sampler_batch_size: self.sampler_batch_size,
            n_train_steps: self.n_train_steps,
            min_buffer_size: self.min_buffer_size,
            target_network_update_freq: self.target_network_update_freq,
        }
    }
}

/// A complete, validated experiment document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Experiment {
    snapshot_config: SnapshotConfig,
    exp_config: ExperimentConfig,
}

/// Validate an untyped document and build the experiment from it
///
/// Pure: nothing is logged and nothing is read.
///
/// # Errors
///
/// Returns every schema, range, consistency and unknown-identifier problem
/// in the document as one [`ValidationError`](deepmdp_schema::ValidationError).
pub fn validate(document: &Value) -> ValidationResult<Experiment> {
    let mut out = Collector::new();
    let experiment = ObjectReader::root(document, &mut out).and_then(|mut root| {
        let snapshot_config = root
            .object("snapshot_config", &mut out)
            .and_then(|r| SnapshotConfig::from_reader(r, &mut out));
        let exp_config = root
            .object("exp_config", &mut out)
            .and_then(|r| ExperimentConfig::from_reader(r, &mut out));
        root.finish(&mut out);

        Some(Experiment {
            snapshot_config: snapshot_config?,
            exp_config: exp_config?,
        })
    });
    out.finish()?;

    experiment.ok_or_else(|| {
        Violation::Schema {
            path: "<document>".to_owned(),
            message: "document could not be built".to_owned(),
        }
        .into()
    })
}

impl Experiment {
    /// See [`validate`]
    ///
    /// # Errors
    ///
    /// Returns the aggregated violations of `document`.
    pub fn validate(document: &Value) -> ValidationResult<Self> {
        validate(document)
    }

    /// Parse and validate a JSON document held in memory
    ///
    /// # Errors
    ///
    /// [`LoadError::Json`] for malformed JSON or trailing data,
    /// [`LoadError::Invalid`] for a document that does not validate.
    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        let document: Value = serde_json::from_str(text)?;
        let experiment = validate(&document)?;
        experiment.log_loaded();
        Ok(experiment)
    }

    /// Read, parse and validate the document at `path`
    ///
    /// The file is closed as soon as its contents are read.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading experiment document");
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn log_loaded(&self) {
        let config = &self.exp_config;
        let weights = config.loss_weights;
        if !config.deepmdp.enabled() && (weights.r_loss() > 0.0 || weights.t_loss() > 0.0) {
            warn!(
                r_loss = weights.r_loss(),
                t_loss = weights.t_loss(),
                "deepmdp is disabled; auxiliary loss weights are ignored"
            );
        }
        debug!(
            env = config.env.name(),
            n_epochs = config.n_epochs,
            snapshot_mode = %self.snapshot_config.mode(),
            parameters = config.layers.parameter_count(None),
            "experiment configuration loaded"
        );
    }

    /// Checkpoint policy
    #[must_use]
    pub fn snapshot(&self) -> &SnapshotConfig {
        &self.snapshot_config
    }

    /// Training configuration
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.exp_config
    }

    /// Layer plan of the Q-network
    #[must_use]
    pub fn layers(&self) -> &LayerPlan {
        &self.exp_config.layers
    }

    /// Loop cadence
    #[must_use]
    pub fn cadence(&self) -> TrainingCadence {
        self.exp_config.cadence()
    }

    /// Resolve the epsilon decay, see [`EpsilonSchedule::decay`]
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] if the bounds are missing or given twice.
    pub fn epsilon_decay(&self, supplied: Option<EpsilonBounds>) -> Result<EpsilonDecay, DomainError> {
        self.exp_config.epsilon_greedy.decay(supplied)
    }

    /// The document this experiment was built from, in canonical form
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Pretty-printed JSON of [`Self::to_value`]
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
