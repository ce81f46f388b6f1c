//! Environment description handed to the environment factory

use serde::Serialize;

use deepmdp_schema::{constraints::min_length, Collector, ObjectReader};

/// Which environment to build and how to wrap it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvSpec {
    name: String,
    normalize: bool,
    do_noops: bool,
}

impl EnvSpec {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let name = r.string("name", &[min_length(1)], out);
        let normalize = r.boolean("normalize", out);
        let do_noops = r.boolean("do_noops", out);
        r.finish(out);

        Some(Self {
            name: name?.to_owned(),
            normalize: normalize?,
            do_noops: do_noops?,
        })
    }

    /// Registry identifier of the environment
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether observations are normalized
    #[must_use]
    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// Whether the frame stack is prefilled with no-op steps on reset
    #[must_use]
    pub fn do_noops(&self) -> bool {
        self.do_noops
    }

    /// Number of no-op steps taken after reset to fill an `n_frames` stack
    ///
    /// With no-ops disabled the first observation is repeated instead.
    #[must_use]
    pub fn noop_prefill(&self, n_frames: usize) -> usize {
        if self.do_noops {
            n_frames.saturating_sub(1)
        } else {
            0
        }
    }
}
