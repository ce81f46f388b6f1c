//! Q-network description as written in the `q-net` section

use serde::Serialize;

use deepmdp_schema::{
    constraints::{length, positive},
    Collector, ObjectReader, ValidationResult,
};

use crate::architecture::{self, ImageShape, LayerPlan};

/// Convolutional encoder: a stack of valid convolutions then dense layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncoderSpec {
    input_shape: ImageShape,
    filter_dims: Vec<usize>,
    num_filters: Vec<usize>,
    strides: Vec<usize>,
    dense_sizes: Vec<usize>,
}

impl EncoderSpec {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let input_shape = r.integer_array("input_shape", &[length(3)], &[positive()], out);
        let filter_dims = r.integer_array("filter_dims", &[], &[positive()], out);
        let num_filters = r.integer_array("num_filters", &[], &[positive()], out);
        let strides = r.integer_array("strides", &[], &[positive()], out);
        let dense_sizes = r.integer_array("dense_sizes", &[], &[positive()], out);

        if let (Some(f), Some(n), Some(s)) = (&filter_dims, &num_filters, &strides) {
            if f.len() != n.len() || n.len() != s.len() {
                out.consistency(
                    r.path(),
                    format!(
                        "filter_dims, num_filters and strides must have equal lengths, got {}, {} and {}",
                        f.len(),
                        n.len(),
                        s.len()
                    ),
                );
                r.finish(out);
                return None;
            }
        }
        r.finish(out);

        let input_shape = input_shape?;
        Some(Self {
            input_shape: ImageShape::new(input_shape[0], input_shape[1], input_shape[2]),
            filter_dims: filter_dims?,
            num_filters: num_filters?,
            strides: strides?,
            dense_sizes: dense_sizes?,
        })
    }

    /// Shape of one observation, channels first
    #[must_use]
    pub fn input_shape(&self) -> ImageShape {
        self.input_shape
    }

    /// Kernel size of each convolution
    #[must_use]
    pub fn filter_dims(&self) -> &[usize] {
        &self.filter_dims
    }

    /// Output channels of each convolution
    #[must_use]
    pub fn num_filters(&self) -> &[usize] {
        &self.num_filters
    }

    /// Stride of each convolution
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Widths of the dense layers after the flatten
    #[must_use]
    pub fn dense_sizes(&self) -> &[usize] {
        &self.dense_sizes
    }

    /// Number of convolutions
    #[must_use]
    pub fn depth(&self) -> usize {
        self.filter_dims.len()
    }
}

/// Dense stack between the encoder output and the action-value layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadSpec {
    dense_sizes: Vec<usize>,
}

impl HeadSpec {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let dense_sizes = r.integer_array("dense_sizes", &[], &[positive()], out);
        r.finish(out);
        Some(Self {
            dense_sizes: dense_sizes?,
        })
    }

    /// Widths of the head's dense layers
    #[must_use]
    pub fn dense_sizes(&self) -> &[usize] {
        &self.dense_sizes
    }
}

/// The `q-net` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QNetSpec {
    encoder: EncoderSpec,
    head: HeadSpec,
    layer_norm: bool,
}

impl QNetSpec {
    pub(crate) fn from_reader(mut r: ObjectReader<'_>, out: &mut Collector) -> Option<Self> {
        let encoder = r.object("encoder", out).and_then(|o| EncoderSpec::from_reader(o, out));
        let head = r.object("head", out).and_then(|o| HeadSpec::from_reader(o, out));
        let layer_norm = r.boolean("layer_norm", out);
        r.finish(out);

        Some(Self {
            encoder: encoder?,
            head: head?,
            layer_norm: layer_norm?,
        })
    }

    /// Encoder description
    #[must_use]
    pub fn encoder(&self) -> &EncoderSpec {
        &self.encoder
    }

    /// Head description
    #[must_use]
    pub fn head(&self) -> &HeadSpec {
        &self.head
    }

    /// Whether every described layer is followed by a normalization step
    #[must_use]
    pub fn layer_norm(&self) -> bool {
        self.layer_norm
    }

    /// Ordered layer plan for this network
    ///
    /// # Errors
    ///
    /// Returns a consistency violation if a convolution collapses the
    /// spatial size to zero.
    pub fn describe(&self) -> ValidationResult<LayerPlan> {
        architecture::describe(&self.encoder, &self.head, self.layer_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepmdp_schema::ViolationKind;
    use serde_json::json;

    fn parse(value: &serde_json::Value) -> (Option<QNetSpec>, Collector) {
        let mut out = Collector::new();
        let q = ObjectReader::open(value, "exp_config.q-net", &mut out)
            .and_then(|r| QNetSpec::from_reader(r, &mut out));
        (q, out)
    }

    #[test]
    fn test_parses_reference_network() {
        let (q, out) = parse(&json!({
            "encoder": {
                "input_shape": [4, 84, 84],
                "filter_dims": [8, 4, 3],
                "num_filters": [32, 64, 64],
                "strides": [4, 2, 1],
                "dense_sizes": [8]
            },
            "head": { "dense_sizes": [256, 128] },
            "layer_norm": false
        }));
        assert!(out.is_empty());
        let q = q.unwrap();
        assert_eq!(q.encoder().input_shape(), ImageShape::new(4, 84, 84));
        assert_eq!(q.encoder().depth(), 3);
        assert_eq!(q.head().dense_sizes(), &[256, 128]);
    }

    #[test]
    fn test_mismatched_sequence_lengths() {
        let (q, out) = parse(&json!({
            "encoder": {
                "input_shape": [4, 84, 84],
                "filter_dims": [8, 4, 3],
                "num_filters": [32, 64],
                "strides": [4, 2, 1],
                "dense_sizes": []
            },
            "head": { "dense_sizes": [] },
            "layer_norm": true
        }));
        assert!(q.is_none());
        let err = out.finish().unwrap_err();
        let v = err.of_kind(ViolationKind::Consistency).next().unwrap();
        assert_eq!(v.path(), "exp_config.q-net.encoder");
    }

    #[test]
    fn test_input_shape_needs_three_entries() {
        let (q, out) = parse(&json!({
            "encoder": {
                "input_shape": [84, 84],
                "filter_dims": [],
                "num_filters": [],
                "strides": [],
                "dense_sizes": [16]
            },
            "head": { "dense_sizes": [8] },
            "layer_norm": false
        }));
        assert!(q.is_none());
        let err = out.finish().unwrap_err();
        assert!(err.mentions("exp_config.q-net.encoder.input_shape"));
        assert_eq!(err.violations()[0].kind(), ViolationKind::Schema);
    }
}
