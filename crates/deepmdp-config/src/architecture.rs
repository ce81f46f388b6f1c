//! Ordered layer plan derived from the `q-net` section
//!
//! The plan is what a network builder consumes: convolutions with their
//! computed output shapes, a flatten, the encoder's dense stack and the
//! head's dense stack, with optional normalization steps interleaved. The
//! action-value output layer is not part of the document; its width comes
//! from the environment and is appended through [`LayerPlan::output_layer`].

use std::fmt;

use serde::{Serialize, Serializer};

use deepmdp_schema::{reader, ValidationResult, Violation};

use crate::network::{EncoderSpec, HeadSpec};

const ENCODER_PATH: &str = "exp_config.q-net.encoder";

/// Channels-first shape of an image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageShape {
    /// Channels, i.e. stacked frames at the input
    pub channels: usize,
    /// Rows
    pub height: usize,
    /// Columns
    pub width: usize,
}

impl ImageShape {
    /// Create a shape from channels, height and width
    #[must_use]
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Number of scalars in a tensor of this shape, `None` on overflow
    #[must_use]
    pub fn numel(&self) -> Option<usize> {
        self.channels.checked_mul(self.height)?.checked_mul(self.width)
    }

    /// Shape after a valid (unpadded) convolution, `None` if it collapses
    #[must_use]
    pub fn convolve(&self, kernel: usize, out_channels: usize, stride: usize) -> Option<Self> {
        let side = |n: usize| -> Option<usize> { n.checked_sub(kernel)?.checked_div(stride)?.checked_add(1) };
        Some(Self::new(out_channels, side(self.height)?, side(self.width)?))
    }

    fn dims(&self) -> Vec<usize> {
        vec![self.channels, self.height, self.width]
    }
}

impl Serialize for ImageShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.channels, self.height, self.width].serialize(serializer)
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// Part of the network a dense layer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Encoder dense stack, after the flatten
    Encoder,
    /// Q-value head
    Head,
    /// Action-value output, sized by the environment
    Output,
}

/// One step of the layer plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Valid 2-D convolution
    Conv2d {
        /// Position among the encoder's convolutions
        index: usize,
        /// Square kernel size
        kernel: usize,
        /// Stride in both directions
        stride: usize,
        /// Input shape
        input: ImageShape,
        /// Computed output shape
        output: ImageShape,
    },
    /// Normalization over the preceding layer's output
    LayerNorm {
        /// Shape the statistics are taken over
        normalized_shape: Vec<usize>,
    },
    /// Collapse the convolutional feature map into a vector
    Flatten {
        /// Feature map being flattened
        input: ImageShape,
        /// Resulting vector width
        features: usize,
    },
    /// Fully connected layer
    Dense {
        /// Encoder, head or output
        stage: Stage,
        /// Input width
        in_features: usize,
        /// Output width
        out_features: usize,
    },
}

impl LayerSpec {
    /// Weights plus biases of this layer; zero for parameter-free steps
    ///
    /// Saturates at `usize::MAX`.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Conv2d {
                kernel, input, output, ..
            } => kernel
                .saturating_mul(*kernel)
                .saturating_mul(input.channels)
                .saturating_mul(output.channels)
                .saturating_add(output.channels),
            Self::Dense {
                in_features,
                out_features,
                ..
            } => in_features.saturating_mul(*out_features).saturating_add(*out_features),
            Self::LayerNorm { .. } | Self::Flatten { .. } => 0,
        }
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conv2d {
                index,
                kernel,
                stride,
                input,
                output,
            } => write!(f, "conv2d[{index}] k={kernel} s={stride}  {input} -> {output}"),
            Self::LayerNorm { normalized_shape } => write!(f, "layer_norm {normalized_shape:?}"),
            Self::Flatten { input, features } => write!(f, "flatten  {input} -> {features}"),
            Self::Dense {
                stage,
                in_features,
                out_features,
            } => write!(f, "dense ({stage:?})  {in_features} -> {out_features}"),
        }
    }
}

/// Ordered layer plan of the Q-network, without the action-value layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerPlan {
    input: ImageShape,
    layers: Vec<LayerSpec>,
    flattened_features: usize,
    encoder_features: usize,
    output_features: usize,
    layer_norm: bool,
}

impl LayerPlan {
    /// All steps in order
    #[must_use]
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Observation shape the plan starts from
    #[must_use]
    pub fn input_shape(&self) -> ImageShape {
        self.input
    }

    /// Convolutions only, in order
    pub fn convolutions(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter().filter(|l| matches!(l, LayerSpec::Conv2d { .. }))
    }

    /// Dense layers of one stage, in order
    pub fn dense_layers(&self, stage: Stage) -> impl Iterator<Item = &LayerSpec> {
        self.layers
            .iter()
            .filter(move |l| matches!(l, LayerSpec::Dense { stage: s, .. } if *s == stage))
    }

    /// Width of the flattened feature map
    #[must_use]
    pub fn flattened_features(&self) -> usize {
        self.flattened_features
    }

    /// Width of the encoder output (the latent state)
    #[must_use]
    pub fn encoder_features(&self) -> usize {
        self.encoder_features
    }

    /// Width fed into the action-value layer
    #[must_use]
    pub fn output_features(&self) -> usize {
        self.output_features
    }

    /// The action-value layer for an environment with `actions` actions
    #[must_use]
    pub fn output_layer(&self, actions: usize) -> LayerSpec {
        LayerSpec::Dense {
            stage: Stage::Output,
            in_features: self.output_features,
            out_features: actions,
        }
    }

    /// Weights plus biases of every convolution and dense layer
    ///
    /// With `actions`, the action-value layer is included. Saturates at
    /// `usize::MAX`.
    #[must_use]
    pub fn parameter_count(&self, actions: Option<usize>) -> usize {
        let output = actions.map(|n| self.output_layer(n));
        self.layers
            .iter()
            .chain(output.as_ref())
            .map(LayerSpec::parameter_count)
            .fold(0, usize::saturating_add)
    }

    /// Whether normalization steps were inserted
    #[must_use]
    pub fn layer_norm(&self) -> bool {
        self.layer_norm
    }
}

/// Build the ordered layer plan of an encoder and head
///
/// Spatial sizes follow the unpadded convolution formula
/// `out = (in - kernel) / stride + 1`. With `layer_norm`, a normalization
/// step follows every convolution and dense layer.
///
/// # Errors
///
/// Returns a consistency violation naming the first convolution whose kernel
/// no longer fits its input, or `input_shape` when the flattened feature map
/// is too large to count.
pub fn describe(encoder: &EncoderSpec, head: &HeadSpec, layer_norm: bool) -> ValidationResult<LayerPlan> {
    let mut layers = Vec::new();
    let mut shape = encoder.input_shape();

    let convs = encoder
        .filter_dims()
        .iter()
        .zip(encoder.num_filters())
        .zip(encoder.strides());
    for (index, ((&kernel, &channels), &stride)) in convs.enumerate() {
        let Some(output) = shape.convolve(kernel, channels, stride) else {
            return Err(Violation::Consistency {
                path: reader::index(&reader::join(ENCODER_PATH, "filter_dims"), index),
                message: format!(
                    "convolution layer {index} collapses the spatial size: kernel {kernel} does not fit a {}x{} input",
                    shape.height, shape.width
                ),
            }
            .into());
        };
        layers.push(LayerSpec::Conv2d {
            index,
            kernel,
            stride,
            input: shape,
            output,
        });
        if layer_norm {
            layers.push(LayerSpec::LayerNorm {
                normalized_shape: output.dims(),
            });
        }
        shape = output;
    }

    let Some(flattened_features) = shape.numel() else {
        return Err(Violation::Consistency {
            path: reader::join(ENCODER_PATH, "input_shape"),
            message: format!("flattened feature map {shape} overflows the feature count"),
        }
        .into());
    };
    layers.push(LayerSpec::Flatten {
        input: shape,
        features: flattened_features,
    });

    let mut features = flattened_features;
    let mut dense = |stage: Stage, sizes: &[usize], layers: &mut Vec<LayerSpec>| {
        for &size in sizes {
            layers.push(LayerSpec::Dense {
                stage,
                in_features: features,
                out_features: size,
            });
            if layer_norm {
                layers.push(LayerSpec::LayerNorm {
                    normalized_shape: vec![size],
                });
            }
            features = size;
        }
        features
    };
    let encoder_features = dense(Stage::Encoder, encoder.dense_sizes(), &mut layers);
    let output_features = dense(Stage::Head, head.dense_sizes(), &mut layers);

    Ok(LayerPlan {
        input: encoder.input_shape(),
        layers,
        flattened_features,
        encoder_features,
        output_features,
        layer_norm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepmdp_schema::{Collector, ObjectReader, ViolationKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan(encoder: serde_json::Value, head: &[usize], layer_norm: bool) -> ValidationResult<LayerPlan> {
        let doc = json!({ "encoder": encoder, "head": { "dense_sizes": head }, "layer_norm": layer_norm });
        let mut out = Collector::new();
        let q = ObjectReader::open(&doc, "exp_config.q-net", &mut out)
            .and_then(|r| crate::network::QNetSpec::from_reader(r, &mut out))
            .expect("network section parses");
        assert!(out.is_empty());
        q.describe()
    }

    fn reference(layer_norm: bool) -> LayerPlan {
        plan(
            json!({
                "input_shape": [4, 84, 84],
                "filter_dims": [8, 4, 3],
                "num_filters": [32, 64, 64],
                "strides": [4, 2, 1],
                "dense_sizes": [8]
            }),
            &[256, 128],
            layer_norm,
        )
        .unwrap()
    }

    #[test]
    fn test_reference_network_shapes() {
        let plan = reference(false);
        let outputs: Vec<ImageShape> = plan
            .convolutions()
            .map(|l| match l {
                LayerSpec::Conv2d { output, .. } => *output,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            outputs,
            vec![ImageShape::new(32, 20, 20), ImageShape::new(64, 9, 9), ImageShape::new(64, 7, 7)]
        );
        assert_eq!(plan.flattened_features(), 64 * 7 * 7);
        assert_eq!(plan.encoder_features(), 8);
        assert_eq!(plan.output_features(), 128);
    }

    #[test]
    fn test_reference_network_order() {
        let plan = reference(false);
        let layers = plan.layers();
        assert_eq!(layers.len(), 3 + 1 + 1 + 2);
        assert!(matches!(layers[3], LayerSpec::Flatten { features: 3136, .. }));
        assert_eq!(
            layers[4],
            LayerSpec::Dense {
                stage: Stage::Encoder,
                in_features: 3136,
                out_features: 8
            }
        );
        let head: Vec<_> = plan.dense_layers(Stage::Head).cloned().collect();
        assert_eq!(
            head,
            vec![
                LayerSpec::Dense {
                    stage: Stage::Head,
                    in_features: 8,
                    out_features: 256
                },
                LayerSpec::Dense {
                    stage: Stage::Head,
                    in_features: 256,
                    out_features: 128
                },
            ]
        );
    }

    #[test]
    fn test_layer_norm_after_every_described_layer() {
        let plan = reference(true);
        // 3 conv + 3 dense, each followed by a norm, plus the flatten
        assert_eq!(plan.layers().len(), 6 * 2 + 1);
        assert_eq!(
            plan.layers()[1],
            LayerSpec::LayerNorm {
                normalized_shape: vec![32, 20, 20]
            }
        );
        assert_eq!(
            plan.layers().last(),
            Some(&LayerSpec::LayerNorm {
                normalized_shape: vec![128]
            })
        );
        assert!(!matches!(plan.output_layer(4), LayerSpec::LayerNorm { .. }));
    }

    #[test]
    fn test_parameter_count() {
        let plan = reference(false);
        assert_eq!(plan.parameter_count(None), 138_280);
        assert_eq!(plan.parameter_count(Some(4)), 138_280 + 128 * 4 + 4);
    }

    #[test]
    fn test_collapsing_convolution_names_layer() {
        let err = plan(
            json!({
                "input_shape": [1, 10, 10],
                "filter_dims": [5, 4, 3],
                "num_filters": [8, 8, 8],
                "strides": [2, 2, 1],
                "dense_sizes": []
            }),
            &[],
            false,
        )
        .unwrap_err();
        // 10 -> 3 -> 0
        assert_eq!(err.violations().len(), 1);
        let v = &err.violations()[0];
        assert_eq!(v.kind(), ViolationKind::Consistency);
        assert_eq!(v.path(), "exp_config.q-net.encoder.filter_dims[1]");
        assert!(v.to_string().contains("convolution layer 1"));
    }

    #[test]
    fn test_dense_only_encoder() {
        let plan = plan(
            json!({
                "input_shape": [1, 8, 8],
                "filter_dims": [],
                "num_filters": [],
                "strides": [],
                "dense_sizes": [32]
            }),
            &[16],
            false,
        )
        .unwrap();
        assert_eq!(plan.flattened_features(), 64);
        assert_eq!(plan.output_features(), 16);
        assert_eq!(plan.convolutions().count(), 0);
    }

    #[test]
    fn test_oversized_feature_map_is_reported() {
        let err = plan(
            json!({
                "input_shape": [4_000_000_000_u64, 4_000_000_000_u64, 4_000_000_000_u64],
                "filter_dims": [],
                "num_filters": [],
                "strides": [],
                "dense_sizes": []
            }),
            &[],
            false,
        )
        .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.violations()[0].kind(), ViolationKind::Consistency);
        assert_eq!(err.violations()[0].path(), "exp_config.q-net.encoder.input_shape");
    }

    #[test]
    fn test_parameter_count_saturates() {
        let huge = usize::MAX / 2;
        let plan = plan(
            json!({
                "input_shape": [1, 1, 1],
                "filter_dims": [],
                "num_filters": [],
                "strides": [],
                "dense_sizes": []
            }),
            &[huge, huge],
            false,
        )
        .unwrap();
        assert_eq!(plan.parameter_count(None), usize::MAX);
        assert_eq!(plan.parameter_count(Some(4)), usize::MAX);
    }

    #[test]
    fn test_numel_overflow() {
        assert_eq!(ImageShape::new(64, 7, 7).numel(), Some(3136));
        assert_eq!(ImageShape::new(usize::MAX, 2, 1).numel(), None);
    }

    #[test]
    fn test_convolve_formula() {
        let shape = ImageShape::new(4, 84, 84);
        assert_eq!(shape.convolve(8, 32, 4), Some(ImageShape::new(32, 20, 20)));
        assert_eq!(ImageShape::new(3, 2, 2).convolve(3, 8, 2), None);
        assert_eq!(ImageShape::new(3, 3, 3).convolve(3, 8, 2), Some(ImageShape::new(8, 1, 1)));
    }
}
