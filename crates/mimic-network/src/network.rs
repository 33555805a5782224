use rand::Rng;

use crate::{ShapeError, WEIGHT_LIMIT, weights};

/// Weights of a fully connected feedforward network, stored flat.
///
/// The weight from source neuron `row` of layer `layer` to destination
/// neuron `col` of layer `layer + 1` lives at
/// `offsets[layer] + row * dst + col`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkWeights {
    layer_sizes: Vec<usize>,
    offsets: Vec<usize>,
    values: Vec<f32>,
}

impl NetworkWeights {
    /// Creates a network whose every weight is produced by `f(layer, row, col)`.
    pub fn from_fn<F>(layer_sizes: &[usize], mut f: F) -> Result<Self, ShapeError>
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        let offsets = compute_offsets(layer_sizes)?;
        let mut values = Vec::with_capacity(offsets.last().copied().unwrap_or(0));
        for (layer, pair) in layer_sizes.windows(2).enumerate() {
            for row in 0..pair[0] {
                for col in 0..pair[1] {
                    values.push(f(layer, row, col));
                }
            }
        }
        Ok(Self {
            layer_sizes: layer_sizes.to_vec(),
            offsets,
            values,
        })
    }

    pub fn zeros(layer_sizes: &[usize]) -> Result<Self, ShapeError> {
        Self::from_fn(layer_sizes, |_, _, _| 0.0)
    }

    /// Creates a network with weights drawn uniformly from `[-1, 1]`.
    pub fn random<R>(rng: &mut R, layer_sizes: &[usize]) -> Result<Self, ShapeError>
    where
        R: Rng + ?Sized,
    {
        Self::from_fn(layer_sizes, |_, _, _| rng.random_range(-1.0..=1.0))
    }

    /// Rebuilds a network from its layer sizes and flattened weights.
    ///
    /// `values` must hold exactly as many weights as the layer sizes imply.
    /// Use [`NetworkWeights::from_payload`](crate::NetworkWeights::from_payload)
    /// for tolerant rebuilding.
    pub fn from_flat(layer_sizes: &[usize], values: Vec<f32>) -> Result<Self, ShapeError> {
        let offsets = compute_offsets(layer_sizes)?;
        let expected = offsets.last().copied().unwrap_or(0);
        if values.len() != expected {
            return Err(ShapeError::LengthMismatch {
                layer: 0,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            layer_sizes: layer_sizes.to_vec(),
            offsets,
            values,
        })
    }

    /// Neuron count of every layer, input layer first.
    #[must_use]
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// Number of connection layers (one less than the neuron layer count).
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layer_sizes.len() - 1
    }

    /// `(source, destination)` neuron counts of connection layer `layer`.
    #[must_use]
    pub fn layer_dims(&self, layer: usize) -> Option<(usize, usize)> {
        if layer >= self.layer_count() {
            return None;
        }
        Some((self.layer_sizes[layer], self.layer_sizes[layer + 1]))
    }

    #[must_use]
    pub fn input_width(&self) -> usize {
        self.layer_sizes[0]
    }

    #[must_use]
    pub fn output_width(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    /// Total number of weights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn offset(&self, layer: usize, row: usize, col: usize) -> Option<usize> {
        let (src, dst) = self.layer_dims(layer)?;
        if row >= src || col >= dst {
            return None;
        }
        Some(self.offsets[layer] + row * dst + col)
    }

    #[must_use]
    pub fn get(&self, layer: usize, row: usize, col: usize) -> Option<f32> {
        self.offset(layer, row, col).map(|i| self.values[i])
    }

    pub fn set(&mut self, layer: usize, row: usize, col: usize, value: f32) -> Result<(), ShapeError> {
        let i = self
            .offset(layer, row, col)
            .ok_or(ShapeError::IndexOutOfRange { layer, row, col })?;
        self.values[i] = value;
        Ok(())
    }

    /// Weights of connection layer `layer`, row-major (`row * dst + col`).
    #[must_use]
    pub fn layer(&self, layer: usize) -> Option<&[f32]> {
        if layer >= self.layer_count() {
            return None;
        }
        Some(&self.values[self.offsets[layer]..self.offsets[layer + 1]])
    }

    pub fn layer_mut(&mut self, layer: usize) -> Option<&mut [f32]> {
        if layer >= self.layer_count() {
            return None;
        }
        Some(&mut self.values[self.offsets[layer]..self.offsets[layer + 1]])
    }

    /// All weights in payload order.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.values
    }

    pub fn as_flat_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Applies sparse Gaussian mutation to every weight.
    pub fn mutate<R>(&mut self, rng: &mut R, rate: f32, sigma: f32)
    where
        R: Rng + ?Sized,
    {
        weights::mutate(&mut self.values, sigma, WEIGHT_LIMIT, rate, rng);
    }

    /// Convex blend of connection layer `layer` with `learned`.
    ///
    /// See [`weights::blend`] for the exact contract at the strength
    /// boundaries.
    pub fn blend_layer(
        &mut self,
        layer: usize,
        learned: &[f32],
        strength: f32,
    ) -> Result<(), ShapeError> {
        let layer_count = self.layer_count();
        let current = self.layer_mut(layer).ok_or(ShapeError::LayerOutOfRange {
            layer,
            layer_count,
        })?;
        if current.len() != learned.len() {
            return Err(ShapeError::LengthMismatch {
                layer,
                expected: current.len(),
                actual: learned.len(),
            });
        }
        weights::blend(current, learned, strength);
        Ok(())
    }

    /// Activations of every neuron layer for `inputs`, input layer first.
    ///
    /// Hidden layers use `tanh`; the output layer uses the logistic
    /// function so actions land in `[0, 1]`.
    pub fn activations(&self, inputs: &[f32]) -> Result<Vec<Vec<f32>>, ShapeError> {
        if inputs.len() != self.input_width() {
            return Err(ShapeError::InputWidth {
                expected: self.input_width(),
                actual: inputs.len(),
            });
        }
        let last = self.layer_count() - 1;
        let mut activations = Vec::with_capacity(self.layer_sizes.len());
        activations.push(inputs.to_vec());
        for layer in 0..self.layer_count() {
            let (src, dst) = (self.layer_sizes[layer], self.layer_sizes[layer + 1]);
            let w = &self.values[self.offsets[layer]..self.offsets[layer + 1]];
            let input = &activations[layer];
            let mut output = vec![0.0; dst];
            for (row, a) in input.iter().enumerate().take(src) {
                for (col, out) in output.iter_mut().enumerate() {
                    *out += a * w[row * dst + col];
                }
            }
            for out in &mut output {
                *out = if layer == last {
                    logistic(*out)
                } else {
                    out.tanh()
                };
            }
            activations.push(output);
        }
        Ok(activations)
    }

    /// Evaluates the network and returns the output layer.
    pub fn forward(&self, inputs: &[f32]) -> Result<Vec<f32>, ShapeError> {
        let mut activations = self.activations(inputs)?;
        Ok(activations.pop().unwrap_or_default())
    }
}

fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn compute_offsets(layer_sizes: &[usize]) -> Result<Vec<usize>, ShapeError> {
    if layer_sizes.len() < 2 {
        return Err(ShapeError::TooFewLayers {
            count: layer_sizes.len(),
        });
    }
    if let Some(layer) = layer_sizes.iter().position(|&n| n == 0) {
        return Err(ShapeError::EmptyLayer { layer });
    }
    let mut offsets = Vec::with_capacity(layer_sizes.len());
    let mut total = 0;
    offsets.push(total);
    for pair in layer_sizes.windows(2) {
        total += pair[0] * pair[1];
        offsets.push(total);
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_shape_validation() {
        assert_eq!(
            NetworkWeights::zeros(&[4]),
            Err(ShapeError::TooFewLayers { count: 1 })
        );
        assert_eq!(
            NetworkWeights::zeros(&[4, 0, 2]),
            Err(ShapeError::EmptyLayer { layer: 1 })
        );
    }

    #[test]
    fn test_offsets_are_row_major_layer_by_layer() {
        let net = NetworkWeights::from_fn(&[2, 3, 2], |l, r, c| {
            #[expect(clippy::cast_precision_loss)]
            let v = (l * 100 + r * 10 + c) as f32;
            v
        })
        .unwrap();
        assert_eq!(net.len(), 2 * 3 + 3 * 2);
        assert_eq!(net.as_flat()[..6], [0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(net.as_flat()[6..], [100.0, 101.0, 110.0, 111.0, 120.0, 121.0]);
        assert_eq!(net.get(1, 2, 1), Some(121.0));
        assert_eq!(net.get(1, 3, 0), None);
        assert_eq!(net.get(2, 0, 0), None);
    }

    #[test]
    fn test_set_out_of_range() {
        let mut net = NetworkWeights::zeros(&[2, 2]).unwrap();
        assert_eq!(
            net.set(0, 2, 0, 1.0),
            Err(ShapeError::IndexOutOfRange {
                layer: 0,
                row: 2,
                col: 0
            })
        );
    }

    #[test]
    fn test_forward_zero_weights_outputs_half() {
        let net = NetworkWeights::zeros(&[3, 4, 2]).unwrap();
        let out = net.forward(&[1.0, 0.5, -1.0]).unwrap();
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn test_forward_rejects_wrong_width() {
        let net = NetworkWeights::zeros(&[3, 2]).unwrap();
        assert_eq!(
            net.forward(&[1.0]),
            Err(ShapeError::InputWidth {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn test_activations_per_layer() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let net = NetworkWeights::random(&mut rng, &[8, 6, 5, 4]).unwrap();
        let acts = net.activations(&[0.5; 8]).unwrap();
        let widths: Vec<_> = acts.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![8, 6, 5, 4]);
        assert!(acts[3].iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_blend_layer_checks_length() {
        let mut net = NetworkWeights::zeros(&[2, 2, 1]).unwrap();
        assert_eq!(
            net.blend_layer(1, &[1.0], 0.5),
            Err(ShapeError::LengthMismatch {
                layer: 1,
                expected: 2,
                actual: 1
            })
        );
        net.blend_layer(1, &[1.0, -1.0], 0.5).unwrap();
        assert_eq!(net.layer(1), Some(&[0.5, -0.5][..]));
        assert_eq!(net.layer(0), Some(&[0.0; 4][..]));
    }
}
