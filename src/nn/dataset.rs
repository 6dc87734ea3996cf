use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Tensor},
};

use crate::error::{ForecastError, Result};
use crate::features::{CLOSE_COLUMN, NUM_FEATURES};

/// A single training sample: a window of scaled features and the scaled closes that follow it
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    /// Feature matrix: [window_size, NUM_FEATURES]
    pub features: Vec<[f64; NUM_FEATURES]>,
    /// Scaled close for each of the next `prediction_days` steps
    pub target: Vec<f64>,
}

/// Windowed dataset, in ascending start-index order
#[derive(Debug, Clone, Default)]
pub struct WindowedDataset {
    pub samples: Vec<ForecastSample>,
}

impl Dataset<ForecastSample> for WindowedDataset {
    fn get(&self, index: usize) -> Option<ForecastSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Slide a stride-1 window over the scaled matrix.
///
/// Pair `i` covers rows `[i, i + window_size)` and targets the close column at
/// rows `[i + window_size, i + window_size + prediction_days)`. A matrix shorter
/// than `window_size + prediction_days` yields an empty dataset.
pub fn build_windows(
    scaled: &[[f64; NUM_FEATURES]],
    window_size: usize,
    prediction_days: usize,
) -> Result<WindowedDataset> {
    if window_size == 0 || prediction_days == 0 {
        return Err(ForecastError::InvalidConfig(format!(
            "window_size ({}) and prediction_days ({}) must both be at least 1",
            window_size, prediction_days
        )));
    }

    let count = (scaled.len() + 1).saturating_sub(window_size + prediction_days);
    let samples = (0..count)
        .map(|start| {
            let end = start + window_size;
            ForecastSample {
                features: scaled[start..end].to_vec(),
                target: scaled[end..end + prediction_days]
                    .iter()
                    .map(|row| row[CLOSE_COLUMN])
                    .collect(),
            }
        })
        .collect();

    Ok(WindowedDataset { samples })
}

/// Chronological split: the first `floor(ratio * n)` pairs train, the rest are held out
pub fn chronological_split(
    dataset: WindowedDataset,
    train_ratio: f64,
) -> (WindowedDataset, WindowedDataset) {
    let mut samples = dataset.samples;
    let split = split_index(samples.len(), train_ratio);
    let test = samples.split_off(split);
    (WindowedDataset { samples }, WindowedDataset { samples: test })
}

/// `floor(ratio * n)`, clamped to `n`
pub fn split_index(n: usize, ratio: f64) -> usize {
    ((n as f64 * ratio).floor() as usize).min(n)
}

/// Batcher that converts ForecastSample slices into tensors
#[derive(Clone, Debug)]
pub struct ForecastBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ForecastBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Batched data for training and inference
#[derive(Debug, Clone)]
pub struct ForecastBatch<B: Backend> {
    pub inputs: Tensor<B, 3>,  // [batch_size, window_size, NUM_FEATURES]
    pub targets: Tensor<B, 2>, // [batch_size, prediction_days]
}

impl<B: Backend> Batcher<ForecastSample, ForecastBatch<B>> for ForecastBatcher<B> {
    fn batch(&self, items: Vec<ForecastSample>) -> ForecastBatch<B> {
        let batch_size = items.len();
        let seq_len = items.first().map(|s| s.features.len()).unwrap_or(0);
        let horizon = items.first().map(|s| s.target.len()).unwrap_or(0);

        let mut input_data = Vec::with_capacity(batch_size * seq_len * NUM_FEATURES);
        let mut target_data = Vec::with_capacity(batch_size * horizon);

        for sample in &items {
            for step in &sample.features {
                input_data.extend(step.iter().map(|&f| f as f32));
            }
            target_data.extend(sample.target.iter().map(|&t| t as f32));
        }

        let inputs = Tensor::<B, 1>::from_floats(input_data.as_slice(), &self.device)
            .reshape([batch_size, seq_len, NUM_FEATURES]);

        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), &self.device)
            .reshape([batch_size, horizon]);

        ForecastBatch { inputs, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    /// Row `i` is `[i, 100 + i, 0, 0, 0]` so indices can be read back from values
    fn indexed_matrix(len: usize) -> Vec<[f64; NUM_FEATURES]> {
        (0..len)
            .map(|i| [i as f64, 100.0 + i as f64, 0.0, 0.0, 0.0])
            .collect()
    }

    #[test]
    fn test_window_count_and_spans() {
        for (len, w, h) in [(20, 5, 1), (20, 5, 3), (10, 1, 1), (7, 3, 4)] {
            let dataset = build_windows(&indexed_matrix(len), w, h).unwrap();
            assert_eq!(dataset.len(), len - w - h + 1, "L={len} w={w} h={h}");

            for (i, sample) in dataset.samples.iter().enumerate() {
                let rows: Vec<usize> = sample.features.iter().map(|r| r[0] as usize).collect();
                assert_eq!(rows, (i..i + w).collect::<Vec<_>>());
                let targets: Vec<usize> = sample.target.iter().map(|&t| t as usize).collect();
                assert_eq!(targets, (i + w..i + w + h).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_too_short_is_empty_not_error() {
        let dataset = build_windows(&indexed_matrix(5), 5, 1).unwrap();
        assert!(dataset.is_empty());
        let dataset = build_windows(&[], 3, 1).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(build_windows(&indexed_matrix(10), 0, 1).is_err());
        assert!(build_windows(&indexed_matrix(10), 3, 0).is_err());
    }

    #[test]
    fn test_chronological_split_sizes_and_order() {
        for n in [1usize, 2, 5, 10, 191] {
            let dataset = build_windows(&indexed_matrix(n + 2), 2, 1).unwrap();
            assert_eq!(dataset.len(), n);
            let (train, test) = chronological_split(dataset, 0.8);
            let expected_train = (n as f64 * 0.8).floor() as usize;
            assert_eq!(train.len(), expected_train);
            assert_eq!(test.len(), n - expected_train);

            let last_train = train.samples.last().map(|s| s.features[0][0]);
            let first_test = test.samples.first().map(|s| s.features[0][0]);
            if let (Some(a), Some(b)) = (last_train, first_test) {
                assert!(a < b);
            }
        }
    }

    #[test]
    fn test_batcher_shapes() {
        let dataset = build_windows(&indexed_matrix(12), 4, 2).unwrap();
        let batcher = ForecastBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(dataset.samples[..3].to_vec());
        assert_eq!(batch.inputs.dims(), [3, 4, NUM_FEATURES]);
        assert_eq!(batch.targets.dims(), [3, 2]);

        let targets = batch.targets.into_data().to_vec::<f32>().unwrap();
        assert_eq!(targets, vec![4.0, 5.0, 5.0, 6.0, 6.0, 7.0]);
    }
}
