use std::time::Instant;

use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

use crate::config::ForecastConfig;
use crate::data::models::TrainingReport;
use crate::error::{ForecastError, Result};
use crate::features::NUM_FEATURES;
use crate::nn::dataset::{split_index, ForecastBatcher, ForecastSample, WindowedDataset};
use crate::nn::model::{ForecastModel, ForecastModelConfig};

/// CPU inference backend
pub type InferenceBackend = NdArray;

/// CPU training backend: NdArray with autodiff
pub type CpuBackend = Autodiff<NdArray>;

/// Train a fresh model on `train_set`.
///
/// The last `validation_split` share of the pairs (in time order) is held back
/// for early stopping. Training halts after `patience` epochs without a lower
/// validation loss, and the weights of the best epoch are returned.
pub fn train<B: AutodiffBackend>(
    device: &B::Device,
    train_set: &WindowedDataset,
    config: &ForecastConfig,
) -> Result<(ForecastModel<B::InnerBackend>, TrainingReport)> {
    let total = train_set.samples.len();
    if total < 2 {
        return Err(ForecastError::InvalidConfig(format!(
            "need at least 2 training pairs, got {}",
            total
        )));
    }
    if config.epochs == 0 || config.batch_size == 0 {
        return Err(ForecastError::InvalidConfig(
            "epochs and batch_size must be at least 1".into(),
        ));
    }

    let horizon = train_set.samples[0].target.len();
    let fit_size = split_index(total, 1.0 - config.validation_split).max(1);
    let fit_samples = train_set.samples[..fit_size].to_vec();
    let val_samples = train_set.samples[fit_size..].to_vec();

    tracing::info!(
        "Training on {} pairs, validating on {} (horizon {}, hidden {})",
        fit_samples.len(),
        val_samples.len(),
        horizon,
        config.hidden_size
    );

    B::seed(config.seed);

    let dataloader = DataLoaderBuilder::new(ForecastBatcher::<B>::new(device.clone()))
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .build(WindowedDataset {
            samples: fit_samples.clone(),
        });

    // Without a validation slice the training loss is monitored instead
    let monitor_samples = if val_samples.is_empty() {
        fit_samples
    } else {
        val_samples
    };
    let monitor_batch =
        ForecastBatcher::<B::InnerBackend>::new(device.clone()).batch(monitor_samples);

    let model_config = ForecastModelConfig {
        input_size: NUM_FEATURES,
        hidden_size: config.hidden_size,
        output_size: horizon,
    };
    let mut model = model_config.init::<B>(device);
    tracing::debug!("Model initialized with {} parameters", model.num_params());

    let mut optim = AdamConfig::new().init();

    let mut report = TrainingReport {
        best_val_loss: f64::INFINITY,
        ..Default::default()
    };
    let mut best_model: Option<ForecastModel<B::InnerBackend>> = None;
    let mut epochs_without_improvement = 0;

    for epoch in 0..config.epochs {
        let epoch_start = Instant::now();
        let mut epoch_loss = 0.0;
        let mut batch_count = 0;

        for batch in dataloader.iter() {
            let output = model.forward(batch.inputs);
            let loss = mse_loss(output, batch.targets);
            let loss_scalar = scalar(loss.clone());

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(config.learning_rate, model, grads);

            epoch_loss += loss_scalar;
            batch_count += 1;
        }

        let train_loss = if batch_count > 0 {
            epoch_loss / batch_count as f64
        } else {
            f64::NAN
        };

        let valid_model = model.valid();
        let val_output = valid_model.forward(monitor_batch.inputs.clone());
        let val_loss = scalar(mse_loss(val_output.clone(), monitor_batch.targets.clone()));
        let val_mae = scalar(mae(val_output, monitor_batch.targets.clone()));

        report.train_losses.push(train_loss);
        report.val_losses.push(val_loss);
        report.val_mae.push(val_mae);
        report.epochs_run = epoch + 1;

        tracing::debug!(
            "Epoch {}/{}: loss {:.6}, val_loss {:.6}, val_mae {:.6} ({} ms)",
            epoch + 1,
            config.epochs,
            train_loss,
            val_loss,
            val_mae,
            epoch_start.elapsed().as_millis()
        );

        if val_loss < report.best_val_loss {
            report.best_val_loss = val_loss;
            report.best_epoch = epoch + 1;
            best_model = Some(valid_model);
            epochs_without_improvement = 0;
        } else {
            epochs_without_improvement += 1;
            if epochs_without_improvement >= config.patience {
                report.stopped_early = true;
                tracing::info!(
                    "Early stopping at epoch {} (best epoch {})",
                    epoch + 1,
                    report.best_epoch
                );
                break;
            }
        }
    }

    tracing::info!(
        "Training finished after {} epochs, best val_loss {:.6} at epoch {}",
        report.epochs_run,
        report.best_val_loss,
        report.best_epoch
    );

    let model = best_model.unwrap_or_else(|| model.valid());
    Ok((model, report))
}

/// Run a trained model over every sample and return the scaled horizon per sample
pub fn run_inference<B: Backend>(
    model: &ForecastModel<B>,
    samples: &[ForecastSample],
    batch_size: usize,
    device: &B::Device,
) -> Vec<Vec<f64>> {
    let batcher = ForecastBatcher::<B>::new(device.clone());
    let mut predictions = Vec::with_capacity(samples.len());

    for chunk in samples.chunks(batch_size.max(1)) {
        let horizon = chunk[0].target.len();
        let batch = batcher.batch(chunk.to_vec());
        let output = model.forward(batch.inputs);
        let values = output.into_data().to_vec::<f32>().unwrap_or_default();
        predictions.extend(
            values
                .chunks(horizon.max(1))
                .map(|row| row.iter().map(|&v| v as f64).collect::<Vec<f64>>()),
        );
    }

    predictions
}

/// Mean squared error loss
fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = predictions - targets;
    let sq = diff.clone() * diff;
    sq.mean()
}

/// Mean absolute error
fn mae<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (predictions - targets).abs().mean()
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor
        .into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(f32::NAN) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::dataset::build_windows;

    /// Smooth scaled series in [0, 1] with all five columns moving
    fn toy_dataset(len: usize, window: usize, horizon: usize) -> WindowedDataset {
        let rows: Vec<[f64; NUM_FEATURES]> = (0..len)
            .map(|i| {
                let t = i as f64 / len as f64;
                let wave = 0.5 + 0.4 * (i as f64 / 4.0).sin();
                [t, wave, t * 0.9, t * 0.8, wave]
            })
            .collect();
        build_windows(&rows, window, horizon).unwrap()
    }

    fn small_config() -> ForecastConfig {
        ForecastConfig {
            hidden_size: 8,
            epochs: 4,
            batch_size: 8,
            patience: 2,
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn test_rejects_single_pair() {
        let dataset = toy_dataset(6, 5, 1);
        assert_eq!(dataset.samples.len(), 1);
        let device = Default::default();
        let err = train::<CpuBackend>(&device, &dataset, &small_config()).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }

    #[test]
    fn test_train_reports_metrics_and_predicts_horizon() {
        let dataset = toy_dataset(60, 8, 3);
        let device = Default::default();
        let (model, report) = train::<CpuBackend>(&device, &dataset, &small_config()).unwrap();

        assert!(report.epochs_run >= 1 && report.epochs_run <= 4);
        assert_eq!(report.train_losses.len(), report.epochs_run);
        assert_eq!(report.val_losses.len(), report.epochs_run);
        assert_eq!(report.val_mae.len(), report.epochs_run);
        assert!(report.best_val_loss.is_finite());
        assert!(report.best_epoch >= 1 && report.best_epoch <= report.epochs_run);
        assert_eq!(
            report.best_val_loss,
            report.val_losses[report.best_epoch - 1]
        );

        let preds = run_inference(&model, &dataset.samples[..5], 2, &device);
        assert_eq!(preds.len(), 5);
        assert!(preds.iter().all(|p| p.len() == 3 && p.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_returns_best_epoch_weights_scored_on_tail_slice() {
        let dataset = toy_dataset(60, 8, 1);
        let device = Default::default();
        let config = ForecastConfig {
            learning_rate: 1e-2,
            epochs: 8,
            patience: 3,
            ..small_config()
        };
        let (model, report) = train::<CpuBackend>(&device, &dataset, &config).unwrap();

        let n = dataset.samples.len();
        let tail = &dataset.samples[split_index(n, 1.0 - config.validation_split)..];
        assert_eq!(tail.len(), n - (n as f64 * 0.9).floor() as usize);

        let preds = run_inference(&model, tail, tail.len(), &device);
        let mse = preds
            .iter()
            .zip(tail)
            .flat_map(|(p, s)| p.iter().zip(&s.target).map(|(a, b)| (a - b).powi(2)))
            .sum::<f64>()
            / tail.len() as f64;
        assert!(
            (mse - report.best_val_loss).abs() < 1e-6,
            "recomputed {} vs reported {}",
            mse,
            report.best_val_loss
        );
    }

    #[test]
    fn test_patience_stops_training() {
        let dataset = toy_dataset(40, 5, 1);
        let device = Default::default();
        let config = ForecastConfig {
            learning_rate: 0.0,
            epochs: 20,
            patience: 2,
            ..small_config()
        };
        // A zero learning rate never improves after the first epoch
        let (_, report) = train::<CpuBackend>(&device, &dataset, &config).unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.best_epoch, 1);
        assert_eq!(report.epochs_run, 3);
    }
}
