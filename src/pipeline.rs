use std::fmt;
use std::time::Instant;

use chrono::NaiveDate;

use crate::config::ForecastConfig;
use crate::data::models::{
    round2, HistoricalPoint, ObservationTable, PredictionResult, TrainingReport,
};
use crate::data::MarketDataSource;
use crate::error::{ForecastError, Result};
use crate::features::{build_feature_matrix, FeatureMatrix, NUM_FEATURES};
use crate::nn::dataset::{build_windows, chronological_split, WindowedDataset};
use crate::nn::persistence::{ModelMetadata, ModelSlot};
use crate::nn::scaler::ScalerPair;
use crate::nn::training::{run_inference, train, CpuBackend, InferenceBackend};
use crate::nn::LoadedModel;

/// Pipeline step, used to tag failures in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquire,
    Features,
    Scale,
    Window,
    Train,
    Persist,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquire => "acquire",
            Stage::Features => "features",
            Stage::Scale => "scale",
            Stage::Window => "window",
            Stage::Train => "train",
            Stage::Persist => "persist",
            Stage::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// Everything one run derives before training, owned by that run alone
struct RunContext<'a> {
    symbol: &'a str,
    window_size: usize,
    prediction_days: usize,
    dates: Vec<NaiveDate>,
    scalers: ScalerPair,
}

/// Download -> features -> scale -> window -> split -> train -> save/load -> predict -> summarize
pub struct Pipeline<S> {
    source: S,
    config: ForecastConfig,
}

impl<S: MarketDataSource> Pipeline<S> {
    pub fn new(source: S, config: ForecastConfig) -> Self {
        Self { source, config }
    }

    pub fn slot(&self) -> ModelSlot {
        ModelSlot::new(&self.config.model_dir, &self.config.model_slot)
    }

    /// Run the full pipeline for `symbol` on data up to today
    pub fn run(
        &self,
        symbol: &str,
        window_size: usize,
        prediction_days: usize,
    ) -> Result<PredictionResult> {
        let today = chrono::Local::now().date_naive();
        self.run_until(symbol, window_size, prediction_days, today)
    }

    /// Run the full pipeline on observations in `[config.start_date, end)`.
    ///
    /// A fresh model is trained on every call. Any stage error is returned as is.
    pub fn run_until(
        &self,
        symbol: &str,
        window_size: usize,
        prediction_days: usize,
        end: NaiveDate,
    ) -> Result<PredictionResult> {
        let started = Instant::now();
        tracing::info!(
            "Starting forecast for {} (window {}, horizon {})",
            symbol,
            window_size,
            prediction_days
        );

        let table = logged(symbol, Stage::Acquire, self.acquire(symbol, end))?;
        let matrix = logged(
            symbol,
            Stage::Features,
            build_feature_matrix(&table, window_size, prediction_days),
        )?;
        let (ctx, scaled) = logged(
            symbol,
            Stage::Scale,
            scale(symbol, window_size, prediction_days, matrix),
        )?;
        let dataset = logged(
            symbol,
            Stage::Window,
            build_windows(&scaled, window_size, prediction_days),
        )?;

        let (train_set, test_set) = chronological_split(dataset, self.config.train_split);
        tracing::info!(
            "Split {} pairs into {} train / {} held out",
            train_set.samples.len() + test_set.samples.len(),
            train_set.samples.len(),
            test_set.samples.len()
        );

        let device = Default::default();
        let (model, report) = logged(
            symbol,
            Stage::Train,
            train::<CpuBackend>(&device, &train_set, &self.config),
        )?;
        let model = logged(symbol, Stage::Persist, self.commit(&ctx, model, &report))?;
        let (actual, predicted) = self.predict(&ctx, &model, &test_set);
        let result = logged(
            symbol,
            Stage::Assemble,
            assemble_result(&ctx.dates, &actual, &predicted),
        )?;

        tracing::info!(
            "Prediction complete for {} in {:.1}s: predicted ${:.2}, actual ${:.2}, margin ${:.2}",
            symbol,
            started.elapsed().as_secs_f64(),
            result.predicted_next_day_close,
            result.actual_last_close,
            result.margin_of_error
        );
        Ok(result)
    }

    fn acquire(&self, symbol: &str, end: NaiveDate) -> Result<ObservationTable> {
        let table = self
            .source
            .get_observations(symbol, self.config.start_date, end)?;
        if table.is_empty() {
            return Err(ForecastError::NoData {
                symbol: symbol.to_string(),
            });
        }
        tracing::info!("Processing {} data points for {}", table.len(), symbol);
        Ok(table)
    }

    /// Write the trained model to the slot and read it back.
    ///
    /// Inference always uses the reloaded copy, so after a successful run the
    /// slot holds the model that produced the returned result.
    fn commit(
        &self,
        ctx: &RunContext<'_>,
        model: LoadedModel,
        report: &TrainingReport,
    ) -> Result<LoadedModel> {
        let metadata = ModelMetadata {
            symbol: ctx.symbol.to_string(),
            trained_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            window_size: ctx.window_size,
            prediction_days: ctx.prediction_days,
            hidden_size: self.config.hidden_size,
            epochs_run: report.epochs_run,
            best_val_loss: report.best_val_loss,
        };

        let slot = self.slot();
        slot.save(&model, &metadata)?;
        drop(model);
        let (model, _) = slot.load()?;
        Ok(model)
    }

    /// Predict every held-out window and map the first horizon step back to price units
    fn predict(
        &self,
        ctx: &RunContext<'_>,
        model: &LoadedModel,
        test_set: &WindowedDataset,
    ) -> (Vec<f64>, Vec<f64>) {
        let device = <InferenceBackend as burn::tensor::backend::Backend>::Device::default();
        let scaled = run_inference(model, &test_set.samples, self.config.batch_size, &device);

        let predicted = scaled
            .iter()
            .map(|p| ctx.scalers.inverse_close(p.first().copied().unwrap_or(f64::NAN)))
            .collect();
        let actual = test_set
            .samples
            .iter()
            .map(|s| ctx.scalers.inverse_close(s.target[0]))
            .collect();
        tracing::debug!("Predicted {} held-out windows", test_set.samples.len());
        (actual, predicted)
    }
}

fn scale(
    symbol: &str,
    window_size: usize,
    prediction_days: usize,
    matrix: FeatureMatrix,
) -> Result<(RunContext<'_>, Vec<[f64; NUM_FEATURES]>)> {
    let scalers = ScalerPair::fit(&matrix)?;
    let scaled = scalers.transform(&matrix);
    let ctx = RunContext {
        symbol,
        window_size,
        prediction_days,
        dates: matrix.dates,
        scalers,
    };
    Ok((ctx, scaled))
}

/// Build the consumer-facing result from aligned held-out series.
///
/// Dates are the tail of the feature-matrix dates, one per held-out pair. The
/// margin is taken between the rounded last prediction and rounded last actual.
pub(crate) fn assemble_result(
    dates: &[NaiveDate],
    actual: &[f64],
    predicted: &[f64],
) -> Result<PredictionResult> {
    let n = actual.len();
    if n == 0 || predicted.len() != n || dates.len() < n {
        return Err(ForecastError::InvalidConfig(format!(
            "cannot summarize {} actual / {} predicted values over {} dates",
            n,
            predicted.len(),
            dates.len()
        )));
    }

    let tail = &dates[dates.len() - n..];
    let historical = tail
        .iter()
        .zip(actual.iter().zip(predicted))
        .map(|(&date, (&actual, &predicted))| HistoricalPoint {
            date,
            actual,
            predicted,
        })
        .collect();

    let predicted_next_day_close = round2(predicted[n - 1]);
    let actual_last_close = round2(actual[n - 1]);
    let margin_of_error = round2((predicted_next_day_close - actual_last_close).abs());

    Ok(PredictionResult {
        predicted_next_day_close,
        actual_last_close,
        margin_of_error,
        historical,
    })
}

fn logged<T>(symbol: &str, stage: Stage, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::error!("Forecast for {} failed at {} stage: {}", symbol, stage, e);
    }
    result
}
