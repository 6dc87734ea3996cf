pub mod dataset;
pub mod model;
pub mod persistence;
pub mod scaler;
pub mod training;

/// Type alias for the persisted model (NdArray backend, always available)
pub type LoadedModel = model::ForecastModel<burn::backend::NdArray>;
