use burn::{
    module::Module,
    nn::{Linear, LinearConfig, Lstm, LstmConfig},
    tensor::{backend::Backend, Tensor},
};

/// Stacked-LSTM close-price forecaster
///
/// Architecture: LSTM (full sequence) -> LSTM -> take last hidden state -> Linear -> horizon
#[derive(Module, Debug)]
pub struct ForecastModel<B: Backend> {
    lstm_in: Lstm<B>,
    lstm_out: Lstm<B>,
    output_layer: Linear<B>,
}

/// Configuration for the model
#[derive(burn::config::Config, PartialEq)]
pub struct ForecastModelConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
}

impl ForecastModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ForecastModel<B> {
        let lstm_in = LstmConfig::new(self.input_size, self.hidden_size, true).init(device);
        let lstm_out = LstmConfig::new(self.hidden_size, self.hidden_size, true).init(device);

        let output_layer = LinearConfig::new(self.hidden_size, self.output_size).init(device);

        ForecastModel {
            lstm_in,
            lstm_out,
            output_layer,
        }
    }
}

impl<B: Backend> ForecastModel<B> {
    /// Forward pass
    ///
    /// Input shape: [batch_size, seq_length, input_size]
    /// Output shape: [batch_size, output_size]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        // First layer returns the whole sequence: [batch_size, seq_length, hidden_size]
        let (sequence, _state) = self.lstm_in.forward(input, None);
        let (lstm_output, _state) = self.lstm_out.forward(sequence, None);

        let [batch_size, seq_len, hidden_size] = lstm_output.dims();
        let last_step = lstm_output.slice([0..batch_size, (seq_len - 1)..seq_len, 0..hidden_size]);
        let last_step = last_step.squeeze::<2>(1);

        self.output_layer.forward(last_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = ForecastModelConfig {
            input_size: 5,
            hidden_size: 8,
            output_size: 3,
        }
        .init::<NdArray>(&device);

        let input = Tensor::<NdArray, 3>::zeros([4, 6, 5], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [4, 3]);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let device = Default::default();
        let model = ForecastModelConfig {
            input_size: 5,
            hidden_size: 4,
            output_size: 1,
        }
        .init::<NdArray>(&device);

        let input = Tensor::<NdArray, 3>::ones([2, 5, 5], &device);
        let a = model.forward(input.clone()).into_data().to_vec::<f32>().unwrap();
        let b = model.forward(input).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }
}
