/// Rolling simple moving average. Entry `i` averages `data[i + 1 - window..=i]`
/// and is `None` until a full window is available.
pub fn rolling_sma(data: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; data.len()];
    }
    let mut out = Vec::with_capacity(data.len());
    let mut sum = 0.0;
    for (i, &x) in data.iter().enumerate() {
        sum += x;
        if i >= window {
            sum -= data[i - window];
        }
        if i + 1 >= window {
            out.push(Some(sum / window as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// Rolling relative strength index (Wilder smoothing, `alpha = 1 / window`).
///
/// The first difference counts as no gain and no loss, so the smoothed
/// averages start at index 0 and the value is defined from index `window - 1`.
/// A zero average loss gives 100.
pub fn rolling_rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; closes.len()];
    }
    let alpha = 1.0 / window as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let change = if i == 0 { 0.0 } else { close - closes[i - 1] };
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            if i == 0 {
                avg_gain = gain;
                avg_loss = loss;
            } else {
                avg_gain = (1.0 - alpha) * avg_gain + alpha * gain;
                avg_loss = (1.0 - alpha) * avg_loss + alpha * loss;
            }

            if i + 1 < window {
                return None;
            }
            if avg_loss == 0.0 {
                return Some(100.0);
            }
            let rs = avg_gain / avg_loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma_warmup_and_values() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = rolling_sma(&data, 3);
        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert_relative_eq!(sma[2].unwrap(), 2.0);
        assert_relative_eq!(sma[4].unwrap(), 4.0);
    }

    #[test]
    fn test_sma_window_longer_than_data() {
        let sma = rolling_sma(&[1.0, 2.0], 10);
        assert!(sma.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_rsi_defined_from_window_minus_one() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let rsi = rolling_rsi(&closes, 14);
        assert!(rsi[..13].iter().all(|v| v.is_none()));
        assert!(rsi[13..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_rsi_wilder_smoothing_by_hand() {
        // alpha = 1/3, first diff counts as 0/0:
        // i=1 gain 1 -> (1/3, 0); i=2 loss 1 -> (2/9, 1/3); i=3 gain 2 -> (22/27, 2/9)
        let rsi = rolling_rsi(&[1.0, 2.0, 1.0, 3.0], 3);
        assert_eq!(rsi[1], None);
        assert_relative_eq!(rsi[2].unwrap(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(rsi[3].unwrap(), 1100.0 / 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rsi_all_gains() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = rolling_rsi(&closes, 14);
        assert_eq!(rsi[19], Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rsi = rolling_rsi(&closes, 14);
        assert_relative_eq!(rsi[19].unwrap(), 0.0);
    }

    #[test]
    fn test_rsi_bounded() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 50.0 + 10.0 * (i as f64 / 5.0).sin() + i as f64 * 0.1)
            .collect();
        for v in rolling_rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI out of range: {}", v);
        }
    }

    #[test]
    fn test_rsi_alternating_is_midrange() {
        let closes: Vec<f64> = (0..100)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let last = rolling_rsi(&closes, 14)[99].unwrap();
        assert!((40.0..60.0).contains(&last), "got {}", last);
    }
}
