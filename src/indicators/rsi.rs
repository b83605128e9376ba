/// Relative Strength Index over the last `period` close-to-close changes
///
/// Uses plain means of gains and losses (no Wilder smoothing), so exactly
/// `period + 1` prices are enough.
///
/// - RSI < 30: oversold
/// - RSI > 70: overbought
///
/// A window without any loss returns 100, including a flat window.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let window = &prices[prices.len() - (period + 1)..];
    let (gain_sum, loss_sum) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;
    if !avg_gain.is_finite() || !avg_loss.is_finite() {
        return None;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
