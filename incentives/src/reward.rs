/// The amount of tokens granted per unit of metric improvement when none is given.
pub const DEFAULT_SCALING_FACTOR: f64 = 10.0;

/// Converts an improvement in a lower-is-better metric (such as a loss) into a token reward.
///
/// # Arguments
/// * `previous_metric` - The metric before training.
/// * `current_metric` - The metric after training.
/// * `scaling_factor` - Tokens per unit of improvement.
///
/// # Returns
/// `(previous_metric - current_metric) * scaling_factor` when the metric improved, `0.0` otherwise.
/// The reward isn't rounded, `0.5 - 0.4` scaled by `10.0` is `0.9999999999999998`; only balances
/// reported by the service are rounded to two decimals.
pub fn calculate_reward(previous_metric: f64, current_metric: f64, scaling_factor: f64) -> f64 {
    let improvement = previous_metric - current_metric;

    if improvement > 0. {
        improvement * scaling_factor
    } else {
        0.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_is_scaled() {
        let reward = calculate_reward(0.5, 0.4, DEFAULT_SCALING_FACTOR);
        assert!((reward - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reward_is_not_rounded() {
        let reward = calculate_reward(0.5, 0.4, DEFAULT_SCALING_FACTOR);
        assert_eq!(reward, (0.5 - 0.4) * 10.0);
        assert_ne!(reward, 1.0);
    }

    #[test]
    fn test_regression_yields_nothing() {
        assert_eq!(calculate_reward(0.4, 0.5, DEFAULT_SCALING_FACTOR), 0.0);
    }

    #[test]
    fn test_no_change_yields_nothing() {
        assert_eq!(calculate_reward(0.3, 0.3, DEFAULT_SCALING_FACTOR), 0.0);
    }

    #[test]
    fn test_nan_yields_nothing() {
        assert_eq!(calculate_reward(f64::NAN, 0.1, DEFAULT_SCALING_FACTOR), 0.0);
    }
}
