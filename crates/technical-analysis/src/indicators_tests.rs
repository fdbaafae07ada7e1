#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use super::super::snapshot::TechnicalSnapshot;
    use market_core::VolCategory;

    // 15 closes, most-recent-first
    fn falling_then_recovering() -> Vec<f64> {
        vec![
            110.0, 108.0, 107.0, 105.0, 100.0, 103.0, 99.0, 98.0, 97.0, 95.0, 94.0, 92.0, 90.0,
            88.0, 85.0,
        ]
    }

    // Build most-recent-first closes from oldest-first daily returns
    fn closes_from_returns(start: f64, returns: &[f64]) -> Vec<f64> {
        let mut prices = vec![start];
        for r in returns {
            let last = *prices.last().unwrap();
            prices.push(last * (1.0 + r));
        }
        prices.reverse();
        prices
    }

    fn zigzag_returns(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| match i % 4 {
                0 => 0.012,
                1 => -0.008,
                2 => 0.004,
                _ => -0.011,
            })
            .collect()
    }

    #[test]
    fn test_moving_average_basic() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((moving_average(&closes, 3) - 2.0).abs() < 1e-9);
        assert!((moving_average(&closes, 5) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_short_history_is_zero() {
        let closes: Vec<f64> = (0..49).map(|i| 100.0 + i as f64).collect();
        assert_eq!(moving_average(&closes, 50), 0.0);
        assert_eq!(moving_average(&[], 50), 0.0);
        assert_eq!(moving_average(&closes, 0), 0.0);
        assert!(try_moving_average(&closes, 50).is_none());
    }

    #[test]
    fn test_rsi_neutral_below_fifteen_closes() {
        for len in 0..15 {
            let closes: Vec<f64> = (0..len).map(|i| 100.0 + (i * 7 % 5) as f64).collect();
            assert_eq!(rsi(&closes, 14), 50.0, "len {len}");
        }
    }

    #[test]
    fn test_rsi_reference_value() {
        // gains 28, losses 3 over 14 deltas
        let value = rsi(&falling_then_recovering(), 14);
        let expected = 100.0 - 100.0 / (1.0 + 28.0 / 3.0);
        assert!((value - expected).abs() < 1e-9);
        assert!((value - 90.3226).abs() < 1e-4);
    }

    #[test]
    fn test_rsi_only_uses_first_period_deltas() {
        let mut closes = falling_then_recovering();
        closes.extend([500.0, 1.0, 300.0]);
        assert!((rsi(&closes, 14) - 90.3226).abs() < 1e-4);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        assert_eq!(rsi(&rising, 14), 100.0);

        let falling: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&falling, 14), 0.0);

        let flat = vec![50.0; 20];
        assert_eq!(rsi(&flat, 14), 100.0);
    }

    #[test]
    fn test_rsi_within_bounds() {
        let series = [
            closes_from_returns(100.0, &zigzag_returns(40)),
            vec![1e-9, 1e9, 1e-9, 1e9, 1e-9, 1e9, 1e-9, 1e9, 1e-9, 1e9, 1e-9, 1e9, 1e-9, 1e9, 1e-9],
            vec![0.0; 15],
            falling_then_recovering(),
        ];
        for closes in series {
            let value = rsi(&closes, 14);
            assert!((0.0..=100.0).contains(&value), "rsi {value} out of range");
        }
    }

    #[test]
    fn test_volatility_neutral_with_few_samples() {
        assert_eq!(volatility(&[], 30), 20.0);
        assert_eq!(volatility(&[100.0, 101.0, 99.0, 100.0, 102.0], 30), 20.0);
        assert!(try_volatility(&[100.0, 101.0, 99.0, 100.0, 102.0], 30).is_none());
    }

    #[test]
    fn test_volatility_flat_series_is_zero() {
        let flat = vec![100.0; 40];
        assert_eq!(volatility(&flat, 30), 0.0);
    }

    #[test]
    fn test_volatility_skips_bad_prices() {
        let closes = vec![100.0, 0.0, 101.0, 100.0, -5.0, 102.0, 100.0, 101.0, 100.0, 99.0, 100.0];
        let value = try_volatility(&closes, 30);
        assert!(value.is_some());
        assert!(value.unwrap().is_finite());
    }

    #[test]
    fn test_volatility_scales_with_swings() {
        let calm = closes_from_returns(100.0, &vec![0.001, -0.001].repeat(20));
        let wild = closes_from_returns(100.0, &vec![0.05, -0.05].repeat(20));
        assert!(volatility(&wild, 30) > volatility(&calm, 30));
        assert!(volatility(&wild, 30) > 35.0);
        assert!(volatility(&calm, 30) < 20.0);
    }

    #[test]
    fn test_beta_flat_benchmark_is_one() {
        let closes = closes_from_returns(100.0, &zigzag_returns(70));
        let flat = vec![400.0; 71];
        assert_eq!(beta(&closes, &flat, 60), 1.0);
    }

    #[test]
    fn test_beta_needs_ten_pairs() {
        let closes = closes_from_returns(100.0, &zigzag_returns(9));
        let bench = closes_from_returns(400.0, &zigzag_returns(9));
        assert_eq!(beta(&closes, &bench, 60), 1.0);
        assert!(try_beta(&closes, &bench, 60).is_none());
    }

    #[test]
    fn test_beta_of_levered_series() {
        let bench_returns = zigzag_returns(70);
        let levered: Vec<f64> = bench_returns.iter().map(|r| 2.0 * r).collect();
        let bench = closes_from_returns(400.0, &bench_returns);
        let closes = closes_from_returns(50.0, &levered);

        assert!((beta(&closes, &bench, 60) - 2.0).abs() < 1e-9);
        assert!((beta(&bench, &bench, 60) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_category_thresholds() {
        assert_eq!(volatility_category(35.0), VolCategory::High);
        assert_eq!(volatility_category(34.99), VolCategory::Medium);
        assert_eq!(volatility_category(20.0), VolCategory::Medium);
        assert_eq!(volatility_category(19.99), VolCategory::Low);
    }

    #[test]
    fn test_custom_config_thresholds() {
        let config = IndicatorConfig {
            high_vol_threshold: 50.0,
            medium_vol_threshold: 10.0,
            ..IndicatorConfig::default()
        };
        assert_eq!(config.categorize(40.0), VolCategory::Medium);
        assert_eq!(config.categorize(9.0), VolCategory::Low);
    }

    #[test]
    fn test_snapshot_from_history() {
        let config = IndicatorConfig::default();
        let closes = closes_from_returns(100.0, &zigzag_returns(260));
        let bench = closes_from_returns(400.0, &zigzag_returns(260));

        let snapshot = TechnicalSnapshot::compute(&closes, Some(bench.as_slice()), &config);

        assert!(snapshot.ma50 > 0.0);
        assert!(snapshot.ma200 > 0.0);
        assert!((0.0..=100.0).contains(&snapshot.rsi));
        assert!((snapshot.beta - 1.0).abs() < 1e-3);
        assert!(snapshot.high_52w >= snapshot.low_52w);
        assert_eq!(snapshot.sparkline.len(), 20);
        assert_eq!(snapshot.sparkline[0], closes[0]);
    }
}
