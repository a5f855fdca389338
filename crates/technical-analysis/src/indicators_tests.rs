#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use analysis_core::Candle;

    const DAY: i64 = 86_400;
    const START: i64 = 1_704_067_200;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to create sample candles
    fn sample_candles() -> Vec<Candle> {
        let prices = vec![
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
            (103.0, 105.0, 102.0, 104.0),
            (104.0, 106.0, 103.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 108.0, 105.0, 107.0),
            (107.0, 109.0, 106.0, 108.0),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
            (110.0, 112.0, 109.0, 111.0),
            (111.0, 113.0, 110.0, 112.0),
            (112.0, 114.0, 111.0, 113.0),
            (113.0, 115.0, 112.0, 114.0),
            (114.0, 116.0, 113.0, 115.0),
        ];

        prices
            .into_iter()
            .enumerate()
            .map(|(i, (open, high, low, close))| {
                Candle::new(START + i as i64 * DAY, open, high, low, close, 1_000_000.0)
            })
            .collect()
    }

    fn choppy_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + ((i * 7) % 11) as f64 - ((i * 3) % 5) as f64;
                Candle::new(START + i as i64 * 300, base, base + 2.0, base - 1.5, base + 0.5, 1000.0 + (i % 4) as f64 * 250.0)
            })
            .collect()
    }

    fn flat_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(START + i as i64 * 300, 100.0, 100.0, 100.0, 100.0, 1000.0))
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 5);
        assert!(result[0].is_nan() && result[1].is_nan());
        assert!((result[2] - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
        assert!((result[3] - 3.0).abs() < 0.001);
        assert!((result[4] - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let result = sma(&[1.0, 2.0], 5);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_sma_real_prices() {
        let prices = sample_prices();
        let result = sma(&prices, 10);
        assert_eq!(result.len(), prices.len());
        let expected: f64 = prices[..10].iter().sum::<f64>() / 10.0;
        assert!((result[9] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = ema(&data, 3);
        assert_eq!(result.len(), 5);
        assert!(result[1].is_nan());
        assert!((result[2] - 2.0).abs() < 1e-9);
        assert!((result[3] - 3.0).abs() < 1e-9);
        assert!((result[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_empty_data() {
        assert!(ema(&[], 10).is_empty());
        assert!(sma(&[], 10).is_empty());
    }

    #[test]
    fn test_ema_skips_leading_nan() {
        let data = vec![f64::NAN, f64::NAN, 2.0, 4.0, 6.0];
        let result = ema(&data, 2);
        assert!(result[2].is_nan());
        assert!((result[3] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ewm_has_no_warmup() {
        let result = ewm(&[10.0, 20.0, 30.0], 3);
        assert_eq!(result[0], 10.0);
        assert!((result[1] - 15.0).abs() < 1e-9);
        assert!((result[2] - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_wilder_reference_value() {
        let result = rsi(&sample_prices(), 14);
        assert_eq!(result.len(), 20);
        assert!(result[13].is_nan());
        assert!((result[14] - 70.46).abs() < 0.05);
    }

    #[test]
    fn test_rsi_bounded() {
        let closes: Vec<f64> = choppy_candles(80).iter().map(|c| c.close).collect();
        for value in rsi(&closes, 14).iter().chain(&rolling_rsi(&closes, 14)) {
            if value.is_finite() {
                assert!((0.0..=100.0).contains(value));
            }
        }
    }

    #[test]
    fn test_rsi_saturation() {
        let rising: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(rsi(&rising, 14)[19], 100.0);
        assert_eq!(rsi(&[5.0; 20], 14)[19], 50.0);
        assert_eq!(rolling_rsi(&[5.0; 20], 14)[19], 50.0);
    }

    #[test]
    fn test_roc() {
        let result = roc(&[100.0, 105.0, 110.0], 2);
        assert!(result[1].is_nan());
        assert!((result[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_macd_aligned() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = macd(&closes, 12, 26, 9);
        assert_eq!(result.macd_line.len(), 60);
        assert_eq!(result.histogram.len(), 60);
        assert!(result.macd_line[24].is_nan());
        assert!(result.macd_line[25] > 0.0);
        assert!(result.signal_line[32].is_nan());
        assert!(result.signal_line[33].is_finite());
    }

    #[test]
    fn test_bollinger_bands_sample_std() {
        let bb = bollinger_bands(&[1.0, 2.0, 3.0, 4.0, 5.0], 5, 2.0);
        let std = 2.5f64.sqrt();
        assert!((bb.middle[4] - 3.0).abs() < 1e-9);
        assert!((bb.upper[4] - (3.0 + 2.0 * std)).abs() < 1e-9);
        assert!((bb.lower[4] - (3.0 - 2.0 * std)).abs() < 1e-9);
        assert!(bb.upper[3].is_nan());
    }

    #[test]
    fn test_bollinger_bands_ordering() {
        let bb = bollinger_bands(&sample_prices(), 5, 2.0);
        for i in 4..20 {
            assert!(bb.upper[i] >= bb.middle[i]);
            assert!(bb.middle[i] >= bb.lower[i]);
        }
    }

    #[test]
    fn test_bollinger_bands_width() {
        let bb = bollinger_bands(&sample_prices(), 5, 2.0);
        let width = bb.width();
        assert_eq!(width.len(), 20);
        assert!(width[19] > 0.0);
    }

    #[test]
    fn test_atr_constant_range() {
        let candles = sample_candles();
        let result = atr(&candles, 14);
        assert_eq!(result.len(), 15);
        assert!(result[12].is_nan());
        assert!((result[13] - 3.0).abs() < 1e-9);
        assert!((result[14] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_increases_with_volatility() {
        let mut candles = sample_candles();
        let calm = atr(&candles, 5)[14];
        candles.push(Candle::new(START + 15 * DAY, 115.0, 125.0, 110.0, 120.0, 1_000_000.0));
        let wild = atr(&candles, 5)[15];
        assert!(wild > calm);
    }

    #[test]
    fn test_keltner_and_squeeze() {
        let candles = choppy_candles(60);
        let kc = keltner_channels(&candles, 20, 10, 2.0);
        for i in 20..60 {
            assert!(kc.upper[i] > kc.middle[i] && kc.middle[i] > kc.lower[i]);
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let flags = squeeze(&bollinger_bands(&closes, 20, 2.0), &kc);
        assert!(flags.iter().all(|f| *f == 0.0 || *f == 1.0));
    }

    #[test]
    fn test_stochastic_bounds_and_flat() {
        let result = stochastic(&choppy_candles(50), 14, 3, 3);
        assert_eq!(result.k.len(), 50);
        for value in result.k.iter().chain(&result.d) {
            if value.is_finite() {
                assert!((0.0..=100.0).contains(value));
            }
        }
        let flat = stochastic(&flat_candles(20), 14, 3, 3);
        assert_eq!(flat.k[19], 50.0);
    }

    #[test]
    fn test_adx_bounds_and_warmup() {
        let result = adx(&choppy_candles(80), 14);
        assert!(result.adx[26].is_nan());
        assert!(result.adx[27].is_finite());
        for value in &result.adx {
            if value.is_finite() {
                assert!((0.0..=100.0).contains(value));
            }
        }
        let trending = adx(&sample_candles(), 5);
        assert!(trending.plus_di[14] > trending.minus_di[14]);
    }

    #[test]
    fn test_obv_direction() {
        let candles = sample_candles();
        let result = obv(&candles);
        assert_eq!(result[0], 1_000_000.0);
        assert_eq!(result[14], 15_000_000.0);
    }

    #[test]
    fn test_vwap_single_session() {
        let candles = sample_candles()[..1].to_vec();
        let result = vwap(&candles, SessionGrouping::FixedBars(75));
        assert!((result[0] - candles[0].typical_price()).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_with_zero_volume() {
        let candles = vec![
            Candle::new(START, 100.0, 102.0, 98.0, 100.0, 0.0),
            Candle::new(START + 300, 102.0, 104.0, 100.0, 102.0, 0.0),
        ];
        let result = vwap(&candles, SessionGrouping::Calendar { utc_offset_secs: 19_800 });
        assert!((result[1] - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_resets_each_session() {
        let candles = sample_candles();
        let grouping = resolve_session_grouping(&candles, 19_800, 75);
        assert_eq!(grouping, SessionGrouping::Calendar { utc_offset_secs: 19_800 });
        let result = vwap(&candles, grouping);
        // One bar per day, so every bar is its own session
        for (v, c) in result.iter().zip(&candles) {
            assert!((v - c.typical_price()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_session_fallback_without_timestamps() {
        let candles: Vec<Candle> = (0..160).map(|_| Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)).collect();
        let grouping = resolve_session_grouping(&candles, 19_800, 75);
        assert_eq!(grouping, SessionGrouping::FixedBars(75));
        let ids = session_ids(&candles, grouping);
        assert_eq!(ids[74], 0);
        assert_eq!(ids[75], 1);
        assert_eq!(ids[159], 2);
    }

    #[test]
    fn test_oscillator_bounds() {
        let candles = choppy_candles(60);
        for value in mfi(&candles, 14) {
            if value.is_finite() {
                assert!((0.0..=100.0).contains(&value));
            }
        }
        for value in williams_r(&candles, 14) {
            if value.is_finite() {
                assert!((-100.0..=0.0).contains(&value));
            }
        }
        for value in cmf(&candles, 20) {
            if value.is_finite() {
                assert!((-1.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_flat_market_sentinels() {
        let candles = flat_candles(30);
        assert_eq!(cci(&candles, 14)[29], 0.0);
        assert_eq!(williams_r(&candles, 14)[29], -50.0);
        assert_eq!(mfi(&candles, 14)[29], 50.0);
        assert!(fisher_transform(&candles, 10)[29].is_nan());
        assert_eq!(adl(&candles)[29], 0.0);
    }

    #[test]
    fn test_heikin_ashi() {
        let candles = sample_candles();
        let ha = heikin_ashi(&candles);
        assert_eq!(ha.open.len(), candles.len());
        assert!((ha.open[0] - 100.5).abs() < 1e-9);
        assert!((ha.close[0] - 100.5).abs() < 1e-9);
        for i in 0..candles.len() {
            assert!(ha.high[i] >= ha.open[i].max(ha.close[i]));
            assert!(ha.low[i] <= ha.open[i].min(ha.close[i]));
        }
    }

    #[test]
    fn test_ichimoku_displacement() {
        let candles = choppy_candles(120);
        let cloud = ichimoku_cloud(&candles, 9, 26, 52, 26);
        assert_eq!(cloud.span_a.len(), 120);
        let i = 80;
        let expected = (cloud.conversion[i - 26] + cloud.base[i - 26]) / 2.0;
        assert!((cloud.span_a[i] - expected).abs() < 1e-9);
        assert!(cloud.span_b[76].is_nan());
        assert!(cloud.span_b[77].is_finite());
        assert_eq!(cloud.lagging[0], candles[26].close);
        assert!(cloud.lagging[119].is_nan());
    }

    #[test]
    fn test_dema_tema_track_trend() {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + i as f64).collect();
        let d = dema(&closes, 10);
        let t = tema(&closes, 10);
        let e = ema(&closes, 10);
        // Less lag than a plain EMA on a straight line
        assert!(d[79] > e[79]);
        assert!((t[79] - closes[79]).abs() < 1e-6);
    }

    #[test]
    fn test_rolling_extremes() {
        let max = rolling_max(&[1.0, 3.0, 2.0, 5.0], 2);
        let min = rolling_min(&[1.0, 3.0, 2.0, 5.0], 2);
        assert!(max[0].is_nan());
        assert_eq!(max[1..], [3.0, 3.0, 5.0]);
        assert_eq!(min[1..], [1.0, 2.0, 2.0]);
    }
}
