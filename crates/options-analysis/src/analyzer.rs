use analysis_core::{OptionChainRow, OptionChainSnapshot};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::grid::{build_grid, GridConfig, GridLevel, LevelCandidate, CURRENT_PRICE};
use crate::pricing::{greeks, implied_volatility, Greeks, IvSolverConfig, OptionKind};

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Weights of the six sentiment components; renormalized over the defined ones
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentWeights {
    pub pcr_oi: f64,
    pub pcr_volume: f64,
    pub iv_skew: f64,
    pub max_pain: f64,
    pub gamma: f64,
    pub atm_iv: f64,
}

impl Default for SentimentWeights {
    fn default() -> Self {
        Self {
            pcr_oi: 0.20,
            pcr_volume: 0.15,
            iv_skew: 0.15,
            max_pain: 0.20,
            gamma: 0.15,
            atm_iv: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainConfig {
    pub risk_free_rate: f64,
    pub iv_solver: IvSolverConfig,
    /// Used when the expiry date cannot be parsed
    pub fallback_days_to_expiry: f64,
    /// Expiry time of day in UTC (15:30 IST)
    pub expiry_hour_utc: u32,
    pub expiry_minute_utc: u32,
    pub min_rows: usize,
    pub skew_put_moneyness: f64,
    pub skew_call_moneyness: f64,
    pub strong_put_skew: f64,
    pub mild_put_skew: f64,
    pub mild_call_skew: f64,
    pub strong_call_skew: f64,
    /// Max-pain deviation from spot (percent) bands
    pub max_pain_strong_pct: f64,
    pub max_pain_mild_pct: f64,
    /// Normalized net gamma bands
    pub gamma_strong: f64,
    pub gamma_mild: f64,
    /// Spot move used for dollar gamma (1%)
    pub gamma_move: f64,
    pub implied_range_confidence: f64,
    pub sentiment_weights: SentimentWeights,
    pub contrarian_high: f64,
    pub contrarian_low: f64,
    pub grid: GridConfig,
}

impl Default for OptionChainConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.065,
            iv_solver: IvSolverConfig::default(),
            fallback_days_to_expiry: 7.0,
            expiry_hour_utc: 10,
            expiry_minute_utc: 0,
            min_rows: 3,
            skew_put_moneyness: 0.95,
            skew_call_moneyness: 1.05,
            strong_put_skew: 1.15,
            mild_put_skew: 1.05,
            mild_call_skew: 0.95,
            strong_call_skew: 0.85,
            max_pain_strong_pct: 2.0,
            max_pain_mild_pct: 0.5,
            gamma_strong: 0.5,
            gamma_mild: 0.1,
            gamma_move: 0.01,
            implied_range_confidence: 0.68,
            sentiment_weights: SentimentWeights::default(),
            contrarian_high: 85.0,
            contrarian_low: 15.0,
            grid: GridConfig::default(),
        }
    }
}

/// Per-strike derived values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeAnalytics {
    pub strike: f64,
    pub call_iv: f64,
    pub put_iv: f64,
    pub call_greeks: Option<Greeks>,
    pub put_greeks: Option<Greeks>,
    pub call_gex: f64,
    pub put_gex: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxPain {
    pub strike: f64,
    pub total_pain: f64,
    /// (max pain - spot) / spot in percent
    pub deviation_pct: f64,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSkew {
    pub put_strike: f64,
    pub call_strike: f64,
    pub put_iv: f64,
    pub call_iv: f64,
    pub skew_ratio: f64,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaStrike {
    pub strike: f64,
    pub net_gex: f64,
    /// Share of total absolute gamma exposure at this strike
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaExposure {
    pub call_gex: f64,
    pub put_gex: f64,
    pub net_gex: f64,
    pub normalized: f64,
    pub interpretation: String,
    pub top_strikes: Vec<GammaStrike>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutCallRatio {
    pub oi_ratio: f64,
    pub volume_ratio: f64,
    pub oi_sentiment: String,
    pub oi_contrarian: String,
    pub volume_sentiment: String,
    pub volume_contrarian: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceRange {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpliedRange {
    /// Open-interest weighted IV
    pub average_iv: f64,
    pub confidence: f64,
    pub z_score: f64,
    pub range: PriceRange,
    pub one_sigma: PriceRange,
    pub two_sigma: PriceRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentComponents {
    pub pcr_oi: f64,
    pub pcr_volume: f64,
    pub iv_skew: f64,
    pub max_pain: f64,
    pub gamma: f64,
    pub atm_iv: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSentiment {
    /// 0-100, higher is more bullish
    pub score: f64,
    pub label: String,
    pub components: SentimentComponents,
    pub contrarian_warning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainReport {
    pub symbol: String,
    pub spot_price: f64,
    pub expiry_date: Option<String>,
    pub days_to_expiry: f64,
    pub strikes: Vec<StrikeAnalytics>,
    pub max_pain: Option<MaxPain>,
    pub iv_skew: Option<IvSkew>,
    pub gamma_exposure: Option<GammaExposure>,
    pub put_call_ratio: Option<PutCallRatio>,
    pub implied_range: Option<ImpliedRange>,
    pub atm_iv: f64,
    pub sentiment: MarketSentiment,
    pub grid_levels: Vec<GridLevel>,
    pub insufficient_data: bool,
    pub error: Option<String>,
}

impl OptionChainReport {
    fn insufficient(snapshot: &OptionChainSnapshot, message: &str) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            spot_price: snapshot.spot_price,
            expiry_date: snapshot.rows.first().map(|r| r.expiry_date.clone()),
            days_to_expiry: f64::NAN,
            strikes: Vec::new(),
            max_pain: None,
            iv_skew: None,
            gamma_exposure: None,
            put_call_ratio: None,
            implied_range: None,
            atm_iv: f64::NAN,
            sentiment: MarketSentiment {
                score: 50.0,
                label: "Insufficient Data".to_string(),
                components: SentimentComponents {
                    pcr_oi: f64::NAN,
                    pcr_volume: f64::NAN,
                    iv_skew: f64::NAN,
                    max_pain: f64::NAN,
                    gamma: f64::NAN,
                    atm_iv: f64::NAN,
                },
                contrarian_warning: false,
            },
            grid_levels: Vec::new(),
            insufficient_data: true,
            error: Some(message.to_string()),
        }
    }
}

/// Parse `2024-01-25` or `25-Jan-2024`.
pub fn parse_expiry(expiry: &str) -> Option<NaiveDate> {
    let trimmed = expiry.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d-%b-%Y"))
        .ok()
}

/// Years from `as_of` to the expiry close; `None` when the date is unparseable.
pub fn time_to_expiry(expiry: &str, as_of: i64, config: &OptionChainConfig) -> Option<f64> {
    let date = parse_expiry(expiry)?;
    let close = NaiveTime::from_hms_opt(config.expiry_hour_utc, config.expiry_minute_utc, 0)?;
    let expiry_ts = date.and_time(close).and_utc().timestamp();
    Some(((expiry_ts - as_of) as f64 / SECONDS_PER_YEAR).max(0.0))
}

/// Total writer payout if the underlying settles at `settle`.
pub fn pain_at(rows: &[OptionChainRow], settle: f64) -> f64 {
    rows.iter()
        .map(|r| r.call_oi * (settle - r.strike).max(0.0) + r.put_oi * (r.strike - settle).max(0.0))
        .sum()
}

/// Strike minimizing total writer payout. Ties resolve to the lowest strike.
pub fn max_pain_strike(rows: &[OptionChainRow]) -> Option<(f64, f64)> {
    let mut best: Option<(f64, f64)> = None;
    for row in rows {
        let pain = pain_at(rows, row.strike);
        let better = match best {
            None => true,
            Some((strike, best_pain)) => pain < best_pain || (pain == best_pain && row.strike < strike),
        };
        if better {
            best = Some((row.strike, pain));
        }
    }
    best
}

pub fn max_pain_impact(deviation_pct: f64, config: &OptionChainConfig) -> &'static str {
    if deviation_pct > config.max_pain_strong_pct {
        "Strongly Bullish - Max pain well above spot"
    } else if deviation_pct > config.max_pain_mild_pct {
        "Slightly Bullish - Max pain slightly above spot"
    } else if deviation_pct < -config.max_pain_strong_pct {
        "Strongly Bearish - Max pain well below spot"
    } else if deviation_pct < -config.max_pain_mild_pct {
        "Slightly Bearish - Max pain slightly below spot"
    } else {
        "Neutral - Max pain near spot"
    }
}

pub fn skew_interpretation(ratio: f64, config: &OptionChainConfig) -> &'static str {
    if !ratio.is_finite() {
        "Insufficient Data"
    } else if ratio > config.strong_put_skew {
        "Strong Bearish - Significant put skew"
    } else if ratio > config.mild_put_skew {
        "Slightly Bearish - Moderately higher put premiums"
    } else if ratio < config.strong_call_skew {
        "Strong Bullish - Significant call skew"
    } else if ratio < config.mild_call_skew {
        "Slightly Bullish - Moderately higher call premiums"
    } else {
        "Neutral - Balanced IV"
    }
}

pub fn gamma_interpretation(normalized: f64, config: &OptionChainConfig) -> &'static str {
    if !normalized.is_finite() {
        "Insufficient Data"
    } else if normalized > config.gamma_strong {
        "Strong Positive Gamma - Dealers dampen moves"
    } else if normalized > config.gamma_mild {
        "Positive Gamma - Mild stabilizing effect"
    } else if normalized >= -config.gamma_mild {
        "Neutral Gamma"
    } else if normalized >= -config.gamma_strong {
        "Negative Gamma - Mild destabilizing effect"
    } else {
        "Strong Negative Gamma - Dealers amplify moves"
    }
}

/// Sentiment and contrarian reading of a put-call ratio.
pub fn pcr_sentiment(ratio: f64) -> (&'static str, &'static str) {
    if !ratio.is_finite() {
        ("Insufficient Data", "Insufficient Data")
    } else if ratio > 1.5 {
        ("Bearish", "Strong Bullish")
    } else if ratio > 1.2 {
        ("Moderately Bearish", "Bullish")
    } else if ratio > 1.0 {
        ("Slightly Bearish", "Slightly Bullish")
    } else if ratio > 0.8 {
        ("Neutral", "Neutral")
    } else if ratio > 0.6 {
        ("Slightly Bullish", "Slightly Bearish")
    } else if ratio > 0.4 {
        ("Moderately Bullish", "Bearish")
    } else {
        ("Bullish", "Strong Bearish")
    }
}

pub fn sentiment_label(score: f64) -> &'static str {
    if score >= 80.0 {
        "Strongly Bullish"
    } else if score >= 65.0 {
        "Bullish"
    } else if score >= 55.0 {
        "Slightly Bullish"
    } else if score > 45.0 {
        "Neutral"
    } else if score > 35.0 {
        "Slightly Bearish"
    } else if score > 20.0 {
        "Bearish"
    } else {
        "Strongly Bearish"
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        f64::NAN
    }
}

fn score_clamp(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        f64::NAN
    }
}

fn nearest_row(rows: &[OptionChainRow], target: f64) -> Option<usize> {
    rows.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.strike - target).abs().total_cmp(&(b.strike - target).abs()))
        .map(|(i, _)| i)
}

fn two_sided_range(spot: f64, sigma: f64, t: f64, z: f64) -> PriceRange {
    let move_ = z * sigma * t.sqrt();
    PriceRange {
        lower: spot * (-move_).exp(),
        upper: spot * move_.exp(),
    }
}

fn z_for_confidence(confidence: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf((1.0 + confidence) / 2.0),
        Err(_) => f64::NAN,
    }
}

fn resolve_iv(quoted: Option<f64>, kind: OptionKind, price: f64, spot: f64, strike: f64, t: f64, config: &OptionChainConfig) -> f64 {
    match quoted {
        Some(iv) if iv.is_finite() && iv > 0.0 => iv,
        _ => implied_volatility(kind, price, spot, strike, t, config.risk_free_rate, &config.iv_solver),
    }
}

/// Extra price levels (technical support/resistance) to fold into the grid
#[derive(Debug, Clone, Default)]
pub struct ExternalLevels {
    pub supports: Vec<f64>,
    pub resistances: Vec<f64>,
}

/// Full option chain report.
///
/// Rows are sorted by strike first, so the result does not depend on input order.
pub fn analyze_option_chain(
    snapshot: &OptionChainSnapshot,
    external: &ExternalLevels,
    config: &OptionChainConfig,
) -> OptionChainReport {
    let spot = snapshot.spot_price;
    if !spot.is_finite() || spot <= 0.0 {
        return OptionChainReport::insufficient(snapshot, "Spot price unavailable");
    }
    if snapshot.rows.len() < config.min_rows {
        return OptionChainReport::insufficient(snapshot, "Insufficient option chain rows");
    }

    let mut rows = snapshot.rows.clone();
    rows.sort_by(|a, b| a.strike.total_cmp(&b.strike));

    let expiry_date = rows.first().map(|r| r.expiry_date.clone());
    let t = expiry_date
        .as_deref()
        .and_then(|e| time_to_expiry(e, snapshot.as_of, config))
        .unwrap_or(config.fallback_days_to_expiry / 365.0);
    debug!(symbol = %snapshot.symbol, rows = rows.len(), t, "Analyzing option chain");

    let r = config.risk_free_rate;
    let dollar_gamma = spot * spot * config.gamma_move;
    let strikes: Vec<StrikeAnalytics> = rows
        .iter()
        .map(|row| {
            let call_iv = resolve_iv(row.call_iv, OptionKind::Call, row.call_price, spot, row.strike, t, config);
            let put_iv = resolve_iv(row.put_iv, OptionKind::Put, row.put_price, spot, row.strike, t, config);
            let call_greeks = call_iv
                .is_finite()
                .then(|| greeks(OptionKind::Call, spot, row.strike, t, r, call_iv));
            let put_greeks = put_iv
                .is_finite()
                .then(|| greeks(OptionKind::Put, spot, row.strike, t, r, put_iv));
            StrikeAnalytics {
                strike: row.strike,
                call_iv,
                put_iv,
                call_gex: call_greeks.map(|g| g.gamma * row.call_oi * dollar_gamma).unwrap_or(0.0),
                put_gex: put_greeks.map(|g| g.gamma * row.put_oi * dollar_gamma).unwrap_or(0.0),
                call_greeks,
                put_greeks,
            }
        })
        .collect();

    // Max pain
    let max_pain = max_pain_strike(&rows).map(|(strike, total_pain)| {
        let deviation_pct = (strike - spot) / spot * 100.0;
        MaxPain {
            strike,
            total_pain,
            deviation_pct,
            impact: max_pain_impact(deviation_pct, config).to_string(),
        }
    });

    // IV skew
    let iv_skew = match (
        nearest_row(&rows, spot * config.skew_put_moneyness),
        nearest_row(&rows, spot * config.skew_call_moneyness),
    ) {
        (Some(p), Some(c)) => {
            let skew_ratio = ratio(strikes[p].put_iv, strikes[c].call_iv);
            Some(IvSkew {
                put_strike: rows[p].strike,
                call_strike: rows[c].strike,
                put_iv: strikes[p].put_iv,
                call_iv: strikes[c].call_iv,
                skew_ratio,
                interpretation: skew_interpretation(skew_ratio, config).to_string(),
            })
        }
        _ => None,
    };

    // Dealer gamma exposure
    let call_gex: f64 = strikes.iter().map(|s| s.call_gex).sum();
    let put_gex: f64 = strikes.iter().map(|s| s.put_gex).sum();
    let net_gex = call_gex - put_gex;
    let normalized = ratio(net_gex, call_gex + put_gex);
    let total_abs: f64 = strikes.iter().map(|s| (s.call_gex - s.put_gex).abs()).sum();
    let mut ranked: Vec<GammaStrike> = strikes
        .iter()
        .map(|s| {
            let net = s.call_gex - s.put_gex;
            GammaStrike {
                strike: s.strike,
                net_gex: net,
                share: ratio(net.abs(), total_abs),
            }
        })
        .filter(|g| g.net_gex != 0.0)
        .collect();
    ranked.sort_by(|a, b| b.net_gex.abs().total_cmp(&a.net_gex.abs()).then(a.strike.total_cmp(&b.strike)));
    ranked.truncate(config.grid.top_gamma_strikes);
    let gamma_exposure = Some(GammaExposure {
        call_gex,
        put_gex,
        net_gex,
        normalized,
        interpretation: gamma_interpretation(normalized, config).to_string(),
        top_strikes: ranked,
    });

    // Put-call ratios
    let total_call_oi: f64 = rows.iter().map(|r| r.call_oi).sum();
    let total_put_oi: f64 = rows.iter().map(|r| r.put_oi).sum();
    let total_call_volume: f64 = rows.iter().map(|r| r.call_volume).sum();
    let total_put_volume: f64 = rows.iter().map(|r| r.put_volume).sum();
    let oi_ratio = ratio(total_put_oi, total_call_oi);
    let volume_ratio = ratio(total_put_volume, total_call_volume);
    let (oi_sentiment, oi_contrarian) = pcr_sentiment(oi_ratio);
    let (volume_sentiment, volume_contrarian) = pcr_sentiment(volume_ratio);
    let put_call_ratio = Some(PutCallRatio {
        oi_ratio,
        volume_ratio,
        oi_sentiment: oi_sentiment.to_string(),
        oi_contrarian: oi_contrarian.to_string(),
        volume_sentiment: volume_sentiment.to_string(),
        volume_contrarian: volume_contrarian.to_string(),
    });

    // Implied range from OI-weighted IV
    let mut iv_weight = 0.0;
    let mut iv_sum = 0.0;
    for (row, s) in rows.iter().zip(&strikes) {
        if s.call_iv.is_finite() && row.call_oi > 0.0 {
            iv_sum += s.call_iv * row.call_oi;
            iv_weight += row.call_oi;
        }
        if s.put_iv.is_finite() && row.put_oi > 0.0 {
            iv_sum += s.put_iv * row.put_oi;
            iv_weight += row.put_oi;
        }
    }
    let average_iv = ratio(iv_sum, iv_weight);
    let implied_range = (average_iv.is_finite() && t > 0.0).then(|| {
        let z_score = z_for_confidence(config.implied_range_confidence);
        ImpliedRange {
            average_iv,
            confidence: config.implied_range_confidence,
            z_score,
            range: two_sided_range(spot, average_iv, t, z_score),
            one_sigma: two_sided_range(spot, average_iv, t, 1.0),
            two_sigma: two_sided_range(spot, average_iv, t, 2.0),
        }
    });

    // ATM IV
    let atm_iv = nearest_row(&rows, spot)
        .map(|i| {
            let ivs: Vec<f64> = [strikes[i].call_iv, strikes[i].put_iv]
                .into_iter()
                .filter(|v| v.is_finite())
                .collect();
            if ivs.is_empty() {
                f64::NAN
            } else {
                ivs.iter().sum::<f64>() / ivs.len() as f64
            }
        })
        .unwrap_or(f64::NAN);

    // Composite sentiment
    let components = SentimentComponents {
        pcr_oi: score_clamp(50.0 + (oi_ratio - 1.0) * 50.0),
        pcr_volume: score_clamp(50.0 + (volume_ratio - 1.0) * 50.0),
        iv_skew: score_clamp(50.0 - (iv_skew.as_ref().map(|s| s.skew_ratio).unwrap_or(f64::NAN) - 1.0) * 250.0),
        max_pain: score_clamp(50.0 + max_pain.as_ref().map(|m| m.deviation_pct).unwrap_or(f64::NAN) * 10.0),
        gamma: score_clamp(50.0 + normalized * 50.0),
        atm_iv: score_clamp(100.0 - (atm_iv * 100.0 - 10.0) * 2.5),
    };
    let w = &config.sentiment_weights;
    let weighted = [
        (components.pcr_oi, w.pcr_oi),
        (components.pcr_volume, w.pcr_volume),
        (components.iv_skew, w.iv_skew),
        (components.max_pain, w.max_pain),
        (components.gamma, w.gamma),
        (components.atm_iv, w.atm_iv),
    ];
    let (score_sum, weight_sum) = weighted
        .iter()
        .filter(|(value, weight)| value.is_finite() && *weight > 0.0)
        .fold((0.0, 0.0), |(s, ws), (value, weight)| (s + value * weight, ws + weight));
    let score = if weight_sum > 0.0 { score_sum / weight_sum } else { 50.0 };
    let sentiment = MarketSentiment {
        score,
        label: sentiment_label(score).to_string(),
        contrarian_warning: score > config.contrarian_high || score < config.contrarian_low,
        components,
    };

    // Grid levels
    let grid_config = &config.grid;
    let mut candidates = vec![LevelCandidate::new(spot, grid_config.current_price_strength, CURRENT_PRICE)];
    let mut below: Vec<&OptionChainRow> = rows.iter().filter(|r| r.strike < spot && r.put_oi > 0.0).collect();
    below.sort_by(|a, b| b.put_oi.total_cmp(&a.put_oi).then(a.strike.total_cmp(&b.strike)));
    for row in below.iter().take(grid_config.top_oi_strikes) {
        candidates.push(LevelCandidate::new(row.strike, grid_config.oi_strength, "Put OI Support"));
    }
    let mut above: Vec<&OptionChainRow> = rows.iter().filter(|r| r.strike > spot && r.call_oi > 0.0).collect();
    above.sort_by(|a, b| b.call_oi.total_cmp(&a.call_oi).then(a.strike.total_cmp(&b.strike)));
    for row in above.iter().take(grid_config.top_oi_strikes) {
        candidates.push(LevelCandidate::new(row.strike, grid_config.oi_strength, "Call OI Resistance"));
    }
    if let Some(range) = &implied_range {
        candidates.push(LevelCandidate::new(range.one_sigma.lower, grid_config.sigma_strength, "Implied Range Lower"));
        candidates.push(LevelCandidate::new(range.one_sigma.upper, grid_config.sigma_strength, "Implied Range Upper"));
    }
    if let Some(gamma) = &gamma_exposure {
        for g in &gamma.top_strikes {
            let share = if g.share.is_finite() { g.share } else { 0.0 };
            candidates.push(LevelCandidate::new(
                g.strike,
                grid_config.gamma_base_strength + share * grid_config.gamma_share_strength,
                "Gamma Concentration",
            ));
        }
    }
    for &level in &external.supports {
        candidates.push(LevelCandidate::new(level, grid_config.external_strength, "Technical Support"));
    }
    for &level in &external.resistances {
        candidates.push(LevelCandidate::new(level, grid_config.external_strength, "Technical Resistance"));
    }
    let backfill = implied_range.as_ref().map(|r| (r.one_sigma.lower, r.one_sigma.upper));
    let grid_levels = build_grid(spot, candidates, backfill, score, grid_config);

    OptionChainReport {
        symbol: snapshot.symbol.clone(),
        spot_price: spot,
        expiry_date,
        days_to_expiry: t * 365.0,
        strikes,
        max_pain,
        iv_skew,
        gamma_exposure,
        put_call_ratio,
        implied_range,
        atm_iv,
        sentiment,
        grid_levels,
        insufficient_data: false,
        error: None,
    }
}
