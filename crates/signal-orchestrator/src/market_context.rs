//! Caller-supplied market context: pre-market read, institutional flows and sector moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured pre-market read produced upstream (e.g. from a research PDF)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreMarketSentiment {
    /// bullish / bearish / neutral
    pub overall_sentiment: String,
    pub summary: Option<String>,
    pub nifty_outlook: Option<String>,
    pub banknifty_outlook: Option<String>,
    pub bullish_sectors: Vec<String>,
    pub bearish_sectors: Vec<String>,
    pub fii_dii_summary: Option<String>,
    pub key_risks: Vec<String>,
    pub short_term_bias: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowValues {
    pub buy_value: f64,
    pub sell_value: f64,
    pub net_value: f64,
}

/// Net cash-market activity of foreign and domestic institutions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FiiDiiFlows {
    pub fii: FlowValues,
    pub dii: FlowValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowSentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiiDiiSentiment {
    pub fii: FlowValues,
    pub dii: FlowValues,
    pub sentiment: FlowSentiment,
    pub data_available: bool,
}

/// Sentiment follows the sign of the FII net flow; missing data is neutral.
pub fn classify_fii_dii(flows: Option<&FiiDiiFlows>) -> FiiDiiSentiment {
    match flows {
        Some(f) => FiiDiiSentiment {
            fii: f.fii,
            dii: f.dii,
            sentiment: if f.fii.net_value > 0.0 {
                FlowSentiment::Bullish
            } else if f.fii.net_value < 0.0 {
                FlowSentiment::Bearish
            } else {
                FlowSentiment::Neutral
            },
            data_available: true,
        },
        None => FiiDiiSentiment {
            fii: FlowValues::default(),
            dii: FlowValues::default(),
            sentiment: FlowSentiment::Neutral,
            data_available: false,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorTrend {
    StronglyBullish,
    Bullish,
    BullishIntraday,
    Neutral,
    Bearish,
    StronglyBearish,
}

impl SectorTrend {
    pub fn is_bullish(&self) -> bool {
        matches!(self, SectorTrend::Bullish | SectorTrend::StronglyBullish)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, SectorTrend::Bearish | SectorTrend::StronglyBearish)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub name: String,
    pub performance_today: f64,
    #[serde(default)]
    pub performance_week: f64,
    #[serde(default = "unit_strength")]
    pub relative_strength: f64,
    pub trend: SectorTrend,
}

fn unit_strength() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorMove {
    pub name: String,
    pub performance_today: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectorRotation {
    Defensive,
    Cyclical,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorAnalysis {
    pub top_sectors: Vec<SectorMove>,
    pub bottom_sectors: Vec<SectorMove>,
    pub key_sectors_strong: bool,
    /// Share of trending sectors that are bullish
    pub market_breadth: f64,
    pub breadth_interpretation: String,
    pub sector_rotation: SectorRotation,
    pub relative_to_index: String,
}

fn find<'a>(sectors: &'a [SectorPerformance], name: &str) -> Option<&'a SectorPerformance> {
    sectors.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

/// Breadth and rotation across sectors, relative to the index being traded.
///
/// Banking drives BANKNIFTY; Banking or IT drive NIFTY.
pub fn analyze_sectors(index: &str, sectors: &[SectorPerformance]) -> SectorAnalysis {
    let mut sorted: Vec<&SectorPerformance> = sectors.iter().collect();
    sorted.sort_by(|a, b| {
        b.performance_today
            .total_cmp(&a.performance_today)
            .then_with(|| a.name.cmp(&b.name))
    });
    let to_move = |s: &&SectorPerformance| SectorMove {
        name: s.name.clone(),
        performance_today: s.performance_today,
    };
    let top_sectors: Vec<SectorMove> = sorted.iter().take(3).map(to_move).collect();
    let bottom_sectors: Vec<SectorMove> = sorted.iter().skip(sorted.len().saturating_sub(3)).map(to_move).collect();

    let strong = |name: &str| find(sectors, name).map(|s| s.trend.is_bullish()).unwrap_or(false);
    let key_sectors_strong = if index.eq_ignore_ascii_case("BANKNIFTY") {
        strong("Banking")
    } else {
        strong("Banking") || strong("IT")
    };

    let bullish = sectors.iter().filter(|s| s.trend.is_bullish()).count();
    let bearish = sectors.iter().filter(|s| s.trend.is_bearish()).count();
    let market_breadth = if bullish + bearish > 0 {
        bullish as f64 / (bullish + bearish) as f64
    } else {
        0.5
    };
    let breadth_interpretation = if market_breadth > 0.6 {
        "Positive"
    } else if market_breadth < 0.4 {
        "Negative"
    } else {
        "Neutral"
    };

    let sector_rotation = match (find(sectors, "Pharma"), find(sectors, "Metal")) {
        (Some(pharma), Some(metal)) if pharma.performance_today > metal.performance_today => SectorRotation::Defensive,
        (Some(_), Some(_)) => SectorRotation::Cyclical,
        _ => SectorRotation::Unknown,
    };

    SectorAnalysis {
        top_sectors,
        bottom_sectors,
        key_sectors_strong,
        market_breadth,
        breadth_interpretation: breadth_interpretation.to_string(),
        sector_rotation,
        relative_to_index: if market_breadth > 0.5 { "Outperforming" } else { "Underperforming" }.to_string(),
    }
}

/// Inputs the engine cannot derive from candles or the option chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    /// Evaluation time; drives the psychology guardrails and stamps the signal
    pub evaluated_at: DateTime<Utc>,
    #[serde(default)]
    pub pre_market: Option<PreMarketSentiment>,
    #[serde(default)]
    pub fii_dii: Option<FiiDiiFlows>,
    #[serde(default)]
    pub sectors: Vec<SectorPerformance>,
}

impl MarketContext {
    pub fn at(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            pre_market: None,
            fii_dii: None,
            sectors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(name: &str, today: f64, trend: SectorTrend) -> SectorPerformance {
        SectorPerformance {
            name: name.to_string(),
            performance_today: today,
            performance_week: 0.0,
            relative_strength: 1.0,
            trend,
        }
    }

    fn sample() -> Vec<SectorPerformance> {
        vec![
            sector("IT", 1.2, SectorTrend::BullishIntraday),
            sector("Banking", 0.7, SectorTrend::Bullish),
            sector("Pharma", -0.3, SectorTrend::Neutral),
            sector("Auto", 1.5, SectorTrend::StronglyBullish),
            sector("Metal", -1.2, SectorTrend::Bearish),
            sector("Energy", 0.5, SectorTrend::Neutral),
        ]
    }

    #[test]
    fn test_sector_breadth_and_rotation() {
        let analysis = analyze_sectors("NIFTY", &sample());
        assert!((analysis.market_breadth - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(analysis.breadth_interpretation, "Positive");
        assert_eq!(analysis.sector_rotation, SectorRotation::Defensive);
        assert!(analysis.key_sectors_strong);
        assert_eq!(analysis.top_sectors[0].name, "Auto");
        assert_eq!(analysis.bottom_sectors.last().map(|s| s.name.as_str()), Some("Metal"));
        assert_eq!(analysis.relative_to_index, "Outperforming");
    }

    #[test]
    fn test_empty_sectors_are_neutral() {
        let analysis = analyze_sectors("BANKNIFTY", &[]);
        assert_eq!(analysis.market_breadth, 0.5);
        assert_eq!(analysis.breadth_interpretation, "Neutral");
        assert_eq!(analysis.sector_rotation, SectorRotation::Unknown);
        assert!(!analysis.key_sectors_strong);
        assert!(analysis.top_sectors.is_empty());
    }

    #[test]
    fn test_fii_flow_sentiment() {
        let flows = FiiDiiFlows {
            fii: FlowValues {
                buy_value: 9_000.0,
                sell_value: 10_500.0,
                net_value: -1_500.0,
            },
            dii: FlowValues {
                buy_value: 8_000.0,
                sell_value: 6_000.0,
                net_value: 2_000.0,
            },
        };
        assert_eq!(classify_fii_dii(Some(&flows)).sentiment, FlowSentiment::Bearish);
        let missing = classify_fii_dii(None);
        assert_eq!(missing.sentiment, FlowSentiment::Neutral);
        assert!(!missing.data_available);
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let json = r#"{"evaluated_at": "2024-01-17T04:00:00Z", "sectors": [{"name": "IT", "performance_today": 1.0, "trend": "bullish"}]}"#;
        let context: MarketContext = serde_json::from_str(json).unwrap();
        assert!(context.pre_market.is_none());
        assert_eq!(context.sectors[0].relative_strength, 1.0);
    }
}
