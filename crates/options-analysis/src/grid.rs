//! Grid trading levels built from option-chain and technical price levels.

use serde::{Deserialize, Serialize};

pub const CURRENT_PRICE: &str = "Current Price";
pub const RANGE_GRID: &str = "Implied Range Grid";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub levels: usize,
    /// Candidates closer than this (percent of price) merge into one level
    pub cluster_tolerance_pct: f64,
    /// Strength added per extra candidate merged into a level
    pub confluence_bonus: f64,
    pub top_oi_strikes: usize,
    pub top_gamma_strikes: usize,
    pub oi_strength: f64,
    pub sigma_strength: f64,
    pub gamma_base_strength: f64,
    pub gamma_share_strength: f64,
    pub current_price_strength: f64,
    pub external_strength: f64,
    pub backfill_strength: f64,
    /// Back-fill span around spot when no implied range is available
    pub fallback_span_pct: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            levels: 5,
            cluster_tolerance_pct: 0.5,
            confluence_bonus: 0.1,
            top_oi_strikes: 3,
            top_gamma_strikes: 3,
            oi_strength: 0.7,
            sigma_strength: 0.6,
            gamma_base_strength: 0.5,
            gamma_share_strength: 0.4,
            current_price_strength: 0.5,
            external_strength: 0.6,
            backfill_strength: 0.3,
            fallback_span_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridAction {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: f64,
    pub action: GridAction,
    /// 0-1 after the sentiment adjustment
    pub strength: f64,
    pub allocation_pct: f64,
    pub deviation_pct: f64,
    pub sources: Vec<String>,
}

/// A raw price level before clustering
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCandidate {
    pub price: f64,
    pub strength: f64,
    pub sources: Vec<String>,
}

impl LevelCandidate {
    pub fn new(price: f64, strength: f64, source: impl Into<String>) -> Self {
        Self {
            price,
            strength,
            sources: vec![source.into()],
        }
    }

    fn is_current_price(&self) -> bool {
        self.sources.iter().any(|s| s == CURRENT_PRICE)
    }
}

/// Merge candidates lying within `tolerance_pct` of the running cluster.
///
/// Merged price is strength-weighted; strength is the strongest member plus a
/// confluence bonus per extra member, capped at 1.
pub fn cluster_candidates(mut candidates: Vec<LevelCandidate>, tolerance_pct: f64, bonus: f64) -> Vec<LevelCandidate> {
    candidates.retain(|c| c.price.is_finite() && c.price > 0.0 && c.strength.is_finite());
    candidates.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut clusters: Vec<(Vec<LevelCandidate>, f64)> = Vec::new();
    for candidate in candidates {
        match clusters.last_mut() {
            Some((members, anchor)) if (candidate.price - *anchor).abs() / *anchor * 100.0 <= tolerance_pct => {
                members.push(candidate);
            }
            _ => {
                let anchor = candidate.price;
                clusters.push((vec![candidate], anchor));
            }
        }
    }

    clusters
        .into_iter()
        .map(|(members, _)| {
            let price = if members.len() == 1 {
                members[0].price
            } else {
                let weight: f64 = members.iter().map(|m| m.strength.max(1e-9)).sum();
                members.iter().map(|m| m.price * m.strength.max(1e-9)).sum::<f64>() / weight
            };
            let strongest = members.iter().map(|m| m.strength).fold(0.0, f64::max);
            let strength = (strongest + bonus * (members.len() - 1) as f64).min(1.0);
            let mut sources: Vec<String> = Vec::new();
            for source in members.into_iter().flat_map(|m| m.sources) {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
            LevelCandidate { price, strength, sources }
        })
        .collect()
}

/// Pick the grid: strongest clusters first (the current-price level is always
/// kept), back-filled with evenly spaced levels across `backfill_range`.
pub fn build_grid(
    spot: f64,
    candidates: Vec<LevelCandidate>,
    backfill_range: Option<(f64, f64)>,
    sentiment_score: f64,
    config: &GridConfig,
) -> Vec<GridLevel> {
    let count = config.levels.max(1);
    let mut clusters = cluster_candidates(candidates, config.cluster_tolerance_pct, config.confluence_bonus);
    clusters.sort_by(|a, b| b.strength.total_cmp(&a.strength).then(a.price.total_cmp(&b.price)));

    let current = clusters.iter().position(|c| c.is_current_price());
    let mut selected: Vec<LevelCandidate> = clusters.iter().take(count).cloned().collect();
    if let Some(idx) = current {
        if idx >= count {
            selected.pop();
            selected.push(clusters[idx].clone());
        }
    }

    let (low, high) = backfill_range
        .filter(|(l, h)| l.is_finite() && h.is_finite() && h > l)
        .unwrap_or((
            spot * (1.0 - config.fallback_span_pct / 100.0),
            spot * (1.0 + config.fallback_span_pct / 100.0),
        ));
    let steps = count.max(2) - 1;
    for i in 0..=steps {
        if selected.len() >= count {
            break;
        }
        let price = low + (high - low) * i as f64 / steps as f64;
        let crowded = selected
            .iter()
            .any(|s| (s.price - price).abs() / s.price * 100.0 <= config.cluster_tolerance_pct);
        if !crowded {
            selected.push(LevelCandidate::new(price, config.backfill_strength, RANGE_GRID));
        }
    }

    selected.sort_by(|a, b| a.price.total_cmp(&b.price));

    let adjusted: Vec<(LevelCandidate, GridAction, f64)> = selected
        .into_iter()
        .map(|level| {
            let action = if level.is_current_price() || level.price == spot {
                GridAction::Neutral
            } else if level.price < spot {
                GridAction::Buy
            } else {
                GridAction::Sell
            };
            let multiplier = match action {
                GridAction::Buy => 1.0 + (50.0 - sentiment_score) / 100.0,
                GridAction::Sell => 1.0 + (sentiment_score - 50.0) / 100.0,
                GridAction::Neutral => 1.0,
            };
            let strength = (level.strength * multiplier).clamp(0.0, 1.0);
            (level, action, strength)
        })
        .collect();

    let total: f64 = adjusted.iter().map(|(_, _, s)| s).sum();
    adjusted
        .into_iter()
        .map(|(level, action, strength)| GridLevel {
            price: level.price,
            action,
            strength,
            allocation_pct: if total > 0.0 { strength / total * 100.0 } else { 0.0 },
            deviation_pct: (level.price - spot) / spot * 100.0,
            sources: level.sources,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_merges_nearby_levels() {
        let clusters = cluster_candidates(
            vec![
                LevelCandidate::new(100.0, 0.7, "a"),
                LevelCandidate::new(100.4, 0.7, "b"),
                LevelCandidate::new(105.0, 0.5, "c"),
            ],
            0.5,
            0.1,
        );
        assert_eq!(clusters.len(), 2);
        assert!((clusters[0].price - 100.2).abs() < 1e-9);
        assert!((clusters[0].strength - 0.8).abs() < 1e-9);
        assert_eq!(clusters[0].sources, vec!["a", "b"]);
    }

    #[test]
    fn test_grid_backfills_and_allocates() {
        let candidates = vec![
            LevelCandidate::new(100.0, 0.5, CURRENT_PRICE),
            LevelCandidate::new(95.0, 0.7, "Put OI Support"),
        ];
        let grid = build_grid(100.0, candidates, Some((90.0, 110.0)), 50.0, &GridConfig::default());
        assert_eq!(grid.len(), 5);
        let total: f64 = grid.iter().map(|g| g.allocation_pct).sum();
        assert!((total - 100.0).abs() < 1e-9);
        for pair in grid.windows(2) {
            assert!(pair[0].price < pair[1].price);
        }
        for level in &grid {
            match level.action {
                GridAction::Buy => assert!(level.price < 100.0),
                GridAction::Sell => assert!(level.price > 100.0),
                GridAction::Neutral => assert!(level.sources.iter().any(|s| s == CURRENT_PRICE)),
            }
        }
        assert!(grid.iter().any(|g| g.sources.iter().any(|s| s == RANGE_GRID)));
    }

    #[test]
    fn test_current_price_survives_selection() {
        let mut candidates: Vec<LevelCandidate> = (1..=6)
            .map(|i| LevelCandidate::new(100.0 + i as f64 * 3.0, 0.9, "Call OI Resistance"))
            .collect();
        candidates.push(LevelCandidate::new(100.0, 0.5, CURRENT_PRICE));
        let grid = build_grid(100.0, candidates, None, 50.0, &GridConfig::default());
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0].action, GridAction::Neutral);
    }

    #[test]
    fn test_bullish_sentiment_weakens_buy_levels() {
        let candidates = vec![
            LevelCandidate::new(95.0, 0.6, "Put OI Support"),
            LevelCandidate::new(105.0, 0.6, "Call OI Resistance"),
        ];
        let grid = build_grid(100.0, candidates, None, 80.0, &GridConfig::default());
        let buy = grid.iter().find(|g| (g.price - 95.0).abs() < 1e-9).unwrap();
        let sell = grid.iter().find(|g| (g.price - 105.0).abs() < 1e-9).unwrap();
        assert!((buy.strength - 0.42).abs() < 1e-9);
        assert!((sell.strength - 0.78).abs() < 1e-9);
    }
}
