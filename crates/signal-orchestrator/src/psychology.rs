//! Time-of-day and day-of-week trading guardrails.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychologyConfig {
    /// Exchange offset from UTC in seconds (IST = +5:30)
    pub session_utc_offset_secs: i32,
    pub opening_hour: u32,
    pub closing_hour: u32,
    /// Midday lull covers [start, end)
    pub midday_start_hour: u32,
    pub midday_end_hour: u32,
    pub max_trades_midweek: u32,
    pub max_trades_other: u32,
    pub off_day_risk_adjustment: f64,
}

impl Default for PsychologyConfig {
    fn default() -> Self {
        Self {
            session_utc_offset_secs: 19_800,
            opening_hour: 9,
            closing_hour: 14,
            midday_start_hour: 11,
            midday_end_hour: 13,
            max_trades_midweek: 5,
            max_trades_other: 3,
            off_day_risk_adjustment: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    OpeningHour,
    ClosingHour,
    MiddayLull,
    RegularSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayContext {
    Monday,
    Friday,
    Midweek,
    Weekend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeReadiness {
    Ready,
    Caution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAssessment {
    pub phase: SessionPhase,
    pub risk_level: RiskLevel,
    pub guidance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAssessment {
    pub context: DayContext,
    pub risk_level: RiskLevel,
    pub guidance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychologyCheck {
    pub session: SessionAssessment,
    pub day: DayAssessment,
    pub psychological_checks: Vec<String>,
    pub behavioral_nudges: Vec<String>,
    pub trade_readiness: TradeReadiness,
    pub max_trades_today: u32,
    /// Multiplier applied to position size
    pub risk_adjustment: f64,
}

fn session_phase(hour: u32, config: &PsychologyConfig) -> (SessionPhase, RiskLevel, &'static str) {
    if hour == config.opening_hour {
        (
            SessionPhase::OpeningHour,
            RiskLevel::Moderate,
            "High volatility during market open, confirm signals before trading",
        )
    } else if hour == config.closing_hour {
        (
            SessionPhase::ClosingHour,
            RiskLevel::Moderate,
            "Position squaring may create volatility, be cautious with new entries",
        )
    } else if (config.midday_start_hour..config.midday_end_hour).contains(&hour) {
        (
            SessionPhase::MiddayLull,
            RiskLevel::Low,
            "Typically lower volume and momentum, scalp trades may underperform",
        )
    } else {
        (SessionPhase::RegularSession, RiskLevel::Normal, "Standard trading conditions")
    }
}

fn day_context(weekday: Weekday) -> (DayContext, RiskLevel, &'static str) {
    match weekday {
        Weekday::Mon => (
            DayContext::Monday,
            RiskLevel::Moderate,
            "Weekly positioning often occurs, may see directional bias",
        ),
        Weekday::Fri => (
            DayContext::Friday,
            RiskLevel::Moderate,
            "Risk of weekend gap, consider reducing position sizes for swing trades",
        ),
        Weekday::Sat | Weekday::Sun => (DayContext::Weekend, RiskLevel::High, "Exchange closed, no new entries"),
        _ => (
            DayContext::Midweek,
            RiskLevel::Normal,
            "Typical trading conditions, follow standard risk management",
        ),
    }
}

/// Guardrails for the exchange-local time corresponding to `at`.
pub fn check_psychology(at: DateTime<Utc>, config: &PsychologyConfig) -> PsychologyCheck {
    let local = match FixedOffset::east_opt(config.session_utc_offset_secs) {
        Some(offset) => at.with_timezone(&offset).naive_local(),
        None => at.naive_utc(),
    };

    let (phase, session_risk, session_note) = session_phase(local.hour(), config);
    let (day, day_risk, day_note) = day_context(local.weekday());
    let midweek = day == DayContext::Midweek;
    let max_trades_today = if midweek {
        config.max_trades_midweek
    } else {
        config.max_trades_other
    };

    let trade_readiness = if session_risk == RiskLevel::High || day_risk == RiskLevel::High {
        TradeReadiness::Caution
    } else {
        TradeReadiness::Ready
    };

    PsychologyCheck {
        session: SessionAssessment {
            phase,
            risk_level: session_risk,
            guidance: session_note.to_string(),
        },
        day: DayAssessment {
            context: day,
            risk_level: day_risk,
            guidance: day_note.to_string(),
        },
        psychological_checks: vec![
            "Validate trade with multiple timeframes before entry".to_string(),
            "Stick to predefined stop loss - no adjustments after entry".to_string(),
            "Clear profit targets set before trade execution".to_string(),
            "Are you trading out of FOMO or solid analysis?".to_string(),
        ],
        behavioral_nudges: vec![
            "Follow your trading plan, not your emotions".to_string(),
            "Consistency matters more than occasional big wins".to_string(),
            format!("Maximum {} trades per day to avoid overtrading", max_trades_today),
            "Take a break after 2 consecutive losses".to_string(),
        ],
        trade_readiness,
        max_trades_today,
        risk_adjustment: if midweek { 1.0 } else { config.off_day_risk_adjustment },
    }
}
