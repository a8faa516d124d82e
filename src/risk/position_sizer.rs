use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Dollar value of one pip on one standard lot.
const FOREX_PIP_VALUE: Decimal = dec!(10);

/// Breakdown text for rejected input.
pub const INVALID_BREAKDOWN: &str = "Invalid input data";

/// Instrument family as sent by the trade-entry client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Forex,
    Futures,
    Crypto,
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentType::Forex => write!(f, "forex"),
            InstrumentType::Futures => write!(f, "futures"),
            InstrumentType::Crypto => write!(f, "crypto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// A stop below entry protects a long; above entry, a short.
    fn from_stop(entry: Decimal, stop: Decimal) -> Self {
        if stop < entry {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    /// Signed price move in the trade's favour.
    fn favourable(&self, entry: Decimal, exit: Decimal) -> Decimal {
        match self {
            Direction::Long => exit - entry,
            Direction::Short => entry - exit,
        }
    }
}

/// Futures contract specs keyed by symbol root: (root, tick size, tick value).
const FUTURES_CONTRACTS: &[(&str, Decimal, Decimal)] = &[
    ("MES", dec!(0.25), dec!(1.25)),
    ("MNQ", dec!(0.25), dec!(0.50)),
    ("RTY", dec!(0.10), dec!(5.00)),
    ("ES", dec!(0.25), dec!(12.50)),
    ("NQ", dec!(0.25), dec!(5.00)),
    ("YM", dec!(1), dec!(5.00)),
    ("CL", dec!(0.01), dec!(10.00)),
    ("GC", dec!(0.10), dec!(10.00)),
    ("SI", dec!(0.005), dec!(25.00)),
];

const DEFAULT_TICK_SIZE: Decimal = dec!(0.25);
const DEFAULT_TICK_VALUE: Decimal = dec!(12.50);

/// Resolved instrument with the unit conversion needed to turn a price
/// distance into money.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instrument {
    Forex { pip_size: Decimal },
    Futures { tick_size: Decimal, tick_value: Decimal },
    Crypto,
}

impl Instrument {
    pub fn resolve(kind: InstrumentType, symbol: &str) -> Self {
        let symbol = normalize_symbol(symbol);
        match kind {
            InstrumentType::Forex => {
                // JPY quotes and metals are priced to two decimals
                let two_decimal = symbol.ends_with("JPY")
                    || symbol.starts_with("XAU")
                    || symbol.starts_with("XAG");
                let pip_size = if two_decimal { dec!(0.01) } else { dec!(0.0001) };
                Instrument::Forex { pip_size }
            }
            InstrumentType::Futures => {
                let (tick_size, tick_value) = FUTURES_CONTRACTS
                    .iter()
                    .find(|(root, _, _)| matches_futures_root(&symbol, root))
                    .map(|(_, size, value)| (*size, *value))
                    .unwrap_or((DEFAULT_TICK_SIZE, DEFAULT_TICK_VALUE));
                Instrument::Futures { tick_size, tick_value }
            }
            InstrumentType::Crypto => Instrument::Crypto,
        }
    }

    /// Price distance expressed in this instrument's units (pips, ticks, or raw points).
    /// Sign is preserved. `None` when the distance does not fit in a `Decimal`.
    pub fn stop_units(&self, distance: Decimal) -> Option<Decimal> {
        match self {
            Instrument::Forex { pip_size } => distance.checked_div(*pip_size),
            Instrument::Futures { tick_size, .. } => distance.checked_div(*tick_size),
            Instrument::Crypto => Some(distance),
        }
    }

    /// Money per unit of distance per unit of position size.
    pub fn unit_value(&self) -> Decimal {
        match self {
            Instrument::Forex { .. } => FOREX_PIP_VALUE,
            Instrument::Futures { tick_value, .. } => *tick_value,
            Instrument::Crypto => Decimal::ONE,
        }
    }

    fn size_dp(&self) -> u32 {
        match self {
            Instrument::Forex { .. } => 2,
            Instrument::Futures { .. } => 0,
            Instrument::Crypto => 3,
        }
    }

    pub fn min_size(&self) -> Decimal {
        match self {
            Instrument::Forex { .. } => dec!(0.01),
            Instrument::Futures { .. } => Decimal::ONE,
            Instrument::Crypto => dec!(0.001),
        }
    }

    /// Truncate to the tradable step, never below the minimum size.
    fn normalize_size(&self, raw: Decimal) -> Decimal {
        raw.round_dp_with_strategy(self.size_dp(), RoundingStrategy::ToZero)
            .max(self.min_size())
    }

    fn unit_label(&self) -> &'static str {
        match self {
            Instrument::Forex { .. } => "pips",
            Instrument::Futures { .. } => "ticks",
            Instrument::Crypto => "points",
        }
    }

    fn size_label(&self) -> &'static str {
        match self {
            Instrument::Forex { .. } => "lots",
            Instrument::Futures { .. } => "contracts",
            Instrument::Crypto => "units",
        }
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .trim_start_matches('/')
        .split(['=', ' ', '.'])
        .next()
        .unwrap_or_default()
        .replace(['/', '_', '-'], "")
        .to_uppercase()
}

/// `ES`, `ESZ4` and `ESZ2024` all match root `ES`; `MES` does not.
fn matches_futures_root(symbol: &str, root: &str) -> bool {
    let Some(rest) = symbol.strip_prefix(root) else {
        return false;
    };
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(month) => {
            "FGHJKMNQUVXZ".contains(month) && chars.clone().count() > 0 && chars.all(|c| c.is_ascii_digit())
        }
    }
}

/// Position-sizing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCalculationInput {
    pub symbol: String,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub account_size: Decimal,
    pub risk_pct: Decimal,
    pub instrument_type: InstrumentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCalculationResult {
    pub position_size: Decimal,
    pub risk_amount: Decimal,
    pub potential_profit: Decimal,
    pub potential_loss: Decimal,
    /// Zero when the ratio is undefined (no target or no loss).
    pub risk_reward_ratio: Decimal,
    pub breakdown: String,
    pub is_valid: bool,
    pub direction: Option<Direction>,
}

impl RiskCalculationResult {
    pub fn invalid() -> Self {
        Self {
            position_size: Decimal::ZERO,
            risk_amount: Decimal::ZERO,
            potential_profit: Decimal::ZERO,
            potential_loss: Decimal::ZERO,
            risk_reward_ratio: Decimal::ZERO,
            breakdown: INVALID_BREAKDOWN.to_string(),
            is_valid: false,
            direction: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
enum SizingError {
    #[error("entry price must be positive, got {0}")]
    NonPositiveEntry(Decimal),

    #[error("account size must be positive, got {0}")]
    NonPositiveAccount(Decimal),

    #[error("risk percentage must be in (0, 100], got {0}")]
    RiskPctOutOfRange(Decimal),

    #[error("stop loss is required for sizing")]
    MissingStop,

    #[error("price levels must be positive")]
    NonPositiveLevel,

    #[error("stop loss equals entry price")]
    ZeroStopDistance,
}

fn validate(input: &RiskCalculationInput) -> Result<Decimal, SizingError> {
    if input.entry_price <= Decimal::ZERO {
        return Err(SizingError::NonPositiveEntry(input.entry_price));
    }
    if input.account_size <= Decimal::ZERO {
        return Err(SizingError::NonPositiveAccount(input.account_size));
    }
    if input.risk_pct <= Decimal::ZERO || input.risk_pct > Decimal::ONE_HUNDRED {
        return Err(SizingError::RiskPctOutOfRange(input.risk_pct));
    }
    let stop = input.stop_loss.ok_or(SizingError::MissingStop)?;
    if stop <= Decimal::ZERO || input.take_profit.is_some_and(|tp| tp <= Decimal::ZERO) {
        return Err(SizingError::NonPositiveLevel);
    }
    if stop == input.entry_price {
        return Err(SizingError::ZeroStopDistance);
    }
    Ok(stop)
}

/// Convert entry/stop/target into a position size and expected profit/loss.
///
/// Never fails: malformed input yields [`RiskCalculationResult::invalid`].
pub fn compute(input: &RiskCalculationInput) -> RiskCalculationResult {
    let stop = match validate(input) {
        Ok(stop) => stop,
        Err(e) => {
            tracing::debug!(symbol = %input.symbol, error = %e, "Rejected position-sizing input");
            return RiskCalculationResult::invalid();
        }
    };

    match size_position(input, stop) {
        Some(result) => result,
        None => {
            tracing::debug!(symbol = %input.symbol, "Position-sizing figures out of range");
            RiskCalculationResult::invalid()
        }
    }
}

/// Sizing arithmetic for validated input. `None` when an intermediate figure
/// overflows or the stop distance rounds away to nothing.
fn size_position(input: &RiskCalculationInput, stop: Decimal) -> Option<RiskCalculationResult> {
    let instrument = Instrument::resolve(input.instrument_type, &input.symbol);
    let entry = input.entry_price;
    let direction = Direction::from_stop(entry, stop);
    let unit_value = instrument.unit_value();

    let risk_amount = input
        .account_size
        .checked_mul(input.risk_pct)?
        .checked_div(Decimal::ONE_HUNDRED)?;
    // Both prices are positive, so the difference cannot overflow
    let stop_units = instrument.stop_units((entry - stop).abs())?;
    let risk_per_size = stop_units.checked_mul(unit_value)?;
    if risk_per_size <= Decimal::ZERO {
        return None;
    }

    let position_size = instrument.normalize_size(risk_amount.checked_div(risk_per_size)?);
    let potential_loss = position_size.checked_mul(risk_per_size)?.round_dp(2);

    let target_units = match input.take_profit {
        Some(tp) => Some(instrument.stop_units(direction.favourable(entry, tp))?),
        None => None,
    };
    let potential_profit = match target_units {
        Some(units) => position_size.checked_mul(units)?.checked_mul(unit_value)?.round_dp(2),
        None => Decimal::ZERO,
    };

    let risk_reward_ratio = if potential_loss.is_zero() {
        Decimal::ZERO
    } else {
        potential_profit.checked_div(potential_loss)?.round_dp(2)
    };

    let mut breakdown = format!(
        "Risk: ${} ({}% of ${}) | Stop: {} {} x ${} | Size: {} {}",
        risk_amount.round_dp(2),
        input.risk_pct.normalize(),
        input.account_size.round_dp(2),
        stop_units.round_dp(1).normalize(),
        instrument.unit_label(),
        unit_value.normalize(),
        position_size,
        instrument.size_label(),
    );
    match target_units {
        Some(units) => breakdown.push_str(&format!(
            " | Target: {} {} -> ${} | R:R 1:{}",
            units.round_dp(1).normalize(),
            instrument.unit_label(),
            potential_profit,
            risk_reward_ratio,
        )),
        None => breakdown.push_str(" | No target: R:R undefined"),
    }

    Some(RiskCalculationResult {
        position_size,
        risk_amount: risk_amount.round_dp(2),
        potential_profit,
        potential_loss,
        risk_reward_ratio,
        breakdown,
        is_valid: true,
        direction: Some(direction),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
