use axum::Json;

use crate::risk::position_sizer::{self, RiskCalculationInput, RiskCalculationResult};

/// POST /api/risk/position-size
///
/// Always 200: rejected input comes back with `is_valid: false`.
pub async fn position_size(Json(input): Json<RiskCalculationInput>) -> Json<RiskCalculationResult> {
    let result = position_sizer::compute(&input);
    tracing::debug!(
        symbol = %input.symbol,
        instrument = %input.instrument_type,
        valid = result.is_valid,
        size = %result.position_size,
        "Position size calculated"
    );
    Json(result)
}
