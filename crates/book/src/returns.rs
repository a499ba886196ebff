//! Internal rate of return over dated cash flows.

use tally_core::Date;

const INITIAL_GUESS: f64 = 0.10;
const TOLERANCE: f64 = 1e-4;
const MAX_ITERATIONS: usize = 10_000;

/// Annual rate `r` at which the discounted cash flows sum to zero, found by
/// Newton's method. Time is measured in fractional years from the first date.
///
/// Returns `None` for empty or mismatched input, or when the iteration does
/// not settle.
pub fn calculate_irr(dates: &[Date], cashflows: &[f64]) -> Option<f64> {
    if dates.is_empty() || dates.len() != cashflows.len() {
        return None;
    }
    let start = dates[0].as_years();
    let years: Vec<f64> = dates.iter().map(|d| d.as_years() - start).collect();

    let mut rate = INITIAL_GUESS;
    for _ in 0..MAX_ITERATIONS {
        let mut value = 0.0;
        let mut slope = 0.0;
        for (&flow, &t) in cashflows.iter().zip(&years) {
            let discount = (1.0 + rate).powf(t);
            value += flow / discount;
            slope -= t * flow / (discount * (1.0 + rate));
        }
        if value.abs() < TOLERANCE {
            return Some(rate);
        }
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        let next = rate - value / slope;
        if !next.is_finite() {
            return None;
        }
        if (next - rate).abs() < TOLERANCE {
            return Some(next);
        }
        // Rates at or below -100% have no real discount factor.
        rate = next.max(-0.999_999_999);
    }
    tracing::debug!(iterations = MAX_ITERATIONS, "irr did not converge");
    None
}
