//! # Terminal Meter
//!
//! Text rendition of the tuner face: a row of open strings with the matched
//! one highlighted, and a needle bar centred on "in tune".
//!
//! ```text
//!  E2 [A2] D3  G3  B3  E4    109.59 Hz  -0.06 st  |-------------------^--------------------|
//! ```

use strum_core::{IndicatorState, NoteBuckets};

/// Characters on each side of the centre mark.
const HALF_WIDTH: usize = 20;

/// Renders one indicator state as a single line.
pub fn render(state: &IndicatorState, buckets: &NoteBuckets) -> String {
    let lit = match state {
        IndicatorState::OnString { bucket, .. } => Some(*bucket),
        IndicatorState::Neutral { .. } => None,
    };

    let strings: String = buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            if Some(i) == lit {
                format!("[{}]", bucket.name)
            } else {
                format!(" {} ", bucket.name)
            }
        })
        .collect();

    match state {
        IndicatorState::OnString {
            frequency,
            deviation,
            needle,
            ..
        } => format!(
            "{}  {:>8.2} Hz  {:>+6.2} st  {}",
            strings,
            frequency,
            deviation,
            needle_bar(Some(*needle))
        ),
        IndicatorState::Neutral {
            frequency: Some(frequency),
        } => format!(
            "{}  {:>8.2} Hz  {:>9}  {}",
            strings,
            frequency,
            "--",
            needle_bar(None)
        ),
        IndicatorState::Neutral { frequency: None } => {
            format!("{}  {:>11}  {:>9}  {}", strings, "--", "--", needle_bar(None))
        }
    }
}

/// Draws the needle bar; `None` leaves the bar empty.
fn needle_bar(needle: Option<f32>) -> String {
    let width = 2 * HALF_WIDTH + 1;
    let position = needle.map(|n| {
        let offset = (n.clamp(-1.0, 1.0) * HALF_WIDTH as f32).round() as i32;
        (HALF_WIDTH as i32 + offset) as usize
    });

    let bar: String = (0..width)
        .map(|i| match position {
            Some(p) if p == i => '^',
            _ if i == HALF_WIDTH => '+',
            _ => '-',
        })
        .collect();

    format!("|{}|", bar)
}
