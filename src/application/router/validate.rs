use rust_decimal::Decimal;

use crate::domain::errors::ValidationFailure;
use crate::domain::trading::{Direction, Signal};

/// Structural and directional validation of a normalized signal. Errors here
/// go straight to the dead-letter path, acked, never retried.
pub fn validate_signal(signal: &Signal) -> Result<(), ValidationFailure> {
    if signal.scrip_code.is_empty() {
        return Err(ValidationFailure::MissingField { field: "scripCode" });
    }
    if signal.entry_hint <= Decimal::ZERO {
        return Err(ValidationFailure::NonPositiveEntryHint {
            value: signal.entry_hint.to_string(),
        });
    }
    if signal.stop_loss_hint <= Decimal::ZERO {
        return Err(ValidationFailure::NonPositiveStopLoss {
            value: signal.stop_loss_hint.to_string(),
        });
    }
    let Some(first_target) = signal.targets.first().copied() else {
        return Err(ValidationFailure::NoTargets);
    };
    if signal.targets.iter().any(|t| *t <= Decimal::ZERO) {
        return Err(ValidationFailure::NoTargets);
    }

    match signal.direction {
        Direction::Long => {
            if signal.stop_loss_hint >= signal.entry_hint {
                return Err(ValidationFailure::DirectionInconsistentStop { direction: "LONG".into() });
            }
            if first_target <= signal.entry_hint {
                return Err(ValidationFailure::DirectionInconsistentTarget { direction: "LONG".into() });
            }
            if !is_monotonic(&signal.targets, true) {
                return Err(ValidationFailure::TargetsNotMonotonic);
            }
        }
        Direction::Short => {
            if signal.stop_loss_hint <= signal.entry_hint {
                return Err(ValidationFailure::DirectionInconsistentStop { direction: "SHORT".into() });
            }
            if first_target >= signal.entry_hint {
                return Err(ValidationFailure::DirectionInconsistentTarget { direction: "SHORT".into() });
            }
            if !is_monotonic(&signal.targets, false) {
                return Err(ValidationFailure::TargetsNotMonotonic);
            }
        }
    }

    const MAX_PLAUSIBLE_PRICE: i64 = 10_000_000;
    if signal.entry_hint > Decimal::from(MAX_PLAUSIBLE_PRICE) {
        return Err(ValidationFailure::ImplausibleEntryHint {
            value: signal.entry_hint.to_string(),
        });
    }

    Ok(())
}

fn is_monotonic(targets: &[Decimal], ascending: bool) -> bool {
    targets.windows(2).all(|w| if ascending { w[0] < w[1] } else { w[0] > w[1] })
}
