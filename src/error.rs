use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the event-driven core.
///
/// Numerical degeneracy (an order-2 polynomial that is arithmetically
/// order 1) and the absence of any admissible event are *not* errors; they
/// are handled locally by order reduction and the infinite-time sentinel.
/// The variants here are either API misuse or fatal internal faults that
/// must stop the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Closed-form root extraction requested for an order with no closed form.
    #[error("no closed-form root solver for polynomial order {0}")]
    UnsupportedOrder(usize),

    /// Internal consistency fault: a missing or dangling calendar record,
    /// or an event popped out of chronological order. Continuing would
    /// silently corrupt causal order, so the driver stops.
    #[error("calendar invariant violated: {0}")]
    InvariantViolation(String),

    /// A participant's position or velocity became NaN/infinite after an
    /// event's effect was applied. Carries enough context to identify the
    /// offending event.
    #[error("non-finite state after event at t={time} ({kind}), participants {participants:?}")]
    NonFiniteState {
        time: f64,
        kind: String,
        participants: Vec<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::InvalidParam("radius must be > 0".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("radius"));
    }

    #[test]
    fn non_finite_error_names_the_event() {
        let e = Error::NonFiniteState {
            time: 1.25,
            kind: "pair(3,7)".to_string(),
            participants: vec![3, 7],
        };
        let msg = format!("{e}");
        assert!(msg.contains("1.25"));
        assert!(msg.contains("pair(3,7)"));
    }
}
