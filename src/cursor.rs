use serde_json::Value;

/// Position of the last consumed event, as declared by the bridge.
///
/// The value only ever comes from a successful pull's `last` field; it is never
/// incremented locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventCursor {
    value: u64,
}

impl EventCursor {
    pub fn new(baseline: u64) -> Self {
        Self { value: baseline }
    }

    pub fn current(&self) -> u64 {
        self.value
    }

    /// Adopt a server-declared value. `None` leaves the cursor untouched.
    pub fn advance(&mut self, next: Option<u64>) {
        if let Some(v) = next {
            if v < self.value {
                tracing::warn!(from = self.value, to = v, "bridge cursor moved backwards");
            }
            self.value = v;
        }
    }
}

/// Read a cursor out of a raw `last` field: non-negative integers only.
pub fn cursor_from_value(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    match v.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Some(f as u64)
        }
        _ => None,
    }
}
