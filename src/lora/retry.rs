//! Bounded retry with a wall-clock budget.

/// Outcome of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Succeeded on this attempt (1-based).
    Done { attempts: u32 },
    /// The time budget ran out before a success.
    TimedOut,
    /// The attempt budget ran out before a success.
    Exhausted,
}

impl Retry {
    pub fn is_done(&self) -> bool {
        matches!(self, Retry::Done { .. })
    }
}

/// Run `op` until it reports success, bounded both by `max_attempts`
/// and by a total pause budget of `timeout_ms`. Between attempts
/// `pause` is called with `step_ms`; elapsed time is accounted from
/// the pauses, so `op` itself must not block.
///
/// `target` is threaded through both closures so a caller can retry
/// an operation on a mutably borrowed device without capturing it
/// twice.
pub fn retry_with_timeout<T>(
    target: &mut T,
    max_attempts: u32,
    timeout_ms: u32,
    step_ms: u32,
    mut op: impl FnMut(&mut T) -> bool,
    mut pause: impl FnMut(&mut T, u32),
) -> Retry {
    let mut elapsed_ms: u32 = 0;
    for attempt in 1..=max_attempts {
        if op(target) {
            return Retry::Done { attempts: attempt };
        }
        if attempt == max_attempts {
            break;
        }
        if elapsed_ms >= timeout_ms {
            return Retry::TimedOut;
        }
        pause(target, step_ms);
        elapsed_ms = elapsed_ms.saturating_add(step_ms);
    }
    Retry::Exhausted
}
