//! Response selection for matched endpoints.
//!
//! Endpoints with several responses cycle through them in registration order,
//! wrapping around. The position lives in a per-endpoint [`ResponseCursor`]
//! that is advanced with a single atomic read-modify-write, so concurrent
//! requests each observe a distinct step of the sequence.

use crate::contract::ResponseSpec;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Position in an endpoint's response list.
#[derive(Default)]
pub struct ResponseCursor(AtomicUsize);

impl ResponseCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Index the next request would receive, without advancing.
    #[must_use]
    pub fn peek(&self, response_count: usize) -> usize {
        let index = self.0.load(Ordering::Acquire);
        index.min(response_count.saturating_sub(1))
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }

    /// Return the current index and move to the next one, modulo `response_count`.
    #[must_use]
    pub fn advance(&self, response_count: usize) -> usize {
        if response_count <= 1 {
            return 0;
        }

        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |index| {
                Some((index % response_count + 1) % response_count)
            })
            .map(|previous| previous % response_count)
            .unwrap_or_else(|previous| {
                debug_assert!(false, "we never return None from fetch_update");
                previous % response_count
            })
    }
}

impl fmt::Debug for ResponseCursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ResponseCursor")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}

/// The response chosen for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub response: ResponseSpec,
    /// Simulated latency to apply before writing the response.
    pub delay: Duration,
}

/// Pick the response for this request and advance the cursor.
///
/// Returns `None` only for an empty response list, which the validator keeps
/// out of the store.
pub fn select(responses: &[ResponseSpec], cursor: &ResponseCursor) -> Option<Selection> {
    let index = cursor.advance(responses.len());
    let response = responses.get(index)?.clone();
    let delay = Duration::from_millis(response.latency.unwrap_or(0));
    Some(Selection { response, delay })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn responses() -> Vec<ResponseSpec> {
        vec![
            ResponseSpec::new(200).with_body("a"),
            ResponseSpec::new(201).with_body("b"),
            ResponseSpec::new(202).with_body("c"),
        ]
    }

    #[test]
    fn test_single_response_always_returned() {
        let responses = vec![ResponseSpec::new(204).with_latency(15)];
        let cursor = ResponseCursor::new();
        for _ in 0..3 {
            let selection = select(&responses, &cursor).unwrap();
            assert_eq!(selection.response.status, 204);
            assert_eq!(selection.delay, Duration::from_millis(15));
        }
        assert_eq!(cursor.peek(1), 0);
    }

    #[test]
    fn test_cycles_in_order_and_wraps() {
        let responses = responses();
        let cursor = ResponseCursor::new();
        let statuses: Vec<i64> = (0..7)
            .map(|_| select(&responses, &cursor).unwrap().response.status)
            .collect();
        assert_eq!(statuses, vec![200, 201, 202, 200, 201, 202, 200]);
    }

    #[test]
    fn test_default_delay_is_zero() {
        let cursor = ResponseCursor::new();
        let selection = select(&[ResponseSpec::new(200)], &cursor).unwrap();
        assert_eq!(selection.delay, Duration::ZERO);
    }

    #[test]
    fn test_empty_list_selects_nothing() {
        assert!(select(&[], &ResponseCursor::new()).is_none());
    }

    #[test]
    fn test_peek_and_reset() {
        let cursor = ResponseCursor::new();
        assert_eq!(cursor.advance(3), 0);
        assert_eq!(cursor.advance(3), 1);
        assert_eq!(cursor.peek(3), 2);
        cursor.reset();
        assert_eq!(cursor.peek(3), 0);
    }

    #[test]
    fn test_concurrent_advances_do_not_duplicate() {
        let cursor = Arc::new(ResponseCursor::new());
        let count = 1000;
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cursor = Arc::clone(&cursor);
                std::thread::spawn(move || {
                    (0..count / 4)
                        .map(|_| cursor.advance(count))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let seen: HashSet<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(seen.len(), count);
    }
}
