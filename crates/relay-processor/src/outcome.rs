/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Pure classification of one [`SendOutcome`] into a
//! [`DeliveryDecision`]. No suspension points: the Queue Processor
//! calls this synchronously between the HTTP Sender and the
//! queue/dead-letter write.

use relay_sender::SendOutcome;

/// What the Queue Processor should do with a delivery after one send
/// attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryDecision {
    /// Terminal success.
    Complete,
    /// Transient failure; schedule a retry via the Retry Scheduler.
    Retry,
    /// Terminal failure; promote to the dead-letter store with this reason.
    Dead(&'static str),
}

/// Status codes treated as retriable even though they are in
/// the 4xx range: request timeout, too-early, and rate-limited.
const RETRIABLE_4XX: [u16; 3] = [408, 425, 429];

/// Classifies `outcome` given the attempt count *after* this attempt
/// was recorded and the delivery's configured `max_attempts`.
pub fn classify_outcome(outcome: &SendOutcome, attempts_after: i32, max_attempts: i32) -> DeliveryDecision {
    if outcome.success {
        return DeliveryDecision::Complete;
    }

    let retriable = match outcome.status_code {
        None => true, // transport error: timeout, connect refused, etc.
        Some(status) => RETRIABLE_4XX.contains(&status) || (500..600).contains(&status),
    };

    if !retriable {
        return DeliveryDecision::Dead("non-retriable client error");
    }

    if attempts_after >= max_attempts {
        return DeliveryDecision::Dead("max attempts exceeded");
    }

    DeliveryDecision::Retry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool, status_code: Option<u16>) -> SendOutcome {
        SendOutcome { success, status_code, error: None, response_time_ms: 5 }
    }

    #[test]
    fn success_is_always_complete_regardless_of_attempts() {
        let decision = classify_outcome(&outcome(true, Some(200)), 1, 3);
        assert_eq!(decision, DeliveryDecision::Complete);
    }

    #[test]
    fn non_retriable_4xx_goes_dead_immediately() {
        let decision = classify_outcome(&outcome(false, Some(404)), 1, 3);
        assert_eq!(decision, DeliveryDecision::Dead("non-retriable client error"));
    }

    #[test]
    fn rate_limited_429_is_retriable() {
        let decision = classify_outcome(&outcome(false, Some(429)), 1, 3);
        assert_eq!(decision, DeliveryDecision::Retry);
    }

    #[test]
    fn server_error_is_retriable_below_max_attempts() {
        let decision = classify_outcome(&outcome(false, Some(503)), 1, 3);
        assert_eq!(decision, DeliveryDecision::Retry);
    }

    #[test]
    fn transport_error_is_retriable_below_max_attempts() {
        let decision = classify_outcome(&outcome(false, None), 1, 3);
        assert_eq!(decision, DeliveryDecision::Retry);
    }

    #[test]
    fn non_retriable_4xx_keeps_its_reason_even_at_max_attempts() {
        let decision = classify_outcome(&outcome(false, Some(404)), 3, 3);
        assert_eq!(decision, DeliveryDecision::Dead("non-retriable client error"));
    }

    #[test]
    fn exhausting_max_attempts_goes_dead_even_for_retriable_status() {
        let decision = classify_outcome(&outcome(false, Some(503)), 3, 3);
        assert_eq!(decision, DeliveryDecision::Dead("max attempts exceeded"));
    }
}
