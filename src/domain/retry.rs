use crate::{constants::MAX_FETCH_ATTEMPTS, errors::FetchError};

/// Classification of a single metadata request.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    Retryable(FetchError),
    Fatal(FetchError),
}

impl<T> AttemptOutcome<T> {
    /// Sorts a raw attempt result into the three outcome kinds.
    pub fn classify(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(e) if is_retryable(&e) => AttemptOutcome::Retryable(e),
            Err(e) => AttemptOutcome::Fatal(e),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

pub fn is_retryable(error: &FetchError) -> bool {
    matches!(error, FetchError::Timeout | FetchError::Status(_))
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: MAX_FETCH_ATTEMPTS }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based: the number of requests already made.
    pub fn decide(&self, attempt: u32, error: &FetchError) -> RetryDecision {
        if is_retryable(error) && attempt < self.max_attempts {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Runs `attempt_fn` until it succeeds, fails fatally, or the attempt
    /// budget is spent. There is no delay between attempts.
    pub async fn run<T, F, Fut>(&self, mut attempt_fn: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match AttemptOutcome::classify(attempt_fn(attempt).await) {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::Fatal(e) => return Err(e),
                AttemptOutcome::Retryable(e) => match self.decide(attempt, &e) {
                    RetryDecision::Retry => {
                        tracing::info!(
                            target: "bing::feed",
                            attempt,
                            remaining = self.max_attempts - attempt,
                            "Retrying feed request: {}", e
                        );
                    }
                    RetryDecision::GiveUp => {
                        return Err(FetchError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                },
            }
        }
    }
}
