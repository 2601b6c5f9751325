// SPDX-License-Identifier: MIT

use super::*;

fn test_config() -> BreakerConfig {
    BreakerConfig {
        error_threshold: 50,
        volume_threshold: 4,
        window_size: 10,
        timeout: None,
        reset_timeout: Duration::from_millis(500),
    }
}

async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<std::io::Error>> {
    breaker.call(async { Err::<(), _>(std::io::Error::other("boom")) }).await.map(|_| ())
}

async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<std::io::Error>> {
    breaker.call(async { Ok::<_, std::io::Error>(()) }).await
}

#[tokio::test(start_paused = true)]
async fn stays_closed_below_volume_threshold() {
    let breaker = CircuitBreaker::new(test_config());
    for _ in 0..3 {
        let _ = fail(&breaker).await;
    }
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn opens_at_failure_ratio_and_rejects() {
    let breaker = CircuitBreaker::new(test_config());
    for _ in 0..4 {
        let _ = fail(&breaker).await;
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    // Rejected immediately without running the work
    let result = succeed(&breaker).await;
    assert!(matches!(result, Err(BreakerError::Open)));
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_below_threshold_stay_closed() {
    let breaker = CircuitBreaker::new(test_config());
    // 1 failure out of 4 = 25% < 50%
    let _ = fail(&breaker).await;
    for _ in 0..3 {
        succeed(&breaker).await.unwrap();
    }
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn half_open_trial_closes_on_success() {
    let breaker = CircuitBreaker::new(test_config());
    for _ in 0..4 {
        let _ = fail(&breaker).await;
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state(), BreakerState::Closed);

    // The window was cleared; earlier failures no longer count
    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn half_open_trial_reopens_on_failure() {
    let breaker = CircuitBreaker::new(test_config());
    for _ in 0..4 {
        let _ = fail(&breaker).await;
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    let _ = fail(&breaker).await;
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_failure() {
    let config = BreakerConfig {
        timeout: Some(Duration::from_millis(10)),
        ..test_config()
    };
    let breaker = CircuitBreaker::new(config);

    for _ in 0..4 {
        let result: Result<(), BreakerError<std::io::Error>> = breaker
            .call(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Timeout)));
    }
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_exactly_one_trial() {
    let breaker = std::sync::Arc::new(CircuitBreaker::new(test_config()));
    for _ in 0..4 {
        let _ = fail(&breaker).await;
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    // First caller becomes the half-open trial and holds it in flight
    let trial = {
        let breaker = std::sync::Arc::clone(&breaker);
        tokio::spawn(async move {
            breaker
                .call(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, std::io::Error>(())
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    // A second caller during the trial is rejected, not run
    assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));

    trial.await.unwrap().unwrap();
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn observer_sees_lifecycle_events() {
    let (breaker, mut events) = CircuitBreaker::with_observer(test_config());
    for _ in 0..4 {
        let _ = fail(&breaker).await;
    }
    let _ = succeed(&breaker).await; // rejected
    tokio::time::sleep(Duration::from_millis(600)).await;
    succeed(&breaker).await.unwrap(); // half-open trial -> close

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&BreakerEvent::Failure));
    assert!(seen.contains(&BreakerEvent::Open));
    assert!(seen.contains(&BreakerEvent::Reject));
    assert!(seen.contains(&BreakerEvent::HalfOpen));
    assert!(seen.contains(&BreakerEvent::Close));
}
