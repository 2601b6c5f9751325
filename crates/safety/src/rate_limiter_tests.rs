// SPDX-License-Identifier: MIT

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test(start_paused = true)]
async fn grants_up_to_capacity_immediately() {
    let limiter = RateLimiter::with_window(3, Duration::from_secs(60));
    for _ in 0..3 {
        limiter.acquire().await.unwrap();
    }
    assert_eq!(limiter.available(), 0);
}

#[tokio::test(start_paused = true)]
async fn queues_excess_until_refill() {
    let limiter = RateLimiter::with_window(2, Duration::from_secs(60));
    let ran = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let limiter = limiter.clone();
        let ran = Arc::clone(&ran);
        handles.push(tokio::spawn(async move {
            limiter
                .run(async {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }));
    }

    // First window: exactly capacity operations run
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ran.load(Ordering::SeqCst), 2);

    // Next window releases two more
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(ran.load(Ordering::SeqCst), 4);

    // And the last one the window after
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(ran.load(Ordering::SeqCst), 5);

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn refill_does_not_accumulate_beyond_capacity() {
    let limiter = RateLimiter::with_window(2, Duration::from_secs(60));
    // Two idle windows pass with no acquires
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(limiter.available(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_fails_queued_waiters() {
    let limiter = RateLimiter::with_window(1, Duration::from_secs(60));
    limiter.acquire().await.unwrap();

    let waiter = {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    limiter.shutdown();
    assert_eq!(waiter.await.unwrap(), Err(RateLimitClosed));

    // New acquires fail immediately after shutdown
    assert_eq!(limiter.acquire().await, Err(RateLimitClosed));
}
