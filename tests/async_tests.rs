//! Parallel initial design tests.
//!
//! These tests are only compiled when the `async` feature is enabled.

#![cfg(feature = "async")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use smbo::prelude::*;

fn builder() -> BayesOptBuilder {
    BayesOpt::builder()
        .space(SearchSpace::unit(2).unwrap())
        .kernel("kSEARD")
        .learning("fixed")
        .n_init_samples(8)
        .n_iterations(3)
        .seed(6)
}

fn objective(x: &[f64]) -> core::result::Result<f64, Error> {
    Ok((x[0] - 0.2).powi(2) + (x[1] - 0.8).powi(2))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_design_matches_sequential_design() {
    let parallel = builder().build().unwrap();
    parallel.initialize_parallel(objective, 4).await.unwrap();

    let sequential = builder().build().unwrap();
    sequential.initialize(&objective).unwrap();

    assert_eq!(parallel.phase(), Phase::Iterating);
    assert_eq!(parallel.dataset(), sequential.dataset());
    assert_eq!(parallel.snapshot(), sequential.snapshot());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded() {
    struct Gauge {
        live: AtomicUsize,
        peak: AtomicUsize,
    }
    let gauge = Arc::new(Gauge {
        live: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let g = Arc::clone(&gauge);
    let f = move |x: &[f64]| {
        let now = g.live.fetch_add(1, Ordering::SeqCst) + 1;
        g.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        g.live.fetch_sub(1, Ordering::SeqCst);
        Ok::<_, Error>(x[0])
    };

    let opt = builder().build().unwrap();
    opt.initialize_parallel(f, 2).await.unwrap();
    assert_eq!(opt.dataset().len(), 8);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn the_loop_continues_after_a_parallel_design() {
    let opt = builder().build().unwrap();
    opt.initialize_parallel(objective, 3).await.unwrap();
    opt.run(&objective).unwrap();
    assert_eq!(opt.dataset().len(), 11);
    assert!(matches!(
        opt.initialize_parallel(objective, 3).await,
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let opt = builder().build().unwrap();
    assert!(matches!(
        opt.initialize_parallel(objective, 0).await,
        Err(Error::Configuration(_))
    ));
}

#[tokio::test]
async fn failures_follow_the_policy() {
    let opt = builder().failure_policy(FailurePolicy::Skip).build().unwrap();
    opt.initialize_parallel(|x: &[f64]| if x[0] < 0.5 { Ok(x[0]) } else { Err("out of range") }, 4)
        .await
        .unwrap();
    assert!(opt.dataset().len() < 8);
    assert!(
        opt.diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::ObjectiveSkipped { iteration: None, .. }))
    );
}
