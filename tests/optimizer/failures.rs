use core::cell::Cell;
use core::time::Duration;

use smbo::prelude::*;

/// Fails on every third call.
struct Flaky {
    calls: Cell<usize>,
}

impl Objective for Flaky {
    type Error = String;

    fn evaluate(&self, x: &[f64]) -> core::result::Result<f64, String> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if n % 3 == 0 {
            Err(format!("call {n} diverged"))
        } else {
            Ok((x[0] - 0.5).powi(2))
        }
    }
}

fn builder() -> BayesOptBuilder {
    BayesOpt::builder()
        .space(SearchSpace::unit(1).unwrap())
        .kernel("kSEISO")
        .learning("fixed")
        .n_init_samples(4)
        .n_iterations(6)
        .seed(12)
}

#[test]
fn penalized_failures_keep_the_run_going() {
    let opt = builder()
        .failure_policy(FailurePolicy::Penalize(Penalty::Constant(10.0)))
        .build()
        .unwrap();
    let f = Flaky { calls: Cell::new(0) };
    opt.run(&f).unwrap();
    assert_eq!(opt.phase(), Phase::BudgetExhausted);
    assert_eq!(opt.dataset().len(), 10);
    let penalized = opt
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::ObjectivePenalized { penalty, .. } if *penalty == 10.0))
        .count();
    assert_eq!(penalized, 3);
    assert_eq!(opt.dataset().samples().iter().filter(|s| s.y == 10.0).count(), 3);
}

#[test]
fn skipped_failures_leave_no_sample() {
    let opt = builder().failure_policy(FailurePolicy::Skip).build().unwrap();
    let f = Flaky { calls: Cell::new(0) };
    opt.run(&f).unwrap();
    assert_eq!(opt.iteration(), 6);
    assert_eq!(opt.dataset().len(), 7);
    assert!(opt.dataset().samples().iter().all(|s| s.y <= 0.25));
}

#[test]
fn a_fully_failing_design_is_an_error() {
    let opt = builder().failure_policy(FailurePolicy::Skip).build().unwrap();
    let broken = |_: &[f64]| Err::<f64, _>("no licence");
    assert!(matches!(opt.initialize(&broken), Err(Error::ObjectiveEvaluation(_))));
    assert_eq!(opt.phase(), Phase::Uninitialized);
}

#[test]
fn timeout_fails_only_the_iteration() {
    let opt = builder().build().unwrap();
    let f = |x: &[f64]| Ok::<_, Error>(x[0]);
    opt.initialize(&f).unwrap();
    let before = opt.snapshot();
    let err = opt.step_with_timeout(&f, Duration::ZERO).unwrap_err();
    assert!(matches!(err, Error::Timeout { limit } if limit == Duration::ZERO));
    assert_eq!(opt.snapshot(), before);
    opt.step(&f).unwrap();
    assert_eq!(opt.iteration(), 1);
}

#[test]
fn soft_time_budget_is_reported() {
    let opt = builder()
        .config(Config {
            inner_time_budget: Some(Duration::ZERO),
            ..Config::default()
        })
        .space(SearchSpace::unit(1).unwrap())
        .kernel("kSEISO")
        .learning("fixed")
        .n_init_samples(4)
        .n_iterations(2)
        .build()
        .unwrap();
    let report = opt.step(&|x: &[f64]| Ok::<_, Error>(x[0])).unwrap();
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::InnerBudgetExhausted { .. }))
    );
}

#[test]
fn stuck_outputs_force_a_random_jump() {
    let opt = builder().force_jump(2).n_iterations(8).build().unwrap();
    opt.run(&|_: &[f64]| Ok::<_, Error>(1.0)).unwrap();
    assert!(
        opt.diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::ForcedJump { .. }))
    );
}
