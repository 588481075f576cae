use smbo::prelude::*;

use crate::test_functions::branin;

fn builder(criterion: &str) -> BayesOptBuilder {
    BayesOpt::builder()
        .space(SearchSpace::continuous(&[(-5.0, 10.0), (0.0, 15.0)]).unwrap())
        .kernel("kMaternARD5")
        .criterion(criterion)
        .n_init_samples(5)
        .n_iterations(8)
        .n_iter_relearn(3)
        .n_inner_iterations(40)
        .seed(99)
}

fn objective(x: &[f64]) -> core::result::Result<f64, Error> {
    Ok(branin(x))
}

#[test]
fn restored_run_matches_uninterrupted_run() {
    for criterion in ["cEI", "cHedge(cEI,cLCB,cThompsonSampling)", "cEIa", "cMI"] {
        let full = builder(criterion).build().unwrap();
        full.run(&objective).unwrap();

        let first = builder(criterion).build().unwrap();
        first.initialize(&objective).unwrap();
        for _ in 0..4 {
            first.step(&objective).unwrap();
        }
        let snapshot = first.snapshot();
        assert_eq!(snapshot.iteration, 4);

        let resumed = builder(criterion).build().unwrap();
        resumed.restore(snapshot).unwrap();
        assert_eq!(resumed.phase(), Phase::Iterating);
        resumed.run(&objective).unwrap();

        assert_eq!(resumed.dataset(), full.dataset(), "{criterion}");
        assert_eq!(resumed.snapshot(), full.snapshot(), "{criterion}");
    }
}

#[test]
fn restoring_before_initialization_starts_fresh() {
    let a = builder("cEI").build().unwrap();
    let snapshot = a.snapshot();
    assert_eq!(snapshot.phase, Phase::Uninitialized);
    let b = builder("cEI").build().unwrap();
    b.restore(snapshot).unwrap();
    a.run(&objective).unwrap();
    b.run(&objective).unwrap();
    assert_eq!(a.dataset(), b.dataset());
}

#[test]
fn incompatible_snapshots_are_rejected() {
    let opt = builder("cEI").build().unwrap();
    opt.initialize(&objective).unwrap();

    let mut future = opt.snapshot();
    future.version += 1;
    assert!(matches!(opt.restore(future), Err(Error::InvalidState(_))));

    let other = builder("cLCB").build().unwrap();
    assert!(matches!(other.restore(opt.snapshot()), Err(Error::InvalidState(_))));

    let mut ragged = opt.snapshot();
    ragged.samples[0].x.push(1.0);
    assert!(matches!(opt.restore(ragged), Err(Error::DimensionMismatch { .. })));
}
