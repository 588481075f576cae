use smbo::prelude::*;

#[test]
fn discrete_sets_are_searched_exhaustively() {
    let points: Vec<Vec<f64>> = (0..25)
        .map(|i| vec![f64::from(i % 5) * 2.0, f64::from(i / 5) - 2.0])
        .collect();
    let opt = BayesOpt::builder()
        .space(SearchSpace::discrete(points.clone()).unwrap())
        .kernel("kSEARD")
        .n_init_samples(5)
        .n_iterations(10)
        .seed(4)
        .build()
        .unwrap();
    let f = |x: &[f64]| Ok::<_, Error>((x[0] - 6.0).powi(2) + (x[1] - 1.0).powi(2));
    let (_, y) = opt.run(&f).unwrap();
    for s in opt.dataset().samples() {
        assert!(points.contains(&s.x), "{:?} is not in the set", s.x);
    }
    assert!(y <= 4.0, "best {y}");
}

#[test]
fn categorical_grids_use_category_indices() {
    let opt = BayesOpt::builder()
        .space(SearchSpace::categorical(vec![3, 4, 2]).unwrap())
        .kernel("kHamming")
        .criterion("cLCB")
        .n_init_samples(6)
        .n_iterations(12)
        .seed(8)
        .build()
        .unwrap();
    let target = [2.0, 1.0, 0.0];
    let f = |x: &[f64]| {
        Ok::<_, Error>(x.iter().zip(&target).filter(|(a, b)| a != b).count() as f64)
    };
    opt.run(&f).unwrap();
    for s in opt.dataset().samples() {
        assert!(s.x.iter().all(|v| v.fract() == 0.0));
        assert!(s.x[0] < 3.0 && s.x[1] < 4.0 && s.x[2] < 2.0);
    }
    assert!(opt.best().unwrap().1 <= 1.0);
}

#[test]
fn design_larger_than_a_finite_domain_is_rejected() {
    let opt = BayesOpt::builder()
        .space(SearchSpace::categorical(vec![2, 2]).unwrap())
        .n_init_samples(5)
        .build()
        .unwrap();
    let result = opt.initialize(&|x: &[f64]| Ok::<_, Error>(x[0]));
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn uniform_design_is_reproducible() {
    let run = || {
        let opt = BayesOpt::builder()
            .space(SearchSpace::unit(3).unwrap())
            .init_method("uniform")
            .learning("fixed")
            .n_init_samples(7)
            .n_iterations(0)
            .seed(17)
            .build()
            .unwrap();
        opt.run(&|x: &[f64]| Ok::<_, Error>(x.iter().sum())).unwrap();
        assert_eq!(opt.phase(), Phase::BudgetExhausted);
        opt.dataset()
    };
    assert_eq!(run(), run());
}

#[cfg(feature = "sobol")]
#[test]
fn sobol_design_fills_the_box() {
    let opt = BayesOpt::builder()
        .space(SearchSpace::unit(2).unwrap())
        .init_method("sobol")
        .learning("fixed")
        .n_init_samples(16)
        .n_iterations(0)
        .build()
        .unwrap();
    opt.initialize(&|x: &[f64]| Ok::<_, Error>(x[0] * x[1])).unwrap();
    let data = opt.dataset();
    for q in 0..4 {
        let (lo, hi) = (f64::from(q) * 0.25, f64::from(q + 1) * 0.25);
        assert!(data.samples().iter().any(|s| (lo..hi).contains(&s.x[0])));
    }
}

#[cfg(feature = "sobol")]
#[test]
fn sobol_design_beyond_its_dimensions_fails_at_build() {
    let result = BayesOpt::builder()
        .space(SearchSpace::unit(smbo::design::SOBOL_MAX_DIM + 1).unwrap())
        .init_method("sobol")
        .learning("fixed")
        .build();
    assert!(matches!(result, Err(Error::Configuration(_))));
}
