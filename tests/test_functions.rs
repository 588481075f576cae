#[path = "../benches/test_functions.rs"]
mod test_functions;

use test_functions::*;

const TOL: f64 = 1e-10;

#[test]
fn sphere_at_optimum() {
    assert!(sphere(&[0.0, 0.0]).abs() < TOL);
    assert!(sphere(&[0.0; 10]).abs() < TOL);
}

#[test]
fn wiggly_1d_minimum() {
    let best = (0..=10_000)
        .map(|i| wiggly_1d(&[f64::from(i) / 10_000.0]))
        .fold(f64::INFINITY, f64::min);
    assert!((best - wiggly_1d(&[0.23719])).abs() < 1e-6);
}

#[test]
fn branin_at_optimum() {
    let target = 0.397_887_357_729_738_1;
    assert!((branin(&[std::f64::consts::PI, 2.275]) - target).abs() < 1e-3);
    assert!((branin(&[-std::f64::consts::PI, 12.275]) - target).abs() < 1e-3);
}

#[test]
fn camelback_at_optimum() {
    assert!((camelback(&[0.0898, -0.7126]) + 1.0316).abs() < 1e-3);
}

#[test]
fn hartmann6_at_optimum() {
    let x_opt = [0.20169, 0.150011, 0.476874, 0.275332, 0.311652, 0.6573];
    assert!((hartmann6(&x_opt) + 3.3224).abs() < 0.01);
}
