//! End-to-end certificate searches.

use std::collections::BTreeMap;

use lmi_cert::certificate::{d_matrix, h_matrix};
use lmi_cert::preprocess::factor_weight;
use lmi_cert::{
    solve_lmi, BackendChoice, CertificateEigenvalues, CertificateError, CertificateMode, CertificateSettings,
    FailureKind, LmiRequest, LmiResult, OutcomeStatus, SolveWarning,
};
use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TOL: f64 = 1e-6;

/// n=2, A=-I, B=[[1],[0]], Q=I, α ∈ [0.1, 10], λ = 0.5
fn scenario(use_d_constraint: bool) -> LmiRequest {
    LmiRequest {
        state_values: BTreeMap::from([("x1".to_string(), 0.3), ("x2".to_string(), -1.2)]),
        matrix_a: vec![vec![-1.0, 0.0], vec![0.0, -1.0]],
        matrix_b: vec![vec![1.0], vec![0.0]],
        matrix_q: vec![1.0, 1.0],
        alpha_min: 0.1,
        alpha_max: 10.0,
        n: 2,
        lambda_val: 0.5,
        use_d_constraint,
    }
}

fn settings(backend: BackendChoice) -> CertificateSettings {
    CertificateSettings {
        backend,
        ..CertificateSettings::default()
    }
}

fn matrix(rows: &[Vec<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), rows[0].len(), |i, j| rows[i][j])
}

fn max_eig(a: &DMatrix<f64>) -> f64 {
    a.clone().symmetric_eigenvalues().max()
}

fn min_eig(a: &DMatrix<f64>) -> f64 {
    a.clone().symmetric_eigenvalues().min()
}

fn assert_symmetric_w(result: &LmiResult) -> DMatrix<f64> {
    let cert = result.certificate().expect("feasible result carries a certificate");
    let w = matrix(&cert.w);
    assert!((&w - w.transpose()).amax() < 1e-12, "W not symmetric: {}", w);
    w
}

/// Recompute the certificate inequality and the W bounds from the returned
/// W and ρ, without going through the verifier.
fn assert_certificate_holds(req: &LmiRequest, result: &LmiResult, context: &str) {
    let cert = result
        .certificate()
        .unwrap_or_else(|| panic!("{}: no certificate: {:?}", context, result.failure()));
    let w = matrix(&cert.w);
    let a = matrix(&req.matrix_a);
    let b = matrix(&req.matrix_b);
    let bbt = &b * b.transpose();

    assert!(cert.rho >= -TOL, "{}: rho = {}", context, cert.rho);
    assert!(min_eig(&w) >= req.alpha_min - TOL, "{}: W below alpha_min", context);
    assert!(max_eig(&w) <= req.alpha_max + TOL, "{}: W above alpha_max", context);
    if req.use_d_constraint {
        let q = DMatrix::from_diagonal(&DVector::from_column_slice(&req.matrix_q));
        let (l, _) = factor_weight(&q);
        let d = d_matrix(&a, &bbt, &l, &w, cert.rho);
        assert!(min_eig(&d) >= -TOL, "{}: min eig D = {}", context, min_eig(&d));
    } else {
        let h = h_matrix(&a, &bbt, req.lambda_val, &w, cert.rho);
        assert!(max_eig(&h) <= TOL, "{}: max eig H = {}", context, max_eig(&h));
    }
}

fn spectral_abscissa(a: &DMatrix<f64>) -> f64 {
    a.complex_eigenvalues()
        .iter()
        .map(|z| z.re)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// H-mode request for a random system of order 3 to 5 with one or two
/// inputs. Entries of A and B are uniform in [-1, 1]; A is then shifted so
/// that its spectral abscissa is exactly `-decay`. Q = I, α ∈ [0.01, 100],
/// λ = 0.2.
fn random_stable_request(rng: &mut ChaCha8Rng, decay: f64) -> LmiRequest {
    let n = rng.gen_range(3..=5);
    let inputs = rng.gen_range(1..=2);
    let mut a = DMatrix::<f64>::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
    let shift = spectral_abscissa(&a) + decay;
    for i in 0..n {
        a[(i, i)] -= shift;
    }
    let b = DMatrix::<f64>::from_fn(n, inputs, |_, _| rng.gen_range(-1.0..1.0));

    let rows = |m: &DMatrix<f64>| -> Vec<Vec<f64>> {
        (0..m.nrows()).map(|i| m.row(i).iter().copied().collect()).collect()
    };
    LmiRequest {
        state_values: BTreeMap::new(),
        matrix_a: rows(&a),
        matrix_b: rows(&b),
        matrix_q: vec![1.0; n],
        alpha_min: 0.01,
        alpha_max: 100.0,
        n,
        lambda_val: 0.2,
        use_d_constraint: false,
    }
}

#[test]
fn test_h_mode_scenario_is_feasible() {
    let result = solve_lmi(&scenario(false), &settings(BackendChoice::Auto)).unwrap();
    assert!(result.feasible, "{:?}", result.failure());
    assert_eq!(result.mode, CertificateMode::HMode);

    let w = assert_symmetric_w(&result);
    assert!(min_eig(&w) >= 0.1 - TOL);
    assert!(max_eig(&w) <= 10.0 + TOL);

    let cert = result.certificate().unwrap();
    assert!(cert.rho >= -TOL);
    match cert.certificate_eigenvalues {
        CertificateEigenvalues::H { max_eig_h, .. } => assert!(max_eig_h <= TOL),
        other => panic!("H mode reported {:?}", other),
    }
    assert!(cert.verification.checks.all());

    // M = W⁻¹
    let m = matrix(&cert.m);
    assert!((&w * &m - DMatrix::identity(2, 2)).amax() < 1e-8);
}

#[test]
fn test_d_mode_scenario_is_feasible() {
    let result = solve_lmi(&scenario(true), &settings(BackendChoice::Auto)).unwrap();
    assert!(result.feasible, "{:?}", result.failure());
    assert_eq!(result.mode, CertificateMode::DMode);

    let w = assert_symmetric_w(&result);
    let cert = result.certificate().unwrap();
    match cert.certificate_eigenvalues {
        CertificateEigenvalues::D { min_eig_d, .. } => assert!(min_eig_d >= -TOL),
        other => panic!("D mode reported {:?}", other),
    }

    // Recompute D independently of the verifier.
    let a = matrix(&scenario(true).matrix_a);
    let b = matrix(&scenario(true).matrix_b);
    let (l, _) = factor_weight(&DMatrix::identity(2, 2));
    let d = d_matrix(&a, &(&b * b.transpose()), &l, &w, cert.rho);
    assert!(min_eig(&d) >= -TOL);
}

#[test]
fn test_builder_and_verifier_agree_on_h() {
    let req = scenario(false);
    let result = solve_lmi(&req, &settings(BackendChoice::Auto)).unwrap();
    let cert = result.certificate().unwrap();
    let w = matrix(&cert.w);

    let a = matrix(&req.matrix_a);
    let b = matrix(&req.matrix_b);
    let h = h_matrix(&a, &(&b * b.transpose()), req.lambda_val, &w, cert.rho);
    let reported = cert.verification.certificate;
    assert!((max_eig(&h) - reported.max).abs() < 1e-9);
    assert!((min_eig(&h) - reported.min).abs() < 1e-9);
}

#[test]
fn test_modes_are_checked_independently() {
    for use_d in [false, true] {
        let result = solve_lmi(&scenario(use_d), &settings(BackendChoice::Auto)).unwrap();
        let cert = result.certificate().unwrap();
        let json = serde_json::to_value(&cert.certificate_eigenvalues).unwrap();
        if use_d {
            assert_eq!(json["matrix"], "D");
            assert!(json.get("max_eig_h").is_none());
        } else {
            assert_eq!(json["matrix"], "H");
            assert!(json.get("max_eig_d").is_none());
        }
    }
}

#[test]
fn test_three_state_chain_is_feasible() {
    let req = LmiRequest {
        state_values: BTreeMap::new(),
        matrix_a: vec![vec![-1.0, 1.0, 0.0], vec![0.0, -2.0, 1.0], vec![0.0, 0.0, -3.0]],
        matrix_b: vec![vec![0.0], vec![0.0], vec![1.0]],
        matrix_q: vec![1.0, 2.0, 3.0],
        alpha_min: 0.1,
        alpha_max: 10.0,
        n: 3,
        lambda_val: 0.25,
        use_d_constraint: false,
    };
    let result = solve_lmi(&req, &settings(BackendChoice::Auto)).unwrap();
    assert!(result.feasible, "{:?}", result.failure());
    let w = assert_symmetric_w(&result);
    assert_eq!(w.shape(), (3, 3));
}

#[test]
fn test_unstable_system_is_infeasible() {
    // H = 3W with W ⪰ 0.1 I can never be negative definite.
    let req = LmiRequest {
        state_values: BTreeMap::new(),
        matrix_a: vec![vec![1.0]],
        matrix_b: vec![vec![0.0]],
        matrix_q: vec![1.0],
        alpha_min: 0.1,
        alpha_max: 10.0,
        n: 1,
        lambda_val: 0.5,
        use_d_constraint: false,
    };
    let result = solve_lmi(&req, &settings(BackendChoice::Auto)).unwrap();
    assert!(!result.feasible);
    assert!(result.certificate().is_none());

    let failure = result.failure().unwrap();
    assert_eq!(failure.rho, 0.0);
    assert_eq!(failure.error.kind, FailureKind::SolverStatus);
    let info = failure.solver_info.as_ref().unwrap();
    assert_eq!(info.status, OutcomeStatus::Infeasible);
}

#[test]
fn test_dimension_mismatch_is_an_error() {
    let mut req = scenario(false);
    req.matrix_b = vec![vec![1.0], vec![0.0], vec![0.0]];
    let err = solve_lmi(&req, &CertificateSettings::default()).unwrap_err();
    assert!(matches!(err, CertificateError::InvalidInput(_)));

    let mut req = scenario(false);
    req.matrix_a = vec![vec![-1.0, 0.0, 0.0], vec![0.0, -1.0, 0.0]];
    assert!(solve_lmi(&req, &CertificateSettings::default()).is_err());
}

#[test]
fn test_repeated_calls_agree() {
    let first = solve_lmi(&scenario(false), &settings(BackendChoice::Auto)).unwrap();
    let second = solve_lmi(&scenario(false), &settings(BackendChoice::Auto)).unwrap();
    assert_eq!(first.feasible, second.feasible);
    assert_eq!(first.mode, second.mode);

    let w1 = matrix(&first.certificate().unwrap().w);
    let w2 = matrix(&second.certificate().unwrap().w);
    assert!((w1 - w2).amax() < 1e-6);
}

#[test]
fn test_singular_q_falls_back_with_warning() {
    let mut req = scenario(true);
    req.matrix_q = vec![1.0, 0.0];
    let result = solve_lmi(&req, &settings(BackendChoice::Auto)).unwrap();
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, SolveWarning::FactorizationFallback { .. })));
    // L = diag(1, 0) keeps W = I feasible.
    assert!(result.feasible, "{:?}", result.failure());
}

#[test]
fn test_operator_splitting_backend_h_mode() {
    let result = solve_lmi(&scenario(false), &settings(BackendChoice::OperatorSplitting)).unwrap();
    let cert = result.certificate().expect("ADMM finds the H certificate");
    assert_eq!(cert.solver_info.solver_name, "admm");
    assert!(matches!(
        cert.certificate_eigenvalues,
        CertificateEigenvalues::H { max_eig_h, .. } if max_eig_h <= TOL
    ));
}

#[test]
fn test_feasible_result_json_shape() {
    let result = solve_lmi(&scenario(false), &settings(BackendChoice::Auto)).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["feasible"], true);
    assert_eq!(json["mode"], "h_mode");
    assert_eq!(json["outcome"], "feasible");
    assert_eq!(json["W"].as_array().unwrap().len(), 2);
    assert_eq!(json["M"].as_array().unwrap().len(), 2);
    assert_eq!(json["certificate_eigenvalues"]["matrix"], "H");
    assert!(json["solver_info"]["solver_name"].is_string());
    assert!(json["solver_info"]["solve_time"].as_f64().unwrap() >= 0.0);
    assert_eq!(json["verification"]["checks"]["rho_non_negative"], true);
    assert!(json["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn test_random_stable_systems_are_certified() {
    // Spectral abscissa at or below -(λ + 0.3): both inequalities hold with ρ = 0.
    let mut rng = ChaCha8Rng::seed_from_u64(20_241_019);
    for case in 0..6 {
        let decay = 0.2 + rng.gen_range(0.3..1.0);
        let base = random_stable_request(&mut rng, decay);
        assert!(spectral_abscissa(&matrix(&base.matrix_a)) < 0.0);

        for backend in [BackendChoice::InteriorPoint, BackendChoice::OperatorSplitting] {
            for use_d_constraint in [false, true] {
                let req = LmiRequest { use_d_constraint, ..base.clone() };
                let context = format!("case {} n={} {:?} d_mode={}", case, req.n, backend, use_d_constraint);
                let result = solve_lmi(&req, &settings(backend)).unwrap();
                assert!(result.feasible, "{}: {:?}", context, result.failure());
                assert_certificate_holds(&req, &result, &context);
            }
        }
    }
}

#[test]
fn test_random_slow_systems_need_input_weight() {
    // Stable, but slower than λ = 0.2: the H inequality needs ρ > 0.
    let mut rng = ChaCha8Rng::seed_from_u64(7_007);
    for case in 0..8 {
        let decay = rng.gen_range(0.05..0.15);
        let base = random_stable_request(&mut rng, decay);

        for use_d_constraint in [false, true] {
            let req = LmiRequest { use_d_constraint, ..base.clone() };
            let context = format!("case {} n={} d_mode={}", case, req.n, use_d_constraint);
            let result = solve_lmi(&req, &settings(BackendChoice::Auto)).unwrap();
            assert!(result.feasible, "{}: {:?}", context, result.failure());
            assert_certificate_holds(&req, &result, &context);
            if !use_d_constraint {
                assert!(result.certificate().unwrap().rho > TOL, "{}", context);
            }
        }
    }
}

#[test]
fn test_unstable_but_stabilizable_system() {
    // A = diag(1, -1), B = e₁: the unstable mode is actuated, so a certificate
    // exists only with ρ > 0. With W₁₁ = α_min = 0.1 the optimum is
    // ρ = (2 + 2λ)·0.1 = 0.3 in H mode and ρ = 2·0.1 + 0.1² = 0.21 in D mode.
    for backend in [BackendChoice::Auto, BackendChoice::OperatorSplitting] {
        for (use_d_constraint, expected) in [(false, 0.3), (true, 0.21)] {
            let req = LmiRequest {
                matrix_a: vec![vec![1.0, 0.0], vec![0.0, -1.0]],
                ..scenario(use_d_constraint)
            };
            let context = format!("{:?} d_mode={}", backend, use_d_constraint);
            let result = solve_lmi(&req, &settings(backend)).unwrap();
            assert!(result.feasible, "{}: {:?}", context, result.failure());
            assert_certificate_holds(&req, &result, &context);

            let rho = result.certificate().unwrap().rho;
            assert!(rho >= expected - 1e-4, "{}: rho = {}", context, rho);
            assert!(rho <= expected + 1e-2, "{}: rho = {}", context, rho);
        }
    }
}

#[test]
fn test_four_state_system_with_wide_bounds() {
    // One eigenvalue of A sits right of -λ, and α spans four decades.
    let base = LmiRequest {
        state_values: BTreeMap::new(),
        matrix_a: vec![
            vec![-1.0, 2.0, 0.0, 0.0],
            vec![0.0, -1.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.5, 1.0],
            vec![1.0, 0.0, 0.0, -2.0],
        ],
        matrix_b: vec![vec![0.0], vec![0.0], vec![1.0], vec![1.0]],
        matrix_q: vec![1.0; 4],
        alpha_min: 0.01,
        alpha_max: 100.0,
        n: 4,
        lambda_val: 0.2,
        use_d_constraint: false,
    };
    for use_d_constraint in [false, true] {
        let req = LmiRequest { use_d_constraint, ..base.clone() };
        let context = format!("d_mode={}", use_d_constraint);
        let result = solve_lmi(&req, &settings(BackendChoice::Auto)).unwrap();
        assert!(result.feasible, "{}: {:?}", context, result.failure());
        assert_certificate_holds(&req, &result, &context);

        let cert = result.certificate().unwrap();
        if cfg!(feature = "interior-point") {
            assert_eq!(cert.solver_info.status, OutcomeStatus::Optimal, "{}", context);
            if !use_d_constraint {
                assert!((cert.rho - 0.012476).abs() < 1e-4, "rho = {}", cert.rho);
            }
        }
    }
}
