use sweepbench_stats::{
    find_root, inverse_student_t, regularized_incomplete_beta, standard_normal_cdf,
    student_t_cdf, StatsError, ACCURACY, NORMAL_LIMIT_DF,
};

const NORMAL_95: f64 = 1.644_853_626_951_472_2;

#[test]
fn test_find_root_sqrt() {
    let v = find_root(2.0, 0.0, 15.0, |x| Ok(x.sqrt())).unwrap();
    assert!((v.sqrt() - 2.0).abs() < ACCURACY);
}

#[test]
fn test_find_root_propagates_function_errors() {
    let err = find_root(1.0, 0.0, 2.0, |_| Err(StatsError::InvalidProbability(2.0))).unwrap_err();
    assert_eq!(err, StatsError::InvalidProbability(2.0));
}

#[test]
fn test_incomplete_beta_closed_forms() {
    // I_x(1, 1) = x
    for x in [0.1, 0.25, 0.5, 0.9] {
        assert!((regularized_incomplete_beta(1.0, 1.0, x).unwrap() - x).abs() < 1e-12);
    }
    // I_x(a, 1) = x^a
    assert!((regularized_incomplete_beta(3.0, 1.0, 0.5).unwrap() - 0.125).abs() < 1e-12);
    // Out-of-range x is clamped
    assert_eq!(regularized_incomplete_beta(2.0, 3.0, -1.0).unwrap(), 0.0);
    assert_eq!(regularized_incomplete_beta(2.0, 3.0, 1.5).unwrap(), 1.0);
}

#[test]
fn test_cdf_matches_cauchy_for_one_degree_of_freedom() {
    for x in [-3.0, -1.0, 0.0, 0.5, 1.0, 10.0] {
        let expected = 0.5 + f64::atan(x) / std::f64::consts::PI;
        assert!((student_t_cdf(x, 1).unwrap() - expected).abs() < 1e-12, "x = {x}");
    }
}

#[test]
fn test_cdf_matches_closed_form_for_two_degrees_of_freedom() {
    for x in [-2.0_f64, -0.5, 0.5, 2.0, 4.0] {
        let expected = 0.5 + x / (2.0 * (2.0 + x * x).sqrt());
        assert!((student_t_cdf(x, 2).unwrap() - expected).abs() < 1e-12, "x = {x}");
    }
}

#[test]
fn test_inverse_reference_quantiles() {
    // df: 1, p: 0.95 = 6.31375
    let v = inverse_student_t(1, 0.95).unwrap();
    assert!((v - 6.31375).abs() < ACCURACY * 10_000.0);
    assert!((v - 6.313_751_514_675).abs() < 1e-7);

    for (df, p, expected) in [
        (2, 0.95, 2.919_985_580),
        (5, 0.99, 3.364_929_999),
        (10, 0.975, 2.228_138_852),
        (30, 0.95, 1.697_260_887),
    ] {
        let v = inverse_student_t(df, p).unwrap();
        assert!((v - expected).abs() < 1e-6, "df={df} p={p}: got {v}, expected {expected}");
    }
}

#[test]
fn test_inverse_is_symmetric() {
    let upper = inverse_student_t(4, 0.9).unwrap();
    let lower = inverse_student_t(4, 0.1).unwrap();
    assert!((upper + lower).abs() < 1e-8);
    assert_eq!(inverse_student_t(4, 0.5).unwrap(), 0.0);
}

#[test]
fn test_inverse_increasing_in_p() {
    let ps = [0.55, 0.6, 0.75, 0.9, 0.95, 0.975, 0.99];
    for df in [1, 3, 12] {
        let qs: Vec<f64> = ps.iter().map(|&p| inverse_student_t(df, p).unwrap()).collect();
        assert!(qs.windows(2).all(|w| w[0] < w[1]), "df={df}: {qs:?}");
    }
}

#[test]
fn test_inverse_decreasing_in_df_towards_normal() {
    let dfs = [1, 2, 3, 5, 10, 30, 100, 1000];
    let qs: Vec<f64> = dfs.iter().map(|&df| inverse_student_t(df, 0.95).unwrap()).collect();
    assert!(qs.windows(2).all(|w| w[0] > w[1]), "{qs:?}");
    let last = *qs.last().unwrap();
    assert!(last > NORMAL_95);
    assert!(last - NORMAL_95 < 2e-3);
}

#[test]
fn test_inverse_keeps_decreasing_for_huge_df() {
    let dfs = [1_000_000, 10_000_000, 50_000_000, 100_000_000, 1_000_000_000, 1 << 53];
    for p in [0.95, 0.975, 0.995] {
        let qs: Vec<f64> = dfs.iter().map(|&df| inverse_student_t(df, p).unwrap()).collect();
        assert!(qs.windows(2).all(|w| w[0] >= w[1]), "p={p}: {qs:?}");
    }
    let qs: Vec<f64> = dfs.iter().map(|&df| inverse_student_t(df, 0.95).unwrap()).collect();
    // t_{0.95} exceeds the normal quantile by about 1.52 / df
    assert!((qs[0] - NORMAL_95 - 1.52e-6).abs() < 2e-8, "{qs:?}");
    assert!((qs[3] - NORMAL_95).abs() < 5e-8, "{qs:?}");
    assert!((qs[5] - NORMAL_95).abs() < 2.0 * ACCURACY, "{qs:?}");
}

#[test]
fn test_cdf_switches_to_normal_past_limit() {
    for x in [-3.0, -0.5, 0.0, 1.0, 1.96] {
        assert_eq!(
            student_t_cdf(x, NORMAL_LIMIT_DF + 1).unwrap(),
            standard_normal_cdf(x).unwrap()
        );
        let below = student_t_cdf(x, NORMAL_LIMIT_DF).unwrap();
        assert!((below - standard_normal_cdf(x).unwrap()).abs() < 1e-8, "x={x}");
    }
}

#[test]
fn test_standard_normal_cdf_reference_values() {
    let cases = [
        (0.0, 0.5),
        (1.0, 0.841_344_746_068_543),
        (-1.0, 0.158_655_253_931_457),
        (1.959_963_984_540_054, 0.975),
        (3.0, 0.998_650_101_968_370),
        (-5.0, 2.866_515_718_791_939e-7),
    ];
    for (z, expected) in cases {
        assert!((standard_normal_cdf(z).unwrap() - expected).abs() < 1e-14, "z={z}");
    }
}

#[test]
fn test_inverse_round_trips_through_cdf() {
    let x = inverse_student_t(7, 0.95).unwrap();
    assert!((student_t_cdf(x, 7).unwrap() - 0.95).abs() < 1e-9);
}

#[test]
fn test_inverse_rejects_degenerate_inputs() {
    assert_eq!(
        inverse_student_t(0, 0.95),
        Err(StatsError::InsufficientSamples { found: 1, required: 2 })
    );
    assert_eq!(inverse_student_t(3, 1.0), Err(StatsError::InvalidProbability(1.0)));
    assert_eq!(inverse_student_t(3, 0.0), Err(StatsError::InvalidProbability(0.0)));
    assert!(matches!(inverse_student_t(3, f64::NAN), Err(StatsError::InvalidProbability(_))));
}
