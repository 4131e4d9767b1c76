use msd_analytics::{MsdAnalyzer, Trajectory};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn unit_speed_track(times: &[f64]) -> Trajectory {
    let rows: Vec<[f64; 3]> = times.iter().map(|&t| [t, t, 0.0]).collect();
    Trajectory::from_rows(&rows).unwrap()
}

fn two_track_analyzer() -> MsdAnalyzer {
    let mut analyzer = MsdAnalyzer::new(2, "um", "s").unwrap();
    analyzer
        .add_all(vec![
            unit_speed_track(&[0.0, 1.0, 2.0, 3.0]),
            unit_speed_track(&[0.0, 2.0, 4.0]),
        ])
        .unwrap();
    analyzer
}

#[test]
fn lag_sets_are_per_track_then_unioned() {
    init_logging();
    let mut analyzer = two_track_analyzer();

    assert_eq!(analyzer.delays_of(&[0]).unwrap().as_slice(), &[0.0, 1.0, 2.0, 3.0]);
    assert_eq!(analyzer.delays_of(&[1]).unwrap().as_slice(), &[0.0, 2.0, 4.0]);
    assert_eq!(analyzer.all_delays().as_slice(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn unit_lag_comes_only_from_the_dense_track() {
    let mut analyzer = two_track_analyzer();
    let msd = analyzer.mean_msd();

    let row = msd.row_at(1.0, 1e-12).unwrap();
    assert_eq!(row.mean, 1.0);
    assert_eq!(row.n, 3);
    assert_eq!(row.sem, 0.0);

    let per_track = analyzer.compute_msd();
    assert!(per_track[1].row_at(1.0, 1e-12).is_none());
}

#[test]
fn double_lag_aggregates_both_tracks() {
    let mut analyzer = two_track_analyzer();
    let msd = analyzer.mean_msd();

    let row = msd.row_at(2.0, 1e-12).unwrap();
    assert_eq!(row.mean, 4.0);
    assert_eq!(row.n, 2 + 2);

    let per_track = analyzer.compute_msd();
    assert_eq!(per_track[0].row_at(2.0, 1e-12).map(|r| r.n), Some(2));
    assert_eq!(per_track[1].row_at(2.0, 1e-12).map(|r| r.n), Some(2));
}

#[test]
fn ensemble_curve_is_sorted_and_complete() {
    let mut analyzer = two_track_analyzer();
    let msd = analyzer.mean_msd();

    assert_eq!(msd.lags(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(msd.means(), vec![0.0, 1.0, 4.0, 9.0, 16.0]);
    assert_eq!(msd.rows()[0].n, 4 + 3);
}

#[test]
fn unequal_weights_shift_the_mean_toward_heavier_tracks() {
    let mut analyzer = MsdAnalyzer::new(1, "um", "s").unwrap();
    let fast = Trajectory::from_rows(&[[0.0, 0.0], [1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]).unwrap();
    let slow = Trajectory::from_rows(&[[0.0, 0.0], [1.0, 1.0]]).unwrap();
    analyzer.add_all(vec![fast, slow]).unwrap();

    let row = *analyzer.mean_msd().row_at(1.0, 1e-12).unwrap();
    // fast: 3 pairs of 4.0, slow: 1 pair of 1.0
    assert!((row.mean - 13.0 / 4.0).abs() < 1e-12);
    assert_eq!(row.n, 4);
    assert!(row.sem > 0.0);
}

#[test]
fn time_jitter_does_not_fragment_lags() {
    let mut analyzer = MsdAnalyzer::new(2, "um", "s").unwrap();
    let jittered: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
    let clean = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
    analyzer
        .add_all(vec![unit_speed_track(&jittered), unit_speed_track(&clean)])
        .unwrap();

    assert_eq!(analyzer.all_delays().len(), 10);
    assert_eq!(analyzer.mean_msd().len(), 10);
}

#[test]
fn csv_export_of_ensemble_curve() {
    let mut analyzer = two_track_analyzer();
    let mut buffer = Vec::new();
    analyzer.mean_msd().write_csv(&mut buffer).unwrap();

    let text = String::from_utf8(buffer).unwrap();
    assert_eq!(text.lines().count(), 1 + 5);
    assert!(text.starts_with("lag,mean,std,sem,n"));
}
