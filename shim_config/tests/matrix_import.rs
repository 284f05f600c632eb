use std::fs;

use rstest::rstest;
use shim_config::{load_filter_dir, load_matrix};
use tempfile::tempdir;

#[rstest]
fn loads_shim_table_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shimvals.txt");
    fs::write(&path, "0.1 0.2 0.3 0.4\n-0.1 -0.2 -0.3 -0.4\n").unwrap();

    let m = load_matrix(&path, 0).unwrap();
    assert_eq!((m.rows, m.cols), (2, 4));
    assert_eq!(m.row(1)[3], -0.4);
}

#[rstest]
fn missing_table_file_reports_path() {
    let dir = tempdir().unwrap();
    let err = load_matrix(&dir.path().join("nope.txt"), 0).unwrap_err();
    assert!(format!("{err:#}").contains("nope.txt"));
}

#[rstest]
fn filter_dir_substitutes_missing_files_with_zeros() {
    let dir = tempdir().unwrap();
    // order 2 => 4 taps per row; ch1.csv is absent
    fs::write(
        dir.path().join("ch0.csv"),
        "1,0,0,0\n0,0,0,0\n0,0,0,0\n",
    )
    .unwrap();
    fs::write(dir.path().join("ch2.csv"), "0 0 0 0\n0 0 0 0\n0 0 0.5 0\n").unwrap();

    let bank = load_filter_dir(dir.path(), 3).unwrap();
    assert_eq!(bank.order, 2);
    assert_eq!(bank.taps.len(), 3 * 3 * 4);
    assert_eq!(bank.taps(0, 0), &[1.0, 0.0, 0.0, 0.0]);
    assert!(bank.taps(1, 0).iter().all(|&t| t == 0.0));
    assert_eq!(bank.taps(2, 2), &[0.0, 0.0, 0.5, 0.0]);
}

#[rstest]
fn filter_dir_pads_short_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ch0.csv"), "2,0\n").unwrap();
    fs::write(dir.path().join("ch1.csv"), "0,0\n0,3\n").unwrap();

    let bank = load_filter_dir(dir.path(), 2).unwrap();
    assert_eq!(bank.order, 1);
    assert_eq!(bank.taps(0, 0), &[2.0, 0.0]);
    assert_eq!(bank.taps(0, 1), &[0.0, 0.0]);
    assert_eq!(bank.taps(1, 1), &[0.0, 3.0]);
}

#[rstest]
fn filter_dir_without_files_is_passthrough() {
    let dir = tempdir().unwrap();
    let bank = load_filter_dir(dir.path(), 4).unwrap();
    assert_eq!(bank.order, 0);
    assert!(bank.taps.is_empty());
}

#[rstest]
#[case("1,0,0\n", "even number of taps")]
#[case("1,0\n0,0\n0,0\n", "3 rows for 2 channels")]
fn filter_dir_rejects_bad_shapes(#[case] ch0: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ch0.csv"), ch0).unwrap();
    let err = load_filter_dir(dir.path(), 2).unwrap_err();
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn filter_dir_rejects_inconsistent_orders() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ch0.csv"), "1,0\n").unwrap();
    fs::write(dir.path().join("ch1.csv"), "1,0,0,0\n").unwrap();
    let err = load_filter_dir(dir.path(), 2).unwrap_err();
    assert!(format!("{err}").contains("expected 2 taps per row"));
}

#[rstest]
fn filter_dir_must_exist() {
    let dir = tempdir().unwrap();
    assert!(load_filter_dir(&dir.path().join("missing"), 2).is_err());
}
