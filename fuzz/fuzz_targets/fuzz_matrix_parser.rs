#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(m) = shim_config::parse_matrix(data, 1) {
        assert_eq!(m.values.len(), m.rows * m.cols);
        assert!(m.row(0).iter().all(|v| *v == 0.0));
    }
});
