use shim_core::mocks::RecordingDac;
use shim_core::{Cube, FilterCoefficients, PreemphasisEngine};
use rstest::rstest;

fn single_pair(order: usize, taps: &[f32]) -> FilterCoefficients {
    let mut cube = Cube::zeros(1, 1, 2 * order);
    cube.lane_mut(0, 0).copy_from_slice(taps);
    FilterCoefficients::new(cube).unwrap()
}

fn run(engine: &mut PreemphasisEngine, inputs: &[f32]) -> Vec<f32> {
    inputs.iter().map(|&x| engine.apply(&[x])[0]).collect()
}

#[rstest]
#[case::unit_tap(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], vec![5.0, 0.0, 0.0, 0.0])]
#[case::two_sample_delay(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0], vec![0.0, 0.0, 5.0, 0.0])]
#[case::one_sample_delay(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0], vec![0.0, 5.0, 0.0, 0.0])]
#[case::feedback_is_subtracted(&[1.0, 0.0, 0.0, -0.5, 0.0, 0.0], vec![5.0, 2.5, 1.25, 0.625])]
fn impulse_response_order_3(#[case] taps: &[f32], #[case] expected: Vec<f32>) {
    let mut e = PreemphasisEngine::new(1, 1);
    e.configure(&single_pair(3, taps));
    assert_eq!(run(&mut e, &[5.0, 0.0, 0.0, 0.0]), expected);
}

#[test]
fn step_settles_through_feedback() {
    // y[n] = x[n] + 0.5 y[n-1]: step of 1 converges to 2
    let mut e = PreemphasisEngine::new(1, 1);
    e.configure(&single_pair(1, &[1.0, -0.5]));
    let out = run(&mut e, &[1.0; 40]);
    assert!((out[39] - 2.0).abs() < 1e-4);
}

#[test]
fn cross_channel_terms_sum_into_output_column() {
    // out column 1 gets 2 x in0 + 1 x in1
    let mut cube = Cube::zeros(2, 2, 2);
    cube.lane_mut(0, 1)[0] = 2.0;
    cube.lane_mut(1, 1)[0] = 1.0;
    let mut e = PreemphasisEngine::new(2, 2);
    e.configure(&FilterCoefficients::new(cube).unwrap());
    assert_eq!(e.apply(&[1.0, 3.0]), &[0.0, 5.0]);
}

#[test]
fn order_zero_is_identity() {
    let mut e = PreemphasisEngine::new(3, 4);
    e.configure(&FilterCoefficients::passthrough(3));
    assert!(!e.is_configured());
    let sp = [0.25, -1.0, 3.5, 9.0];
    assert_eq!(e.apply(&sp), &sp);
}

#[test]
fn reconfigure_clears_history() {
    let mut e = PreemphasisEngine::new(1, 1);
    let delay = single_pair(2, &[0.0, 1.0, 0.0, 0.0]);
    e.configure(&delay);
    e.apply(&[7.0]);
    e.configure(&delay);
    assert_eq!(e.apply(&[0.0]), &[0.0]);
}

#[test]
fn smaller_filter_leaves_extra_pairs_at_zero() {
    let mut e = PreemphasisEngine::new(2, 2);
    e.configure(&single_pair(1, &[1.0, 0.0]));
    assert_eq!(e.apply(&[4.0, 9.0]), &[4.0, 0.0]);
}

#[test]
fn filtered_reset_is_routed_like_a_setpoint() {
    // reset through an idle filter writes 0 A
    let dac = RecordingDac::new();
    let log = dac.log();
    let router = shim_core::ChannelRouter::new(&[0], 1, 1).unwrap();
    let mut out = shim_core::DacOutput::new(dac, router);
    let mut e = PreemphasisEngine::new(1, 1);
    e.configure(&single_pair(1, &[1.0, 0.0]));
    out.apply_all(e.apply(&[0.0])).unwrap();
    assert_eq!(log.writes(), vec![(0, 0x8000)]);
}
