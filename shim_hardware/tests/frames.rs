use rstest::rstest;
use shim_hardware::DacRegisters;
use shim_hardware::error::HwError;
use shim_hardware::frame::{REG_DATA_BASE, data_frame, init_frames};

#[rstest]
#[case(0, 0x0000, [0xC8, 0x00, 0x00])]
#[case(1, 0xFFFF, [0xC9, 0xFF, 0xFF])]
#[case(7, 0x8000, [0xCF, 0x80, 0x00])]
#[case(15, 0x999A, [0xD7, 0x99, 0x9A])]
fn data_frames_encode_register_and_code(
    #[case] ch: u8,
    #[case] code: u16,
    #[case] expected: [u8; 3],
) {
    assert_eq!(data_frame(ch, code).unwrap(), expected);
}

#[rstest]
fn custom_registers_are_used_for_every_channel() {
    let regs = DacRegisters {
        common_offset: 0x0D55,
        channel_gain: 0x7000,
        channel_offset: 0x7FFF,
    };
    let frames = init_frames(&regs);
    assert_eq!(frames[0][1..], [0x0D, 0x55]);
    for pair in frames[2..].chunks(2) {
        assert_eq!(pair[0][1..], [0x70, 0x00]);
        assert_eq!(pair[1][1..], [0x7F, 0xFF]);
    }
    assert!(frames.iter().all(|f| f[0] < REG_DATA_BASE));
}

#[rstest]
fn data_frame_errors_are_typed() {
    match data_frame(200, 0) {
        Err(HwError::Channel(200)) => {}
        other => panic!("expected channel error, got {other:?}"),
    }
}
