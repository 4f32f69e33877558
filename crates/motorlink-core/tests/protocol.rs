use motorlink_core::protocol::{
    classify, decode_status, encode_command, CommandFrame, Frame, GatewayError, StatusFrame,
    COMMAND_FRAME_LEN, FRAME_TERMINATOR, STATUS_FRAME_LEN,
};
use pretty_assertions::assert_eq;

const SAMPLE_VALUES: &[i64] = &[
    0,
    1,
    -1,
    100,
    -100,
    65_535,
    1_000_000,
    -1_000_000,
    i32::MAX as i64,
    i32::MIN as i64,
];

#[test]
fn test_encode_is_always_eight_bytes_and_decodes_back() {
    for &command in &[0u8, 1, 7, 255] {
        for &motor in &[0u8, 1, 255] {
            for &value in SAMPLE_VALUES {
                let bytes = encode_command(command, motor, value).expect("in range");
                assert_eq!(bytes.len(), COMMAND_FRAME_LEN);

                let frame = CommandFrame::from_bytes(&bytes).expect("Should decode");
                assert_eq!(frame.command, command);
                assert_eq!(frame.motor, motor);
                assert_eq!(frame.value as i64, value);
                assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), FRAME_TERMINATOR);
            }
        }
    }
}

#[test]
fn test_out_of_range_values_are_rejected() {
    for value in [1i64 << 31, -(1i64 << 31) - 1, 5_000_000_000, i64::MIN] {
        let err = encode_command(1, 0, value).unwrap_err();
        assert!(
            matches!(
                err,
                GatewayError::ValueOutOfRange { value: v } if v == i128::from(value)
            ),
            "unexpected error for {value}: {err:?}"
        );
    }
}

#[test]
fn test_decode_status_length_threshold() {
    for len in 0..STATUS_FRAME_LEN {
        let data = vec![0xFF; len];
        assert!(matches!(
            decode_status(&data),
            Err(GatewayError::TooShort { .. })
        ));
    }
    for len in [STATUS_FRAME_LEN, STATUS_FRAME_LEN + 1, 64] {
        assert!(decode_status(&vec![0x00; len]).is_ok());
    }
}

#[test]
fn test_decode_status_ignores_leading_byte() {
    for lead in [0x00u8, 0x41, 0xFE, 0xFF] {
        let mut data = vec![0u8; STATUS_FRAME_LEN];
        data[0] = lead;
        assert_eq!(decode_status(&data).unwrap().start_byte, lead);
    }
}

#[test]
fn test_status_wire_layout() {
    let frame = StatusFrame {
        start_byte: 0xFF,
        control_mode: 3,
        x_angle: 1.0,
        y_angle: -1.0,
        x_speed: 0.25,
        y_speed: 0.0,
        x_desired_angle: 90.0,
        y_desired_angle: -90.0,
        message: Some("ok".into()),
    };
    let bytes = frame.to_bytes();

    assert_eq!(bytes.len(), STATUS_FRAME_LEN + 2);
    assert_eq!(&bytes[1..5], &[0, 0, 0, 3]);
    assert_eq!(&bytes[5..9], &1.0f32.to_be_bytes());
    assert_eq!(&bytes[25..29], &(-90.0f32).to_be_bytes());
    assert_eq!(decode_status(&bytes).unwrap(), frame);
}

#[test]
fn test_classification_happens_outside_decoder() {
    let text = b"this line is definitely longer than twenty-nine bytes\n".to_vec();
    assert!(decode_status(&text).is_ok());
    assert!(matches!(classify(text).unwrap(), Frame::Text(_)));
}
