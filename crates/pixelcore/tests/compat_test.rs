use pixelcore::{compatible, ConnectRejection, Pin, PinDirection, PinSpec, PinType};
use uuid::Uuid;

/// Rows are outputs, columns are inputs, both in `PinType::ALL` order:
/// exec bool int float string path image color vec2 vec3 matrix array dict any
const MATRIX: [&str; 14] = [
    "10000000000000",
    "01000000000001",
    "00110000000001",
    "00110000000001",
    "00001100000001",
    "00001100000001",
    "00000010000001",
    "00000001000001",
    "00000000100001",
    "00000000010001",
    "00000000001001",
    "00000000000101",
    "00000000000011",
    "01111111111111",
];

fn pin(direction: PinDirection, pin_type: PinType) -> Pin {
    Pin::from_spec(Uuid::new_v4(), direction, PinSpec::new("p", pin_type))
}

#[test]
fn test_compatibility_matrix_is_exhaustive() {
    for (row, output) in PinType::ALL.iter().enumerate() {
        let cells = MATRIX[row].as_bytes();
        assert_eq!(cells.len(), PinType::ALL.len());
        for (col, input) in PinType::ALL.iter().enumerate() {
            let expected = cells[col] == b'1';
            assert_eq!(
                compatible(*output, *input),
                expected,
                "compatible({}, {})",
                output,
                input
            );
        }
    }
}

#[test]
fn test_matrix_is_symmetric() {
    for a in PinType::ALL {
        for b in PinType::ALL {
            assert_eq!(compatible(a, b), compatible(b, a), "{} / {}", a, b);
        }
    }
}

#[test]
fn test_pin_never_accepts_itself() {
    for pin_type in PinType::ALL {
        for direction in [PinDirection::Input, PinDirection::Output] {
            let p = pin(direction, pin_type);
            assert!(!p.can_accept_connection(&p));
            assert_eq!(p.check_connection(&p), Err(ConnectRejection::SamePin));
        }
    }
}

#[test]
fn test_same_direction_is_rejected() {
    let a = pin(PinDirection::Input, PinType::Float);
    let b = pin(PinDirection::Input, PinType::Float);
    assert_eq!(a.check_connection(&b), Err(ConnectRejection::SameDirection));

    let c = pin(PinDirection::Output, PinType::Any);
    let d = pin(PinDirection::Output, PinType::Any);
    assert_eq!(c.check_connection(&d), Err(ConnectRejection::SameDirection));
}

#[test]
fn test_pin_check_follows_matrix_in_either_order() {
    for output_type in PinType::ALL {
        for input_type in PinType::ALL {
            let out = pin(PinDirection::Output, output_type);
            let inp = pin(PinDirection::Input, input_type);
            let expected = compatible(output_type, input_type);
            assert_eq!(out.can_accept_connection(&inp), expected);
            assert_eq!(inp.can_accept_connection(&out), expected);
            if !expected {
                assert_eq!(out.check_connection(&inp), Err(ConnectRejection::TypeMismatch));
            }
        }
    }
}

#[test]
fn test_multiplicity_defaults_follow_direction() {
    assert!(pin(PinDirection::Output, PinType::Float).is_multiple());
    assert!(!pin(PinDirection::Input, PinType::Float).is_multiple());

    let fan_in = Pin::from_spec(
        Uuid::new_v4(),
        PinDirection::Input,
        PinSpec::new("items", PinType::Any).multiple(),
    );
    assert!(fan_in.is_multiple());
}
