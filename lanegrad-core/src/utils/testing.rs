use crate::element::Element;
use crate::matrix::Matrix;

/// Checks that a matrix has the expected shape and that every lane of every
/// element is within `tolerance` of the expected value.
/// Panics with the first mismatching position otherwise.
pub fn check_matrix_near<T: Element>(
    actual: &Matrix<T>,
    expected_shape: [usize; 2],
    expected_data: &[f32],
    tolerance: f32,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");
    assert_eq!(
        actual.len(),
        expected_data.len(),
        "Data length mismatch"
    );

    for (i, (a, e)) in actual.as_slice().iter().zip(expected_data.iter()).enumerate() {
        for lane in 0..T::LANES {
            let diff = (a.lane(lane) - *e).abs();
            if diff > tolerance {
                panic!(
                    "Data mismatch at index {} lane {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                    i,
                    lane,
                    a.lane(lane),
                    e,
                    diff,
                    tolerance
                );
            }
        }
    }
}
