use super::*;
use crate::func::UnaryFunc;
use crate::simd::F32x4;
use approx::assert_relative_eq;

fn param(data: Vec<f32>, rows: usize, cols: usize) -> Node<f32> {
    Node::from_vec(data, rows, cols).unwrap()
}

#[test]
fn test_scalar_expression() {
    let x = Node::scalar(2.0f32);
    let y = Node::scalar(3.0f32);
    let f = &x + &(&y * &y);
    assert_eq!(f.scalar_value().unwrap(), 11.0);
}

#[test]
fn test_subtraction_and_division() {
    let a = Node::scalar(7.0f32);
    let b = Node::scalar(2.0f32);
    assert_eq!((&a - &b).scalar_value().unwrap(), 5.0);
    assert_eq!((&a / &b).scalar_value().unwrap(), 3.5);
    assert_eq!((-&a).scalar_value().unwrap(), -7.0);
}

#[test]
fn test_division_requires_scalar_divisor() {
    let a = param(vec![1.0, 2.0], 2, 1);
    let b = param(vec![1.0, 2.0], 2, 1);
    assert_eq!(
        (&a / &b).value().unwrap_err(),
        LaneGradError::DivisorNotScalar { rows: 2, cols: 1 }
    );
    let s = Node::scalar(2.0f32);
    assert_eq!((&a / &s).value().unwrap().as_slice(), &[0.5, 1.0]);
}

#[test]
fn test_matrix_product_and_mismatch() {
    let a = param(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
    let v = param(vec![1.0, 1.0], 2, 1);
    assert_eq!((&a * &v).value().unwrap().as_slice(), &[3.0, 7.0]);
    let bad = &v * &a;
    assert!(matches!(bad.value(), Err(LaneGradError::ShapeMismatch { .. })));
}

#[test]
fn test_dot_max_and_func() {
    let a = param(vec![1.0, -2.0, 3.0], 3, 1);
    let b = param(vec![2.0, 2.0, 2.0], 3, 1);
    assert_eq!(a.dot(&b).value().unwrap().as_slice(), &[2.0, -4.0, 6.0]);
    assert_eq!(a.max(&b).value().unwrap().as_slice(), &[2.0, 2.0, 3.0]);
    assert_eq!(a.relu().value().unwrap().as_slice(), &[1.0, 0.0, 3.0]);
    assert_eq!(a.func(UnaryFunc::Square).value().unwrap().as_slice(), &[1.0, 4.0, 9.0]);
}

#[test]
fn test_sum_reduces_to_scalar() {
    let a = param(vec![1.0, 2.0, 3.0, 4.0], 4, 1);
    let s = a.sum();
    assert_eq!(s.shape().unwrap(), [1, 1]);
    assert_eq!(s.scalar_value().unwrap(), 10.0);
}

#[test]
fn test_slice_and_bounds() {
    let a = Node::<f32>::parameter(3, 3);
    a.iota(0.0).unwrap();
    assert_eq!(a.slice(1, 1, 2, 2).value().unwrap().as_slice(), &[4.0, 5.0, 7.0, 8.0]);
    assert!(matches!(
        a.slice(2, 2, 2, 2).value(),
        Err(LaneGradError::SliceOutOfBounds { .. })
    ));
}

#[test]
fn test_flatten_is_column_major_per_member() {
    let a = param(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
    let b = param(vec![5.0, 6.0], 1, 2);
    let flat = Node::flatten(&[a, b]);
    assert_eq!(flat.shape().unwrap(), [6, 1]);
    assert_eq!(flat.value().unwrap().as_slice(), &[1.0, 3.0, 2.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_log_softmax_equal_pairs_and_normalization() {
    let x = param(vec![1.0, 0.0, 0.0, 1.0], 4, 1);
    let out = x.log_softmax().value().unwrap();
    assert_relative_eq!(out[(0, 0)], out[(3, 0)]);
    assert_relative_eq!(out[(1, 0)], out[(2, 0)]);
    let total: f32 = out.as_slice().iter().map(|v| v.exp()).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-6);
}

#[test]
fn test_log_softmax_is_stable_for_large_inputs() {
    let x = param(vec![1000.0, 1000.0], 2, 1);
    let out = x.log_softmax().value().unwrap();
    assert_relative_eq!(out[(0, 0)], -(2.0f32.ln()), epsilon = 1e-6);
    assert!(out.as_slice().iter().all(|v| v.is_finite()));
}

#[test]
fn test_convolution_unit_kernel_doubles() {
    let input = Node::<f32>::parameter(4, 4);
    input.iota(1.0).unwrap();
    let kernel = Node::scalar(2.0f32);
    let bias = Node::scalar(0.0f32);
    let out = input.convolution(&kernel, &bias, 1).value().unwrap();
    assert_eq!(out.shape(), [4, 4]);
    let expected: Vec<f32> = (1..=16).map(|v| 2.0 * v as f32).collect();
    assert_eq!(out.as_slice(), expected.as_slice());
}

#[test]
fn test_convolution_output_shape_and_bias() {
    let input = Node::<f32>::parameter(4, 5);
    input.constant(1.0).unwrap();
    let kernel = Node::<f32>::parameter(3, 3);
    kernel.constant(1.0).unwrap();
    let bias = Node::scalar(0.5f32);
    let out = input.convolution(&kernel, &bias, 3).value().unwrap();
    assert_eq!(out.shape(), [2, 3]);
    assert!(out.as_slice().iter().all(|v| *v == 9.5));

    let wrong_kernel = input.convolution(&Node::parameter(2, 2), &bias, 3);
    assert!(matches!(wrong_kernel.value(), Err(LaneGradError::ShapeMismatch { .. })));
}

#[test]
fn test_max_pool_truncates_edge_windows() {
    let input = Node::<f32>::parameter(5, 5);
    input.iota(0.0).unwrap();
    let out = input.max_pool_2d(2).value().unwrap();
    assert_eq!(out.shape(), [3, 3]);
    assert_eq!(out.as_slice(), &[6.0, 8.0, 9.0, 16.0, 18.0, 19.0, 21.0, 23.0, 24.0]);
}

#[test]
fn test_dropout_rate_zero_is_identity() {
    let a = param(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
    assert_eq!(a.dropout(0.0).value().unwrap().as_slice(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_dropout_scales_kept_elements() {
    let a = Node::<f32>::parameter(20, 20);
    a.constant(1.0).unwrap();
    let out = a.dropout(0.75).value().unwrap();
    assert!(out.as_slice().iter().all(|v| *v == 0.0 || *v == 4.0));
    assert!(matches!(a.dropout(1.0).value(), Err(LaneGradError::InvalidArgument(_))));
}

#[test]
fn test_values_are_memoized_until_invalidated() {
    let x = Node::scalar(2.0f32);
    let y = x.square();
    assert_eq!(y.scalar_value().unwrap(), 4.0);
    x.assign(3.0).unwrap();
    // still the cached value
    assert_eq!(y.scalar_value().unwrap(), 4.0);
    y.zero_grad();
    assert_eq!(y.scalar_value().unwrap(), 9.0);
}

#[test]
fn test_evaluation_allocates_zeroed_grads() {
    let a = param(vec![1.0, 2.0, 3.0], 3, 1);
    let b = a.exp();
    b.value().unwrap();
    assert_eq!(b.grad(), Matrix::zeros(3, 1));
    assert_eq!(b.accum_grad(), Matrix::zeros(3, 1));
}

#[test]
fn test_lane_values_evaluate_independently() {
    let x = Node::scalar(F32x4::new([1.0, 2.0, 3.0, 4.0]));
    let y = Node::scalar(F32x4::splat(2.0));
    let f = (&x * &y).square();
    let v = f.scalar_value().unwrap();
    assert_eq!(v.0, [4.0, 16.0, 36.0, 64.0]);
}

#[test]
fn test_set_value_on_operation_fails() {
    let x = Node::scalar(1.0f32);
    let y = x.exp();
    assert_eq!(
        y.set_value(Matrix::scalar(2.0)).unwrap_err(),
        LaneGradError::NotAParameter {
            operation: "set_value".to_string()
        }
    );
    assert!(matches!(
        x.set_value(Matrix::zeros(2, 1)),
        Err(LaneGradError::ShapeMismatch { .. })
    ));
}
