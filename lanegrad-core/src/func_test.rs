use super::*;
use crate::simd::F32x4;
use approx::assert_relative_eq;

#[test]
fn test_index_round_trip_is_stable() {
    assert_eq!(UnaryFunc::Sigmoid.index(), 0);
    assert_eq!(UnaryFunc::Relu.index(), 1);
    assert_eq!(UnaryFunc::Exp.index(), 2);
    assert_eq!(UnaryFunc::Log.index(), 3);
    assert_eq!(UnaryFunc::Tanh.index(), 4);
    assert_eq!(UnaryFunc::Square.index(), 5);
    for f in UnaryFunc::ALL {
        assert_eq!(UnaryFunc::from_index(f.index()), Some(f));
    }
    assert_eq!(UnaryFunc::from_index(6), None);
}

#[test]
fn test_scalar_values() {
    assert_relative_eq!(UnaryFunc::Sigmoid.apply(0.0f32), 0.5);
    assert_relative_eq!(UnaryFunc::Sigmoid.derivative(0.0f32), 0.25);
    assert_eq!(UnaryFunc::Relu.apply(-2.0f32), 0.0);
    assert_eq!(UnaryFunc::Relu.apply(3.0f32), 3.0);
    assert_eq!(UnaryFunc::Relu.derivative(-2.0f32), 0.0);
    assert_eq!(UnaryFunc::Relu.derivative(0.0f32), 1.0);
    assert_relative_eq!(UnaryFunc::Exp.apply(1.0f32), std::f32::consts::E);
    assert_relative_eq!(UnaryFunc::Tanh.derivative(0.0f32), 1.0);
    assert_eq!(UnaryFunc::Square.apply(3.0f32), 9.0);
    assert_eq!(UnaryFunc::Square.derivative(3.0f32), 6.0);
}

#[test]
fn test_log_clamps_zero() {
    assert_eq!(UnaryFunc::Log.apply(0.0f32), LOG_ZERO);
    assert_eq!(UnaryFunc::Log.derivative(0.0f32), 80.0);
    assert_relative_eq!(UnaryFunc::Log.apply(std::f32::consts::E), 1.0, epsilon = 1e-6);
    assert_relative_eq!(UnaryFunc::Log.derivative(4.0f32), 0.25);
}

#[test]
fn test_lanes_match_scalar_evaluation() {
    let x = F32x4::new([-1.5, 0.0, 0.7, 2.0]);
    for f in [UnaryFunc::Sigmoid, UnaryFunc::Relu, UnaryFunc::Tanh, UnaryFunc::Square] {
        let v = f.apply(x);
        let d = f.derivative(x);
        for l in 0..4 {
            assert_relative_eq!(v[l], f.apply(x[l]), epsilon = 1e-6);
            assert_relative_eq!(d[l], f.derivative(x[l]), epsilon = 1e-6);
        }
    }
    let pos = F32x4::new([0.0, 1.0, 2.0, 0.5]);
    let v = UnaryFunc::Log.apply(pos);
    for l in 0..4 {
        assert_relative_eq!(v[l], UnaryFunc::Log.apply(pos[l]), epsilon = 1e-6);
    }
}
