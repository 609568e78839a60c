use super::*;
use crate::error::LaneGradError;
use crate::simd::F32x8;
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_parameter_starts_at_zero_with_grad_buffers() {
    let p = Node::<f32>::parameter(2, 3);
    assert!(p.is_parameter());
    assert!(p.has_value());
    assert_eq!(p.mode(), Mode::Parameter);
    assert_eq!(p.value().unwrap(), Matrix::zeros(2, 3));
    assert_eq!(p.grad(), Matrix::zeros(2, 3));
    assert_eq!(p.accum_grad(), Matrix::zeros(2, 3));
    assert!(!p.needs_grad());
    assert!(!p.is_variable());
}

#[test]
fn test_ids_are_unique_and_clones_share_the_vertex() {
    let a = Node::scalar(1.0f32);
    let b = Node::scalar(1.0f32);
    assert_ne!(a.id(), b.id());
    let a2 = a.clone();
    assert!(a.ptr_eq(&a2));
    assert_eq!(a.id(), a2.id());
    a2.set_needs_grad(true);
    assert!(a.needs_grad());
}

#[test]
fn test_builders_record_mode_without_evaluating() {
    let a = Node::scalar(1.0f32);
    let b = Node::scalar(2.0f32);
    let c = &a + &b;
    assert_eq!(c.mode(), Mode::Add);
    assert!(!c.has_value());
    assert_eq!((&a - &b).mode(), Mode::Add);
    assert_eq!((&a * &b).mode(), Mode::Mul);
    assert_eq!((&a / &b).mode(), Mode::Div);
    assert_eq!((-&a).mode(), Mode::Neg);
    assert_eq!(a.dot(&b).mode(), Mode::Dot);
    assert_eq!(a.max(&b).mode(), Mode::Max);
    assert_eq!(a.sum().mode(), Mode::Sum);
    assert_eq!(a.relu().mode(), Mode::Func);
    assert_eq!(a.slice(0, 0, 1, 1).mode(), Mode::Slice);
    assert_eq!(Node::flatten(&[a.clone()]).mode(), Mode::Flatten);
    assert_eq!(a.convolution(&b, &b, 1).mode(), Mode::Convolution);
    assert_eq!(a.max_pool_2d(1).mode(), Mode::MaxPool2D);
    assert_eq!(a.dropout(0.5).mode(), Mode::Dropout);
    assert_eq!(a.log_softmax().mode(), Mode::LogSoftmax);
}

#[test]
fn test_subtraction_is_addition_of_negation() {
    let a = Node::scalar(1.0f32);
    let b = Node::scalar(2.0f32);
    let d = &a - &b;
    let children = d.children();
    assert!(children[0].ptr_eq(&a));
    assert_eq!(children[1].mode(), Mode::Neg);
    assert!(children[1].children()[0].ptr_eq(&b));
}

#[test]
fn test_from_vec_rejects_bad_length() {
    assert!(matches!(
        Node::from_vec(vec![1.0f32, 2.0, 3.0], 2, 2),
        Err(LaneGradError::TensorCreationError { .. })
    ));
}

#[test]
fn test_fill_helpers() {
    let p = Node::<f32>::parameter(2, 2);
    p.iota(1.0).unwrap();
    assert_eq!(p.value().unwrap().as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    p.constant(7.0).unwrap();
    assert_eq!(p.value().unwrap().as_slice(), &[7.0; 4]);
    p.identity(2.0).unwrap();
    assert_eq!(p.value().unwrap().as_slice(), &[2.0, 0.0, 0.0, 2.0]);
    p.zero().unwrap();
    assert_eq!(p.value().unwrap().as_slice(), &[0.0; 4]);

    let row = Node::<f32>::parameter(1, 4);
    row.one_hot_column(2).unwrap();
    assert_eq!(row.value().unwrap().as_slice(), &[0.0, 0.0, 1.0, 0.0]);
    assert!(matches!(
        row.one_hot_column(4),
        Err(LaneGradError::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        row.identity(1.0),
        Err(LaneGradError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_randomize_stays_within_factor() {
    let p = Node::<F32x8>::parameter(4, 4);
    let mut rng = StdRng::seed_from_u64(7);
    p.randomize_with(&mut rng, 0.5).unwrap();
    let v = p.value().unwrap();
    assert!(v
        .as_slice()
        .iter()
        .all(|e| e.lanes().iter().all(|x| (-0.5..=0.5).contains(x))));
    // lanes are drawn independently
    assert!(v.as_slice().iter().any(|e| e[0] != e[1]));
}

#[test]
fn test_set_lane_touches_one_lane() {
    let p = Node::<F32x8>::parameter(1, 1);
    p.set_lane(0, 0, 3, 1.5).unwrap();
    let v = p.scalar_value().unwrap();
    assert_eq!(v[3], 1.5);
    assert_eq!(v.sum(), 1.5);
    assert!(matches!(
        p.set_lane(0, 0, 8, 1.0),
        Err(LaneGradError::InvalidArgument(_))
    ));
}

#[test]
fn test_mutations_are_limited_to_parameters() {
    let a = Node::scalar(1.0f32);
    let b = a.exp();
    assert!(matches!(b.assign(1.0), Err(LaneGradError::NotAParameter { .. })));
    assert!(matches!(b.iota(0.0), Err(LaneGradError::NotAParameter { .. })));
    assert!(matches!(
        b.set_element(0, 0, 1.0),
        Err(LaneGradError::NotAParameter { .. })
    ));
    assert!(matches!(
        a.set_element(1, 0, 1.0),
        Err(LaneGradError::IndexOutOfBounds { .. })
    ));
}

#[test]
fn test_normalize_sets_mean_and_spread() {
    let p = Node::from_vec(vec![1.0f32, 2.0, 3.0], 3, 1).unwrap();
    p.normalize(4.0, None).unwrap();
    assert_eq!(p.value().unwrap().as_slice(), &[2.0, 4.0, 6.0]);

    p.normalize(4.0, Some(1.0)).unwrap();
    let v = p.value().unwrap();
    let mean = v.sum() / 3.0;
    let spread = (v.map(|x| (x - mean) * (x - mean)).sum() / 3.0).sqrt();
    assert_relative_eq!(mean, 4.0, epsilon = 1e-5);
    assert_relative_eq!(spread, 1.0, epsilon = 1e-5);
    assert_relative_eq!(v[(1, 0)], 4.0, epsilon = 1e-5);

    assert!(matches!(
        p.exp().normalize(0.0, None),
        Err(LaneGradError::NotAParameter { .. })
    ));
}

#[test]
fn test_max_value_index_of_column() {
    let scores = Node::from_vec(vec![0.1f32, 0.7, 0.2], 3, 1).unwrap();
    assert_eq!(scores.max_value_index_of_column(0).unwrap(), 1);
    let computed = scores.log_softmax();
    assert_eq!(computed.max_value_index_of_column(0).unwrap(), 1);
}

#[test]
fn test_debug_output_names_mode() {
    let a = Node::scalar(1.0f32);
    let text = format!("{:?}", a.exp());
    assert!(text.contains("Func"));
}
