use super::*;
use crate::simd::{F32x4, F32x8};
use approx::assert_relative_eq;

fn trainable(value: f32) -> Node<f32> {
    let n = Node::scalar(value);
    n.set_needs_grad(true);
    n
}

fn grad_at(program: &Program<f32>, topo: &TopoOrder<f32>, node: &Node<f32>) -> f32 {
    program.grads()[topo.position(node.id()).unwrap()]
}

#[test]
fn test_sum_of_product_value_and_gradients() {
    let x = trainable(2.0);
    let y = trainable(3.0);
    let f = &x + &(&y * &y);
    let topo = f.topological_order();
    let mut program = compile(&topo).unwrap();

    assert_eq!(program.len(), 4);
    assert_eq!(program.get_result().unwrap(), 11.0);
    program.backward().unwrap();
    assert_eq!(grad_at(&program, &topo, &x), 1.0);
    assert_eq!(grad_at(&program, &topo, &y), 6.0);
}

#[test]
fn test_index_follows_topological_position() {
    let x = trainable(2.0);
    let y = Node::scalar(3.0f32);
    let f = (&x - &y).tanh();
    let topo = f.topological_order();
    let program = topo.compile().unwrap();
    for (i, node) in topo.iter().enumerate() {
        let item = &program.work()[i];
        assert_eq!(item.opcode == Opcode::Parameter, node.is_parameter());
    }
    let last = program.work().last().unwrap();
    assert_eq!(last.opcode, Opcode::Func);
    assert_eq!(last.func, UnaryFunc::Tanh.index());
    assert_eq!(last.rhs, UNUSED);
}

#[test]
fn test_gradients_match_pointer_graph() {
    let a = trainable(0.7);
    let b = trainable(-1.3);
    let c = trainable(2.0);
    let left = (&(&(&a * &b) - &c).tanh() / &c).max(&a.sigmoid());
    let right = (&c.log() * &a).square() + b.relu() + (-&b).exp();
    let f = &left + &right;

    let topo = f.topological_order();
    let mut program = compile(&topo).unwrap();
    let compiled = program.get_result().unwrap();
    program.backward().unwrap();

    assert_relative_eq!(compiled, f.scalar_value().unwrap(), epsilon = 1e-6);
    f.backward_with(&topo).unwrap();
    for p in [&a, &b, &c] {
        assert_relative_eq!(
            grad_at(&program, &topo, p),
            p.grad().to_scalar().unwrap(),
            epsilon = 1e-5
        );
    }
}

#[test]
fn test_max_ties_route_to_right_operand() {
    let a = trainable(1.0);
    let b = trainable(1.0);
    let f = a.max(&b);
    let topo = f.topological_order();
    let mut program = compile(&topo).unwrap();
    program.get_result().unwrap();
    program.backward().unwrap();
    assert_eq!(grad_at(&program, &topo, &a), 0.0);
    assert_eq!(grad_at(&program, &topo, &b), 1.0);
}

#[test]
fn test_matrix_modes_are_rejected() {
    let a = Node::scalar(1.0f32);
    let err = compile(&a.sum().topological_order()).unwrap_err();
    assert!(matches!(err, LaneGradError::UnsupportedOperation(_)));

    let m = Node::from_vec(vec![1.0f32, 2.0], 2, 1).unwrap();
    let err = compile(&m.exp().topological_order()).unwrap_err();
    assert!(matches!(err, LaneGradError::UnsupportedOperation(_)));
}

#[test]
fn test_needs_grad_flows_only_from_marked_parameters() {
    let a = trainable(2.0);
    let b = Node::scalar(5.0f32);
    let c = &a * &b;
    let d = b.exp();
    let e = &c + &d;
    let topo = e.topological_order();
    let mut program = compile(&topo).unwrap();

    let flag = |n: &Node<f32>| program.work()[topo.position(n.id()).unwrap()].needs_grad;
    assert!(flag(&a) && flag(&c) && flag(&e));
    assert!(!flag(&b) && !flag(&d));

    program.get_result().unwrap();
    program.backward().unwrap();
    assert_eq!(grad_at(&program, &topo, &a), 5.0);
    assert_eq!(grad_at(&program, &topo, &b), 0.0);
    assert_eq!(grad_at(&program, &topo, &d), 0.0);
}

#[test]
fn test_dynamic_entries_list_marked_nodes() {
    let x = Node::scalar(1.0f32);
    x.set_variable(true);
    let w = trainable(2.0);
    let k = Node::scalar(3.0f32);
    let f = &(&x * &w) + &k;
    let topo = f.topological_order();
    let program = compile(&topo).unwrap();

    let ids: Vec<u64> = program.dyns().iter().map(|d| d.node_id).collect();
    assert_eq!(ids, vec![x.id(), w.id()]);
    for entry in program.dyns() {
        assert_eq!(topo.nodes()[entry.index].id(), entry.node_id);
    }
}

#[test]
fn test_zero_grad_is_idempotent() {
    let x = trainable(3.0);
    let f = x.square();
    let mut program = compile(&f.topological_order()).unwrap();
    program.get_result().unwrap();
    program.backward().unwrap();
    assert!(program.grads().iter().any(|g| *g != 0.0));
    program.zero_grad();
    assert!(program.grads().iter().all(|g| *g == 0.0));
    program.zero_grad();
    assert!(program.grads().iter().all(|g| *g == 0.0));
}

#[test]
fn test_backward_needs_zero_grad_between_passes() {
    let x = trainable(1.0);
    let f = &(&x * &Node::scalar(2.0)) * &Node::scalar(3.0);
    let topo = f.topological_order();
    let mut program = compile(&topo).unwrap();
    program.get_result().unwrap();

    // the intermediate product keeps its gradient and pushes it again
    let mut seen = Vec::new();
    for _ in 0..3 {
        program.backward().unwrap();
        seen.push(grad_at(&program, &topo, &x));
    }
    assert_eq!(seen, vec![6.0, 18.0, 36.0]);

    program.zero_grad();
    program.backward().unwrap();
    assert_eq!(grad_at(&program, &topo, &x), 6.0);
}

#[test]
fn test_fingerprint_tracks_structure_only() {
    let a = Node::scalar(1.0f32);
    let b = Node::scalar(2.0f32);
    let sum = compile(&(&a + &b).topological_order()).unwrap();
    let product = compile(&(&a * &b).topological_order()).unwrap();
    assert_ne!(sum.fingerprint(), product.fingerprint());

    let c = Node::scalar(10.0f32);
    let d = Node::scalar(20.0f32);
    let other_sum = compile(&(&c + &d).topological_order()).unwrap();
    assert_eq!(sum.fingerprint(), other_sum.fingerprint());
}

#[test]
fn test_convert_to_lanes_keeps_structure() {
    let x = trainable(2.0);
    let f = &x * &x;
    let topo = f.topological_order();
    let program = compile(&topo).unwrap();
    let mut wide: Program<F32x8> = program.convert();

    assert_eq!(wide.fingerprint(), program.fingerprint());
    assert_eq!(wide.len(), program.len());
    assert_eq!(wide.get_result().unwrap(), F32x8::splat(4.0));

    let x_index = topo.position(x.id()).unwrap();
    wide.set_value(x_index, F32x8::from_lane_fn(|l| l as f32));
    let result = wide.get_result().unwrap();
    for l in 0..8 {
        assert_eq!(result[l], (l * l) as f32);
    }
}

#[test]
fn test_sync_variables_rereads_parameters() {
    let x = Node::scalar(1.0f32);
    x.set_variable(true);
    let f = &x + &Node::scalar(1.0f32);
    let topo = f.topological_order();
    let mut program = compile(&topo).unwrap();
    assert_eq!(program.get_result().unwrap(), 2.0);

    x.assign(41.0).unwrap();
    program.sync_variables(&topo).unwrap();
    assert_eq!(program.get_result().unwrap(), 42.0);

    let unrelated = Node::scalar(0.0f32).exp().topological_order();
    assert!(matches!(
        program.sync_variables(&unrelated),
        Err(LaneGradError::ProjectionMismatch { .. })
    ));
}

#[test]
fn test_sync_grads_sums_lanes_into_scalar_graph() {
    let x = trainable(3.0);
    let f = &x * &x;
    let topo = f.topological_order();
    let mut wide: Program<F32x4> = compile(&topo).unwrap().convert();
    wide.get_result().unwrap();
    wide.backward().unwrap();

    wide.sync_grads(&topo).unwrap();
    assert_eq!(x.grad().to_scalar().unwrap(), 24.0);
    wide.sync_grads(&topo).unwrap();
    assert_eq!(x.grad().to_scalar().unwrap(), 48.0);
}
