use lanegrad_core::{Matrix, Node, NodeArray};

// Shared by several test crates; each one uses a different subset.
#[allow(dead_code)]
pub fn param(data: Vec<f32>, rows: usize, cols: usize) -> Node<f32> {
    Node::from_vec(data, rows, cols).expect("Test parameter creation failed")
}

/// A scalar Parameter that receives gradients.
#[allow(dead_code)]
pub fn trainable(value: f32) -> Node<f32> {
    let node = Node::scalar(value);
    node.set_needs_grad(true);
    node
}

#[allow(dead_code)]
pub fn block(data: Vec<f32>, rows: usize, cols: usize) -> NodeArray<f32> {
    let values = Matrix::from_vec(data, rows, cols).expect("Test block creation failed");
    NodeArray::from_values(&values)
}
