//! # Lane-parallel training of a small classifier
//!
//! Builds a softmax classifier over two features out of scalar nodes,
//! compiles it once, widens the program to 8 lanes and trains it with one
//! example per lane.
//!
//! ## Steps
//! 1.  **Model as a scalar graph**: `NodeArray` blocks for weights, input and
//!     one-hot label; loss `-(log_softmax(W x) . label)`.
//! 2.  **Compilation**: `compile` then `convert::<F32x8>()`.
//! 3.  **Projections**: weights, inputs, labels and scores move in and out of
//!     the program without recompiling.
//! 4.  **Update**: lane gradients are summed into the weights, accumulated,
//!     and applied by `SgdOptimizer`.
//!
//! ## Running
//! `cargo run --example lane_parallel_training`

use lanegrad_core::{
    compile, make_projection, proj_back, proj_back_grad, proj_forward, F32x8, LaneGradError, NodeArray,
    Optimizer, Program, SgdConfig, SgdOptimizer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LANES: usize = 8;

/// A point near (-1, -1) for class 0 or near (1, 1) for class 1.
fn sample(rng: &mut StdRng) -> ([f32; 2], usize) {
    let class = rng.gen_range(0..2);
    let center = if class == 0 { -1.0 } else { 1.0 };
    let x = [center + rng.gen_range(-0.8..0.8), center + rng.gen_range(-0.8..0.8)];
    (x, class)
}

fn main() -> Result<(), LaneGradError> {
    let mut rng = StdRng::seed_from_u64(2024);

    // features are (x0, x1, 1) so the last weight column is the bias
    let weights = NodeArray::<f32>::new(2, 3);
    weights.randomize_with(&mut rng)?;
    weights.set_needs_grad();
    let input = NodeArray::<f32>::new(3, 1);
    input.set_variable();
    let label = NodeArray::<f32>::new(2, 1);
    label.set_variable();

    let scores = weights.matmul(&input)?.log_softmax()?;
    scores.set_variable();
    let loss = -&scores.dot(&label)?.sum()?;

    let topo = loss.topological_order();
    let mut program: Program<F32x8> = compile(&topo)?.convert();
    let weight_proj = make_projection(&weights, &program);
    let input_proj = make_projection(&input, &program);
    let label_proj = make_projection(&label, &program);
    let score_proj = make_projection(&scores, &program);
    println!("compiled {} work items", program.len());

    let mut optimizer = SgdOptimizer::new(
        weights.parameters(),
        SgdConfig {
            lr: 0.5,
            momentum: 0.5,
            batch_size: LANES,
        },
    )?;

    let lane_input = NodeArray::<F32x8>::new(3, 1);
    let lane_label = NodeArray::<F32x8>::new(2, 1);
    let lane_scores = NodeArray::<F32x8>::new(2, 1);

    for step in 0..40 {
        let mut classes = [0usize; LANES];
        for (lane, class_slot) in classes.iter_mut().enumerate() {
            let (x, class) = sample(&mut rng);
            *class_slot = class;
            lane_input.set_lane(0, 0, lane, x[0])?;
            lane_input.set_lane(1, 0, lane, x[1])?;
            lane_input.set_lane(2, 0, lane, 1.0)?;
            lane_label.set_lane(0, 0, lane, if class == 0 { 1.0 } else { 0.0 })?;
            lane_label.set_lane(1, 0, lane, if class == 1 { 1.0 } else { 0.0 })?;
        }

        proj_forward(&weight_proj, &weights, &mut program)?;
        proj_forward(&input_proj, &lane_input, &mut program)?;
        proj_forward(&label_proj, &lane_label, &mut program)?;
        let losses = program.get_result()?;
        program.zero_grad();
        program.backward()?;

        proj_back_grad(&weight_proj, &program, &weights)?;
        weights.accum_grads()?;
        optimizer.step()?;
        optimizer.zero_grad();

        if step % 10 == 9 {
            proj_back(&score_proj, &program, &lane_scores)?;
            let mut correct = 0;
            for (lane, class) in classes.iter().enumerate() {
                if lane_scores.get_unparallel(lane)?.max_value_index_of_column(0)? == *class {
                    correct += 1;
                }
            }
            println!(
                "step {:>3}: mean loss {:.4}, {}/{} correct",
                step + 1,
                losses.sum() / LANES as f32,
                correct,
                LANES
            );
        }
    }

    println!("weights:\n{}", weights.values()?);
    Ok(())
}
