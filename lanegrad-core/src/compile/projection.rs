//! Moving structured blocks in and out of a compiled program.
//!
//! A [`Projection`] is built once per (block, program) pair and maps every
//! cell of a [`NodeArray`] to the program index of the same node. New inputs
//! or updated weights are then copied straight into the program's work items
//! without recompiling, and outputs or gradients copied back out.

use super::program::Program;
use crate::array::NodeArray;
use crate::element::{broadcast_lanes, fold_lanes, Element};
use crate::error::LaneGradError;
use crate::matrix::Matrix;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Program index of each cell, row-major; `None` for cells that are not
    /// dynamic entries of the program.
    slots: Vec<Option<usize>>,
    rows: usize,
    cols: usize,
    fingerprint: u64,
}

impl Projection {
    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Number of cells that have a program index.
    pub fn mapped(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn check<T: Element>(&self, program: &Program<T>, shape: [usize; 2]) -> Result<(), LaneGradError> {
        if program.fingerprint() != self.fingerprint {
            return Err(LaneGradError::ProjectionMismatch {
                expected: format!("program {:016x}", self.fingerprint),
                actual: format!("program {:016x}", program.fingerprint()),
            });
        }
        if shape != self.shape() {
            return Err(LaneGradError::ProjectionMismatch {
                expected: format!("{}x{} block", self.rows, self.cols),
                actual: format!("{}x{} block", shape[0], shape[1]),
            });
        }
        Ok(())
    }

    fn mapped_slots(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(cell, slot)| slot.map(|index| (cell, index)))
    }
}

/// Maps every cell of `block` to the dynamic entry of `program` compiled from
/// the same node.
pub fn make_projection<S: Element, T: Element>(block: &NodeArray<S>, program: &Program<T>) -> Projection {
    let by_node: HashMap<u64, usize> = program.dyns().iter().map(|d| (d.node_id, d.index)).collect();
    let slots: Vec<Option<usize>> = block.nodes().iter().map(|n| by_node.get(&n.id()).copied()).collect();

    let projection = Projection {
        slots,
        rows: block.rows(),
        cols: block.cols(),
        fingerprint: program.fingerprint(),
    };
    let mapped = projection.mapped();
    if mapped == 0 && !block.is_empty() {
        log::warn!(
            "projection of a {}x{} block maps no cell; mark it variable or needs-grad before compiling",
            block.rows(),
            block.cols()
        );
    } else {
        log::debug!("projection maps {} of {} cells", mapped, block.len());
    }
    projection
}

/// Copies the current value of every mapped cell of `block` into `program`.
pub fn proj_forward<S: Element, T: Element>(
    projection: &Projection,
    block: &NodeArray<S>,
    program: &mut Program<T>,
) -> Result<(), LaneGradError> {
    projection.check(program, block.shape())?;
    for (cell, index) in projection.mapped_slots() {
        let value = block.nodes()[cell].scalar_value()?;
        program.set_value(index, broadcast_lanes(value));
    }
    Ok(())
}

/// Like [`proj_forward`], from plain values broadcast into every lane.
pub fn proj_forward_splat<T: Element>(
    projection: &Projection,
    values: &Matrix<f32>,
    program: &mut Program<T>,
) -> Result<(), LaneGradError> {
    projection.check(program, values.shape())?;
    for (cell, index) in projection.mapped_slots() {
        program.set_value(index, T::splat(values.as_slice()[cell]));
    }
    Ok(())
}

/// Copies value and gradient of every mapped cell out of `program` into
/// `out`, whose cells must be Parameters.
pub fn proj_back<S: Element, T: Element>(
    projection: &Projection,
    program: &Program<T>,
    out: &NodeArray<S>,
) -> Result<(), LaneGradError> {
    projection.check(program, out.shape())?;
    for (cell, index) in projection.mapped_slots() {
        let node = &out.nodes()[cell];
        node.assign(broadcast_lanes(program.work()[index].value))?;
        node.write_data().grad = Matrix::scalar(broadcast_lanes(program.grads()[index]));
    }
    Ok(())
}

/// Adds the program's gradient of every mapped cell into the gradient of
/// the matching cell of `target`. Lanes are folded into a narrower block,
/// so the lane total is preserved.
pub fn proj_back_grad<S: Element, T: Element>(
    projection: &Projection,
    program: &Program<T>,
    target: &NodeArray<S>,
) -> Result<(), LaneGradError> {
    projection.check(program, target.shape())?;
    for (cell, index) in projection.mapped_slots() {
        let g: S = fold_lanes(program.grads()[index]);
        target.nodes()[cell].write_data().grad.add_scalar_assign(g);
    }
    Ok(())
}

#[cfg(test)]
#[path = "projection_test.rs"]
mod tests;
