use crate::autograd::graph::TopoOrder;
use crate::element::{broadcast_lanes, fold_lanes, Element};
use crate::error::LaneGradError;
use crate::func::UnaryFunc;
use crate::node::{Node, Op};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Operand slot of an item that does not use it.
pub const UNUSED: u32 = u32::MAX;

/// Instruction of a compiled item. Only modes over 1x1 values compile.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Parameter = 0,
    Add = 1,
    Neg = 2,
    Mul = 3,
    Div = 4,
    Func = 5,
    Max = 6,
}

/// One entry of a compiled program, at the same position as its node in the
/// topological order it was compiled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkItem<T: Element> {
    pub value: T,
    pub lhs: u32,
    pub rhs: u32,
    pub opcode: Opcode,
    /// [`UnaryFunc`] index for `Func` items, 0 otherwise.
    pub func: u8,
    /// Set on needs-grad Parameters and on every item that depends on one.
    pub needs_grad: bool,
}

/// A node marked variable or needs-grad, and where it lives in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynEntry {
    pub index: usize,
    pub node_id: u64,
}

/// A flat, index-addressed copy of a scalar graph.
///
/// Evaluating it walks `work` front to back; the reverse pass walks it back
/// to front writing into `grads`. No node is touched after compilation, so a
/// program can be cloned onto another thread and run there, and converted to
/// a wider lane type to evaluate several examples per pass.
#[derive(Debug, Clone)]
pub struct Program<T: Element = f32> {
    work: Vec<WorkItem<T>>,
    grads: Vec<T>,
    dyns: Vec<DynEntry>,
    fingerprint: u64,
}

/// Compiles a topological order into a [`Program`].
///
/// Fails with `UnsupportedOperation` on any mode other than Parameter, Add,
/// Neg, Mul, Div, Func and Max, and on Parameters whose value is not 1x1.
pub fn compile<T: Element>(topo: &TopoOrder<T>) -> Result<Program<T>, LaneGradError> {
    let mut positions: HashMap<u64, u32> = HashMap::with_capacity(topo.len());
    let mut work: Vec<WorkItem<T>> = Vec::with_capacity(topo.len());
    let mut dyns = Vec::new();

    for (index, node) in topo.iter().enumerate() {
        let guard = node.read_data();
        let operand = |n: &Node<T>| -> Result<u32, LaneGradError> {
            positions.get(&n.id()).copied().ok_or_else(|| {
                LaneGradError::InvalidArgument(format!(
                    "operand {} of node {} precedes it nowhere in the order",
                    n.id(),
                    guard.id
                ))
            })
        };

        let (opcode, lhs, rhs, func) = match &guard.op {
            Op::Parameter => (Opcode::Parameter, UNUSED, UNUSED, 0),
            Op::Add(l, r) => (Opcode::Add, operand(l)?, operand(r)?, 0),
            Op::Neg(l) => (Opcode::Neg, operand(l)?, UNUSED, 0),
            Op::Mul(l, r) => (Opcode::Mul, operand(l)?, operand(r)?, 0),
            Op::Div(l, r) => (Opcode::Div, operand(l)?, operand(r)?, 0),
            Op::Func(l, f) => (Opcode::Func, operand(l)?, UNUSED, f.index()),
            Op::Max(l, r) => (Opcode::Max, operand(l)?, operand(r)?, 0),
            other => {
                return Err(LaneGradError::UnsupportedOperation(format!(
                    "{:?} nodes cannot be compiled",
                    other.mode()
                )))
            }
        };

        let (value, needs_grad) = if opcode == Opcode::Parameter {
            if !guard.value.is_scalar() {
                return Err(LaneGradError::UnsupportedOperation(format!(
                    "parameter {} is {}x{}; only 1x1 parameters compile",
                    guard.id,
                    guard.value.rows(),
                    guard.value.cols()
                )));
            }
            (guard.value[(0, 0)], guard.needs_grad)
        } else {
            let from_operands = [lhs, rhs]
                .iter()
                .any(|&i| i != UNUSED && work[i as usize].needs_grad);
            (T::zero(), from_operands || guard.needs_grad)
        };

        if guard.is_variable || guard.needs_grad {
            dyns.push(DynEntry {
                index,
                node_id: guard.id,
            });
        }
        positions.insert(guard.id, index as u32);
        work.push(WorkItem {
            value,
            lhs,
            rhs,
            opcode,
            func,
            needs_grad,
        });
    }

    let fingerprint = fingerprint_of(&work);
    log::debug!(
        "compiled {} work items, {} dynamic entries, fingerprint {:016x}",
        work.len(),
        dyns.len(),
        fingerprint
    );
    Ok(Program {
        grads: vec![T::zero(); work.len()],
        work,
        dyns,
        fingerprint,
    })
}

fn fingerprint_of<T: Element>(work: &[WorkItem<T>]) -> u64 {
    let mut hasher = DefaultHasher::new();
    work.len().hash(&mut hasher);
    for item in work {
        (item.opcode, item.lhs, item.rhs, item.func).hash(&mut hasher);
    }
    hasher.finish()
}

fn func_of<T: Element>(item: &WorkItem<T>) -> Result<UnaryFunc, LaneGradError> {
    UnaryFunc::from_index(item.func)
        .ok_or_else(|| LaneGradError::InvalidArgument(format!("unknown function index {}", item.func)))
}

impl<T: Element> Program<T> {
    pub fn len(&self) -> usize {
        self.work.len()
    }

    pub fn is_empty(&self) -> bool {
        self.work.is_empty()
    }

    pub fn work(&self) -> &[WorkItem<T>] {
        &self.work
    }

    pub fn grads(&self) -> &[T] {
        &self.grads
    }

    pub fn dyns(&self) -> &[DynEntry] {
        &self.dyns
    }

    /// Hash of the opcode, operands and function of every item. Values are
    /// not part of it.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub(crate) fn set_value(&mut self, index: usize, value: T) {
        self.work[index].value = value;
    }

    #[inline]
    fn value_at(&self, index: u32) -> T {
        self.work[index as usize].value
    }

    /// Recomputes every non-Parameter item from its operands, front to back,
    /// and returns the value of the last item.
    pub fn get_result(&mut self) -> Result<T, LaneGradError> {
        for i in 0..self.work.len() {
            let item = self.work[i];
            let value = match item.opcode {
                Opcode::Parameter => continue,
                Opcode::Add => self.value_at(item.lhs) + self.value_at(item.rhs),
                Opcode::Neg => -self.value_at(item.lhs),
                Opcode::Mul => self.value_at(item.lhs) * self.value_at(item.rhs),
                Opcode::Div => self.value_at(item.lhs) / self.value_at(item.rhs),
                Opcode::Func => func_of(&item)?.apply(self.value_at(item.lhs)),
                Opcode::Max => self.value_at(item.lhs).max_elem(self.value_at(item.rhs)),
            };
            self.work[i].value = value;
        }
        self.work
            .last()
            .map(|item| item.value)
            .ok_or(LaneGradError::EmptyGraph)
    }

    #[inline]
    fn push_grad(&mut self, index: u32, contribution: T) {
        let i = index as usize;
        if self.work[i].needs_grad {
            self.grads[i] += contribution;
        }
    }

    /// Reverse pass over the values left by the last [`Program::get_result`].
    ///
    /// Seeds the last item's gradient with one and only writes gradients of
    /// items that lead to a needs-grad Parameter. Intermediate gradients are
    /// not reset, so call [`Program::zero_grad`] between passes.
    pub fn backward(&mut self) -> Result<(), LaneGradError> {
        let last = self.grads.len().checked_sub(1).ok_or(LaneGradError::EmptyGraph)?;
        self.grads[last] = T::one();

        for i in (0..self.work.len()).rev() {
            let item = self.work[i];
            if !item.needs_grad || item.opcode == Opcode::Parameter {
                continue;
            }
            let g = self.grads[i];
            match item.opcode {
                Opcode::Parameter => {}
                Opcode::Add => {
                    self.push_grad(item.lhs, g);
                    self.push_grad(item.rhs, g);
                }
                Opcode::Neg => self.push_grad(item.lhs, -g),
                Opcode::Mul => {
                    let (l, r) = (self.value_at(item.lhs), self.value_at(item.rhs));
                    self.push_grad(item.lhs, g * r);
                    self.push_grad(item.rhs, g * l);
                }
                Opcode::Div => {
                    let (l, r) = (self.value_at(item.lhs), self.value_at(item.rhs));
                    self.push_grad(item.lhs, g / r);
                    self.push_grad(item.rhs, -g * l / (r * r));
                }
                Opcode::Func => {
                    let x = self.value_at(item.lhs);
                    self.push_grad(item.lhs, g * func_of(&item)?.derivative(x));
                }
                Opcode::Max => {
                    // ties go to the right-hand side
                    let left = self.value_at(item.rhs).lt_mask(self.value_at(item.lhs));
                    self.push_grad(item.lhs, g * left);
                    self.push_grad(item.rhs, g * (T::one() - left));
                }
            }
        }
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        self.grads.iter_mut().for_each(|g| *g = T::zero());
    }

    /// The same program over another element type. Values are broadcast
    /// lane-wise, gradients start at zero and the fingerprint is kept.
    pub fn convert<U: Element>(&self) -> Program<U> {
        Program {
            work: self
                .work
                .iter()
                .map(|item| WorkItem {
                    value: broadcast_lanes(item.value),
                    lhs: item.lhs,
                    rhs: item.rhs,
                    opcode: item.opcode,
                    func: item.func,
                    needs_grad: item.needs_grad,
                })
                .collect(),
            grads: vec![U::zero(); self.work.len()],
            dyns: self.dyns.clone(),
            fingerprint: self.fingerprint,
        }
    }

    fn dyn_node<'a, S: Element>(
        &self,
        topo: &'a TopoOrder<S>,
        entry: &DynEntry,
    ) -> Result<&'a Node<S>, LaneGradError> {
        match topo.nodes().get(entry.index) {
            Some(node) if node.id() == entry.node_id => Ok(node),
            other => Err(LaneGradError::ProjectionMismatch {
                expected: format!("node {} at position {}", entry.node_id, entry.index),
                actual: match other {
                    Some(node) => format!("node {}", node.id()),
                    None => format!("an order of {} nodes", topo.len()),
                },
            }),
        }
    }

    /// Re-reads the value of every dynamic Parameter from the graph the
    /// program was compiled from.
    pub fn sync_variables<S: Element>(&mut self, topo: &TopoOrder<S>) -> Result<(), LaneGradError> {
        for entry in self.dyns.clone() {
            if self.work[entry.index].opcode != Opcode::Parameter {
                continue;
            }
            let node = self.dyn_node(topo, &entry)?;
            let value = node.scalar_value()?;
            self.work[entry.index].value = broadcast_lanes(value);
        }
        Ok(())
    }

    /// Adds the program's gradients into the needs-grad Parameters of the
    /// graph it was compiled from, folding lanes into a narrower graph.
    pub fn sync_grads<S: Element>(&self, topo: &TopoOrder<S>) -> Result<(), LaneGradError> {
        for entry in &self.dyns {
            let item = &self.work[entry.index];
            if item.opcode != Opcode::Parameter || !item.needs_grad {
                continue;
            }
            let node = self.dyn_node(topo, entry)?;
            let g: S = fold_lanes(self.grads[entry.index]);
            node.write_data().grad.add_scalar_assign(g);
        }
        Ok(())
    }
}

impl<T: Element> TopoOrder<T> {
    pub fn compile(&self) -> Result<Program<T>, LaneGradError> {
        compile(self)
    }
}

#[cfg(test)]
#[path = "program_test.rs"]
mod tests;
