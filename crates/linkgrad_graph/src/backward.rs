use crate::{
    config::no_backprop_mode,
    node::{Node, NodeId},
    variable::Variable,
};
use linkgrad_core::{array::NdArray, error::Result};
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashSet},
    sync::Arc,
};

/// Heap entry: highest rank first, then first discovered.
struct Candidate {
    rank: usize,
    seq: Reverse<usize>,
    node: Arc<Node>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.rank, self.seq).cmp(&(other.rank, other.seq))
    }
}

#[derive(Default)]
struct Frontier {
    heap: BinaryHeap<Candidate>,
    seen: HashSet<NodeId>,
    seq: usize,
}

impl Frontier {
    fn push(&mut self, node: Arc<Node>) {
        if self.seen.insert(node.id()) {
            self.heap.push(Candidate {
                rank: node.rank(),
                seq: Reverse(self.seq),
                node,
            });
            self.seq += 1;
        }
    }

    fn pop(&mut self) -> Option<Arc<Node>> {
        self.heap.pop().map(|c| c.node)
    }
}

impl Variable {
    /// Runs backpropagation from this variable.
    ///
    /// A single-element variable without a gradient is seeded with one. Gradients
    /// are summed into every reachable input. Unless `retain_grad`, gradients of
    /// intermediate variables are released once consumed; the root keeps its own.
    pub fn backward(&self, retain_grad: bool) -> Result<()> {
        let Some(creator) = self.creator()? else {
            return Ok(());
        };

        if self.grad()?.is_none() {
            let data = self.data()?;
            if data.size() == 1 {
                self.set_grad(Some(data.ones_like()))?;
            }
        }

        let _no_backprop = no_backprop_mode();

        let mut frontier = Frontier::default();
        frontier.push(creator);

        while let Some(node) = frontier.pop() {
            let Some(inputs) = node.inputs()? else {
                continue;
            };
            let outputs = node.outputs();
            let out_grads = outputs
                .iter()
                .map(|y| match y {
                    Some(y) => y.grad(),
                    None => Ok(None),
                })
                .collect::<Result<Vec<Option<NdArray>>>>()?;
            let in_data = inputs.iter().map(Variable::data).collect::<Result<Vec<_>>>()?;

            log::trace!("backward {} (rank {})", node.label(), node.rank());
            let grads = node.run_backward(&in_data, &out_grads)?;

            if !retain_grad {
                for y in outputs.iter().flatten().filter(|y| !y.ptr_eq(self)) {
                    y.clear_grad()?;
                }
            }

            for (x, gx) in inputs.iter().zip(grads) {
                let Some(gx) = gx else {
                    continue;
                };
                x.accumulate_grad(gx)?;
                if let Some(creator) = x.creator()? {
                    frontier.push(creator);
                }
            }
        }

        Ok(())
    }

    /// Unchains every node reachable backward from this variable, including its
    /// own creator.
    pub fn unchain_backward(&self) -> Result<()> {
        let Some(creator) = self.creator()? else {
            return Ok(());
        };

        let mut seen = HashSet::from([creator.id()]);
        let mut stack = vec![creator];
        while let Some(node) = stack.pop() {
            if let Some(inputs) = node.inputs()? {
                for x in &inputs {
                    if let Some(c) = x.creator()? {
                        if seen.insert(c.id()) {
                            stack.push(c);
                        }
                    }
                }
            }
            node.unchain()?;
        }

        Ok(())
    }
}
