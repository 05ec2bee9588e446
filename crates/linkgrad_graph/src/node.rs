use crate::{
    config::{is_cosim_enabled, with_config, Flag},
    cosim::{self, CosimPhase},
    function::{Backend, Function},
    hook::{active_hooks, HookRegistry},
    variable::{Variable, WeakVariable},
};
use linkgrad_core::{
    array::NdArray,
    device::DeviceGuard,
    error::{Error, Result},
};
use std::{
    backtrace::Backtrace,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError, RwLock,
    },
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

static NODE_COUNTER: AtomicUsize = AtomicUsize::new(1);

#[inline]
fn next_node_id() -> NodeId {
    NodeId(NODE_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Record of one function application inside the graph.
///
/// Inputs are held strongly and outputs weakly, so the graph is owned from its
/// outputs backward.
pub struct Node {
    id: NodeId,
    label: String,
    rank: usize,
    backend: Backend,
    function: Mutex<Box<dyn Function>>,
    cosim_function: Option<Mutex<Box<dyn Function>>>,
    inputs: RwLock<Option<Vec<Variable>>>,
    outputs: Vec<WeakVariable>,
    local_hooks: HookRegistry,
    stack: Option<Backtrace>,
}

pub(crate) struct NodeParts {
    pub label: String,
    pub rank: usize,
    pub backend: Backend,
    pub function: Box<dyn Function>,
    pub cosim_function: Option<Box<dyn Function>>,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<WeakVariable>,
    pub local_hooks: HookRegistry,
    pub stack: Option<Backtrace>,
}

impl Node {
    pub(crate) fn new(parts: NodeParts) -> Self {
        Self {
            id: next_node_id(),
            label: parts.label,
            rank: parts.rank,
            backend: parts.backend,
            function: Mutex::new(parts.function),
            cosim_function: parts.cosim_function.map(Mutex::new),
            inputs: RwLock::new(Some(parts.inputs)),
            outputs: parts.outputs,
            local_hooks: parts.local_hooks,
            stack: parts.stack,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Call site of the application, captured in debug mode.
    pub fn stack(&self) -> Option<&Backtrace> {
        self.stack.as_ref()
    }

    pub fn local_hooks(&self) -> &HookRegistry {
        &self.local_hooks
    }

    /// Input variables, or `None` once the node has been unchained.
    pub fn inputs(&self) -> Result<Option<Vec<Variable>>> {
        Ok(self.inputs.read().map_err(|_| Error::Lock)?.clone())
    }

    /// Outputs in order; `None` for outputs that no longer exist.
    pub fn outputs(&self) -> Vec<Option<Variable>> {
        self.outputs.iter().map(WeakVariable::upgrade).collect()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_unchained(&self) -> Result<bool> {
        Ok(self.inputs.read().map_err(|_| Error::Lock)?.is_none())
    }

    /// Cuts the node out of the graph: live outputs forget their creator and the
    /// node drops its inputs. Calling it again is a no-op.
    pub fn unchain(&self) -> Result<()> {
        for y in self.outputs.iter().filter_map(WeakVariable::upgrade) {
            let is_creator = y.creator()?.is_some_and(|c| c.id() == self.id);
            if is_creator {
                y.clear_creator()?;
            }
        }
        let inputs = self.inputs.write().map_err(|_| Error::Lock)?.take();
        drop(inputs);
        Ok(())
    }

    /// Runs the backward computation with hooks and, when enabled, the reference
    /// cross-check.
    pub(crate) fn run_backward(&self, in_data: &[NdArray], out_grads: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        let mut function = self.function.lock().map_err(|_| Error::Lock)?;
        let hooks = active_hooks(&self.local_hooks);

        for (_, hook) in hooks.iter() {
            hook.backward_preprocess(&**function, in_data, out_grads)?;
        }

        let _device = DeviceGuard::for_devices(in_data.iter().map(NdArray::device));

        let reference = match &self.cosim_function {
            Some(cosim_function) if is_cosim_enabled() => {
                let mut cosim_function = cosim_function.lock().map_err(|_| Error::Lock)?;
                let x_copies: Vec<NdArray> = in_data.iter().map(NdArray::deep_copy).collect();
                let gy_copies: Vec<Option<NdArray>> =
                    out_grads.iter().map(|g| g.as_ref().map(NdArray::deep_copy)).collect();
                log::debug!("cosim backward {}", self.label);
                Some(with_config(Flag::UseOptimized, false, || {
                    cosim_function.backward(self.backend, &x_copies, &gy_copies)
                })?)
            }
            _ => None,
        };

        let grads = function.backward(self.backend, in_data, out_grads)?;
        assert_eq!(
            grads.len(),
            in_data.len(),
            "{}: backward returned {} gradients for {} inputs",
            self.label,
            grads.len(),
            in_data.len()
        );

        if let Some(reference) = reference {
            cosim::verify(&self.label, CosimPhase::Backward, &grads, &reference)?;
        }

        for (_, hook) in hooks.iter() {
            hook.backward_postprocess(&**function, in_data, out_grads)?;
        }

        Ok(grads)
    }
}

// Releases the history with a work list so deep chains do not exhaust the stack.
impl Drop for Node {
    fn drop(&mut self) {
        let inputs = self.inputs.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        let Some(mut pending) = inputs else {
            return;
        };

        while let Some(x) = pending.pop() {
            let Some(node) = x.take_creator_if_last() else {
                continue;
            };
            if Arc::strong_count(&node) == 1 {
                let inputs = node.inputs.write().unwrap_or_else(PoisonError::into_inner).take();
                pending.extend(inputs.into_iter().flatten());
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("rank", &self.rank)
            .field("backend", &self.backend)
            .field("local_hooks", &self.local_hooks)
            .finish()
    }
}
