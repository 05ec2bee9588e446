use crate::{
    config::{with_config, Config, Flag},
    cosim::{self, CosimPhase},
    hook::{active_hooks, FunctionHook, HookRegistry},
    node::{Node, NodeParts},
    type_check::TypeInfoTuple,
    variable::Variable,
    volatility::Volatility,
};
use linkgrad_core::{
    array::NdArray,
    device::DeviceGuard,
    error::{Error, Result},
};
use std::{backtrace::Backtrace, fmt, sync::Arc};

/// Compute backend chosen for one application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    Accel,
}

impl Backend {
    /// `Accel` as soon as one array lives on an accelerator.
    pub fn of(arrays: &[NdArray]) -> Self {
        if arrays.iter().any(|a| a.device().is_accel()) {
            Self::Accel
        } else {
            Self::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accel => "accel",
        }
    }
}

/// Argument of a function application.
#[derive(Clone, Debug)]
pub enum Input {
    Raw(NdArray),
    Tracked(Variable),
}

impl Input {
    /// Raw arrays become fresh leaves with `Volatility::Auto`.
    pub fn into_variable(self) -> Variable {
        match self {
            Self::Raw(data) => Variable::with_volatility(data, Volatility::Auto),
            Self::Tracked(v) => v,
        }
    }
}

impl From<NdArray> for Input {
    fn from(data: NdArray) -> Self {
        Self::Raw(data)
    }
}

impl From<&NdArray> for Input {
    fn from(data: &NdArray) -> Self {
        Self::Raw(data.clone())
    }
}

impl From<Variable> for Input {
    fn from(v: Variable) -> Self {
        Self::Tracked(v)
    }
}

impl From<&Variable> for Input {
    fn from(v: &Variable) -> Self {
        Self::Tracked(v.clone())
    }
}

/// Result of an application: a single variable, or all of them when there are
/// zero or several outputs.
#[derive(Clone, Debug)]
pub enum FunctionOutput {
    One(Variable),
    Many(Vec<Variable>),
}

impl FunctionOutput {
    fn from_vec(mut outputs: Vec<Variable>) -> Self {
        if outputs.len() == 1 {
            if let Some(y) = outputs.pop() {
                return Self::One(y);
            }
        }
        Self::Many(outputs)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn one(self) -> Result<Variable> {
        match self {
            Self::One(y) => Ok(y),
            Self::Many(v) => Err(Error::InvalidState(format!("expected one output, got {}", v.len()))),
        }
    }

    pub fn into_vec(self) -> Vec<Variable> {
        match self {
            Self::One(y) => vec![y],
            Self::Many(v) => v,
        }
    }
}

pub trait FunctionClone {
    /// Fresh copy of the function and its parameters, for reapplication or
    /// co-simulation.
    fn duplicate(&self) -> Box<dyn Function>;
}

impl<T: Function + Clone> FunctionClone for T {
    fn duplicate(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }
}

/// Differentiable operation on raw arrays.
///
/// Implementors provide `forward_cpu` / `forward_accel` (and the backward
/// counterparts), or override `forward` / `backward` to branch themselves. State
/// saved in `forward` (for example argmax positions) is available to `backward`,
/// since both run on the same instance.
pub trait Function: FunctionClone + Send + 'static {
    fn label(&self) -> &str {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name)
    }

    /// Number of arrays `forward` returns for `n_inputs` inputs.
    fn n_out(&self, _n_inputs: usize) -> usize {
        1
    }

    fn check_type_forward(&self, _in_types: &TypeInfoTuple) -> Result<()> {
        Ok(())
    }

    fn forward(&mut self, backend: Backend, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        match backend {
            Backend::Cpu => self.forward_cpu(inputs),
            Backend::Accel => self.forward_accel(inputs),
        }
    }

    fn forward_cpu(&mut self, _inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Err(Error::UnsupportedBackend {
            function: self.label().to_string(),
            backend: Backend::Cpu.as_str(),
        })
    }

    fn forward_accel(&mut self, _inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        Err(Error::UnsupportedBackend {
            function: self.label().to_string(),
            backend: Backend::Accel.as_str(),
        })
    }

    /// One entry per input; `None` marks an input as non-differentiable.
    fn backward(
        &mut self,
        backend: Backend,
        inputs: &[NdArray],
        grad_outputs: &[Option<NdArray>],
    ) -> Result<Vec<Option<NdArray>>> {
        match backend {
            Backend::Cpu => self.backward_cpu(inputs, grad_outputs),
            Backend::Accel => self.backward_accel(inputs, grad_outputs),
        }
    }

    fn backward_cpu(&mut self, inputs: &[NdArray], _grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        Ok(vec![None; inputs.len()])
    }

    fn backward_accel(&mut self, inputs: &[NdArray], _grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        Ok(vec![None; inputs.len()])
    }

    /// Stochastic functions cannot be compared against a second run.
    fn in_cosim_skip_list(&self) -> bool {
        false
    }
}

/// A function instance waiting to be applied, together with its local hooks.
///
/// Applying consumes the node; use [`duplicate`](Self::duplicate) to apply the same
/// configuration again.
pub struct FunctionNode {
    function: Box<dyn Function>,
    local_hooks: HookRegistry,
}

impl FunctionNode {
    pub fn new<F: Function>(function: F) -> Self {
        Self::from_boxed(Box::new(function))
    }

    pub fn from_boxed(function: Box<dyn Function>) -> Self {
        Self {
            function,
            local_hooks: HookRegistry::new(),
        }
    }

    pub fn function(&self) -> &dyn Function {
        &*self.function
    }

    pub fn label(&self) -> &str {
        self.function.label()
    }

    pub fn local_hooks(&self) -> &HookRegistry {
        &self.local_hooks
    }

    pub fn duplicate(&self) -> Self {
        Self {
            function: self.function.duplicate(),
            local_hooks: self.local_hooks.clone(),
        }
    }

    pub fn add_hook(&mut self, hook: Arc<dyn FunctionHook>) -> Result<()> {
        let name = hook.name().to_string();
        self.add_hook_named(name, hook)
    }

    pub fn add_hook_named(&mut self, name: impl Into<String>, hook: Arc<dyn FunctionHook>) -> Result<()> {
        let name = name.into();
        self.local_hooks.insert(name.clone(), Arc::clone(&hook))?;
        if let Err(e) = hook.added(Some(&*self.function)) {
            self.local_hooks.remove(&name)?;
            return Err(e);
        }
        Ok(())
    }

    pub fn delete_hook(&mut self, name: &str) -> Result<()> {
        let hook = self.local_hooks.remove(name)?;
        hook.deleted(Some(&*self.function))
    }

    /// Applies the function.
    ///
    /// Outputs are wrapped into new variables. Unless the aggregated volatility
    /// rules it out, they are linked to a graph node that keeps the inputs alive.
    ///
    /// # Panics
    ///
    /// Panics if `forward` returns a number of arrays other than `n_out`.
    pub fn apply<I, T>(self, inputs: I) -> Result<FunctionOutput>
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        let FunctionNode {
            mut function,
            local_hooks,
        } = self;
        let config = Config::current();

        let inputs: Vec<Variable> = inputs.into_iter().map(|x| x.into().into_variable()).collect();
        let in_data = inputs.iter().map(Variable::data).collect::<Result<Vec<_>>>()?;
        let label = function.label().to_string();

        let stack = config.debug.then(Backtrace::force_capture);

        if config.type_check {
            function.check_type_forward(&TypeInfoTuple::new(&label, &in_data))?;
        }

        let hooks = active_hooks(&local_hooks);
        for (_, hook) in hooks.iter() {
            hook.forward_preprocess(&*function, &in_data)?;
        }

        let backend = Backend::of(&in_data);
        let (outputs, cosim_function) = {
            let _device = DeviceGuard::for_devices(in_data.iter().map(NdArray::device));

            let reference = if config.cosim && backend == Backend::Cpu && !function.in_cosim_skip_list() {
                let mut duplicate = function.duplicate();
                let copies: Vec<NdArray> = in_data.iter().map(NdArray::deep_copy).collect();
                log::debug!("cosim forward {}", label);
                let outputs = with_config(Flag::UseOptimized, false, || duplicate.forward(backend, &copies))?;
                Some((duplicate, outputs))
            } else {
                None
            };

            let outputs = function.forward(backend, &in_data)?;
            let expected = function.n_out(in_data.len());
            assert_eq!(
                outputs.len(),
                expected,
                "{}: forward returned {} outputs, expected {}",
                label,
                outputs.len(),
                expected
            );

            let cosim_function = match reference {
                Some((duplicate, reference)) => {
                    let primary: Vec<Option<NdArray>> = outputs.iter().cloned().map(Some).collect();
                    let reference: Vec<Option<NdArray>> = reference.into_iter().map(Some).collect();
                    cosim::verify(&label, CosimPhase::Forward, &primary, &reference)?;
                    Some(duplicate)
                }
                None => None,
            };

            (outputs, cosim_function)
        };

        for (_, hook) in hooks.iter() {
            hook.forward_postprocess(&*function, &in_data)?;
        }

        if config.debug && outputs.iter().any(|y| y.dtype().is_float() && y.has_nan()) {
            return Err(Error::Numerical {
                function: label,
                msg: "NaN is detected on forward computation".into(),
            });
        }

        let volatility = Volatility::aggregate(inputs.iter().map(Variable::volatility));
        let ret: Vec<Variable> = outputs
            .into_iter()
            .map(|y| Variable::with_volatility(y, volatility))
            .collect();

        if volatility.builds_graph(config.enable_backprop) {
            let rank = inputs.iter().map(Variable::rank).max().unwrap_or(0);
            let node = Arc::new(Node::new(NodeParts {
                label,
                rank,
                backend,
                function,
                cosim_function,
                inputs,
                outputs: ret.iter().map(Variable::downgrade).collect(),
                local_hooks,
                stack,
            }));
            for y in &ret {
                y.set_creator(&node)?;
            }
        }

        Ok(FunctionOutput::from_vec(ret))
    }
}

impl<F: Function> From<F> for FunctionNode {
    fn from(function: F) -> Self {
        Self::new(function)
    }
}

impl fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode")
            .field("label", &self.label())
            .field("local_hooks", &self.local_hooks)
            .finish()
    }
}

/// Applies a fresh node of `function` to `inputs`.
pub fn apply<F, I, T>(function: F, inputs: I) -> Result<FunctionOutput>
where
    F: Function,
    I: IntoIterator<Item = T>,
    T: Into<Input>,
{
    FunctionNode::new(function).apply(inputs)
}
