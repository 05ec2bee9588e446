use crate::{node::Node, volatility::Volatility};
use linkgrad_core::{
    array::NdArray,
    device::Device,
    dtype::DType,
    error::{Error, Result},
};
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock, Weak,
    },
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

static VARIABLE_COUNTER: AtomicUsize = AtomicUsize::new(1);

#[inline]
fn next_variable_id() -> VariableId {
    VariableId(VARIABLE_COUNTER.fetch_add(1, Ordering::Relaxed))
}

struct VariableInner {
    id: VariableId,
    data: RwLock<NdArray>,
    grad: RwLock<Option<NdArray>>,
    creator: RwLock<Option<Arc<Node>>>,
    rank: AtomicUsize,
    volatility: RwLock<Volatility>,
    name: RwLock<Option<String>>,
}

/// Graph-tracked value.
///
/// A cheap handle: clones share the same data, gradient and creator. The creator edge
/// is strong, so a node lives as long as any of its outputs.
#[derive(Clone)]
pub struct Variable(Arc<VariableInner>);

/// Non-owning handle, as held by a node for its outputs.
#[derive(Clone)]
pub struct WeakVariable(Weak<VariableInner>);

impl WeakVariable {
    pub fn upgrade(&self) -> Option<Variable> {
        self.0.upgrade().map(Variable)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Variable {
    pub fn new(data: NdArray) -> Self {
        Self::with_volatility(data, Volatility::Auto)
    }

    pub fn with_volatility(data: NdArray, volatility: Volatility) -> Self {
        Self(Arc::new(VariableInner {
            id: next_variable_id(),
            data: RwLock::new(data),
            grad: RwLock::new(None),
            creator: RwLock::new(None),
            rank: AtomicUsize::new(0),
            volatility: RwLock::new(volatility),
            name: RwLock::new(None),
        }))
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        if let Ok(mut slot) = self.0.name.write() {
            *slot = Some(name.into());
        }
        self
    }

    pub fn id(&self) -> VariableId {
        self.0.id
    }

    pub fn name(&self) -> Option<String> {
        self.0.name.read().ok().and_then(|name| name.clone())
    }

    pub fn downgrade(&self) -> WeakVariable {
        WeakVariable(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // data

    pub fn data(&self) -> Result<NdArray> {
        Ok(self.0.data.read().map_err(|_| Error::Lock)?.clone())
    }

    pub fn set_data(&self, data: NdArray) -> Result<()> {
        *self.0.data.write().map_err(|_| Error::Lock)? = data;
        Ok(())
    }

    pub fn shape(&self) -> Result<Vec<usize>> {
        Ok(self.0.data.read().map_err(|_| Error::Lock)?.shape().to_vec())
    }

    pub fn dtype(&self) -> Result<DType> {
        Ok(self.0.data.read().map_err(|_| Error::Lock)?.dtype())
    }

    pub fn device(&self) -> Result<Device> {
        Ok(self.0.data.read().map_err(|_| Error::Lock)?.device())
    }

    // grad

    pub fn grad(&self) -> Result<Option<NdArray>> {
        Ok(self.0.grad.read().map_err(|_| Error::Lock)?.clone())
    }

    pub fn set_grad(&self, grad: Option<NdArray>) -> Result<()> {
        if let Some(g) = &grad {
            self.check_grad_shape(g)?;
        }
        *self.0.grad.write().map_err(|_| Error::Lock)? = grad;
        Ok(())
    }

    pub fn clear_grad(&self) -> Result<()> {
        *self.0.grad.write().map_err(|_| Error::Lock)? = None;
        Ok(())
    }

    /// Adds `grad` to the stored gradient, or stores it if there is none yet.
    pub fn accumulate_grad(&self, grad: NdArray) -> Result<()> {
        self.check_grad_shape(&grad)?;
        let mut slot = self.0.grad.write().map_err(|_| Error::Lock)?;
        *slot = Some(match slot.take() {
            Some(prev) => prev.add(&grad)?,
            None => grad,
        });
        Ok(())
    }

    fn check_grad_shape(&self, grad: &NdArray) -> Result<()> {
        let data = self.0.data.read().map_err(|_| Error::Lock)?;
        if grad.shape() != data.shape() {
            return Err(Error::ShapeMismatch {
                expected: data.shape().to_vec(),
                got: grad.shape().to_vec(),
                msg: "gradient must match the data shape".into(),
            });
        }
        Ok(())
    }

    // graph

    pub fn creator(&self) -> Result<Option<Arc<Node>>> {
        Ok(self.0.creator.read().map_err(|_| Error::Lock)?.clone())
    }

    /// Makes `node` the creator; the rank becomes one above the node's.
    pub fn set_creator(&self, node: &Arc<Node>) -> Result<()> {
        *self.0.creator.write().map_err(|_| Error::Lock)? = Some(Arc::clone(node));
        self.0.rank.store(node.rank() + 1, Ordering::Relaxed);
        Ok(())
    }

    pub fn clear_creator(&self) -> Result<()> {
        let prev = self.0.creator.write().map_err(|_| Error::Lock)?.take();
        // the node may own the last handle to other values; drop it outside the lock
        drop(prev);
        Ok(())
    }

    /// Detaches the creator when this is the last handle to the variable.
    pub(crate) fn take_creator_if_last(&self) -> Option<Arc<Node>> {
        if Arc::strong_count(&self.0) != 1 {
            return None;
        }
        self.0.creator.write().ok().and_then(|mut creator| creator.take())
    }

    pub fn rank(&self) -> usize {
        self.0.rank.load(Ordering::Relaxed)
    }

    pub fn volatility(&self) -> Volatility {
        self.0.volatility.read().map(|v| *v).unwrap_or_default()
    }

    pub fn set_volatility(&self, volatility: Volatility) -> Result<()> {
        *self.0.volatility.write().map_err(|_| Error::Lock)? = volatility;
        Ok(())
    }
}

impl From<NdArray> for Variable {
    fn from(data: NdArray) -> Self {
        Variable::new(data)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Variable");
        s.field("id", &self.0.id);
        if let Some(name) = self.name() {
            s.field("name", &name);
        }
        if let Ok(data) = self.0.data.read() {
            s.field("shape", &data.shape()).field("dtype", &data.dtype());
        }
        s.field("rank", &self.rank()).field("volatility", &self.volatility()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grads_accumulate() -> Result<()> {
        let x = Variable::new(NdArray::from_vec(vec![1.0f32, 2.0], &[2])?);
        assert!(x.grad()?.is_none());
        x.accumulate_grad(NdArray::from_vec(vec![1.0f32, 1.0], &[2])?)?;
        x.accumulate_grad(NdArray::from_vec(vec![0.5f32, 2.0], &[2])?)?;
        assert_eq!(x.grad()?.map(|g| g.to_f64_vec()), Some(vec![1.5, 3.0]));
        Ok(())
    }

    #[test]
    fn grad_shape_is_checked() -> Result<()> {
        let x = Variable::new(NdArray::zeros(&[2, 2], DType::F32));
        assert!(matches!(
            x.accumulate_grad(NdArray::zeros(&[4], DType::F32)),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(x.set_grad(Some(NdArray::zeros(&[3], DType::F32))).is_err());
        Ok(())
    }

    #[test]
    fn weak_handle_dies_with_last_strong() -> Result<()> {
        let x = Variable::new(NdArray::zeros(&[1], DType::F64)).with_name("x");
        assert_eq!(x.name().as_deref(), Some("x"));
        let weak = x.downgrade();
        let y = x.clone();
        drop(x);
        assert!(weak.upgrade().is_some_and(|v| v.ptr_eq(&y)));
        drop(y);
        assert!(!weak.is_alive());
        Ok(())
    }
}
