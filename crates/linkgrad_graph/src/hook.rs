use crate::function::Function;
use linkgrad_core::{
    array::NdArray,
    error::{Error, Result},
};
use std::{cell::RefCell, fmt, marker::PhantomData, sync::Arc};

/// Callbacks around forward and backward computation of functions.
///
/// A hook is registered under a name, either globally for the current thread
/// ([`install_hook`]) or on a single function ([`FunctionNode::add_hook`]). Every
/// callback has a no-op default; returning an error aborts the computation.
///
/// [`FunctionNode::add_hook`]: crate::function::FunctionNode::add_hook
pub trait FunctionHook: Send + Sync {
    fn name(&self) -> &str {
        "FunctionHook"
    }

    /// Called on registration. `function` is `None` for global registration.
    fn added(&self, _function: Option<&dyn Function>) -> Result<()> {
        Ok(())
    }

    /// Called on removal. `function` is `None` for global registration.
    fn deleted(&self, _function: Option<&dyn Function>) -> Result<()> {
        Ok(())
    }

    fn forward_preprocess(&self, _function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        Ok(())
    }

    fn forward_postprocess(&self, _function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        Ok(())
    }

    fn backward_preprocess(
        &self,
        _function: &dyn Function,
        _in_data: &[NdArray],
        _out_grad: &[Option<NdArray>],
    ) -> Result<()> {
        Ok(())
    }

    fn backward_postprocess(
        &self,
        _function: &dyn Function,
        _in_data: &[NdArray],
        _out_grad: &[Option<NdArray>],
    ) -> Result<()> {
        Ok(())
    }
}

/// Insertion-ordered, name-unique collection of hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<(String, Arc<dyn FunctionHook>)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FunctionHook>> {
        self.position(name).map(|i| &self.hooks[i].1)
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn FunctionHook>)> {
        self.hooks.iter().map(|(name, hook)| (name.as_str(), hook))
    }

    pub fn insert(&mut self, name: impl Into<String>, hook: Arc<dyn FunctionHook>) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(Error::DuplicateRegistration { name });
        }
        self.hooks.push((name, hook));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn FunctionHook>> {
        let index = self.position(name).ok_or_else(|| Error::MissingRegistration { name: name.to_string() })?;
        Ok(self.hooks.remove(index).1)
    }

    /// Overlays `local` on `self`: a local entry replaces the global one with the same
    /// name in place, and the remaining local entries are appended in order.
    pub fn merged_with(&self, local: &HookRegistry) -> HookRegistry {
        let mut merged = self.clone();
        for (name, hook) in &local.hooks {
            match merged.position(name) {
                Some(index) => merged.hooks[index].1 = Arc::clone(hook),
                None => merged.hooks.push((name.clone(), Arc::clone(hook))),
            }
        }
        merged
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.hooks.iter().position(|(n, _)| n == name)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

thread_local! {
    static GLOBAL_HOOKS: RefCell<HookRegistry> = RefCell::new(HookRegistry::new());
}

/// Snapshot of the hooks installed on the current thread.
pub fn global_hooks() -> HookRegistry {
    GLOBAL_HOOKS.with(|hooks| hooks.borrow().clone())
}

/// Hooks that apply to a function carrying `local` hooks.
pub fn active_hooks(local: &HookRegistry) -> HookRegistry {
    GLOBAL_HOOKS.with(|hooks| hooks.borrow().merged_with(local))
}

/// Keeps a global hook installed until dropped.
#[must_use = "the hook is removed as soon as the guard is dropped"]
pub struct HookGuard {
    name: String,
    _not_send: PhantomData<*const ()>,
}

impl HookGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let removed = GLOBAL_HOOKS.with(|hooks| hooks.borrow_mut().remove(&self.name));
        match removed {
            Ok(hook) => {
                if let Err(e) = hook.deleted(None) {
                    log::warn!("hook {} failed on removal: {}", self.name, e);
                }
                log::debug!("uninstalled function hook {}", self.name);
            }
            Err(e) => log::warn!("{}", e),
        }
    }
}

pub fn install_hook(hook: Arc<dyn FunctionHook>) -> Result<HookGuard> {
    let name = hook.name().to_string();
    install_hook_named(name, hook)
}

pub fn install_hook_named(name: impl Into<String>, hook: Arc<dyn FunctionHook>) -> Result<HookGuard> {
    let name = name.into();
    GLOBAL_HOOKS.with(|hooks| hooks.borrow_mut().insert(name.clone(), Arc::clone(&hook)))?;
    let guard = HookGuard {
        name,
        _not_send: PhantomData,
    };
    hook.added(None)?;
    log::debug!("installed function hook {}", guard.name);
    Ok(guard)
}

/// Runs `f` with `hook` installed globally.
pub fn with_hook<R>(hook: Arc<dyn FunctionHook>, f: impl FnOnce() -> R) -> Result<R> {
    let _guard = install_hook(hook)?;
    Ok(f())
}
