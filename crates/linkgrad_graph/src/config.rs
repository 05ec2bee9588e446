use std::{cell::Cell, marker::PhantomData, sync::LazyLock};

/// Runtime switches consulted while applying functions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Build the backward graph for volatility-`Auto` values.
    EnableBackprop,
    /// Run `check_type_forward` before computing.
    TypeCheck,
    /// Capture call-site backtraces and scan outputs for NaN.
    Debug,
    /// Use the optimized kernels on host arrays.
    UseOptimized,
    /// Cross-check optimized results against the reference kernels.
    Cosim,
}

impl Flag {
    pub const ALL: [Flag; 5] = [
        Flag::EnableBackprop,
        Flag::TypeCheck,
        Flag::Debug,
        Flag::UseOptimized,
        Flag::Cosim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnableBackprop => "enable_backprop",
            Self::TypeCheck => "type_check",
            Self::Debug => "debug",
            Self::UseOptimized => "use_optimized",
            Self::Cosim => "cosim",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Process-wide defaults, read once from the environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalConfig {
    pub enable_backprop: bool,
    pub type_check: bool,
    pub debug: bool,
    pub use_optimized: bool,
    pub cosim: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enable_backprop: true,
            type_check: true,
            debug: false,
            use_optimized: true,
            cosim: false,
        }
    }
}

impl GlobalConfig {
    pub fn get() -> &'static GlobalConfig {
        &GLOBAL_CONFIG
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: bool| std::env::var(key).ok().and_then(|v| parse_flag(&v)).unwrap_or(default);

        Self {
            enable_backprop: defaults.enable_backprop,
            type_check: read("LINKGRAD_TYPE_CHECK", defaults.type_check),
            debug: read("LINKGRAD_DEBUG", defaults.debug),
            use_optimized: read("LINKGRAD_USE_OPTIMIZED", defaults.use_optimized),
            cosim: read("LINKGRAD_COSIM", defaults.cosim),
        }
    }

    pub fn value(&self, flag: Flag) -> bool {
        match flag {
            Flag::EnableBackprop => self.enable_backprop,
            Flag::TypeCheck => self.type_check,
            Flag::Debug => self.debug,
            Flag::UseOptimized => self.use_optimized,
            Flag::Cosim => self.cosim,
        }
    }
}

/// Parses `1/true/on` and `0/false/off`, ignoring case.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

static GLOBAL_CONFIG: LazyLock<GlobalConfig> = LazyLock::new(|| {
    let config = GlobalConfig::from_env();
    log::debug!("linkgrad global config: {:?}", config);
    config
});

thread_local! {
    static OVERLAY: Cell<[Option<bool>; 5]> = const { Cell::new([None; 5]) };
}

fn overlay(flag: Flag) -> Option<bool> {
    OVERLAY.with(|o| o.get()[flag.slot()])
}

fn set_overlay(flag: Flag, value: Option<bool>) {
    OVERLAY.with(|o| {
        let mut slots = o.get();
        slots[flag.slot()] = value;
        o.set(slots);
    });
}

pub fn get_config(flag: Flag) -> bool {
    overlay(flag).unwrap_or_else(|| GlobalConfig::get().value(flag))
}

/// Snapshot of every flag as seen by the current thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub enable_backprop: bool,
    pub type_check: bool,
    pub debug: bool,
    pub use_optimized: bool,
    pub cosim: bool,
}

impl Config {
    pub fn current() -> Self {
        Self {
            enable_backprop: get_config(Flag::EnableBackprop),
            type_check: get_config(Flag::TypeCheck),
            debug: get_config(Flag::Debug),
            use_optimized: get_config(Flag::UseOptimized),
            cosim: get_config(Flag::Cosim),
        }
    }
}

/// Overrides one flag on this thread until dropped, then restores the previous
/// value. Not `Send`: the override belongs to the thread that made it.
#[must_use = "the override ends as soon as the guard is dropped"]
pub struct ConfigGuard {
    flag: Flag,
    prev: Option<bool>,
    _not_send: PhantomData<*const ()>,
}

impl ConfigGuard {
    pub fn new(flag: Flag, value: bool) -> Self {
        let prev = overlay(flag);
        set_overlay(flag, Some(value));
        Self {
            flag,
            prev,
            _not_send: PhantomData,
        }
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        set_overlay(self.flag, self.prev);
    }
}

pub fn using_config(flag: Flag, value: bool) -> ConfigGuard {
    ConfigGuard::new(flag, value)
}

pub fn with_config<R>(flag: Flag, value: bool, f: impl FnOnce() -> R) -> R {
    let _guard = using_config(flag, value);
    f()
}

pub fn no_backprop_mode() -> ConfigGuard {
    ConfigGuard::new(Flag::EnableBackprop, false)
}

pub fn force_backprop_mode() -> ConfigGuard {
    ConfigGuard::new(Flag::EnableBackprop, true)
}

pub fn is_debug() -> bool {
    get_config(Flag::Debug)
}

pub fn is_backprop_enabled() -> bool {
    get_config(Flag::EnableBackprop)
}

pub fn is_type_check_enabled() -> bool {
    get_config(Flag::TypeCheck)
}

pub fn is_optimized_enabled() -> bool {
    get_config(Flag::UseOptimized)
}

pub fn is_cosim_enabled() -> bool {
    get_config(Flag::Cosim)
}

/// Disables graph construction in the current lexical scope.
/// When the scope ends, the previous setting is restored.
///
/// ### Example
/// ```rust
/// linkgrad_graph::no_backprop!();
/// assert!(!linkgrad_graph::config::is_backprop_enabled());
/// ```
#[macro_export]
macro_rules! no_backprop {
    () => {
        let _backprop_guard = $crate::config::no_backprop_mode();
    };
}

/// Forces graph construction in the current lexical scope.
/// When the scope ends, the previous setting is restored.
#[macro_export]
macro_rules! force_backprop {
    () => {
        let _backprop_guard = $crate::config::force_backprop_mode();
    };
}
