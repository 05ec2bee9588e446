#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-value switch deciding whether applying a function records graph edges.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Volatility {
    /// Never build the graph.
    On,
    /// Always build the graph.
    Off,
    /// Follow `Flag::EnableBackprop`.
    #[default]
    Auto,
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Auto => "auto",
        }
    }

    /// `On` dominates `Off`, which dominates `Auto`.
    pub fn aggregate<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = Volatility>,
    {
        let mut result = Self::Auto;
        for flag in flags {
            match flag {
                Self::On => return Self::On,
                Self::Off => result = Self::Off,
                Self::Auto => {}
            }
        }
        result
    }

    pub fn builds_graph(&self, enable_backprop: bool) -> bool {
        match self {
            Self::On => false,
            Self::Off => true,
            Self::Auto => enable_backprop,
        }
    }
}
