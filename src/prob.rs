//! §4.3 / DESIGN NOTES §9: probability channels.
//!
//! A channel is one of the three declared specializations — a constant, a
//! reference into the model's parameter table, or a user closure — rather
//! than a captured function pointer with an opaque `void*` parameter, per the
//! redesign flag in spec §9. `Model` owns the parameter table and hands out
//! stable `ParamId`s.

use crate::agent::Agent;
use crate::model::Model;
use std::sync::Arc;

/// A stable handle into `Model`'s parameter table.
pub type ParamId = usize;

/// A probability (or rate, or day-count) channel evaluated against an
/// agent, the virus/tool instance that owns the channel, and the model.
///
/// `T` is `crate::virus::VirusInstance` or `crate::tool::ToolInstance`.
pub enum Channel<T> {
    /// A fixed value, independent of agent/model state.
    Constant(f64),
    /// A reference to a named entry in `Model`'s parameter table, so that
    /// many viruses/tools can share one tunable value.
    Param(ParamId),
    /// An arbitrary closure. `Send + Sync` so that a `Model` carrying one
    /// can be deep-cloned and moved across threads for replicate
    /// parallelism (the closure itself is treated as read-only seed
    /// material, never mutated after registration).
    Closure(Arc<dyn Fn(&Agent, &T, &Model) -> f64 + Send + Sync>),
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        match self {
            Channel::Constant(v) => Channel::Constant(*v),
            Channel::Param(id) => Channel::Param(*id),
            Channel::Closure(f) => Channel::Closure(Arc::clone(f)),
        }
    }
}

impl<T> Channel<T> {
    /// Evaluates the channel for `agent`/`obj` under `model`.
    pub fn eval(&self, agent: &Agent, obj: &T, model: &Model) -> f64 {
        match self {
            Channel::Constant(v) => *v,
            Channel::Param(id) => model.param(*id),
            Channel::Closure(f) => f(agent, obj, model),
        }
    }
}

impl<T> From<f64> for Channel<T> {
    fn from(v: f64) -> Self {
        Channel::Constant(v)
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Constant(v) => write!(f, "Channel::Constant({v})"),
            Channel::Param(id) => write!(f, "Channel::Param({id})"),
            Channel::Closure(_) => write!(f, "Channel::Closure(..)"),
        }
    }
}
