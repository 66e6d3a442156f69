//! Command framework.
//!
//! Commands are declared with [`CommandBuilder`], compiled into immutable
//! [`CommandDescriptor`]s, stored in a grouped [`CommandRegistry`] and run
//! through the [`Executor`] by a [`Dispatcher`].

pub mod binder;
pub mod context;
pub mod descriptor;
pub mod dispatch;
pub mod executor;
pub mod param;
pub mod parser;
pub mod registry;

pub use context::{CommandContext, Invocation, Output};
pub use descriptor::{CommandBuilder, CommandDescriptor, Handler, Reply};
pub use dispatch::Dispatcher;
pub use executor::{CallEnv, ExecutionResult, Executor};
pub use param::{ArgHint, Arity, Param, ParameterSpec, TypeHint, Value};
pub use registry::{CommandRegistry, PatternSet};
