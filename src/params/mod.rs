//! Command argument binding
//!
//! Parameter declarations are compiled into cutter pipelines at registration
//! ([`resolve`]); the [`binder`] runs a pipeline against each inbound command.

pub mod binder;
pub mod cutter;
pub mod duration;
pub mod error;
pub mod resolve;
pub mod target;
pub mod tokens;
pub mod value;

pub use binder::CompiledHandler;
pub use cutter::{Cut, CutContext, Cutter, Scalar};
pub use duration::{format_duration, parse_duration, parse_duration_from_text, DurationError};
pub use error::{InvalidArguments, ParamsError};
pub use resolve::{resolve_param, resolve_params, CompiledParam, ParamShape, ParamSpec};
pub use target::find_target;
pub use tokens::TokenSeq;
pub use value::{ArgValue, BoundArgs, DefaultValue};
