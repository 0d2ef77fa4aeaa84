//! Protocol method model and the per-revision method catalogues.
//!
//! [`spec`] holds the static tables (one per AMQP revision); [`method`]
//! builds, encodes and decodes methods against whichever table the
//! connection was configured with.

pub mod method;
pub mod spec;

pub use method::{Argument, Method, MethodKind};
pub use spec::{ArgDefault, ArgSpec, MethodSpec, ProtocolSpec, ProtocolVersion};
