pub mod connection;

pub use connection::{Activity, ConnectionPhase, Tuning};
