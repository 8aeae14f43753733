pub mod async_impl;
pub mod builder;
pub mod callable;
pub mod context;
pub mod decorated;
pub mod descriptor;
pub mod error;
pub mod sync_impl;
pub mod telemetry;
