//! Domain and wire model module declarations.

pub mod descriptor;
pub mod execution;
pub mod request;
pub mod result;
pub mod stop;
