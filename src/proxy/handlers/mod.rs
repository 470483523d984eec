// Handlers module - gateway endpoint handlers

pub mod forward;

pub use forward::handle_proxy;
