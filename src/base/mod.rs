//! Core error definitions shared by the resolver and the connection race.

pub mod context;
pub mod neterror;
