mod health_check;
mod me;

pub use health_check::*;
pub use me::*;
