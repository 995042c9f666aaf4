pub mod compare;
pub mod core;
pub mod locate;

#[cfg(test)]
mod tests;

pub use self::compare::*;
pub use self::core::*;
pub use self::locate::*;
