pub mod arch;
pub mod immutable;
pub mod paths;

pub use arch::Arch;
