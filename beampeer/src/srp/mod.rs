// SRP-6a: safe-prime groups and the primitive field operations.

pub mod groups;
pub mod math;
