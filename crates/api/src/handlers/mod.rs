pub mod bootstrap;
pub mod refine;
