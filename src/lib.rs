pub mod adapters;
pub mod prelude;
pub mod serve;

pub use adapters::WorldDomain;
