pub mod errors;
pub mod params;
pub mod run;

pub use errors::*;
pub use params::*;
pub use run::*;
