pub mod types;
pub mod reducer;
pub mod provider;

pub use types::*;
pub use reducer::reduce;
pub use provider::StateProvider;
