pub mod dtc;
pub mod module;
pub mod outcome;
pub mod spn;
pub mod test_result;
pub mod vehicle;
pub mod vin;

pub use dtc::*;
pub use module::*;
pub use outcome::*;
pub use spn::*;
pub use test_result::*;
pub use vehicle::*;
