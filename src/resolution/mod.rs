pub mod decision;
pub mod sync;
