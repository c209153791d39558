mod driver;
mod observer;

pub use driver::{DatabaseDriver, DriverStatement};
pub use observer::Observer;
