//! Console front end of the demo driver.

pub mod console;
