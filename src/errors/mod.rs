mod host_error;

pub use host_error::{HostError, Result};
