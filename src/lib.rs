pub mod constants;
pub mod copy;
pub mod errors;
pub mod host;
pub mod pool;
pub mod services;
pub mod utils;

pub use copy::{copy_all, copy_file};
pub use errors::{HostError, Result};
pub use host::local::{Local, LOCALHOST};
pub use host::ssh::{SshRemote, SshRemoteBuilder};
pub use host::{DirEntry, EntryKind, Host, Metadata, ProcessSpec};
pub use pool::{Connector, SessionPool, SshConnector};
pub use services::logger::Logger;
pub use services::secret::Secret;
