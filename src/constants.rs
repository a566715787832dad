pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const DIAL_TIMEOUT_MS: u64 = 5_000;
    /// After a failed dial, new attempts for the same identity are suppressed
    /// and the recorded error replayed until this window elapses.
    pub const BACKOFF_WINDOW_MS: u64 = 5_000;
    pub const KNOWN_HOSTS_REL_PATH: &str = ".ssh/known_hosts";
    pub const AGENT_SOCK_ENV: &str = "SSH_AUTH_SOCK";
}

pub mod retry {
    /// Remote servers cap concurrent session channels at a limit we cannot
    /// query, so channel opens are retried with a short delay.
    pub const SESSION_OPEN_ATTEMPTS: usize = 10;
    pub const SESSION_OPEN_DELAY_MS: u64 = 250;
}

pub mod perms {
    pub const DEFAULT_DIR_MODE: u32 = 0o775;
    pub const DEFAULT_FILE_MODE: u32 = 0o664;
    pub const DEFAULT_LOG_MODE: u32 = 0o644;
}
