use std::fmt;

/// Connection descriptor for the deployment host. Every remote
/// command and file transfer is parametrized by one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub key: String,
}

impl RemoteTarget {
    #[must_use]
    pub fn new(user: &str, host: &str, key: &str) -> Self {
        Self {
            user: user.to_string(),
            host: host.to_string(),
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Whether commands need `sudo` to touch system state.
    #[must_use]
    pub fn needs_sudo(&self) -> bool {
        self.user != "root"
    }

    /// Full `ssh` argument vector running `command` on the host.
    #[must_use]
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.ssh_base_args();
        args.push(self.destination());
        args.push(command.to_string());
        args
    }

    /// Value for `rsync -e`, so transfers reuse the same options
    /// and multiplexed connection as remote commands.
    #[must_use]
    pub fn rsync_shell(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        parts.extend(self.ssh_base_args());
        shell_words::join(parts)
    }

    // Non-interactive, trust-on-first-use, one shared master
    // connection per user@host.
    fn ssh_base_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            "ControlPath=/tmp/dropship-%r@%h:%p".to_string(),
            "-o".to_string(),
            "ControlPersist=60".to_string(),
            "-i".to_string(),
            self.key.clone(),
        ]
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.destination())
    }
}
