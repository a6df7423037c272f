//! Hands a host off to the system SSH client

use std::process::{Command, ExitStatus};

use tracing::debug;

#[derive(Debug)]
pub enum SshError {
    Spawn(String),
    Signal,
}

impl std::fmt::Display for SshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshError::Spawn(msg) => write!(f, "Failed to start SSH client: {}", msg),
            SshError::Signal => write!(f, "SSH client was terminated by a signal"),
        }
    }
}

impl std::error::Error for SshError {}

/// Where to connect and as whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub address: String,
    pub username: Option<String>,
}

impl SshTarget {
    pub fn new(address: impl Into<String>, username: Option<String>) -> Self {
        Self {
            address: address.into(),
            username: username.filter(|user| !user.trim().is_empty()),
        }
    }

    /// `user@address`, or just the address when no login name is known.
    pub fn destination(&self) -> String {
        match &self.username {
            Some(username) => format!("{username}@{}", self.address),
            None => self.address.clone(),
        }
    }

    pub fn command(&self, ssh_command: &str) -> Command {
        let mut command = Command::new(ssh_command);
        command.arg(self.destination());
        command
    }

    /// Run the SSH client attached to this terminal and wait for it to exit.
    pub fn launch(&self, ssh_command: &str) -> Result<ExitStatus, SshError> {
        debug!("Running {} {}", ssh_command, self.destination());
        let status = self
            .command(ssh_command)
            .status()
            .map_err(|err| SshError::Spawn(format!("{ssh_command}: {err}")))?;

        if status.code().is_none() {
            return Err(SshError::Signal);
        }
        Ok(status)
    }
}
