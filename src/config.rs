//! Port-range validation shared by the send and receive modes.
//!
//! Both modes refuse to touch a socket until the configured port has been
//! validated, so an out-of-range port is a configuration error (exit before
//! any I/O), never a transfer error.

use thiserror::Error;

/// Lowest port outside the privileged range.
pub const PORT_MIN: u16 = 1024;

/// Errors arising from command-line configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The port is in the privileged range and cannot be used.
    #[error("port {0} is privileged; use a port in the range {PORT_MIN}-65535")]
    PrivilegedPort(u16),
}

/// Check that `port` is in the unprivileged range `1024..=65535`.
///
/// The upper bound is enforced by the `u16` type itself: values above 65535
/// fail to parse on the command line before reaching this function.
pub fn validate_port(port: u16) -> Result<u16, ConfigError> {
    if port < PORT_MIN {
        return Err(ConfigError::PrivilegedPort(port));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_privileged_ports() {
        assert_eq!(validate_port(0), Err(ConfigError::PrivilegedPort(0)));
        assert_eq!(validate_port(80), Err(ConfigError::PrivilegedPort(80)));
        assert_eq!(validate_port(1023), Err(ConfigError::PrivilegedPort(1023)));
    }

    #[test]
    fn accepts_unprivileged_range() {
        assert_eq!(validate_port(1024), Ok(1024));
        assert_eq!(validate_port(8080), Ok(8080));
        assert_eq!(validate_port(65535), Ok(65535));
    }
}
