//! Configuration validation

use super::*;
use anyhow::Result;

/// Upper bound on concurrent workers
pub const MAX_WORKERS: usize = 10_000;

/// Upper bound on the payload size (the fixture is held in memory)
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(&config.server)?;
    validate_workload(&config.workload)?;
    validate_runtime(&config.runtime)?;

    Ok(())
}

/// Validate server configuration
pub fn validate_server(server: &ServerConfig) -> Result<()> {
    let address = server.address.trim();
    if address.is_empty() {
        anyhow::bail!("server address must not be empty");
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            if port.parse::<u16>().is_err() {
                anyhow::bail!("server address has an invalid port: {}", address);
            }
        }
        _ => anyhow::bail!("server address must be host:port, got {}", address),
    }

    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if workload.file_size == 0 || workload.file_size > MAX_FILE_SIZE {
        anyhow::bail!(
            "file_size must be between 1 and {} bytes, got {}",
            MAX_FILE_SIZE,
            workload.file_size
        );
    }

    if workload.workers == 0 || workload.workers > MAX_WORKERS {
        anyhow::bail!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS,
            workload.workers
        );
    }

    if !workload.full_verify && workload.verify_prefix == 0 {
        anyhow::bail!("verify_prefix must be at least 1");
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if let Some(tag) = &runtime.tag {
        if tag.is_empty() || tag.chars().any(char::is_whitespace) {
            anyhow::bail!("tag must be non-empty and contain no whitespace");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_server_address() {
        let mut server = ServerConfig::default();
        for good in ["localhost:6666", "10.0.0.1:80", "[::1]:6666"] {
            server.address = good.to_string();
            assert!(validate_server(&server).is_ok(), "{}", good);
        }
        for bad in ["", "localhost", ":6666", "host:http", "host:70000"] {
            server.address = bad.to_string();
            assert!(validate_server(&server).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_validate_workers() {
        let mut workload = WorkloadConfig::default();
        workload.workers = 0;
        assert!(validate_workload(&workload).is_err());
        workload.workers = MAX_WORKERS + 1;
        assert!(validate_workload(&workload).is_err());
        workload.workers = 50;
        assert!(validate_workload(&workload).is_ok());
    }

    #[test]
    fn test_validate_file_size() {
        let mut workload = WorkloadConfig {
            file_size: 0,
            ..Default::default()
        };
        assert!(validate_workload(&workload).is_err());

        workload.file_size = crate::config::cli_convert::parse_size("100000G").unwrap();
        assert!(validate_workload(&workload).is_err());

        workload.file_size = MAX_FILE_SIZE;
        assert!(validate_workload(&workload).is_ok());
    }

    #[test]
    fn test_zero_prefix_allowed_with_full_verify() {
        let mut workload = WorkloadConfig {
            verify_prefix: 0,
            ..Default::default()
        };
        assert!(validate_workload(&workload).is_err());
        workload.full_verify = true;
        assert!(validate_workload(&workload).is_ok());
    }

    #[test]
    fn test_validate_tag() {
        let mut runtime = RuntimeConfig::default();
        runtime.tag = Some("bad tag".to_string());
        assert!(validate_runtime(&runtime).is_err());
        runtime.tag = Some("run-1".to_string());
        assert!(validate_runtime(&runtime).is_ok());
    }
}
