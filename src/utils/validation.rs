use crate::utils::error::{Result, SyncError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 路由器位址可以是主機名、IP 或完整的 http(s) URL
pub fn validate_router_address(field_name: &str, address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: address.to_string(),
            reason: "Router address cannot be empty".to_string(),
        });
    }

    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    match Url::parse(&candidate) {
        Ok(url) => match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(()),
            "http" | "https" => Err(SyncError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: address.to_string(),
                reason: "Router address has no host".to_string(),
            }),
            scheme => Err(SyncError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: address.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: address.to_string(),
            reason: format!("Invalid router address: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_router_address() {
        assert!(validate_router_address("router_ip", "192.168.1.1").is_ok());
        assert!(validate_router_address("router_ip", "https://router.lan").is_ok());
        assert!(validate_router_address("router_ip", "http://10.0.0.1:8443").is_ok());
        assert!(validate_router_address("router_ip", "").is_err());
        assert!(validate_router_address("router_ip", "ftp://router.lan").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("readiness.max_attempts", 5, 1).is_ok());
        assert!(validate_positive_number("readiness.max_attempts", 0, 1).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("username", "ubnt").is_ok());
        assert!(matches!(
            validate_non_empty_string("username", "   "),
            Err(SyncError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("files.ports", "ports.txt").is_ok());
        assert!(validate_path("files.ports", "").is_err());
    }
}
