use crate::core::parser::KeyValueParser;
use crate::domain::model::Record;
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_router_address, Validate};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
enum CredentialField {
    RouterAddress,
    Username,
    Password,
}

const CREDENTIAL_KEYS: &[(&str, CredentialField)] = &[
    ("router_ip", CredentialField::RouterAddress),
    ("username", CredentialField::Username),
    ("password", CredentialField::Password),
];

/// Router login settings. Only used to open a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub router_address: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("router_address", &self.router_address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        router_address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            router_address: router_address.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// 後面的行會覆蓋前面的值
    pub fn from_records(records: &[Record]) -> Self {
        let mut credentials = Credentials::default();

        for record in records {
            for &(key, field) in CREDENTIAL_KEYS {
                if let Some(value) = record.get(key) {
                    let slot = match field {
                        CredentialField::RouterAddress => &mut credentials.router_address,
                        CredentialField::Username => &mut credentials.username,
                        CredentialField::Password => &mut credentials.password,
                    };
                    *slot = value.to_string();
                }
            }
        }

        credentials
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let records = KeyValueParser::new(reader).parse()?;
        Ok(Self::from_records(&records))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl Validate for Credentials {
    fn validate(&self) -> Result<()> {
        validate_router_address("router_ip", &self.router_address)?;
        validate_non_empty_string("username", &self.username)?;
        validate_non_empty_string("password", &self.password)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_credentials_from_reader() {
        let input = Cursor::new("router_ip=192.168.1.1\nusername=ubnt\npassword=\"pa ss\"\n");
        let creds = Credentials::from_reader(input).unwrap();

        assert_eq!(creds, Credentials::new("192.168.1.1", "ubnt", "pa ss"));
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn test_later_lines_override() {
        let input = Cursor::new("router_ip=10.0.0.1 username=admin\nusername=ubnt password=x\n");
        let creds = Credentials::from_reader(input).unwrap();

        assert_eq!(creds.router_address, "10.0.0.1");
        assert_eq!(creds.username, "ubnt");
    }

    #[test]
    fn test_missing_password_fails_validation() {
        let creds = Credentials::new("192.168.1.1", "ubnt", "");
        assert!(creds.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("192.168.1.1", "ubnt", "hunter2");
        let rendered = format!("{:?}", creds);

        assert!(rendered.contains("ubnt"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_credentials_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"router_ip=router.lan username=ubnt password=secret\n")
            .unwrap();

        let creds = Credentials::from_file(temp_file.path()).unwrap();
        assert_eq!(creds.router_address, "router.lan");
        assert_eq!(creds.password, "secret");
    }
}
