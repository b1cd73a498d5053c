use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write a file readable and writable only by the owner.
///
/// On non-unix targets mode bits do not apply and this is a plain write.
#[cfg(unix)]
fn write_restricted(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

/// PEM material produced by a completed bootstrap.
///
/// Created once per run and never mutated afterwards. The mutual-TLS
/// client is built from exactly these three documents.
#[derive(Debug, Clone)]
pub struct TrustMaterial {
    /// Server root CA certificate (fetched via the TOFU probe)
    pub root_ca: String,
    /// Agent certificate issued at registration
    pub certificate: String,
    /// Agent private key issued at registration
    pub private_key: String,
}

/// Manages durable certificate storage for an agent.
///
/// Files in the configured directory:
/// - `server-ca.pem` - Server root CA (fetched during bootstrap)
/// - `agent-cert.pem` - Agent's client certificate (for mTLS)
/// - `agent-private-key.pem` - Agent's private key (mode 0600)
#[derive(Debug, Clone)]
pub struct CertStore {
    base_dir: PathBuf,
}

impl CertStore {
    /// Create a cert store rooted at the given directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Default cert store location based on the agent name.
    ///
    /// - macOS: `~/Library/Application Support/{agent_name}/certs/`
    /// - Linux: `~/.config/{agent_name}/certs/`
    pub fn default_path(agent_name: &str) -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(agent_name)
            .join("certs")
    }

    fn root_ca_path(&self) -> PathBuf {
        self.base_dir.join("server-ca.pem")
    }

    fn cert_path(&self) -> PathBuf {
        self.base_dir.join("agent-cert.pem")
    }

    fn key_path(&self) -> PathBuf {
        self.base_dir.join("agent-private-key.pem")
    }

    /// Check whether a full set of trust material is on disk.
    pub fn has_material(&self) -> bool {
        self.root_ca_path().exists() && self.cert_path().exists() && self.key_path().exists()
    }

    /// Save the server root CA fetched during the bootstrap probe.
    pub fn save_root_ca(&self, ca_pem: &str) -> Result<()> {
        self.ensure_dir()?;
        std::fs::write(self.root_ca_path(), ca_pem)?;
        debug!("Wrote server CA to {:?}", self.root_ca_path());
        Ok(())
    }

    /// Save the certificate and key issued at registration.
    pub fn save_identity(&self, cert_pem: &str, key_pem: &str) -> Result<()> {
        self.ensure_dir()?;

        std::fs::write(self.cert_path(), cert_pem)?;
        debug!("Wrote agent certificate to {:?}", self.cert_path());

        // The private key alone gets restricted permissions
        write_restricted(&self.key_path(), key_pem.as_bytes())?;
        debug!("Wrote agent key to {:?}", self.key_path());
        Ok(())
    }

    /// Load the stored trust material for constructing the mTLS client.
    pub fn load(&self) -> Result<TrustMaterial> {
        if !self.has_material() {
            return Err(Error::Certificate(format!(
                "no trust material under {}; bootstrap has not completed",
                self.base_dir.display()
            )));
        }
        Ok(TrustMaterial {
            root_ca: std::fs::read_to_string(self.root_ca_path())?,
            certificate: std::fs::read_to_string(self.cert_path())?,
            private_key: std::fs::read_to_string(self.key_path())?,
        })
    }

    /// Get the base directory path.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.base_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }
}
