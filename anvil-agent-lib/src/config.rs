/// Connection endpoints for the build-coordination server.
///
/// The server exposes two ports: a plaintext HTTP port used only during
/// registration (no trust material exists yet) and a TLS port used for
/// the certificate probe and all authenticated traffic afterwards.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server hostname (e.g. "build.example.com")
    pub host: String,
    /// TLS port
    pub ssl_port: u16,
    /// Plaintext HTTP port (registration only)
    pub http_port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, ssl_port: u16, http_port: u16) -> Self {
        Self {
            host: host.into(),
            ssl_port,
            http_port,
        }
    }

    /// `host:ssl_port`, as used for the TLS dial.
    pub fn ssl_addr(&self) -> String {
        format!("{}:{}", self.host, self.ssl_port)
    }

    /// Absolute URL on the TLS port.
    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}{}", self.ssl_addr(), path)
    }

    /// Absolute URL on the plaintext port.
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.http_port, path)
    }
}
