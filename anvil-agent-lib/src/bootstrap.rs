//! Trust-on-first-use bootstrap against the build-coordination server.
//!
//! The agent starts with no pre-shared secret. Bootstrap runs three steps
//! in strict order:
//! 1. Probe the server's TLS port with verification disabled and capture
//!    the certificate it presents (TOFU - this is the single deliberate
//!    trust gap in the protocol, scoped to this one call).
//! 2. POST the agent's identity to the plaintext registration endpoint
//!    and receive a signed certificate/key pair.
//! 3. Build an HTTP client that trusts only the probed root and presents
//!    the issued identity - genuine mutual TLS from here on.

use crate::{AgentIdentity, CertStore, Error, Result, ServerConfig, TrustMaterial};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde::Deserialize;
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, info};

/// Signed identity returned by the server's registration endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    #[serde(rename = "AgentPrivateKey")]
    pub private_key: String,
    #[serde(rename = "AgentCertificate")]
    pub certificate: String,
}

/// A certificate verifier that accepts any peer.
///
/// Used exclusively by the bootstrap probe; never installed on the
/// authenticated client.
#[derive(Debug)]
struct TofuCertVerifier {
    schemes: Vec<SignatureScheme>,
}

impl TofuCertVerifier {
    fn new() -> Self {
        let provider = rustls::crypto::ring::default_provider();
        Self {
            schemes: provider
                .signature_verification_algorithms
                .supported_schemes(),
        }
    }
}

impl ServerCertVerifier for TofuCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        // Accept any certificate - this is intentionally insecure for TOFU
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

/// Handles trust establishment with the coordination server.
pub struct TrustBootstrap {
    server: ServerConfig,
}

impl TrustBootstrap {
    pub fn new(server: ServerConfig) -> Self {
        Self { server }
    }

    /// Fetch the server's certificate over an unverified TLS handshake.
    ///
    /// Trusts whatever certificate the server presents during this one
    /// call and returns it PEM-encoded. Fatal if the handshake cannot be
    /// completed: no channel exists without it.
    pub fn fetch_root_certificate(&self) -> Result<String> {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(TofuCertVerifier::new()))
        .with_no_client_auth();

        let server_name = ServerName::try_from(self.server.host.clone()).map_err(|_| {
            Error::Certificate(format!("invalid server name: {}", self.server.host))
        })?;

        let addr = self.server.ssl_addr();
        debug!("Probing {} for its server certificate", addr);
        let mut conn = rustls::ClientConnection::new(Arc::new(config), server_name)?;
        let mut sock = TcpStream::connect(&addr)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock)?;
        }

        let leaf = conn
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| {
                Error::Certificate(format!("server {addr} presented no certificate"))
            })?;

        info!("Fetched server certificate from {}", addr);
        Ok(pem::encode(&pem::Pem::new(
            "CERTIFICATE",
            leaf.as_ref().to_vec(),
        )))
    }

    /// Exchange agent identity metadata for a signed certificate/key pair.
    ///
    /// Goes over plain HTTP: no trust material exists yet, so the call
    /// cannot be protected. Fatal on network failure or a response that
    /// does not decode into the expected two-field structure.
    pub fn register(&self, identity: &AgentIdentity) -> Result<Registration> {
        let url = self.server.http_url("/go/admin/agent");
        info!("Registering agent {} with {}", identity.uuid, url);

        let resp = reqwest::blocking::Client::builder()
            .build()?
            .post(&url)
            .form(identity)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RegistrationFailed(format!(
                "{url} returned {status}"
            )));
        }

        let registration: Registration = resp
            .json()
            .map_err(|e| Error::RegistrationFailed(format!("invalid response from {url}: {e}")))?;

        if registration.private_key.is_empty() || registration.certificate.is_empty() {
            return Err(Error::RegistrationFailed(
                "server returned empty key or certificate".to_string(),
            ));
        }

        Ok(registration)
    }

    /// Run the full bootstrap: probe, persist the root, register, persist
    /// the issued identity, and hand back the assembled material.
    pub fn run(&self, store: &CertStore, identity: &AgentIdentity) -> Result<TrustMaterial> {
        let root_ca = self.fetch_root_certificate()?;
        store.save_root_ca(&root_ca)?;

        let registration = self.register(identity)?;
        store.save_identity(&registration.certificate, &registration.private_key)?;
        info!("Trust material saved to {:?}", store.base_dir());

        Ok(TrustMaterial {
            root_ca,
            certificate: registration.certificate,
            private_key: registration.private_key,
        })
    }

    /// Build the mutual-TLS client from completed bootstrap material.
    ///
    /// The client trusts only the probed root certificate and presents the
    /// issued agent identity. Fails fast on partial material rather than
    /// constructing a client with an empty trust anchor.
    pub fn build_client(material: &TrustMaterial) -> Result<reqwest::blocking::Client> {
        if material.root_ca.trim().is_empty()
            || material.certificate.trim().is_empty()
            || material.private_key.trim().is_empty()
        {
            return Err(Error::Certificate(
                "incomplete trust material; bootstrap must complete before building the client"
                    .to_string(),
            ));
        }

        let root = reqwest::Certificate::from_pem(material.root_ca.as_bytes())?;
        let identity_pem = format!(
            "{}\n{}\n",
            material.private_key.trim_end(),
            material.certificate.trim_end()
        );
        let identity = reqwest::Identity::from_pem(identity_pem.as_bytes())?;

        let client = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(root)
            .identity(identity)
            .build()?;
        Ok(client)
    }

    /// Authenticated GET of the server root, confirming the new channel
    /// actually works end to end.
    pub fn verify_channel(&self, client: &reqwest::blocking::Client) -> Result<()> {
        let url = self.server.https_url("/");
        let resp = client.get(&url).send()?;
        debug!("Channel check against {} returned {}", url, resp.status());
        Ok(())
    }
}
