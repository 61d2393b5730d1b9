//! In-band TLS.
//!
//! A [`TlsProvider`] wraps an already-open stream in TLS. The side that sent
//! the `StartTLS` ask is the TLS client; the side that answered it is the
//! TLS server.
//!
//! [`RustlsProvider`] is the stock implementation. With trusted authorities
//! configured the server also requires a client certificate signed by one
//! of them.
//!
//! # Example
//!
//! ```ignore
//! use ampwire::config::TlsSettings;
//! use ampwire::transport::RustlsProvider;
//!
//! let settings = TlsSettings::new(cert_pem, key_pem)
//!     .trusted_authorities(ca_pem)
//!     .server_name("amp.example.com");
//! let provider = RustlsProvider::new(&settings)?;
//! ```

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use super::BoxedStream;
use crate::config::TlsSettings;
use crate::error::{AmpError, Result};
use crate::handler::BoxFuture;

/// Which end of the TLS handshake this side plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRole {
    /// Sent the `StartTLS` ask.
    Client,
    /// Answered the `StartTLS` ask.
    Server,
}

/// Something that can wrap a connection in TLS.
pub trait TlsProvider: Send + Sync + 'static {
    /// Run the handshake over `stream` and return the encrypted stream.
    fn wrap(&self, stream: BoxedStream, role: TlsRole) -> BoxFuture<'static, Result<BoxedStream>>;
}

/// TLS over rustls with the ring crypto provider.
pub struct RustlsProvider {
    connector: Option<TlsConnector>,
    acceptor: TlsAcceptor,
    server_name: Option<ServerName<'static>>,
}

impl RustlsProvider {
    /// Build client and server configurations from PEM material.
    ///
    /// # Errors
    ///
    /// `Tls` if the certificate, key, or authorities cannot be parsed, or the
    /// server name is invalid.
    pub fn new(settings: &TlsSettings) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let certs = parse_certificates(settings.certificate_pem.as_bytes())?;
        if certs.is_empty() {
            return Err(AmpError::Tls("no certificates found".into()));
        }
        let key = parse_private_key(settings.private_key_pem.as_bytes())?;

        let roots = settings
            .trusted_authorities_pem
            .as_deref()
            .map(|pem| root_store(pem.as_bytes()))
            .transpose()?
            .map(Arc::new);

        let server_builder = ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| AmpError::Tls(format!("server config error: {e}")))?;
        let server_config = match &roots {
            Some(roots) => {
                let verifier =
                    WebPkiClientVerifier::builder_with_provider(roots.clone(), provider.clone())
                        .build()
                        .map_err(|e| AmpError::Tls(format!("client verifier error: {e}")))?;
                server_builder.with_client_cert_verifier(verifier)
            }
            None => server_builder.with_no_client_auth(),
        }
        .with_single_cert(certs.clone(), key.clone_key())
        .map_err(|e| AmpError::Tls(format!("server config error: {e}")))?;

        let connector = roots
            .map(|roots| client_config(provider, roots, certs, key))
            .transpose()?
            .map(|config| TlsConnector::from(Arc::new(config)));

        let server_name = settings
            .server_name
            .as_deref()
            .map(|name| {
                ServerName::try_from(name.to_owned())
                    .map_err(|e| AmpError::Tls(format!("invalid server name: {e}")))
            })
            .transpose()?;

        Ok(Self {
            connector,
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
            server_name,
        })
    }
}

impl TlsProvider for RustlsProvider {
    fn wrap(&self, stream: BoxedStream, role: TlsRole) -> BoxFuture<'static, Result<BoxedStream>> {
        match role {
            TlsRole::Client => {
                let connector = self.connector.clone();
                let server_name = self.server_name.clone();
                Box::pin(async move {
                    let connector = connector.ok_or_else(|| {
                        AmpError::Tls("no trusted authorities configured".into())
                    })?;
                    let server_name = server_name
                        .ok_or_else(|| AmpError::Tls("no server name configured".into()))?;
                    let tls = connector
                        .connect(server_name, stream)
                        .await
                        .map_err(|e| AmpError::Tls(format!("TLS handshake failed: {e}")))?;
                    Ok(Box::new(tls) as BoxedStream)
                })
            }
            TlsRole::Server => {
                let acceptor = self.acceptor.clone();
                Box::pin(async move {
                    let tls = acceptor
                        .accept(stream)
                        .await
                        .map_err(|e| AmpError::Tls(format!("TLS handshake failed: {e}")))?;
                    Ok(Box::new(tls) as BoxedStream)
                })
            }
        }
    }
}

fn client_config(
    provider: Arc<CryptoProvider>,
    roots: Arc<RootCertStore>,
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ClientConfig> {
    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| AmpError::Tls(format!("client config error: {e}")))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| AmpError::Tls(format!("client config error: {e}")))
}

fn root_store(pem: &[u8]) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    for cert in parse_certificates(pem)? {
        store
            .add(cert)
            .map_err(|e| AmpError::Tls(format!("failed to add trusted authority: {e}")))?;
    }
    if store.is_empty() {
        return Err(AmpError::Tls("no trusted authorities found".into()));
    }
    Ok(store)
}

/// Parse PEM-encoded certificates.
fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AmpError::Tls(format!("failed to parse certificates: {e}")))
}

/// Parse a PEM-encoded private key.
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| AmpError::Tls(format!("failed to parse private key: {e}")))
}
