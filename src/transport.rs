//! Transport establishment: TCP dial, TLS negotiation, banner verification

use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use crate::constants::AMI_BANNER_TOKEN;
use crate::error::{AmiError, AmiResult};
use crate::protocol::{self, IoStream, MessageReader, MessageWriter};

/// TLS configuration for the session.
///
/// Defaults to TLS disabled. With TLS enabled and no custom config, the
/// connection verifies the server against the bundled webpki roots unless
/// `insecure_skip_verify` is set, in which case certificate verification is
/// bypassed entirely (self-signed / unverified servers are accepted).
#[derive(Debug, Clone, Default)]
pub(crate) struct TlsOptions {
    pub(crate) enabled: bool,
    pub(crate) insecure_skip_verify: bool,
    pub(crate) config: Option<Arc<rustls::ClientConfig>>,
}

/// Owns dial/redial: address, TLS selection, banner verification.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    address: String,
    tls: TlsOptions,
}

impl Transport {
    pub(crate) fn new(address: impl Into<String>, tls: TlsOptions) -> Self {
        Self {
            address: address.into(),
            tls,
        }
    }

    /// Establish the byte stream (TCP, then TLS when requested), read the
    /// server's opening banner and confirm it names the manager service.
    /// Returns the codec halves over the live stream.
    pub(crate) async fn connect(&self) -> AmiResult<(MessageReader, MessageWriter)> {
        debug!(address = %self.address, tls = self.tls.enabled, "dialing AMI endpoint");
        let tcp = TcpStream::connect(&self.address).await?;

        let stream: IoStream = if self.tls.enabled {
            let config = self.client_config();
            let server_name = server_name_for(&self.address)?;
            let connector = TlsConnector::from(config);
            let tls_stream = connector
                .connect(server_name, tcp)
                .await?;
            debug!("TLS session established");
            Box::new(tls_stream)
        } else {
            Box::new(tcp)
        };

        let (mut reader, writer) = protocol::split(stream);
        let banner = reader
            .read_banner()
            .await?;
        if !banner.contains(AMI_BANNER_TOKEN) {
            warn!(%banner, "unexpected banner, rejecting session");
            return Err(AmiError::NotAmi { banner });
        }

        info!(%banner, "connected to AMI endpoint");
        Ok((reader, writer))
    }

    /// A caller-supplied config wins; otherwise build a default verifying
    /// config, or the no-verification one when `insecure_skip_verify` is set.
    fn client_config(&self) -> Arc<rustls::ClientConfig> {
        if let Some(config) = &self.tls.config {
            return config.clone();
        }
        if self.tls.insecure_skip_verify {
            Arc::new(
                rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(danger::NoVerification))
                    .with_no_client_auth(),
            )
        } else {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(
                webpki_roots::TLS_SERVER_ROOTS
                    .iter()
                    .cloned(),
            );
            Arc::new(
                rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        }
    }
}

/// SNI name from a `host:port` address. IPv6 literals arrive bracketed
/// (`[::1]:5038`); the brackets are not part of the name.
fn server_name_for(address: &str) -> AmiResult<rustls::pki_types::ServerName<'static>> {
    let host = address
        .rsplit_once(':')
        .map(|(host, _port)| host)
        .unwrap_or(address);
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|_| AmiError::tls(format!("invalid server name: {host:?}")))
}

mod danger {
    //! Certificate verifier that accepts anything. Installed only when the
    //! caller explicitly opts into unverified TLS.

    use rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    #[derive(Debug)]
    pub(super) struct NoVerification;

    impl ServerCertVerifier for NoVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ECDSA_NISTP521_SHA512,
                SignatureScheme::ED25519,
            ]
        }
    }
}
