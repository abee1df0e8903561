//! Client TLS context construction.
//!
//! Builds a rustls [`ClientConfig`] from keystore/truststore material named in
//! [`TlsSettings`]. Every input is required once TLS is enabled; anything
//! missing, unreadable or unsupported is a configuration error and the
//! connection attempt is aborted. There is no plaintext fallback.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use rustls::{
    Certificate, ClientConfig, PrivateKey, RootCertStore, SupportedCipherSuite,
    SupportedProtocolVersion,
};

use crate::config::TlsSettings;
use crate::error::{InboundError, Result};

/// Store format accepted for both keystore and truststore.
const PEM_STORE: &str = "PEM";

/// TLS protocol version policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    /// TLS 1.2 only
    Tls12,
    /// TLS 1.3 only
    Tls13,
    /// Either TLS 1.2 or TLS 1.3
    Any,
}

impl TlsProtocol {
    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tls12 => "TLSv1.2",
            Self::Tls13 => "TLSv1.3",
            Self::Any => "TLS",
        }
    }

    fn versions(self) -> Vec<&'static SupportedProtocolVersion> {
        match self {
            Self::Tls12 => vec![&rustls::version::TLS12],
            Self::Tls13 => vec![&rustls::version::TLS13],
            Self::Any => vec![&rustls::version::TLS13, &rustls::version::TLS12],
        }
    }
}

impl fmt::Display for TlsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TlsProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tlsv1.2" | "tls1.2" | "tlsv12" => Ok(Self::Tls12),
            "tlsv1.3" | "tls1.3" | "tlsv13" => Ok(Self::Tls13),
            "tls" => Ok(Self::Any),
            _ => Err(format!("Unsupported TLS protocol version: {s}")),
        }
    }
}

/// Reusable client TLS context handed to the transport.
#[derive(Clone)]
pub struct TlsContext {
    client_config: Arc<ClientConfig>,
    protocol: TlsProtocol,
    cipher_suite: SupportedCipherSuite,
    fips_required: bool,
}

impl TlsContext {
    /// rustls client configuration (key material, trust roots, policy).
    /// Transports hand this to the TLS connector.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }

    /// Negotiated protocol policy
    pub fn protocol(&self) -> TlsProtocol {
        self.protocol
    }

    /// Cipher suite name as the transport expects it
    pub fn cipher_suite_name(&self) -> String {
        suite_name(self.cipher_suite)
    }

    /// Whether the transport must run in FIPS mode
    pub fn fips_required(&self) -> bool {
        self.fips_required
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("protocol", &self.protocol)
            .field("cipher_suite", &self.cipher_suite_name())
            .field("fips_required", &self.fips_required)
            .finish_non_exhaustive()
    }
}

/// Build a client TLS context from keystore/truststore settings.
pub fn build_tls_context(settings: &TlsSettings) -> Result<TlsContext> {
    let keystore_path = require(settings.keystore_path.as_deref(), "keystore_path")?;
    let keystore_type = require(settings.keystore_type.as_deref(), "keystore_type")?;
    // PEM keys carry no passphrase, but an unset password means the
    // settings were never filled in.
    require(settings.keystore_password.as_deref(), "keystore_password")?;
    let truststore_path = require(settings.truststore_path.as_deref(), "truststore_path")?;
    let truststore_type = require(settings.truststore_type.as_deref(), "truststore_type")?;
    let version = require(settings.protocol_version.as_deref(), "protocol_version")?;
    let suite_name_setting = require(settings.cipher_suite.as_deref(), "cipher_suite")?;

    check_store_type("keystore", keystore_type)?;
    check_store_type("truststore", truststore_type)?;

    let protocol = TlsProtocol::from_str(version).map_err(InboundError::Configuration)?;
    let suite = find_cipher_suite(suite_name_setting, protocol)?;
    if settings.fips_required && !is_fips_approved(suite) {
        return Err(InboundError::Configuration(format!(
            "Cipher suite {} is not FIPS-approved",
            suite_name(suite)
        )));
    }

    let (certs, key) = load_keystore(keystore_path)?;
    let roots = load_truststore(truststore_path)?;

    let client_config = ClientConfig::builder()
        .with_cipher_suites(&[suite])
        .with_safe_default_kx_groups()
        .with_protocol_versions(&protocol.versions())
        .map_err(|e| InboundError::Configuration(format!("Invalid TLS policy: {e}")))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| {
            InboundError::Configuration(format!("Keystore key does not match certificate: {e}"))
        })?;

    tracing::debug!(
        protocol = %protocol,
        cipher_suite = %suite_name(suite),
        fips = settings.fips_required,
        "TLS context built"
    );

    Ok(TlsContext {
        client_config: Arc::new(client_config),
        protocol,
        cipher_suite: suite,
        fips_required: settings.fips_required,
    })
}

fn require<'a, T: ?Sized>(value: Option<&'a T>, field: &str) -> Result<&'a T> {
    value.ok_or_else(|| {
        InboundError::Configuration(format!("TLS is enabled but connection.tls.{field} is not set"))
    })
}

fn check_store_type(store: &str, kind: &str) -> Result<()> {
    if kind.trim().eq_ignore_ascii_case(PEM_STORE) {
        Ok(())
    } else {
        Err(InboundError::Configuration(format!(
            "Unsupported {store} type {kind:?} (expected {PEM_STORE})"
        )))
    }
}

fn suite_name(suite: SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

/// Resolve a suite by rustls or IANA name, restricted to `protocol`.
fn find_cipher_suite(name: &str, protocol: TlsProtocol) -> Result<SupportedCipherSuite> {
    let wanted = name.trim().to_uppercase();
    // IANA spells TLS 1.3 suites without the version infix rustls uses.
    let alias = wanted
        .strip_prefix("TLS_")
        .filter(|rest| rest.starts_with("AES_") || rest.starts_with("CHACHA20_"))
        .map(|rest| format!("TLS13_{rest}"));

    let suite = rustls::ALL_CIPHER_SUITES
        .iter()
        .copied()
        .find(|s| {
            let n = suite_name(*s);
            n == wanted || alias.as_deref() == Some(n.as_str())
        })
        .ok_or_else(|| InboundError::Configuration(format!("Unsupported cipher suite: {name}")))?;

    let allowed = protocol
        .versions()
        .iter()
        .any(|v| v.version == suite.version().version);
    if !allowed {
        return Err(InboundError::Configuration(format!(
            "Cipher suite {name} cannot be used with protocol {protocol}"
        )));
    }
    Ok(suite)
}

fn is_fips_approved(suite: SupportedCipherSuite) -> bool {
    let name = suite_name(suite);
    name.contains("AES_128_GCM") || name.contains("AES_256_GCM")
}

fn read_store(kind: &str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| InboundError::Configuration(format!("Failed to read {kind} {path:?}: {e}")))
}

fn load_keystore(path: &Path) -> Result<(Vec<Certificate>, PrivateKey)> {
    let pem = read_store("keystore", path)?;

    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut pem.as_slice())
        .map_err(|e| InboundError::Configuration(format!("Failed to parse keystore PEM: {e}")))?
        .into_iter()
        .map(Certificate)
        .collect();

    if certs.is_empty() {
        return Err(InboundError::Configuration(format!(
            "No certificates found in keystore {path:?}"
        )));
    }

    if String::from_utf8_lossy(&pem).contains("ENCRYPTED PRIVATE KEY") {
        return Err(InboundError::Configuration(format!(
            "Keystore {path:?} holds an encrypted private key, which is not supported"
        )));
    }

    // Try PKCS8 first, then RSA, then SEC1
    let key = rustls_pemfile::pkcs8_private_keys(&mut pem.as_slice())
        .ok()
        .and_then(|keys| keys.into_iter().next())
        .or_else(|| {
            rustls_pemfile::rsa_private_keys(&mut pem.as_slice())
                .ok()?
                .into_iter()
                .next()
        })
        .or_else(|| {
            rustls_pemfile::ec_private_keys(&mut pem.as_slice())
                .ok()?
                .into_iter()
                .next()
        })
        .map(PrivateKey)
        .ok_or_else(|| {
            InboundError::Configuration(format!("No private key found in keystore {path:?}"))
        })?;

    Ok((certs, key))
}

fn load_truststore(path: &Path) -> Result<RootCertStore> {
    let pem = read_store("truststore", path)?;

    let ders = rustls_pemfile::certs(&mut pem.as_slice()).map_err(|e| {
        InboundError::Configuration(format!("Failed to parse truststore PEM: {e}"))
    })?;

    let mut roots = RootCertStore::empty();
    for der in ders {
        roots.add(&Certificate(der)).map_err(|e| {
            InboundError::Configuration(format!("Invalid certificate in truststore {path:?}: {e}"))
        })?;
    }

    if roots.is_empty() {
        return Err(InboundError::Configuration(format!(
            "No certificates found in truststore {path:?}"
        )));
    }
    Ok(roots)
}
