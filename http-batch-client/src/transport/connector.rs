//! TLS setup for [`HyperTransport`](super::HyperTransport).
//!
//! HTTPS needs a crypto provider and a root store, each chosen by feature:
//!
//! | concern   | features                                   |
//! |-----------|--------------------------------------------|
//! | provider  | `tls-ring` (preferred), `tls-aws-lc`        |
//! | roots     | `tls-native-roots`, `tls-webpki-roots`     |
//!
//! With no provider feature, a process-wide provider installed through
//! `CryptoProvider::install_default()` is used. With both root features, the
//! platform store is used and the bundled Mozilla roots only fill in when the
//! platform yields no certificates.

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;

use crate::builder::ClientBuildError;

/// Whether this build can reach `https://` batch endpoints without a
/// caller-supplied TLS config.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(any(feature = "tls-ring", feature = "tls-aws-lc"))
        && cfg!(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))
}

/// The rustls config the enabled features describe, or `None` when no crypto
/// provider is available.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub fn default_tls_config() -> Option<ClientConfig> {
    #[cfg(feature = "tls-ring")]
    let provider = Some(Arc::new(rustls::crypto::ring::default_provider()));
    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    let provider = Some(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    let provider = rustls::crypto::CryptoProvider::get_default().cloned();

    let config = ClientConfig::builder_with_provider(provider?)
        .with_safe_default_protocol_versions()
        .ok()?
        .with_root_certificates(root_store())
        .with_no_client_auth();
    Some(config)
}

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn root_store() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();

    #[cfg(feature = "tls-native-roots")]
    {
        let loaded = rustls_native_certs::load_native_certs();
        #[cfg(feature = "tracing")]
        if !loaded.errors.is_empty() {
            tracing::debug!(errors = ?loaded.errors, "some platform certificates failed to load");
        }
        let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
        #[cfg(feature = "tracing")]
        tracing::trace!(added, ignored, "loaded platform root certificates");
        #[cfg(not(feature = "tracing"))]
        let _ = (added, ignored);
    }

    #[cfg(feature = "tls-webpki-roots")]
    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    roots
}

fn resolve_tls_config(explicit: Option<ClientConfig>) -> Result<ClientConfig, ClientBuildError> {
    match explicit {
        Some(config) => Ok(config),
        None => feature_tls_config(),
    }
}

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn feature_tls_config() -> Result<ClientConfig, ClientBuildError> {
    default_tls_config().ok_or_else(|| {
        ClientBuildError::Transport(
            "no TLS crypto provider: enable `tls-ring` or `tls-aws-lc`, \
             or install one via `CryptoProvider::install_default()`"
                .into(),
        )
    })
}

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
fn feature_tls_config() -> Result<ClientConfig, ClientBuildError> {
    Err(ClientBuildError::Transport(
        "no TLS root certificates: enable `tls-native-roots` or \
         `tls-webpki-roots`, or pass a TLS config"
            .into(),
    ))
}

/// A connector for both `http://` and `https://` batch endpoints, negotiating
/// HTTP/2 through ALPN.
///
/// # Errors
///
/// [`ClientBuildError::Transport`] when `tls_config` is `None` and the enabled
/// features cannot produce one.
pub fn build_https_connector(
    tls_config: Option<ClientConfig>,
) -> Result<HttpsConnector<HttpConnector>, ClientBuildError> {
    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(resolve_tls_config(tls_config)?)
        .https_or_http()
        .enable_all_versions()
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(
        any(feature = "tls-ring", feature = "tls-aws-lc"),
        any(feature = "tls-native-roots", feature = "tls-webpki-roots")
    ))]
    #[test]
    fn test_default_features_build_connector() {
        assert!(has_tls_support());
        assert!(default_tls_config().is_some());
        assert!(build_https_connector(None).is_ok());
    }

    #[cfg(all(feature = "tls-ring", feature = "tls-native-roots"))]
    #[test]
    fn test_explicit_config_wins() {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth();
        assert!(resolve_tls_config(Some(config)).is_ok());
    }

    #[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
    #[test]
    fn test_missing_roots_is_build_error() {
        assert!(!has_tls_support());
        assert!(matches!(
            build_https_connector(None),
            Err(ClientBuildError::Transport(_))
        ));
    }
}
