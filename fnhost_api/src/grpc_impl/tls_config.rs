// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

/// PEM files used to serve the runtime API over TLS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsConfig {
    /// Path to the server's certificate
    pub cert_path: Option<String>,
    /// Path to the server's private key
    pub key_path: Option<String>,
    /// Path to the CA used to verify clients
    pub ca_path: Option<String>,
}

impl TlsConfig {
    /// Create the tonic server TLS configuration.
    ///
    /// Returns `None` when no certificate or no key is configured, in which
    /// case the server runs in plaintext.
    pub fn create_server_tls_config(&self) -> anyhow::Result<Option<tonic::transport::ServerTlsConfig>> {
        let (cert_path, key_path) = match (&self.cert_path, &self.key_path) {
            (Some(cert_path), Some(key_path)) => (cert_path, key_path),
            _ => {
                log::info!("No TLS enabled for server.");
                return Ok(None);
            }
        };

        let mut tls_config =
            tonic::transport::ServerTlsConfig::new().identity(tonic::transport::Identity::from_pem(read(cert_path)?, read(key_path)?));

        if let Some(ca_path) = &self.ca_path {
            log::info!("Server CA specified: client authentication will be enforced.");
            tls_config = tls_config.client_ca_root(tonic::transport::Certificate::from_pem(read(ca_path)?));
        } else {
            log::info!("No server CA specified: client authentication will NOT be enforced.");
        }

        Ok(Some(tls_config))
    }
}

fn read(path: &str) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| anyhow::anyhow!("could not read '{}': {}", path, err))
}
