use std::fs;
use std::io;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};
use tracing::warn;

/// 设备连接的 TLS 选项
///
/// insecure_skip_verify 被接受但不会真正绕过校验：rustls 不提供
/// 受支持的绕过入口，置位时仅记录告警并继续用 CA / 系统根证书校验。
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub enabled: bool,
    pub insecure_skip_verify: bool,
    pub server_name: Option<String>,
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

impl TlsOptions {
    /// 构建 tonic 的客户端 TLS 配置
    pub fn client_config(&self) -> io::Result<ClientTlsConfig> {
        let mut tls = ClientTlsConfig::new();

        if self.insecure_skip_verify {
            warn!("insecure_skip_verify is set but certificate verification cannot be bypassed; continuing with normal verification");
        }

        if let Some(ca_file) = &self.ca_file {
            let pem = fs::read(ca_file)?;
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }

        match (&self.cert_file, &self.key_file) {
            (Some(cert_file), Some(key_file)) => {
                let cert = fs::read(cert_file)?;
                let key = fs::read(key_file)?;
                tls = tls.identity(Identity::from_pem(cert, key));
            }
            (None, None) => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cert_file and key_file must be provided together",
                ));
            }
        }

        if let Some(server_name) = &self.server_name {
            tls = tls.domain_name(server_name.clone());
        }

        Ok(tls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cert_without_key_rejected() {
        let options = TlsOptions {
            enabled: true,
            cert_file: Some("/tmp/client.pem".to_string()),
            ..TlsOptions::default()
        };
        assert!(options.client_config().is_err());
    }

    #[test]
    fn test_plain_options_build() {
        let options = TlsOptions {
            enabled: true,
            server_name: Some("switch01.lab".to_string()),
            ..TlsOptions::default()
        };
        assert!(options.client_config().is_ok());
    }
}
