pub mod api;

use crate::cli::ServeArgs;
use crate::llm::gemini::GeminiClient;
use crate::llm::GenerationClient;
use api::AppState;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use log::{ info, warn, error };

pub struct Server {
    addr: String,
    state: AppState,
    args: ServeArgs,
}

impl Server {
    pub fn new(args: ServeArgs) -> Self {
        let api_key = args.gemini_api_key.clone().filter(|k| !k.trim().is_empty());

        let generator = match api_key {
            Some(key) => {
                info!("Gemini client configured: Model={}, BaseURL={}", args.gemini_model, args.gemini_base_url);
                let client = GeminiClient::new(
                    key,
                    args.gemini_model.clone(),
                    args.gemini_base_url.clone()
                );
                Some(Arc::new(client) as Arc<dyn GenerationClient>)
            }
            None => {
                warn!("GEMINI_API_KEY is not set. Chat requests will be refused with 500.");
                None
            }
        };

        Self {
            addr: args.server_addr.clone(),
            state: AppState { generator },
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = api::router(self.state.clone());

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                (Some(_), None) | (None, Some(_)) => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            };

            // axum-server enables aws-lc-rs as well; pick one provider explicitly.
            let _ = rustls::crypto::ring::default_provider().install_default();

            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await
                .map_err(|e| format!("Failed to load TLS certificate/key: {}", e))?;

            info!("HTTPS server listening on: https://{}{}", addr, api::CHAT_ROUTE);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener
                ::bind(addr).await
                .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;
            info!("HTTP server listening on: http://{}{}", addr, api::CHAT_ROUTE);
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
