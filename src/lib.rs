pub mod chat;
pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;

use cli::{ Args, Command };
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve_args) => {
            info!("--- Proxy Configuration ---");
            info!("Server Address: {}", serve_args.server_addr);
            info!("Gemini Model: {}", serve_args.gemini_model);
            info!("Gemini Base URL: {}", serve_args.gemini_base_url);
            info!("Gemini API Key Configured: {}", serve_args.gemini_api_key.is_some());
            info!("TLS Enabled: {}", serve_args.enable_tls);
            info!("---------------------------");

            let server = Server::new(serve_args);
            server.run().await?;
        }
        Command::Chat(chat_args) => {
            info!("--- Chat Configuration ---");
            info!("Proxy URL: {}", chat_args.proxy_url);
            info!("History Store Type: {}", chat_args.history_type);
            info!("Prompts Path: {}", chat_args.prompts_path.as_deref().unwrap_or("built-in"));
            info!("--------------------------");

            chat::run_chat(chat_args).await?;
        }
    }

    Ok(())
}
