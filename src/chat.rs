use crate::cli::ChatArgs;
use crate::config::prompt::{ load_prompts, PromptConfig };
use crate::history::create_history_store;
use crate::models::chat::{ Message, Role };
use crate::session::proxy::HttpChatProxy;
use crate::session::{ ConversationSession, SessionError };
use std::error::Error;
use std::sync::Arc;
use tokio::io::{ stdin, AsyncBufReadExt, BufReader, Lines, Stdin };
use log::{ info, error };

const CLEAR_COMMAND: &str = "/clear";
const QUIT_COMMAND: &str = "/quit";

fn render(message: &Message) {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "barq",
    };
    println!("[{}] {}", label, message.text);
}

async fn confirm(lines: &mut Lines<BufReader<Stdin>>) -> Result<bool, std::io::Error> {
    println!("Clear the conversation and start over? [y/N]");
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let prompts = match &args.prompts_path {
        Some(path) => load_prompts(path)?,
        None => Arc::new(PromptConfig::default()),
    };
    let store = create_history_store(&args)?;
    let proxy = Arc::new(HttpChatProxy::new(args.proxy_url.clone()));
    let session = ConversationSession::new(store, proxy, prompts);

    session.load().await?;
    for message in session.transcript().await {
        render(&message);
    }
    info!("Chat ready against {}. Type {} to reset or {} to exit.", args.proxy_url, CLEAR_COMMAND, QUIT_COMMAND);

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            QUIT_COMMAND => break,
            CLEAR_COMMAND => {
                if confirm(&mut lines).await? {
                    session.clear().await?;
                    for message in session.transcript().await {
                        render(&message);
                    }
                }
            }
            input => {
                println!("...");
                match session.send(input).await {
                    Ok(_) => {
                        if let Some(last) = session.transcript().await.last() {
                            render(last);
                        }
                    }
                    Err(SessionError::Busy) => println!("Still waiting for the previous reply."),
                    Err(SessionError::EmptyMessage) => {}
                    Err(SessionError::Storage(e)) => {
                        error!("Failed to save conversation: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}
