//! `dentassist chat`: interactive terminal mode.

use std::io::Write;
use std::path::Path;

use dentassist_core::session::{SessionId, Turn};
use tokio::io::{AsyncBufReadExt, BufReader};

const GREETING: &str =
    ". **Welcome! Ask me about dental conditions or upload an image for diagnosis.**";
const FAREWELL: &str = ". **Bye!**";

fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    super::require_api_key(&config)?;

    let agent = super::build_agent(&config);
    let session = SessionId::new();
    let mut history: Vec<Turn> = Vec::new();

    println!("{GREETING}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        if is_exit(&line) {
            println!("{FAREWELL}");
            break;
        }

        let dispatch = agent.dispatch(Some(&session), &line, &history).await;
        println!("{}\n", dispatch.text);

        history.push(Turn::user(line));
        history.push(Turn::assistant(dispatch.text));
    }

    Ok(())
}
