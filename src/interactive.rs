//! Line-based front end for the [`Controller`].
//!
//! Plain lines are product details. Lines starting with `:` are commands.
//! Provider calls run in the background so selections can be changed while a
//! draft is still being customized; only the latest selection is shown.

use std::sync::Arc;

use clap::ValueEnum;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};
use tracing_indicatif::{indicatif_eprintln, indicatif_println};

use crate::AppResult;
use crate::ai::provider::Provider;
use crate::controller::choices::{Length, Tone};
use crate::controller::{Controller, Update};

const HELP: &str = "Describe your product or service (20+ characters) to generate a testimonial.

Commands:
  :tone <professional|friendly|enthusiastic|humorous>
  :length <short|medium|long>
  :refresh    customize the current draft again
  :show       print the current draft and selection
  :help       this message
  :quit       leave";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Generate(String),
    Tone(Tone),
    Length(Length),
    Refresh,
    Show,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Some(Command::Generate(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "tone" | "t" => Command::Tone(Tone::from_str(arg, true).map_err(|_| {
                format!("unknown tone `{arg}`")
            })?),
            "length" | "l" => Command::Length(Length::from_str(arg, true).map_err(|_| {
                format!("unknown length `{arg}`")
            })?),
            "refresh" | "r" => Command::Refresh,
            "show" | "s" => Command::Show,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => return Err(format!("unknown command `:{other}`, try :help")),
        };
        Ok(Some(command))
    }
}

/// Read commands from stdin until `:quit` or end of input.
pub async fn run(controller: Arc<Controller<dyn Provider>>) -> AppResult<()> {
    indicatif_println!("{HELP}");
    drive(controller, BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}

/// Run commands from `input`, then wait for every request still pending.
///
/// Returns the updates of the requests that completed successfully, in
/// completion order. Each result is presented as soon as it arrives.
#[tracing::instrument(name = "Interactive session", level = "debug", skip_all)]
async fn drive<R>(controller: Arc<Controller<dyn Provider>>, input: R) -> AppResult<Vec<Update>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut pending: JoinSet<AppResult<Update>> = JoinSet::new();
    let mut updates = Vec::new();

    while let Some(line) = lines.next_line().await? {
        while let Some(done) = pending.try_join_next() {
            updates.extend(finished(done));
        }

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                indicatif_eprintln!("{msg}");
                continue;
            }
        };

        let controller = controller.clone();
        match command {
            Command::Quit => break,
            Command::Help => indicatif_println!("{HELP}"),
            Command::Show => show(&controller).await,
            Command::Generate(details) => {
                pending.spawn(async move { controller.generate(details).await });
            }
            Command::Tone(tone) => {
                pending.spawn(async move { controller.select_tone(tone).await });
            }
            Command::Length(length) => {
                pending.spawn(async move { controller.select_length(length).await });
            }
            Command::Refresh => {
                pending.spawn(async move { controller.refresh().await });
            }
        }
    }

    if !pending.is_empty() {
        indicatif_println!("Waiting for {} pending request(s)...", pending.len());
    }
    while let Some(done) = pending.join_next().await {
        updates.extend(finished(done));
    }
    Ok(updates)
}

fn finished(done: Result<AppResult<Update>, JoinError>) -> Option<Update> {
    match done {
        Ok(result) => present(result),
        Err(e) => {
            error!("Request task failed: {e}");
            None
        }
    }
}

async fn show(controller: &Controller<dyn Provider>) {
    let session = controller.snapshot().await;
    indicatif_println!("tone: {}, length: {}", session.tone(), session.length());
    if session.is_busy() {
        indicatif_println!("(working...)");
    }
    match session.displayed() {
        Some(text) => indicatif_println!("\n{text}\n"),
        None => indicatif_println!("No testimonial yet."),
    }
    if let Some(notice) = session.notice() {
        indicatif_eprintln!("{} {}", notice.message, notice.detail);
    }
}

fn present(result: AppResult<Update>) -> Option<Update> {
    match &result {
        Ok(Update::Displayed(text)) => indicatif_println!("\n{text}\n"),
        Ok(Update::Waiting) => {
            indicatif_println!("Selection saved. Describe a product first to get a draft.")
        }
        Ok(Update::Superseded) => debug!("Result superseded by a newer request"),
        Err(e) => indicatif_eprintln!("{e}"),
    }
    result.ok()
}
