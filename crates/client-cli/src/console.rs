//! Line-oriented presenter and participant consoles.
//!
//! Both loops redraw after every poll snapshot and after every command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::{MessageInfo, MessageList, SessionStatus};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ApiClient;
use crate::config::PollingConfig;
use crate::error::ClientError;
use crate::participant::ParticipantClient;
use crate::poller::{self, PollOptions, Snapshot, StopReason};
use crate::presenter::{PresentationController, View};

const PRESENTER_HELP: &str =
    "commands: open N | next | prev | back | code | hl [N] | unhl [N] | answer [N] | end | quit";
const PARTICIPANT_HELP: &str = "commands: ask <text> | like N | mine | all | quit";

// ============================================================================
// Rendering
// ============================================================================

fn flags(message: &MessageInfo) -> String {
    let mut flags = String::new();
    if message.is_highlighted {
        flags.push_str(" \x1b[33m★\x1b[0m");
    }
    if message.is_answered {
        flags.push_str(" \x1b[32m✓\x1b[0m");
    }
    flags
}

fn author(message: &MessageInfo) -> &str {
    message.author.display_name().unwrap_or("Anonymous")
}

/// Coarse age of a message; clock skew into the future reads as "just now"
fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);
    if elapsed.num_days() > 0 {
        format!("{}d ago", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_minutes() > 0 {
        format!("{}m ago", elapsed.num_minutes())
    } else {
        "just now".to_string()
    }
}

pub fn render_row(position: usize, message: &MessageInfo) -> String {
    render_row_at(position, message, Utc::now())
}

fn render_row_at(position: usize, message: &MessageInfo, now: DateTime<Utc>) -> String {
    format!(
        "{:>3}. [{:>3} ♥] {} \x1b[90m({}, {})\x1b[0m{}",
        position,
        message.likes,
        message.text,
        author(message),
        time_ago(message.created_at, now),
        flags(message)
    )
}

fn render_banner(snapshot: &Snapshot) {
    if snapshot.banner {
        eprintln!(
            "\x1b[31m⚠ Connection problems ({} failed polls): {}\x1b[0m",
            snapshot.consecutive_failures,
            snapshot.last_error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn render_header(list: &MessageList) {
    let session = &list.session;
    println!(
        "\x1b[1m{}\x1b[0m  [{}]  code \x1b[1;36m{}\x1b[0m  {} messages  {}",
        session.title, session.course_ref, session.code, session.messages_count, session.duration
    );
}

fn render_presenter(controller: &PresentationController) {
    println!();
    if controller.code_modal() {
        println!("\x1b[1;36m    Join code:  {}    \x1b[0m", controller.code());
        println!("\x1b[90m    ('code' to hide)\x1b[0m");
    }

    match controller.view() {
        View::Grid => {
            if controller.messages().is_empty() {
                println!("\x1b[90mNo questions yet.\x1b[0m");
            }
            for (i, message) in controller.messages().iter().enumerate() {
                println!("{}", render_row(i + 1, message));
            }
        }
        View::Fullscreen { .. } => {
            if let (Some(index), Some(message)) =
                (controller.current_index(), controller.current_message())
            {
                println!(
                    "\x1b[90mQuestion {} of {}\x1b[0m",
                    index + 1,
                    controller.messages().len()
                );
                println!();
                println!("    \x1b[1m{}\x1b[0m", message.text);
                println!();
                println!(
                    "    {} · {} likes{}",
                    author(message),
                    message.likes,
                    flags(message)
                );
            }
        }
        View::Terminal => println!("\x1b[1mSession ended.\x1b[0m"),
    }
}

fn render_participant(client: &ParticipantClient, messages: &[MessageInfo], only_mine: bool) {
    println!();
    let shown: Vec<&MessageInfo> = if only_mine {
        client.my_messages(messages)
    } else {
        messages.iter().collect()
    };
    if shown.is_empty() {
        println!("\x1b[90mNothing here yet.\x1b[0m");
    }
    for (i, message) in shown.iter().enumerate() {
        let marker = if client.is_mine(message.id) { " \x1b[36m(you)\x1b[0m" } else { "" };
        println!("{}{}", render_row(i + 1, message), marker);
    }
}

fn report(e: &ClientError) {
    eprintln!("\x1b[31m✗ {}\x1b[0m", e);
}

fn position_arg(arg: Option<&str>) -> Option<usize> {
    arg.and_then(|a| a.trim().parse().ok())
}

// ============================================================================
// Presenter
// ============================================================================

pub async fn run_presenter(
    api: Arc<ApiClient>,
    mut controller: PresentationController,
    polling: &PollingConfig,
) -> Result<()> {
    let handle = poller::spawn(api.clone(), controller.session_id(), PollOptions::presenter(polling));
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", PRESENTER_HELP);
    controller.show_code();
    render_presenter(&controller);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                render_banner(&snapshot);
                if let Some(list) = &snapshot.list {
                    controller.refresh(list);
                    render_header(list);
                }
                if let Some(StopReason::Rejected(reason)) = &snapshot.stopped {
                    eprintln!("\x1b[31mPolling stopped: {}\x1b[0m", reason);
                    break;
                }
                render_presenter(&controller);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (command, arg) = match line.trim().split_once(' ') {
                    Some((command, arg)) => (command, Some(arg)),
                    None => (line.trim(), None),
                };
                if command == "quit" {
                    break;
                }
                presenter_command(&api, &mut controller, command, arg).await;
                render_presenter(&controller);
            }
        }

        if controller.is_terminal() {
            break;
        }
    }

    handle.cancel();
    Ok(())
}

/// Resolve the message a moderation command applies to
fn moderation_target(controller: &PresentationController, arg: Option<&str>) -> Option<MessageInfo> {
    match position_arg(arg) {
        Some(position) => position
            .checked_sub(1)
            .and_then(|i| controller.messages().get(i))
            .cloned(),
        None => controller.current_message().cloned(),
    }
}

async fn presenter_command(
    api: &ApiClient,
    controller: &mut PresentationController,
    command: &str,
    arg: Option<&str>,
) {
    let session_id = controller.session_id();
    let outcome = match command {
        "open" => match position_arg(arg) {
            Some(position) => controller.select_position(position).map(|_| ()),
            None => {
                println!("usage: open N");
                Ok(())
            }
        },
        "next" => controller.next().map(|_| ()),
        "prev" => controller.prev().map(|_| ()),
        "back" => controller.exit(),
        "code" => {
            controller.toggle_code();
            Ok(())
        }
        "hl" | "unhl" | "answer" => {
            let Some(target) = moderation_target(controller, arg) else {
                println!("usage: {} N (or open a question first)", command);
                return;
            };
            let result = match command {
                "answer" => api.mark_answered(session_id, target.id).await,
                _ => api.highlight(session_id, target.id, command == "hl").await,
            };
            match result {
                Ok(updated) => controller.apply(updated),
                Err(e) => report(&e),
            }
            Ok(())
        }
        "end" => {
            match api.end_session(session_id).await {
                Ok(ended) => {
                    tracing::info!("Session {} ended at {}", session_id, ended.ended_at);
                    controller.end();
                }
                Err(e) => report(&e),
            }
            Ok(())
        }
        "" => Ok(()),
        _ => {
            println!("{}", PRESENTER_HELP);
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("\x1b[33m{}\x1b[0m", e);
    }
}

// ============================================================================
// Participant
// ============================================================================

/// Submits without touching the shown list; the next poll brings the message in.
async fn ask(client: &mut ParticipantClient, text: &str) {
    match client.submit(text).await {
        Ok(_) => println!("\x1b[32m✓ Sent\x1b[0m"),
        Err(e) => report(&e),
    }
}

pub async fn run_participant(
    api: Arc<ApiClient>,
    mut client: ParticipantClient,
    polling: &PollingConfig,
) -> Result<()> {
    let handle = poller::spawn(api, client.session_id(), PollOptions::participant(polling));
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut messages: Vec<MessageInfo> = Vec::new();
    let mut only_mine = false;
    let mut ended = false;

    println!(
        "Joined \x1b[1m{}\x1b[0m [{}] as {}",
        client.session().title,
        client.session().course_ref,
        client.author().display_name().unwrap_or("Anonymous")
    );
    println!("{}", PARTICIPANT_HELP);

    loop {
        tokio::select! {
            changed = snapshots.changed(), if !ended => {
                if changed.is_err() {
                    ended = true;
                    continue;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                render_banner(&snapshot);
                if let Some(list) = snapshot.list {
                    ended = list.session.status == SessionStatus::Ended;
                    messages = list.messages;
                    render_participant(&client, &messages, only_mine);
                }
                if ended {
                    println!("\x1b[1mThe presenter has ended this session.\x1b[0m");
                    break;
                }
                if let Some(StopReason::Rejected(reason)) = snapshot.stopped {
                    eprintln!("\x1b[31mPolling stopped: {}\x1b[0m", reason);
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                let (command, arg) = match line.split_once(' ') {
                    Some((command, arg)) => (command, Some(arg)),
                    None => (line, None),
                };
                match command {
                    "quit" => break,
                    "ask" => ask(&mut client, arg.unwrap_or_default()).await,
                    "like" => {
                        let shown: Vec<&MessageInfo> = if only_mine {
                            client.my_messages(&messages)
                        } else {
                            messages.iter().collect()
                        };
                        let target = position_arg(arg)
                            .and_then(|p| p.checked_sub(1))
                            .and_then(|i| shown.get(i))
                            .map(|m| m.id);
                        match target {
                            Some(id) => match client.like(id).await {
                                Ok(likes) => println!("\x1b[32m♥ {}\x1b[0m", likes),
                                Err(e) => report(&e),
                            },
                            None => println!("usage: like N"),
                        }
                    }
                    "mine" => {
                        only_mine = true;
                        render_participant(&client, &messages, only_mine);
                    }
                    "all" => {
                        only_mine = false;
                        render_participant(&client, &messages, only_mine);
                    }
                    "" => {}
                    _ => println!("{}", PARTICIPANT_HELP),
                }
            }
        }
    }

    handle.cancel();
    Ok(())
}
