//! Line commands typed on stdin and the text printed back for session events.

use anyhow::{Result, anyhow, bail};
use narrator_core::{Notice, ReaderSnapshot, SessionState};
use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  n, next          next page
  p, prev          previous page
  g, goto <page>   jump to a page
  r, read          start or stop reading aloud
  m, mute          toggle mute
  s, status        show the current page
  o, open <path>   open another document
  c, close         close the document
  h, help          show this help
  q, quit          exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Next,
    Previous,
    GoTo(usize),
    ToggleReading,
    ToggleMute,
    Status,
    Open(PathBuf),
    Close,
    Help,
    Quit,
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "n" | "next" => ConsoleCommand::Next,
        "p" | "prev" | "previous" => ConsoleCommand::Previous,
        "g" | "goto" => {
            let page = rest
                .parse::<usize>()
                .map_err(|_| anyhow!("usage: goto <page number>"))?;
            ConsoleCommand::GoTo(page)
        }
        "r" | "read" => ConsoleCommand::ToggleReading,
        "m" | "mute" => ConsoleCommand::ToggleMute,
        "s" | "status" => ConsoleCommand::Status,
        "o" | "open" => {
            if rest.is_empty() {
                bail!("usage: open <path>");
            }
            ConsoleCommand::Open(PathBuf::from(rest))
        }
        "c" | "close" => ConsoleCommand::Close,
        "h" | "help" | "?" => ConsoleCommand::Help,
        "q" | "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (h for help)"),
    };
    Ok(Some(command))
}

pub fn status_line(snapshot: &ReaderSnapshot) -> String {
    let name = snapshot.document.as_deref().unwrap_or("no document");
    match snapshot.state {
        SessionState::Idle => "[idle] no document open".to_string(),
        SessionState::Loading => format!("[loading] {name}"),
        SessionState::Error => format!(
            "[error] {name}: {}",
            snapshot.error.as_deref().unwrap_or("failed to open")
        ),
        SessionState::Ready | SessionState::Reading => {
            let mut line = format!(
                "[{}] {name} page {}/{}",
                snapshot.state, snapshot.current_page, snapshot.total_pages
            );
            if snapshot.is_muted {
                line.push_str(" (muted)");
            }
            if snapshot.raster.is_none() {
                line.push_str(" (text only)");
            }
            line
        }
    }
}

pub fn describe_notice(notice: &Notice) -> String {
    match notice {
        Notice::DocumentLoadFailed { document, reason } => {
            format!("could not open {document}: {reason}")
        }
        Notice::PageRenderFailed { page, reason } => {
            format!("page {page} could not be displayed: {reason}")
        }
        Notice::NarrationFailed { page, reason } => {
            format!("narration stopped on page {page}: {reason}")
        }
        Notice::FinishedDocument { total_pages } => {
            format!("finished reading all {total_pages} pages")
        }
        Notice::Closed {
            location,
            page,
            total_pages,
        } => format!(
            "closed {} at page {page}/{total_pages}",
            location.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(parse_line("n").unwrap(), Some(ConsoleCommand::Next));
        assert_eq!(parse_line("  PREV ").unwrap(), Some(ConsoleCommand::Previous));
        assert_eq!(parse_line("goto 12").unwrap(), Some(ConsoleCommand::GoTo(12)));
        assert_eq!(parse_line("g 3").unwrap(), Some(ConsoleCommand::GoTo(3)));
        assert_eq!(parse_line("r").unwrap(), Some(ConsoleCommand::ToggleReading));
        assert_eq!(
            parse_line("open /livros/meu livro.txt").unwrap(),
            Some(ConsoleCommand::Open(PathBuf::from("/livros/meu livro.txt")))
        );
        assert_eq!(parse_line("q").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn rejects_bad_arguments_and_unknown_words() {
        assert!(parse_line("goto").is_err());
        assert!(parse_line("goto dez").is_err());
        assert!(parse_line("open").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn status_line_describes_each_state() {
        assert_eq!(status_line(&ReaderSnapshot::default()), "[idle] no document open");

        let reading = ReaderSnapshot {
            state: SessionState::Reading,
            document: Some("livro.txt".to_string()),
            current_page: 2,
            total_pages: 9,
            is_reading: true,
            is_muted: true,
            ..ReaderSnapshot::default()
        };
        assert_eq!(
            status_line(&reading),
            "[reading] livro.txt page 2/9 (muted) (text only)"
        );

        let failed = ReaderSnapshot {
            state: SessionState::Error,
            document: Some("x.bin".to_string()),
            error: Some("unsupported".to_string()),
            ..ReaderSnapshot::default()
        };
        assert_eq!(status_line(&failed), "[error] x.bin: unsupported");
    }

    #[test]
    fn notices_read_naturally() {
        let closed = Notice::Closed {
            location: PathBuf::from("/tmp/a.txt"),
            page: 3,
            total_pages: 10,
        };
        assert_eq!(describe_notice(&closed), "closed /tmp/a.txt at page 3/10");
        assert_eq!(
            describe_notice(&Notice::FinishedDocument { total_pages: 4 }),
            "finished reading all 4 pages"
        );
    }
}
