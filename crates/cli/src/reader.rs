//! Line-oriented viewer: one command per input line, one or more lines of
//! report per command.

use anyhow::{bail, Context, Result};
use pdf_engine::PdfBackend;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use viewer_core::{RenderApply, RenderTicket, ViewingSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    Next,
    Previous,
    GoTo(u32),
    ZoomIn,
    ZoomOut,
    Rotate,
    Search(String),
    Render(PathBuf),
    Status,
    Retry,
    Close,
    Quit,
}

impl ViewerCommand {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "next" => Self::Next,
            "prev" => Self::Previous,
            "goto" => {
                let page =
                    rest.parse().with_context(|| format!("goto expects a page number, got `{rest}`"))?;
                Self::GoTo(page)
            }
            "zoom-in" => Self::ZoomIn,
            "zoom-out" => Self::ZoomOut,
            "rotate" => Self::Rotate,
            "search" => Self::Search(rest.to_owned()),
            "render" => {
                if rest.is_empty() {
                    bail!("render expects an output path");
                }
                Self::Render(PathBuf::from(rest))
            }
            "status" => Self::Status,
            "retry" => Self::Retry,
            "close" => Self::Close,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command `{other}`"),
        };

        Ok(Some(command))
    }
}

pub fn status_line<B: PdfBackend>(session: &ViewingSession<B>) -> String {
    if !session.has_document() {
        return match session.load_error() {
            Some(message) => message.to_owned(),
            None => "no document open".to_owned(),
        };
    }

    let reader = session.reader();
    let mut line = format!(
        "page {}/{} zoom {}% rotation {}",
        reader.current_page,
        session.total_pages(),
        reader.zoom.percent(),
        reader.rotation.degrees()
    );

    if let Some(message) = session.render_error() {
        line.push_str(" | ");
        line.push_str(message);
    }

    line
}

/// Drives `session` from `input` until `quit` or end of input. Command
/// errors are reported on `output` and do not end the loop.
pub fn run_reader<B, R, W>(session: &mut ViewingSession<B>, input: R, output: &mut W) -> Result<()>
where
    B: PdfBackend,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{}", status_line(session))?;

    for line in input.lines() {
        let line = line.context("failed to read command")?;

        let command = match ViewerCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(output, "error: {err:#}")?;
                continue;
            }
        };

        if command == ViewerCommand::Quit {
            break;
        }

        if let Err(err) = execute(session, command, output) {
            writeln!(output, "error: {err:#}")?;
        }
    }

    output.flush()?;
    Ok(())
}

fn execute<B, W>(session: &mut ViewingSession<B>, command: ViewerCommand, output: &mut W) -> Result<()>
where
    B: PdfBackend,
    W: Write,
{
    match command {
        ViewerCommand::Next => navigate(session, output, |session| session.next_page()),
        ViewerCommand::Previous => navigate(session, output, |session| session.previous_page()),
        ViewerCommand::GoTo(page) => navigate(session, output, |session| session.go_to_page(page)),
        ViewerCommand::ZoomIn => {
            if session.has_document() && !session.can_zoom_in() {
                bail!("already at the largest zoom ({}%)", session.zoom().percent());
            }
            navigate(session, output, |session| session.zoom_in())
        }
        ViewerCommand::ZoomOut => {
            if session.has_document() && !session.can_zoom_out() {
                bail!("already at the smallest zoom ({}%)", session.zoom().percent());
            }
            navigate(session, output, |session| session.zoom_out())
        }
        ViewerCommand::Rotate => navigate(session, output, |session| session.rotate()),
        ViewerCommand::Search(query) => {
            let matches = session.search(&query);
            for hit in matches {
                writeln!(output, "page {}: {}", hit.page_number, hit.excerpt)?;
            }
            writeln!(output, "{} result(s)", matches.len())?;
            Ok(())
        }
        ViewerCommand::Render(path) => {
            let Some(surface) = session.surface() else {
                bail!("no rendered page to write");
            };
            surface
                .image
                .save(&path)
                .with_context(|| format!("failed to write image to {}", path.display()))?;
            writeln!(output, "wrote {}", path.display())?;
            Ok(())
        }
        ViewerCommand::Status => {
            writeln!(output, "{}", status_line(session))?;
            Ok(())
        }
        ViewerCommand::Retry => {
            let ticket = session.retry()?;
            session.run_render(ticket);
            writeln!(output, "{}", status_line(session))?;
            Ok(())
        }
        ViewerCommand::Close => {
            session.close();
            writeln!(output, "closed")?;
            Ok(())
        }
        ViewerCommand::Quit => Ok(()),
    }
}

fn navigate<B, W, F>(session: &mut ViewingSession<B>, output: &mut W, action: F) -> Result<()>
where
    B: PdfBackend,
    W: Write,
    F: FnOnce(&mut ViewingSession<B>) -> Option<RenderTicket>,
{
    if let Some(ticket) = action(session) {
        if session.run_render(ticket) == RenderApply::Discarded {
            tracing::debug!("render superseded before completion");
        }
    }

    writeln!(output, "{}", status_line(session))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doc_model::{DocumentContent, DocumentId, DocumentRecord};
    use pdf_engine::fixtures::FixturePdf;
    use pdf_engine::{default_backend, LopdfBackend};

    fn open_session(pages: &[&str]) -> ViewingSession<LopdfBackend> {
        let bytes = FixturePdf::new().pages(pages.iter().copied()).build();
        let record = DocumentRecord {
            id: DocumentId::from("doc"),
            display_name: "doc.pdf".to_owned(),
            title: "doc".to_owned(),
            content: Some(DocumentContent::new(bytes)),
            thumbnail: String::new(),
            uploaded_at: Utc::now(),
        };

        let mut session = ViewingSession::new(default_backend());
        let ticket = session.open(&record).expect("open should succeed");
        session.run_render(ticket);
        session
    }

    fn drive(session: &mut ViewingSession<LopdfBackend>, script: &str) -> String {
        let mut output = Vec::new();
        run_reader(session, script.as_bytes(), &mut output).expect("reader should run");
        String::from_utf8(output).expect("utf8 output")
    }

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(ViewerCommand::parse("  next ").expect("parses"), Some(ViewerCommand::Next));
        assert_eq!(ViewerCommand::parse("goto 7").expect("parses"), Some(ViewerCommand::GoTo(7)));
        assert_eq!(
            ViewerCommand::parse("search annual  report").expect("parses"),
            Some(ViewerCommand::Search("annual  report".to_owned()))
        );
        assert_eq!(ViewerCommand::parse("").expect("parses"), None);
        assert!(ViewerCommand::parse("goto seven").is_err());
        assert!(ViewerCommand::parse("render").is_err());
        assert!(ViewerCommand::parse("dance").is_err());
    }

    #[test]
    fn navigation_reports_status_after_each_command() {
        let mut session = open_session(&["one", "two", "three"]);
        let output = drive(&mut session, "next\nzoom-in\nrotate\nprev\nprev\n");

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "page 1/3 zoom 100% rotation 0",
                "page 2/3 zoom 100% rotation 0",
                "page 2/3 zoom 125% rotation 0",
                "page 2/3 zoom 125% rotation 90",
                "page 1/3 zoom 125% rotation 90",
                "page 1/3 zoom 125% rotation 90",
            ]
        );
    }

    #[test]
    fn search_lists_matching_pages() {
        let mut session = open_session(&["alpha beta", "gamma", "Beta again"]);
        let output = drive(&mut session, "search beta\n");

        assert!(output.contains("page 1: alpha beta..."));
        assert!(output.contains("page 3: beta again..."));
        assert!(output.contains("2 result(s)"));
    }

    #[test]
    fn errors_do_not_stop_the_loop_and_quit_does() {
        let mut session = open_session(&["one", "two"]);
        let output = drive(&mut session, "dance\ngoto 2\nquit\nnext\n");

        assert!(output.contains("error: unknown command `dance`"));
        assert!(output.contains("page 2/2"));
        assert_eq!(output.lines().count(), 3);
    }

    #[test]
    fn render_writes_current_surface() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("page.png");
        let mut session = open_session(&["one"]);

        let output = drive(&mut session, &format!("render {}\n", path.display()));

        assert!(output.contains("wrote"));
        let image = image::open(&path).expect("png should be readable");
        assert_eq!((image.width(), image.height()), (612, 792));
    }

    #[test]
    fn zoom_limits_are_reported() {
        let mut session = open_session(&["one"]);
        let output = drive(&mut session, "zoom-out\nzoom-out\nzoom-out\n");

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[2], "page 1/1 zoom 50% rotation 0");
        assert_eq!(lines[3], "error: already at the smallest zoom (50%)");
    }

    #[test]
    fn retry_reopens_the_document() {
        let mut session = open_session(&["one", "two"]);
        let output = drive(&mut session, "next\nretry\n");

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[1], "page 2/2 zoom 100% rotation 0");
        assert_eq!(lines[2], "page 1/2 zoom 100% rotation 0");
    }

    #[test]
    fn close_resets_state() {
        let mut session = open_session(&["one", "two"]);
        let output = drive(&mut session, "next\nclose\nstatus\nnext\n");

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[2], "closed");
        assert_eq!(lines[3], "no document open");
        assert_eq!(lines[4], "no document open");
    }

    #[test]
    fn retry_after_close_reports_error() {
        let mut session = open_session(&["one"]);
        let output = drive(&mut session, "close\nretry\n");

        assert!(output.contains("error: no document has been opened in this session"));
    }
}
