use crate::app::{Session, Stage};
use crate::settings::Settings;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const LABEL_WIDTH: usize = 12;

/// Color palette handed to the projector.
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,
    pub download: Color,
    pub upload: Color,
    pub server: Color,
    pub warn: Color,
    pub error: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_muted: Color,
    pub border: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(100, 149, 237),
            download: Color::Rgb(134, 194, 156),
            upload: Color::Rgb(147, 180, 220),
            server: Color::Rgb(208, 208, 208),
            warn: Color::Rgb(220, 180, 130),
            error: Color::Rgb(255, 68, 68),
            text_primary: Color::Rgb(230, 230, 230),
            text_secondary: Color::Rgb(160, 160, 160),
            text_muted: Color::Rgb(100, 100, 100),
            border: Color::Rgb(60, 60, 65),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub theme: Theme,
    pub show_latency: bool,
    /// Whether the footer mentions the quit key.
    pub key_hints: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            show_latency: true,
            key_hints: true,
        }
    }
}

impl From<&Settings> for ViewOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            theme: Theme::default(),
            show_latency: settings.show_latency,
            key_hints: true,
        }
    }
}

/// Projects the session into the text body of a frame.
pub fn render(session: &Session, opts: &ViewOptions) -> Text<'static> {
    let theme = &opts.theme;
    let dim = Style::default().fg(theme.text_muted);

    if let (Stage::Failed, Some(err)) = (session.stage, session.last_error.as_ref()) {
        return Text::from(Line::from(Span::styled(
            format!("Error: {}", err),
            Style::default().fg(theme.error),
        )));
    }

    let spinner = session.spinner();
    let mut lines = Vec::with_capacity(5);

    let server = match session.selected_endpoint.as_ref() {
        Some(endpoint) => {
            let mut spans = vec![Span::styled(
                format!("{} ({})", endpoint.name, endpoint.country),
                Style::default().fg(theme.server).add_modifier(Modifier::BOLD),
            )];
            if opts.show_latency {
                spans.push(Span::styled("  ·  ", dim));
                spans.push(Span::styled(
                    format!("{:.0} ms", endpoint.latency_ms),
                    Style::default().fg(theme.warn),
                ));
            }
            spans
        }
        None if session.cancelled => vec![Span::styled("...", dim)],
        None => vec![Span::styled(format!("{} Finding best server...", spinner), dim)],
    };
    lines.push(labelled("Server", server, theme));

    let download = match session.download_result {
        Some(value) => Span::styled(
            value.to_string(),
            Style::default().fg(theme.download).add_modifier(Modifier::BOLD),
        ),
        None if session.stage == Stage::TestingDownload && !session.cancelled => {
            Span::styled(format!("{} Testing download...", spinner), dim)
        }
        None => Span::styled("...", dim),
    };
    lines.push(labelled("Download", vec![download], theme));

    let upload = match session.upload_result {
        Some(value) => Span::styled(
            value.to_string(),
            Style::default().fg(theme.upload).add_modifier(Modifier::BOLD),
        ),
        None if session.stage == Stage::TestingUpload && !session.cancelled => {
            Span::styled(format!("{} Testing upload...", spinner), dim)
        }
        None => Span::styled("...", dim),
    };
    lines.push(labelled("Upload", vec![upload], theme));

    let footer = match (session.cancelled, session.stage, opts.key_hints) {
        (true, _, _) => Some("Cancelled."),
        (false, Stage::Done, true) => Some("Done. Press 'q' to exit."),
        (false, Stage::Done, false) => Some("Done."),
        (false, _, true) => Some("Press 'q' to quit"),
        (false, _, false) => None,
    };
    if let Some(footer) = footer {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(footer, dim)));
    }

    Text::from(lines)
}

fn labelled(label: &str, mut value: Vec<Span<'static>>, theme: &Theme) -> Line<'static> {
    let mut spans = Vec::with_capacity(value.len() + 1);
    spans.push(Span::styled(
        format!("{:<width$}", label, width = LABEL_WIDTH),
        Style::default().fg(theme.text_secondary),
    ));
    spans.append(&mut value);
    Line::from(spans)
}

/// Flattens rendered text to plain lines, dropping all styling.
pub fn plain(text: &Text) -> String {
    text.lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain report printed after the terminal has been restored.
pub fn summary(session: &Session) -> String {
    let opts = ViewOptions {
        key_hints: false,
        ..ViewOptions::default()
    };
    plain(&render(session, &opts))
}

pub fn draw_ui(frame: &mut Frame, session: &Session, opts: &ViewOptions) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(5),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], session, &opts.theme);

    let body = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(opts.theme.border));
    let inner = body.inner(chunks[1]);
    frame.render_widget(body, chunks[1]);
    frame.render_widget(
        Paragraph::new(render(session, opts)).wrap(Wrap { trim: false }),
        inner,
    );

    frame.render_widget(
        Paragraph::new("q quit")
            .style(Style::default().fg(opts.theme.text_muted))
            .alignment(Alignment::Center),
        chunks[2],
    );
}

fn draw_header(frame: &mut Frame, area: Rect, session: &Session, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(theme.border));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::horizontal([
        Constraint::Length(12),
        Constraint::Min(10),
        Constraint::Length(20),
    ])
    .split(inner);

    let title = Paragraph::new("speedrun")
        .style(Style::default().fg(theme.text_primary).add_modifier(Modifier::BOLD));
    frame.render_widget(title, chunks[0]);

    let (status, color) = if session.cancelled {
        ("Cancelled", theme.text_muted)
    } else {
        match session.stage {
            Stage::Idle => ("Ready", theme.text_muted),
            Stage::DiscoveringServer => ("Finding server...", theme.warn),
            Stage::TestingDownload => ("Testing download...", theme.download),
            Stage::TestingUpload => ("Testing upload...", theme.upload),
            Stage::Done => ("Complete", theme.accent),
            Stage::Failed => ("Failed", theme.error),
        }
    };

    frame.render_widget(
        Paragraph::new(status)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new(create_stage_text(session.stage, theme)).alignment(Alignment::Right),
        chunks[2],
    );
}

fn create_stage_text(stage: Stage, theme: &Theme) -> Line<'static> {
    let stages = [
        (Stage::DiscoveringServer, "server"),
        (Stage::TestingDownload, "down"),
        (Stage::TestingUpload, "up"),
    ];

    let mut spans = Vec::new();

    for (i, (s, label)) in stages.iter().enumerate() {
        let is_active = stage == *s;
        let is_complete = match stage {
            Stage::TestingDownload => *s == Stage::DiscoveringServer,
            Stage::TestingUpload => *s != Stage::TestingUpload,
            Stage::Done => true,
            _ => false,
        };

        let style = if is_active {
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
        } else if is_complete {
            Style::default().fg(theme.text_secondary)
        } else {
            Style::default().fg(theme.text_muted)
        };

        spans.push(Span::styled(*label, style));

        if i < stages.len() - 1 {
            spans.push(Span::styled(" / ", Style::default().fg(theme.text_muted)));
        }
    }

    Line::from(spans)
}
