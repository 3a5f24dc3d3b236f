use crate::shared::{ClipRow, DisplayState};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

const HELP: &str =
    "Enter play  F2 hotkey  F3 rename  F4 favorite  F6 sort  Del remove  Tab cable  Esc quit";
const CAPTURE_HELP: &str = "press the chord  Enter accept  Backspace reset  Esc cancel";
const RENAME_HELP: &str = "type a title  Enter accept  Esc cancel";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // routing status
            Constraint::Min(3),    // clip list
            Constraint::Length(4), // status + key help
        ])
        .split(area);

    draw_routing(frame, sections[0], state);
    draw_clips(frame, sections[1], state);
    draw_footer(frame, sections[2], state);
}

fn draw_routing(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let playing = if state.playing {
        Span::styled("PLAYING", Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("idle", Style::default().fg(Color::DarkGray))
    };
    let cable = state.virtual_cable.as_deref().unwrap_or("none");
    let lines = vec![
        Line::from(vec![
            Span::raw(format!("router: {}   ", state.router_state)),
            playing,
        ]),
        Line::from(format!("virtual cable: {cable}")),
    ];
    let block = Block::default().borders(Borders::ALL).title(" soundboard ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_clips(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let items: Vec<ListItem> = state.clips.iter().map(clip_line).collect();
    let title = format!(" clips ({}) - sort: {} ", state.clips.len(), state.sort.label());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut list_state = ListState::default();
    if !state.clips.is_empty() {
        list_state.select(Some(state.selected));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn clip_line(row: &ClipRow) -> ListItem<'static> {
    let star = if row.favorite { "* " } else { "  " };
    let chord = row.chord.as_deref().unwrap_or("-");
    ListItem::new(Line::from(vec![
        Span::styled(star, Style::default().fg(Color::Yellow)),
        Span::raw(format!("{:<32}", row.title)),
        Span::styled(format!("{chord:<20}"), Style::default().fg(Color::Cyan)),
        Span::styled(format!("{} plays", row.play_count), Style::default().fg(Color::DarkGray)),
    ]))
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (first, help) = match (&state.capturing, &state.renaming) {
        (_, Some(title)) => (
            Line::from(Span::styled(
                format!("title: {title}_"),
                Style::default().fg(Color::LightMagenta),
            )),
            RENAME_HELP,
        ),
        (Some(chord), None) => {
            let shown = if chord.is_empty() { "..." } else { chord.as_str() };
            (
                Line::from(Span::styled(
                    format!("capturing: {shown}"),
                    Style::default().fg(Color::LightMagenta),
                )),
                CAPTURE_HELP,
            )
        }
        (None, None) => (
            Line::from(Span::styled(
                state.status.clone().unwrap_or_default(),
                Style::default().fg(Color::LightRed),
            )),
            HELP,
        ),
    };
    let lines = vec![first, Line::from(Span::styled(help, Style::default().fg(Color::DarkGray)))];
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}
