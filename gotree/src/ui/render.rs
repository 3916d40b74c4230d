// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::app::App;
use gotree_runner::catalog::{
    Catalog, FailureReason, NodeRef, PackageGroup, PassKind, RunState, TestEntry,
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

const KEY_HELP: &str = "↑↓ move  space select  enter run/expand  r run selected  tab output  q quit";

pub(super) fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(2)])
        .split(frame.area());

    if app.show_output {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);
        draw_tree(frame, app, columns[0]);
        draw_output(frame, app, columns[1]);
    } else {
        draw_tree(frame, app, rows[0]);
    }

    draw_status(frame, app, rows[1]);
}

fn draw_tree(frame: &mut Frame, app: &App, area: Rect) {
    let catalog = app.session.catalog();
    let items: Vec<ListItem> = app
        .tree
        .visible_rows(catalog)
        .into_iter()
        .filter_map(|node| match catalog.node(node)? {
            NodeRef::Package(package) => {
                Some(package_item(package, app.tree.is_expanded(package.index())))
            }
            NodeRef::Entry(entry) => Some(entry_item(entry)),
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().title(" Tests ").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.tree.cursor()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn package_item(package: &PackageGroup, expanded: bool) -> ListItem<'_> {
    let selected = package.entries().iter().filter(|e| e.is_selected()).count();
    let marker = if selected == 0 {
        "[ ]"
    } else if selected == package.entries().len() {
        "[x]"
    } else {
        "[-]"
    };
    let arrow = if expanded { "▾" } else { "▸" };
    ListItem::new(Line::from(vec![
        Span::raw(format!("{marker} {arrow} ")),
        Span::styled(
            package.name(),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ({})", package.entries().len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
}

fn entry_item(entry: &TestEntry) -> ListItem<'_> {
    let marker = if entry.is_selected() { "[x]" } else { "[ ]" };
    let (glyph, color) = glyph(entry.run_state());
    ListItem::new(Line::from(vec![
        Span::raw(format!("    {marker} ")),
        Span::styled(
            glyph.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(entry.name()),
    ]))
}

/// The single-character status shown next to each test.
fn glyph(state: &RunState) -> (char, Color) {
    match state {
        RunState::Unstarted => (' ', Color::Reset),
        RunState::Queued => ('…', Color::DarkGray),
        RunState::Running => ('R', Color::Cyan),
        RunState::Passed(PassKind::Ok) => ('P', Color::Green),
        RunState::Passed(PassKind::Skipped) => ('S', Color::Yellow),
        RunState::Failed(FailureReason::Assertion) => ('F', Color::Red),
        RunState::Failed(_) => ('!', Color::Red),
    }
}

fn draw_output(frame: &mut Frame, app: &App, area: Rect) {
    let catalog = app.session.catalog();
    let (title, text) = match app.cursor_node().and_then(|node| catalog.node(node)) {
        Some(NodeRef::Entry(entry)) => (
            format!(" {} [{}] ", entry.name(), entry.run_state()),
            entry.captured_output(),
        ),
        Some(NodeRef::Package(package)) => (format!(" {} ", package.name()), ""),
        None => (" Output ".to_owned(), ""),
    };

    let paragraph = Paragraph::new(text)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false });

    // Keep the end of the output in view while a run is streaming. The count includes the
    // block's borders, and wrapping happens within them.
    let rendered = paragraph.line_count(area.width.saturating_sub(2));
    let scroll = u16::try_from(rendered)
        .unwrap_or(u16::MAX)
        .saturating_sub(area.height);
    frame.render_widget(paragraph.scroll((scroll, 0)), area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let counts = Counts::new(app.session.catalog());
    let count_line = Line::from(vec![
        Span::raw(format!("{} selected  ", counts.selected)),
        Span::styled(
            format!("{} running  ", counts.in_flight),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("{} passed  ", counts.passed),
            Style::default().fg(Color::Green),
        ),
        Span::styled(
            format!("{} skipped  ", counts.skipped),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("{} failed", counts.failed),
            Style::default().fg(Color::Red),
        ),
        Span::styled(
            format!("  | {}", app.status),
            Style::default().fg(Color::Gray),
        ),
    ]);
    let help_line = Line::styled(KEY_HELP, Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(vec![count_line, help_line]), area);
}

#[derive(Debug, Default)]
struct Counts {
    selected: usize,
    in_flight: usize,
    passed: usize,
    skipped: usize,
    failed: usize,
}

impl Counts {
    fn new(catalog: &Catalog) -> Self {
        let mut counts = Self::default();
        for entry in catalog.entries() {
            if entry.is_selected() {
                counts.selected += 1;
            }
            match entry.run_state() {
                RunState::Queued | RunState::Running => counts.in_flight += 1,
                RunState::Passed(PassKind::Ok) => counts.passed += 1,
                RunState::Passed(PassKind::Skipped) => counts.skipped += 1,
                RunState::Failed(_) => counts.failed += 1,
                RunState::Unstarted => {}
            }
        }
        counts
    }
}
