use log::error;
use tui::backend::Backend;
use tui::layout::{Alignment, Constraint, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Line, Span};
use tui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use tui::{Frame, Terminal};
use tui_logger::TuiLoggerWidget;

use crate::app::App;
use crate::components::league_card::{CARD_HEIGHT, LeagueCard, MIN_CARD_WIDTH, SkeletonCard};
use crate::query::leagues::LeaguesView;
use crate::state::app_state::{CardHitbox, InputMode};
use crate::state::network::{ERROR_CHAR, LoadingState};
use crate::ui::layout::{LayoutAreas, grid_columns};

const SKELETON_COUNT: usize = 6;

const HELP_TEXT: &str = "\
/ or i   search leagues (Enter/Esc to finish)
s / S    next / previous sport
c        clear filters
arrows   move selection (hjkl works too)
Enter    show or hide the badge
r        reload leagues
f        full screen
\"        toggle logs
q        quit";

pub fn draw<B>(terminal: &mut Terminal<B>, app: &mut App, loading: LoadingState)
where
    B: Backend,
{
    let current_size = terminal.size().unwrap_or_default();
    if current_size.width <= 10 || current_size.height <= 10 {
        return;
    }

    let mut layout = LayoutAreas::new(current_size);
    let view = app.leagues();

    let result = terminal.draw(|f| {
        layout.update(f.area(), app.settings.full_screen, app.state.show_logs);

        if !app.settings.full_screen {
            draw_header(f, layout.header);
            draw_filters(f, layout.filters, app, &view);
        }
        draw_grid(f, layout.main, app, &view);

        if app.state.show_logs {
            draw_logs(f, layout.logs);
        }
        if app.state.show_help {
            draw_help(f, f.area());
        }
        draw_toast(f, f.area(), app);
        draw_loading_spinner(f, f.area(), app, loading);
    });
    if let Err(e) = result {
        error!("draw failed: {e}");
    }
}

pub fn default_border<'a>(color: Color) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
}

fn draw_header(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                "Sports Leagues",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Discover and explore leagues from around the world",
                Style::default().fg(Color::Gray),
            )),
        ]),
        inner,
    );
}

fn draw_filters(f: &mut Frame, area: Rect, app: &App, view: &LeaguesView) {
    let block = default_border(Color::DarkGray);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let [controls, count] = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(inner);

    let editing = app.state.input_mode == InputMode::Search;
    let search = match (editing, view.search_term.is_empty()) {
        (true, _) => Span::styled(format!("{}_", view.search_term), Style::default().fg(Color::Yellow)),
        (false, true) => Span::styled("Search leagues…", Style::default().fg(Color::DarkGray)),
        (false, false) => Span::raw(view.search_term.clone()),
    };
    let sport = if view.selected_sport.is_empty() {
        Span::styled("All sports", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(view.selected_sport.clone(), Style::default().fg(Color::Red))
    };
    let clear_style = if view.has_filters() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
    };

    let key = Style::default().fg(Color::DarkGray);
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("/ ", key),
            search,
            Span::styled("   s ", key),
            sport,
            Span::styled("   c ", key),
            Span::styled("Clear", clear_style),
        ])),
        controls,
    );

    f.render_widget(
        Paragraph::new(result_count(view.is_loading(), view.filtered_leagues.len()))
            .style(Style::default().fg(Color::Gray)),
        count,
    );
}

fn result_count(is_loading: bool, total: usize) -> String {
    if is_loading {
        return "Loading leagues…".to_string();
    }
    let suffix = if total == 1 { "" } else { "s" };
    format!("{} result{suffix}", thousands(total))
}

fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn draw_grid(f: &mut Frame, area: Rect, app: &mut App, view: &LeaguesView) {
    app.state.card_hitboxes.clear();
    if area.width == 0 || area.height == 0 {
        return;
    }

    let columns = grid_columns(area.width, MIN_CARD_WIDTH);
    app.state.grid.set_columns(columns as usize);
    let card_width = area.width / columns;
    let visible_rows = (area.height / CARD_HEIGHT).max(1);

    if view.is_loading() {
        for i in 0..SKELETON_COUNT {
            if let Some(cell) = grid_cell(area, i, columns, card_width, 0, visible_rows) {
                f.render_widget(SkeletonCard, cell);
            }
        }
        return;
    }

    if view.filtered_leagues.is_empty() {
        let msg = match view.error() {
            Some(_) if view.leagues.is_empty() => "Leagues could not be loaded. Press r to retry.",
            _ if view.has_filters() => "No leagues match your filters. Press c to clear them.",
            _ => "No leagues to show.",
        };
        f.render_widget(
            Paragraph::new(msg)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            area,
        );
        return;
    }

    app.state.grid.ensure_visible(visible_rows as usize);
    let scroll_row = app.state.grid.scroll_row;
    let selected = app.state.grid.selected;

    for (index, league) in view.filtered_leagues.iter().enumerate() {
        let Some(cell) = grid_cell(area, index, columns, card_width, scroll_row, visible_rows) else {
            continue;
        };
        let card = LeagueCard {
            league,
            search_term: &view.search_term,
            selected: index == selected,
            hovered: app.state.hovered.as_deref() == Some(league.id.as_str()),
            badge: app.badge_view(league),
        };
        f.render_widget(card, cell);
        app.state.card_hitboxes.push(CardHitbox {
            area: cell,
            index,
            league_id: league.id.clone(),
        });
    }
}

/// Screen area of card `index`, or `None` when it is scrolled out of view.
fn grid_cell(
    area: Rect,
    index: usize,
    columns: u16,
    card_width: u16,
    scroll_row: usize,
    visible_rows: u16,
) -> Option<Rect> {
    let row = (index / columns as usize).checked_sub(scroll_row)?;
    if row >= visible_rows as usize {
        return None;
    }
    let col = (index % columns as usize) as u16;
    Some(Rect::new(
        area.x + col * card_width,
        area.y + row as u16 * CARD_HEIGHT,
        card_width,
        CARD_HEIGHT,
    ))
}

fn draw_logs(f: &mut Frame, area: Rect) {
    let logs = TuiLoggerWidget::default()
        .block(default_border(Color::DarkGray).title(" Logs "))
        .style_error(Style::default().fg(Color::Red))
        .style_warn(Style::default().fg(Color::Yellow))
        .style_info(Style::default().fg(Color::Cyan))
        .style_debug(Style::default().fg(Color::Gray));
    f.render_widget(logs, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let popup = centered(area, 52, 13);
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(HELP_TEXT).block(default_border(Color::White).title(" Help ")),
        popup,
    );
}

fn draw_toast(f: &mut Frame, area: Rect, app: &App) {
    let Some(toast) = app.state.toast.current.as_ref() else {
        return;
    };
    let width = 36.min(area.width);
    let rect = Rect::new(area.right().saturating_sub(width + 1), area.bottom().saturating_sub(5), width, 4);
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(toast.title, Style::default().add_modifier(Modifier::BOLD))),
            Line::from(toast.description),
        ])
        .wrap(Wrap { trim: true })
        .block(default_border(Color::Red)),
        rect,
    );
}

fn draw_loading_spinner(f: &mut Frame, area: Rect, app: &App, loading: LoadingState) {
    if !loading.is_loading && loading.spinner_char != ERROR_CHAR {
        return;
    }
    let style = match loading.spinner_char {
        ERROR_CHAR => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::White),
    };
    let spinner = Paragraph::new(loading.spinner_char.to_string())
        .alignment(Alignment::Right)
        .style(style);
    let area = if app.settings.full_screen {
        Rect::new(area.width.saturating_sub(3), area.height.saturating_sub(2), 1, 1)
    } else {
        Rect::new(area.width.saturating_sub(2), 0, 1, 1)
    };
    f.render_widget(spinner, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
