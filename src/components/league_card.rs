use crate::components::highlight::highlight_line;
use crate::query::QueryState;
use sportsdb_api::{League, SeasonBadge, latest_badge};
use tui::buffer::Buffer;
use tui::layout::{Alignment, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Line, Span};
use tui::widgets::{Block, BorderType, Borders, Paragraph, Widget};

/// Rows per card, borders included.
pub const CARD_HEIGHT: u16 = 7;
pub const MIN_CARD_WIDTH: u16 = 28;

const MARK: Style = Style::new().fg(Color::Black).bg(Color::Yellow);

/// What the badge row of a card shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeView {
    Collapsed,
    Loading,
    Badge { season: String, url: String },
    Missing { initials: String },
}

impl BadgeView {
    /// Expanded cards show the newest season's artwork, or the league's
    /// initials when there is none (including when the lookup failed).
    pub fn expanded(league: &League, query: &QueryState<Vec<SeasonBadge>>) -> Self {
        if query.is_loading() {
            return BadgeView::Loading;
        }
        let seasons = query.data.as_deref().map(Vec::as_slice).unwrap_or_default();
        match (latest_badge(seasons), seasons.last()) {
            (Some(url), Some(last)) => BadgeView::Badge {
                season: last.season.clone(),
                url: url.to_string(),
            },
            _ => BadgeView::Missing { initials: league.initials() },
        }
    }
}

pub struct LeagueCard<'a> {
    pub league: &'a League,
    pub search_term: &'a str,
    pub selected: bool,
    pub hovered: bool,
    pub badge: BadgeView,
}

impl Widget for LeagueCard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let expanded = self.badge != BadgeView::Collapsed;
        let border_color = match (expanded, self.selected || self.hovered) {
            (true, true) => Color::LightRed,
            (true, false) => Color::Red,
            (false, true) => Color::White,
            (false, false) => Color::DarkGray,
        };
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_type(if self.selected { BorderType::Thick } else { BorderType::Rounded })
            .border_style(Style::default().fg(border_color));
        if self.selected {
            block = block.title(Line::from(" ▸ ").alignment(Alignment::Right));
        }
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let tag = Line::from(Span::styled(
            format!(" {} ", self.league.sport),
            Style::default().fg(Color::White).bg(Color::Red),
        ));
        let name = highlight_line(
            &self.league.name,
            self.search_term,
            Style::default().add_modifier(Modifier::BOLD),
            MARK.add_modifier(Modifier::BOLD),
        );
        let alternate = match self.league.alternate_name.as_deref() {
            Some(alt) if !alt.is_empty() => {
                highlight_line(alt, self.search_term, Style::default().fg(Color::Gray), MARK)
            }
            _ => Line::from(""),
        };

        let lines = vec![tag, name, alternate, Line::from(""), badge_line(&self.badge)];
        Paragraph::new(lines).render(inner, buf);
    }
}

fn badge_line(badge: &BadgeView) -> Line<'static> {
    let muted = Style::default().fg(Color::DarkGray);
    match badge {
        BadgeView::Collapsed => Line::from(Span::styled("◌ Show badge", muted)),
        BadgeView::Loading => Line::from(Span::styled("░░░░░░░░░░░░░░░░", muted)),
        BadgeView::Badge { season, url } => Line::from(vec![
            Span::styled(format!("{season} "), Style::default().fg(Color::Cyan)),
            Span::styled(url.clone(), Style::default().add_modifier(Modifier::UNDERLINED)),
        ]),
        BadgeView::Missing { initials } => Line::from(vec![
            Span::styled(
                format!(" {initials} "),
                Style::default().fg(Color::Black).bg(Color::Gray).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" No badge", muted),
        ]),
    }
}

/// Placeholder drawn while the list is loading.
pub struct SkeletonCard;

impl Widget for SkeletonCard {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width as usize;
        let bar = |percent: usize| "▒".repeat(width * percent / 100);
        let style = Style::default().fg(Color::DarkGray);
        Paragraph::new(vec![
            Line::from(Span::styled(bar(25), style)),
            Line::from(Span::styled(bar(70), style)),
            Line::from(Span::styled(bar(40), style)),
        ])
        .render(inner, buf);
    }
}
