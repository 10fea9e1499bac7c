use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use treegrid_core::{ItemId, TreeGrid, TreeModel};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const GUIDE_STYLE: Style = Style::new().fg(Color::DarkGray);
const SELECTED_BG: Color = Color::Gray;

/// Render the grid's rows into a bordered block, scrolled so `cursor` stays
/// in view.
pub fn render_tree(
    frame: &mut Frame,
    area: Rect,
    model: &TreeModel<String>,
    grid: &TreeGrid,
    cursor: usize,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(" Tree ");

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if grid.count() == 0 {
        let empty = Paragraph::new("  Nothing here. Press 'a' to add.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let visible_lines = inner.height as usize;
    let scroll_offset = if cursor >= visible_lines {
        cursor - visible_lines + 1
    } else {
        0
    };

    let end = grid.count().min(scroll_offset + visible_lines);
    let lines: Vec<Line> = (scroll_offset..end)
        .map(|row| render_row(model, grid, row, row == cursor, inner.width))
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_row(
    model: &TreeModel<String>,
    grid: &TreeGrid,
    row: usize,
    is_selected: bool,
    width: u16,
) -> Line<'static> {
    let Some(item) = grid.item_at_row(row) else {
        return Line::from("");
    };

    let base_style = if is_selected {
        Style::default()
            .bg(SELECTED_BG)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else if model.is_expandable(item) {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().fg(Color::White)
    };
    let guide_style = if is_selected {
        GUIDE_STYLE.bg(SELECTED_BG)
    } else {
        GUIDE_STYLE
    };

    let prefix = row_prefix(model, grid, row);
    let glyph = expander_glyph(model, item);
    let used = prefix.width() + glyph.width();
    let name = model.get(item).map(String::as_str).unwrap_or("?");
    let name = truncate_to_width(name, (width as usize).saturating_sub(used));

    let mut spans = vec![
        Span::styled(prefix, guide_style),
        Span::styled(glyph, base_style),
        Span::styled(name, base_style),
    ];

    if is_selected {
        let content_width: usize = spans.iter().map(|s| s.content.width()).sum();
        let remaining = (width as usize).saturating_sub(content_width);
        if remaining > 0 {
            spans.push(Span::styled(
                " ".repeat(remaining),
                Style::default().bg(SELECTED_BG),
            ));
        }
    }

    Line::from(spans)
}

/// Indent guides and connector for `row`.
///
/// Top-level rows get nothing. Deeper rows get one column per intermediate
/// ancestor (a bar while that ancestor has siblings below it), then a
/// connector for the row itself.
pub fn row_prefix(model: &TreeModel<String>, grid: &TreeGrid, row: usize) -> String {
    let Some(node) = grid.node_at_row(model, row) else {
        return String::new();
    };
    if node.level == 0 {
        return String::new();
    }

    // Nearest first; keep only the ancestors inside the bound store
    let mut chain: Vec<ItemId> = model.ancestors(node.item);
    chain.truncate(node.level);
    chain.reverse();

    let mut prefix = String::new();
    for ancestor in chain.iter().skip(1) {
        if is_last_sibling(model, *ancestor) {
            prefix.push_str("  ");
        } else {
            prefix.push_str("\u{2502} ");
        }
    }
    prefix.push_str(if node.is_last() { "\u{2514} " } else { "\u{251C} " });
    prefix
}

fn is_last_sibling(model: &TreeModel<String>, item: ItemId) -> bool {
    match (model.location(item), model.index_in_parent(item)) {
        (Some(key), Some(index)) => index + 1 == model.len(key),
        _ => true,
    }
}

/// Open/closed marker for items that can expand, a bullet otherwise.
pub fn expander_glyph(model: &TreeModel<String>, item: ItemId) -> &'static str {
    if !model.is_expandable(item) {
        "\u{25CF} "
    } else if model.is_expanded(item) {
        "\u{25BC} "
    } else {
        "\u{25B6} "
    }
}

/// Cut `text` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('\u{2026}');
    out
}

/// Render the bottom status bar: a mode label, then dimmed info text.
pub fn render_status_bar(frame: &mut Frame, area: Rect, label: &str, info: &str) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {label} "),
            Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED),
        ),
        Span::raw("  "),
        Span::styled(info.to_string(), Style::default().add_modifier(Modifier::DIM)),
    ]);

    let bar = Paragraph::new(line).style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_widget(bar, area);
}
