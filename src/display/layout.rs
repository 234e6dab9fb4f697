//=========================================================================
// Scoreboard Layout
//=========================================================================
//
// Reference layout for a 384×256 baseball scoreboard.
//
// Slot geometry per mode:
//   overview  two columns × 5 rows, 192×50 per game, colors alternate by row
//   dual      two columns × 5 rows, 192×50 per game, one color per column
//   detailed  one column × 5 rows, 384×50 per game (adds matchup lines)
//   gamecast  side list of 6 × 128×42 games, focus panel at x ≥ 129
//
// The bottom-right strip below the slots holds the delayed clock readout;
// the page indicator shares the bottom row to its left.
//
// Every field read tolerates nulls and missing keys: a game that has only
// received part of its state draws what it has and skips the rest.
//
//=========================================================================

//=== External Dependencies ===============================================

use chrono::NaiveTime;
use serde_json::Value;

//=== Internal Dependencies ===============================================

use super::{Layout, Region};
use crate::core::patch::Tree;
use crate::core::settings::Mode;
use crate::raster::{AlignedField, Color, FontId, Painter};

//=== Geometry ============================================================

const SLOT_HEIGHT: i32 = 50;
const ROWS_PER_COLUMN: usize = 5;
const BOARD_HEIGHT: i32 = SLOT_HEIGHT * ROWS_PER_COLUMN as i32;

const SIDE_WIDTH: i32 = 128;
const SIDE_HEIGHT: i32 = 42;
const FOCUS_X: i32 = 129;

const CLOCK_WIDTH: i32 = 96;
const CLOCK_HEIGHT: i32 = 6;

/// Double-digit offset for the 32px font.
const DDO: i32 = 7;
/// Double-digit offset for the 16px font.
const DDO_SMALL: i32 = 4;

//--- Scoreline fields, relative to the slot origin ----------------------

const AWAY_ABV: AlignedField = AlignedField::fixed(FontId::Bold32, 0, 22);
const HOME_ABV: AlignedField = AlignedField::fixed(FontId::Bold32, 0, 44);
const AWAY_SCORE: AlignedField = AlignedField::new(FontId::Bold32, 62, 22, &[0, -DDO]);
const HOME_SCORE: AlignedField = AlignedField::new(FontId::Bold32, 62, 44, &[0, -DDO]);
const INNING: AlignedField = AlignedField::new(FontId::Bold32, 100, 33, &[0, -DDO]);
const STATUS: AlignedField = AlignedField::fixed(FontId::Bold16, 132, 44);
// Four-character times shift right to stay centered.
const START_TIME: AlignedField = AlignedField::new(FontId::Bold28, 60, 33, &[0, 0, 0, 14, 0]);

const DETAIL_LINES: [i32; 3] = [14, 29, 44];
const DETAIL_X: i32 = 190;

//--- Gamecast side list ---------------------------------------------------

const SIDE_AWAY: AlignedField = AlignedField::fixed(FontId::Bold16, 2, 16);
const SIDE_HOME: AlignedField = AlignedField::fixed(FontId::Bold16, 2, 34);
const SIDE_AWAY_SCORE: AlignedField = AlignedField::new(FontId::Bold16, 48, 16, &[0, -DDO_SMALL]);
const SIDE_HOME_SCORE: AlignedField = AlignedField::new(FontId::Bold16, 48, 34, &[0, -DDO_SMALL]);
const SIDE_STATUS: AlignedField = AlignedField::fixed(FontId::Bold16, 72, 25);

//--- Focus panel ----------------------------------------------------------

const FOCUS_AWAY: AlignedField = AlignedField::fixed(FontId::Bold16, FOCUS_X, 12);
const FOCUS_HOME: AlignedField = AlignedField::fixed(FontId::Bold16, FOCUS_X, 24);
const FOCUS_AWAY_RUNS: AlignedField = AlignedField::new(FontId::Bold16, 208, 12, &[0, -DDO_SMALL]);
const FOCUS_HOME_RUNS: AlignedField = AlignedField::new(FontId::Bold16, 208, 24, &[0, -DDO_SMALL]);
const FOCUS_INNING: AlignedField = AlignedField::new(FontId::Bold16, 280, 18, &[0, -DDO_SMALL]);

//=== ScoreboardLayout ====================================================

pub struct ScoreboardLayout {
    width: i32,
    height: i32,
}

impl ScoreboardLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: i32::try_from(width).unwrap_or(i32::MAX),
            height: i32::try_from(height).unwrap_or(i32::MAX),
        }
    }

    fn column_width(&self) -> i32 {
        self.width / 2
    }

    fn origin(&self, mode: Mode, slot: usize) -> (i32, i32) {
        let slot = i32::try_from(slot).unwrap_or(i32::MAX);
        let rows = ROWS_PER_COLUMN as i32;
        match mode {
            Mode::Overview | Mode::Dual => ((slot / rows) * self.column_width(), (slot % rows) * SLOT_HEIGHT),
            Mode::Detailed => (0, slot * SLOT_HEIGHT),
            Mode::Gamecast => (0, slot * SIDE_HEIGHT),
        }
    }

    //--- Scoreline (overview, dual, detailed) -----------------------------

    fn draw_scoreline(&self, painter: &mut Painter<'_>, x: i32, y: i32, color: Color, game: &Tree) {
        let away = text_at(game, &["away", "abv"]).unwrap_or_default();
        let home = text_at(game, &["home", "abv"]).unwrap_or_default();
        AWAY_ABV.at(x, y).draw(painter, color, &away);
        HOME_ABV.at(x, y).draw(painter, color, &home);

        match text_at(game, &["game_state"]).as_deref() {
            Some("L") => {
                self.draw_scores(painter, x, y, color, game);
                self.draw_inning(painter, x, y, color, game);
                draw_bases(painter, x + 165, y + 12, 6, 2, color, game);
                draw_outs(painter, x + 157, y + 40, color, game);
            }
            Some("F") => {
                self.draw_scores(painter, x, y, color, game);
                let text = match int_at(game, &["inning"]) {
                    Some(9) | None => "F".to_string(),
                    Some(inning) => format!("F/{inning}"),
                };
                INNING.at(x, y).draw(painter, color, &text);
            }
            Some("P") => {
                let time = text_at(game, &["start_time"]).unwrap_or_default();
                START_TIME.at(x, y).draw(painter, color, &time);
            }
            Some("S") => {
                self.draw_scores(painter, x, y, color, game);
                self.draw_inning(painter, x, y, color, game);
                STATUS.at(x, y).draw(painter, color, "Susp");
            }
            Some("D") => {
                self.draw_scores(painter, x, y, color, game);
                self.draw_inning(painter, x, y, color, game);
                STATUS.at(x, y).draw(painter, color, "Dly");
            }
            _ => {}
        }
    }

    fn draw_scores(&self, painter: &mut Painter<'_>, x: i32, y: i32, color: Color, game: &Tree) {
        if let Some(score) = text_at(game, &["away_score"]) {
            AWAY_SCORE.at(x, y).draw(painter, color, &score);
        }
        if let Some(score) = text_at(game, &["home_score"]) {
            HOME_SCORE.at(x, y).draw(painter, color, &score);
        }
    }

    fn draw_inning(&self, painter: &mut Painter<'_>, x: i32, y: i32, color: Color, game: &Tree) {
        if let Some(inning) = text_at(game, &["inning"]) {
            INNING.at(x, y).draw(painter, color, &inning);
        }
        match text_at(game, &["inning_state"]).as_deref() {
            Some("T") => painter.arrow(x + 104, y + 2, 6, true, color),
            Some("B") => painter.arrow(x + 104, y + 47, 6, false, color),
            _ => {}
        }
    }

    /// Three matchup lines chosen by game state.
    fn detail_lines(game: &Tree) -> [Option<String>; 3] {
        let pair = |name: &[&str], summary: &[&str], prefix: &str| {
            text_at(game, name).map(|n| match text_at(game, summary) {
                Some(s) => format!("{prefix}{n} {s}"),
                None => format!("{prefix}{n}"),
            })
        };

        match text_at(game, &["game_state"]).as_deref() {
            Some("L") => [
                pair(&["matchup", "batter"], &["matchup", "batter_summary"], "AB:"),
                None,
                pair(&["matchup", "pitcher"], &["matchup", "pitcher_summary"], "P:"),
            ],
            Some("F") => [
                pair(&["decisions", "win"], &["decisions", "win_summary"], "W:"),
                pair(&["decisions", "loss"], &["decisions", "loss_summary"], "L:"),
                pair(&["decisions", "save"], &["decisions", "save_summary"], "S:"),
            ],
            Some("P") => [
                pair(&["probables", "away"], &["probables", "away_era"], "SP:"),
                None,
                pair(&["probables", "home"], &["probables", "home_era"], "SP:"),
            ],
            Some("S") => [None, Some("Suspended".to_string()), None],
            Some("D") => [None, Some("Delayed".to_string()), None],
            _ => [None, None, None],
        }
    }

    //--- Gamecast side list -----------------------------------------------

    fn draw_side_game(&self, painter: &mut Painter<'_>, y: i32, color: Color, game: &Tree) {
        let away = text_at(game, &["away", "abv"]).unwrap_or_default();
        let home = text_at(game, &["home", "abv"]).unwrap_or_default();
        SIDE_AWAY.at(0, y).draw(painter, color, &away);
        SIDE_HOME.at(0, y).draw(painter, color, &home);

        let state = text_at(game, &["game_state"]);
        if state.as_deref() != Some("P") {
            if let Some(score) = text_at(game, &["away_score"]) {
                SIDE_AWAY_SCORE.at(0, y).draw(painter, color, &score);
            }
            if let Some(score) = text_at(game, &["home_score"]) {
                SIDE_HOME_SCORE.at(0, y).draw(painter, color, &score);
            }
        }

        let status = match state.as_deref() {
            Some("L") | Some("S") | Some("D") => {
                let half = text_at(game, &["inning_state"]).unwrap_or_default();
                let inning = text_at(game, &["inning"]).unwrap_or_default();
                format!("{half}{inning}")
            }
            Some("F") => "F".to_string(),
            Some("P") => text_at(game, &["start_time"]).unwrap_or_default(),
            _ => String::new(),
        };
        SIDE_STATUS.at(0, y).draw(painter, color, &status);
    }
}

impl Layout for ScoreboardLayout {
    fn slot_region(&self, mode: Mode, slot: usize) -> Region {
        let (x, y) = self.origin(mode, slot);
        let (w, h) = match mode {
            Mode::Overview | Mode::Dual => (self.column_width(), SLOT_HEIGHT),
            Mode::Detailed => (self.width, SLOT_HEIGHT),
            Mode::Gamecast => (SIDE_WIDTH, SIDE_HEIGHT),
        };
        Region::new(x, y, x + w - 1, y + h - 1)
    }

    fn draw_game(&self, painter: &mut Painter<'_>, mode: Mode, slot: usize, game: &Tree) {
        let (x, y) = self.origin(mode, slot);
        let alternate = match mode {
            Mode::Dual => slot >= ROWS_PER_COLUMN,
            _ => slot % 2 == 1,
        };
        let color = if alternate { Color::GREEN } else { Color::WHITE };

        match mode {
            Mode::Overview | Mode::Dual => self.draw_scoreline(painter, x, y, color, game),
            Mode::Detailed => {
                self.draw_scoreline(painter, x, y, color, game);
                for (line, row) in Self::detail_lines(game).iter().zip(DETAIL_LINES) {
                    if let Some(line) = line {
                        painter.text(FontId::Bold18, x + DETAIL_X, y + row, color, line);
                    }
                }
            }
            Mode::Gamecast => self.draw_side_game(painter, y, color, game),
        }
    }

    fn focus_region(&self) -> Region {
        Region::new(FOCUS_X, 0, self.width - 1, BOARD_HEIGHT - 1)
    }

    fn draw_focus(&self, painter: &mut Painter<'_>, focus: &Tree) {
        let white = Color::WHITE;

        let away = text_at(focus, &["away", "name"]).or_else(|| text_at(focus, &["away", "abv"]));
        let home = text_at(focus, &["home", "name"]).or_else(|| text_at(focus, &["home", "abv"]));
        FOCUS_AWAY.draw(painter, white, &away.unwrap_or_default());
        FOCUS_HOME.draw(painter, white, &home.unwrap_or_default());

        let runs = |key| int_at(focus, &[key]).unwrap_or(0).to_string();
        FOCUS_AWAY_RUNS.draw(painter, Color::YELLOW, &runs("away_score"));
        FOCUS_HOME_RUNS.draw(painter, Color::YELLOW, &runs("home_score"));

        if let Some(inning) = text_at(focus, &["inning"]) {
            FOCUS_INNING.draw(painter, white, &inning);
        }
        match text_at(focus, &["inning_state"]).as_deref() {
            Some("T") => painter.arrow(283, 2, 5, true, white),
            Some("B") => painter.arrow(283, 24, 5, false, white),
            _ => {}
        }

        draw_bases(painter, 310, 8, 6, 2, white, focus);
        draw_count(painter, 334, focus);

        let mut row = 48;
        for (label, name, summary) in [
            ("AB:", "batter", "batter_summary"),
            ("P: ", "pitcher", "pitcher_summary"),
        ] {
            if let Some(name) = text_at(focus, &["matchup", name]) {
                let summary = text_at(focus, &["matchup", summary]).unwrap_or_default();
                painter.text(FontId::Bold16, FOCUS_X, row, white, &format!("{label}{name} {summary}"));
            }
            row += 12;
        }

        if let Some(kind) = text_at(focus, &["pitch_details", "type"]) {
            painter.text(FontId::Bold16, FOCUS_X, 144, pitch_color(&kind), &kind);
            if let Some(speed) = lookup(focus, &["pitch_details", "speed"]).and_then(Value::as_f64) {
                painter.text(FontId::Bold16, FOCUS_X, 156, white, &format!("{speed:.1} MPH"));
            }
            if let Some(zone) = int_at(focus, &["pitch_details", "zone"]) {
                let color = if zone > 9 { Color::GREEN } else { Color::RED };
                painter.text(FontId::Bold16, FOCUS_X, 168, color, &format!("Zone:{zone:2}"));
            }
        }
    }

    fn draw_no_games(&self, painter: &mut Painter<'_>) {
        let text = "No games";
        let width = FontId::Bold32.glyph_width() * text.len() as i32;
        painter.text(FontId::Bold32, (self.width - width) / 2, self.height / 2, Color::WHITE, text);
    }

    fn draw_page_indicator(&self, painter: &mut Painter<'_>, page: usize, _page_count: usize) {
        const DASH: i32 = 5;
        const GAP: i32 = 2;
        let y = self.height - 1;
        let background = painter.background();

        painter.line(0, y, self.clock_region().x1 - 1, y, background);
        for i in 0..=i32::try_from(page).unwrap_or(0) {
            let x0 = 40 + (i + 1) * (DASH + GAP);
            painter.line(x0, y, x0 + DASH - 1, y, Color::WHITE);
        }
    }

    fn clock_region(&self) -> Region {
        Region::new(self.width - CLOCK_WIDTH, self.height - CLOCK_HEIGHT, self.width - 1, self.height - 1)
    }

    fn draw_clock(&self, painter: &mut Painter<'_>, delayed: NaiveTime, delay: u32) {
        let region = self.clock_region();
        let text = format!("{} -{}s", delayed.format("%-I:%M:%S"), delay);
        painter.text(FontId::Small6x10, region.x1, region.y2, Color::YELLOW, &text);
    }
}

//=== Shared widgets ======================================================

/// Three bases around second base at `(x, y)`; `runners` is a bit mask
/// with 1 = first, 2 = second, 4 = third.
fn draw_bases(painter: &mut Painter<'_>, x: i32, y: i32, radius: i32, thickness: i32, color: Color, game: &Tree) {
    let runners = int_at(game, &["runners"]).unwrap_or(0);
    let delta = radius + 2;

    painter.diamond(x + delta, y + delta, radius, thickness, runners & 1 != 0, color);
    painter.diamond(x, y, radius, thickness, runners & 2 != 0, color);
    painter.diamond(x - delta, y + delta, radius, thickness, runners & 4 != 0, color);
}

/// Three out markers centered on `(x + 8, y)`.
fn draw_outs(painter: &mut Painter<'_>, x: i32, y: i32, color: Color, game: &Tree) {
    let Some(outs) = int_at(game, &["count", "outs"]) else {
        return;
    };
    for j in 0..3 {
        painter.circle(x + 8 * j as i32, y, 3, 1, outs > j, color);
    }
}

/// Balls, strikes and outs as three rows of circles.
fn draw_count(painter: &mut Painter<'_>, x: i32, game: &Tree) {
    const DELTA: i32 = 8;
    let rows = [("balls", 4, 4, Color::GREEN), ("strikes", 3, 12, Color::RED), ("outs", 3, 20, Color::WHITE)];

    for (key, markers, y, color) in rows {
        let Some(value) = int_at(game, &["count", key]) else {
            continue;
        };
        for j in 0..markers {
            painter.circle(x + DELTA * j as i32, y, 3, 1, value > j, color);
        }
    }
}

fn pitch_color(kind: &str) -> Color {
    match kind {
        "Four-Seam Fastball" | "Four-Seam" => Color::RED,
        "Sinker" | "Cutter" => Color::MAGENTA,
        "Curveball" => Color::BLUE,
        "Slider" | "Sweeper" => Color::LIGHT_BLUE,
        "Changeup" => Color::GREEN,
        "Splitter" => Color::YELLOW,
        _ => Color::WHITE,
    }
}

//--- Field access ----------------------------------------------------------

fn lookup<'a>(tree: &'a Tree, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(tree.get(*first)?, |value, key| value.get(*key))
}

/// Strings as-is, numbers in their JSON form; null and missing are `None`.
fn text_at(tree: &Tree, path: &[&str]) -> Option<String> {
    match lookup(tree, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_at(tree: &Tree, path: &[&str]) -> Option<i64> {
    lookup(tree, path)?.as_i64()
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::default_template;
    use crate::display::{Backend, FrameBuffer};
    use crate::core::patch::merge;
    use crate::core::scheduler::PageSizes;
    use crate::raster::Canvas;
    use serde_json::json;

    fn game(value: Value) -> Tree {
        let mut tree = default_template();
        if let Value::Object(patch) = value {
            merge(&mut tree, &patch);
        }
        tree
    }

    fn render(mode: Mode, slot: usize, game: &Tree) -> FrameBuffer {
        let layout = ScoreboardLayout::new(384, 256);
        let mut frame = FrameBuffer::new(384, 256, Backend::Hardware);
        layout.draw_game(&mut Painter::new(&mut frame), mode, slot, game);
        frame.swap();
        frame
    }

    #[test]
    fn overview_slots_fill_two_columns() {
        let layout = ScoreboardLayout::new(384, 256);
        assert_eq!(layout.slot_region(Mode::Overview, 0), Region::new(0, 0, 191, 49));
        assert_eq!(layout.slot_region(Mode::Overview, 6), Region::new(192, 50, 383, 99));
        assert_eq!(layout.slot_region(Mode::Detailed, 4), Region::new(0, 200, 383, 249));
        assert_eq!(layout.slot_region(Mode::Dual, 4), Region::new(0, 200, 191, 249));
        assert_eq!(layout.slot_region(Mode::Dual, 9), Region::new(192, 200, 383, 249));
        assert_eq!(layout.slot_region(Mode::Gamecast, 5), Region::new(0, 210, 127, 251));
    }

    #[test]
    fn slots_do_not_overlap_focus_panel() {
        let layout = ScoreboardLayout::new(384, 256);
        let focus = layout.focus_region();
        for slot in 0..6 {
            assert!(layout.slot_region(Mode::Gamecast, slot).x2 < focus.x1);
        }
    }

    #[test]
    fn live_game_draws_scoreline_and_shapes() {
        let frame = render(
            Mode::Overview,
            0,
            &game(json!({
                "game_state": "L",
                "away": {"abv": "NYY"},
                "home": {"abv": "BOS"},
                "away_score": 10,
                "home_score": 3,
                "inning": 7,
                "inning_state": "T",
                "runners": 5,
                "count": {"outs": 2}
            })),
        );

        assert!(frame.shows_text("NYY"));
        assert!(frame.shows_text("BOS"));
        let ten = frame.texts().iter().find(|op| op.text == "10").unwrap();
        assert_eq!(ten.x, 62 - DDO);
        assert!(frame.lit_in(140, 0, 191, 49) > 0);
    }

    #[test]
    fn dual_colors_follow_columns() {
        let final_game = game(json!({"game_state": "F", "away": {"abv": "SEA"}}));
        let color_of = |slot| {
            let frame = render(Mode::Dual, slot, &final_game);
            frame.texts().iter().find(|op| op.text == "SEA").map(|op| op.color)
        };

        assert_eq!(color_of(0), Some(Color::WHITE));
        assert_eq!(color_of(1), Some(Color::WHITE));
        assert_eq!(color_of(5), Some(Color::GREEN));
        assert_eq!(color_of(9), Some(Color::GREEN));
    }

    #[test]
    fn template_game_draws_without_fields() {
        let frame = render(Mode::Detailed, 1, &default_template());
        assert_eq!(frame.lit_pixels(), 0);
    }

    #[test]
    fn final_extra_innings_shows_inning() {
        let frame = render(Mode::Overview, 1, &game(json!({"game_state": "F", "inning": 11})));
        assert!(frame.shows_text("F/11"));
    }

    #[test]
    fn detailed_mode_adds_matchup_lines() {
        let frame = render(
            Mode::Detailed,
            0,
            &game(json!({"game_state": "P", "start_time": "7:05", "probables": {"away": "Cole", "away_era": "2.95"}})),
        );
        assert!(frame.shows_text("SP:Cole 2.95"));
        assert!(frame.shows_text("7:05"));
    }

    #[test]
    fn page_indicator_marks_pages_up_to_current() {
        let layout = ScoreboardLayout::new(384, 256);
        let mut frame = FrameBuffer::new(384, 256, Backend::Hardware);
        layout.draw_page_indicator(&mut Painter::new(&mut frame), 1, 3);
        frame.swap();

        assert_eq!(frame.lit_in(0, 255, 383, 255), 10);
        assert_eq!(frame.pixel(47, 255), Some(Color::WHITE));
        assert_eq!(frame.pixel(52, 255), Some(Color::BLACK));
    }

    #[test]
    fn clock_sits_below_every_slot() {
        let layout = ScoreboardLayout::new(384, 256);
        let clock = layout.clock_region();
        for mode in [Mode::Overview, Mode::Dual, Mode::Detailed, Mode::Gamecast] {
            for slot in 0..PageSizes::default().get(mode) {
                let region = layout.slot_region(mode, slot);
                assert!(region.y2 < clock.y1 || region.x2 < clock.x1, "{mode} slot {slot}");
            }
        }

        let mut frame = FrameBuffer::new(384, 256, Backend::Hardware);
        let time = NaiveTime::from_hms_opt(19, 5, 30).unwrap();
        layout.draw_clock(&mut Painter::new(&mut frame), time, 45);
        frame.swap();
        assert!(frame.shows_text("7:05:30 -45s"));
    }

        #[test]
    fn focus_panel_stays_in_region() {
        let layout = ScoreboardLayout::new(384, 256);
        let mut frame = FrameBuffer::new(384, 256, Backend::Hardware);
        let focus = game(json!({
            "game_state": "L",
            "away": {"name": "Yankees"},
            "inning": 3,
            "inning_state": "B",
            "runners": 7,
            "count": {"balls": 3, "strikes": 2, "outs": 1},
            "pitch_details": {"type": "Slider", "speed": 86.4, "zone": 12}
        }));
        layout.draw_focus(&mut Painter::new(&mut frame), &focus);
        frame.swap();

        assert!(frame.shows_text("Yankees"));
        assert!(frame.shows_text("86.4 MPH"));
        assert_eq!(frame.lit_in(0, 0, FOCUS_X - 1, 255), 0);
        assert!(frame.texts().iter().all(|op| op.x >= FOCUS_X));
    }
}
