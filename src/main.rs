use std::{
    fmt,
    fs::File,
    io::stdout,
    path::{Path, PathBuf},
    sync::Mutex,
};

use botsweeper::{Cell, Config, CursorDirection, Game, Rules};
use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Alignment, Constraint, Layout, Position, Rect},
    style::{Color, Stylize},
    widgets::{Block, Paragraph},
};
use tracing_subscriber::EnvFilter;

/// Terminal columns taken by one board cell.
const CELL_WIDTH: u16 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Board width in cells
    #[arg(default_value_t = 30)]
    width: usize,
    /// Board height in cells
    #[arg(default_value_t = 16)]
    height: usize,
    /// Number of bots hidden on the board
    #[arg(default_value_t = 99)]
    mines: usize,
    /// Reveal only the chosen cell, even when it has no bots around it
    #[arg(long)]
    no_flood: bool,
    /// Disable chord clearing
    #[arg(long)]
    no_chord: bool,
    /// Write logs to this file, filtered by RUST_LOG
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        Config::new(self.width, self.height, self.mines).with_rules(Rules {
            flood_reveal: !self.no_flood,
            chord_clear: !self.no_chord,
        })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let game = Game::new(args.config()).wrap_err("invalid board parameters")?;

    let terminal = ratatui::init();
    let result = execute!(stdout(), EnableMouseCapture)
        .wrap_err("failed to enable mouse capture")
        .and_then(|()| App::new(game).run(terminal));
    // the terminal is going away either way
    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// What a single cell looks like on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TileFace {
    Closed,
    Pressed,
    Flagged,
    Bot,
    Open(u8),
}

impl TileFace {
    /// A cell shows its contents once opened, and every cell does while
    /// cheating or after death. Flags are drawn over everything else.
    fn of(cell: &Cell, reveal_all: bool, pressed: bool) -> Self {
        if cell.is_flagged() {
            TileFace::Flagged
        } else if cell.is_open() || reveal_all {
            if cell.is_mined() {
                TileFace::Bot
            } else {
                TileFace::Open(cell.neighboring_mines())
            }
        } else if pressed {
            TileFace::Pressed
        } else {
            TileFace::Closed
        }
    }

    fn colors(self, checker: bool) -> (Color, Color) {
        match self {
            TileFace::Closed if checker => (Color::White, Color::DarkGray),
            TileFace::Closed => (Color::White, Color::Gray),
            TileFace::Flagged => (Color::LightRed, Color::DarkGray),
            TileFace::Bot => (Color::White, Color::Red),
            TileFace::Pressed | TileFace::Open(0) => (Color::White, Color::Black),
            TileFace::Open(1) => (Color::LightBlue, Color::Black),
            TileFace::Open(2) => (Color::LightGreen, Color::Black),
            TileFace::Open(3) => (Color::LightRed, Color::Black),
            TileFace::Open(4) => (Color::Blue, Color::Black),
            TileFace::Open(5) => (Color::Red, Color::Black),
            TileFace::Open(6) => (Color::Cyan, Color::Black),
            TileFace::Open(_) => (Color::Magenta, Color::Black),
        }
    }
}

impl fmt::Display for TileFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileFace::Closed => write!(f, "-"),
            TileFace::Pressed | TileFace::Open(0) => write!(f, " "),
            TileFace::Flagged => write!(f, "F"),
            TileFace::Bot => write!(f, "*"),
            TileFace::Open(n) => write!(f, "{n}"),
        }
    }
}

/// Where cell `(x, y)` is drawn inside `area`. Cells that would be cut off
/// by the edge of the terminal are not drawn at all.
fn tile_area(area: Rect, x: usize, y: usize) -> Option<Rect> {
    let left = u16::try_from(x).ok()?.checked_mul(CELL_WIDTH)?;
    let top = u16::try_from(y).ok()?;
    if left.checked_add(CELL_WIDTH)? > area.width || top >= area.height {
        return None;
    }
    Some(Rect::new(area.x + left, area.y + top, CELL_WIDTH, 1))
}

pub struct App {
    running: bool,
    game: Game,
    /// Keyboard users get a highlighted cursor, mouse users don't.
    show_cursor: bool,
    /// Left button held down over the cursor cell.
    opening: bool,
    board_area: Rect,
}

impl App {
    pub fn new(game: Game) -> Self {
        Self {
            running: false,
            game,
            show_cursor: true,
            opening: false,
            board_area: Rect::default(),
        }
    }

    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.running = true;
        while self.running {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events()?;
        }
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        let [board_area, status_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(frame.area());
        self.board_area = board_area;

        let board = self.game.board();
        let reveal_all = self.game.cheat() || self.game.is_dead();
        let cursor = self.game.cursor();

        for y in 0..board.height() {
            for x in 0..board.width() {
                let Some(area) = tile_area(board_area, x, y) else {
                    continue;
                };
                let Ok(cell) = board.cell(x, y) else {
                    continue;
                };
                let at_cursor = cursor == (x, y);
                let face = TileFace::of(cell, reveal_all, at_cursor && self.opening);
                let (fg, mut bg) = face.colors(x % 2 == y % 2);
                if at_cursor && self.show_cursor {
                    bg = Color::Yellow;
                }
                frame.render_widget(
                    Paragraph::new(face.to_string())
                        .alignment(Alignment::Center)
                        .fg(fg)
                        .block(Block::new().bg(bg)),
                    area,
                );
            }
        }

        frame.render_widget(Paragraph::new(self.status_line()), status_area);
    }

    fn status_line(&self) -> String {
        let board = self.game.board();
        let state = if self.game.is_dead() {
            "DEAD, press r to restart"
        } else {
            "alive"
        };
        let cheat = if self.game.cheat() { " [cheat]" } else { "" };
        format!(
            " {state} | bots {} | flags {}{cheat} | arrows move, space open, f flag, g clear, c cheat, 1-3 size, q quit",
            board.mine_count(),
            board.flag_count(),
        )
    }

    fn handle_crossterm_events(&mut self) -> Result<()> {
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key)?,
            Event::Mouse(mouse) => self.on_mouse_event(mouse)?,
            Event::Resize(_, _) => {}
            _ => {}
        }
        Ok(())
    }

    fn on_key_event(&mut self, key: KeyEvent) -> Result<()> {
        let rules = self.game.config().rules;
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc | KeyCode::Char('q' | 'Q'))
            | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (_, KeyCode::Char('c' | 'C')) => self.game.toggle_cheat(),
            (_, KeyCode::Char('r' | 'R')) => self.game.restart()?,
            (_, KeyCode::Char('1')) => self.game.restart_with(Config::beginner().with_rules(rules))?,
            (_, KeyCode::Char('2')) => self
                .game
                .restart_with(Config::intermediate().with_rules(rules))?,
            (_, KeyCode::Char('3')) => self.game.restart_with(Config::expert().with_rules(rules))?,
            (_, KeyCode::Up) => self.game.move_cursor(CursorDirection::Up),
            (_, KeyCode::Down) => self.game.move_cursor(CursorDirection::Down),
            (_, KeyCode::Left) => self.game.move_cursor(CursorDirection::Left),
            (_, KeyCode::Right) => self.game.move_cursor(CursorDirection::Right),
            (_, KeyCode::Char(' ')) => {
                self.game.reveal()?;
            }
            (_, KeyCode::Char('f' | 'F')) => {
                self.game.flag()?;
            }
            (_, KeyCode::Char('g' | 'G')) => {
                self.game.clear()?;
            }
            _ => {}
        }
        self.show_cursor = true;
        Ok(())
    }

    fn on_mouse_event(&mut self, mouse: MouseEvent) -> Result<()> {
        let Some((x, y)) = self.cell_under(mouse.column, mouse.row) else {
            if let MouseEventKind::Up(MouseButton::Left) = mouse.kind {
                self.opening = false;
            }
            return Ok(());
        };
        if self.game.is_dead() {
            self.opening = false;
            return Ok(());
        }

        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                self.game.set_cursor(x, y)?;
                self.show_cursor = false;
            }
            MouseEventKind::Down(MouseButton::Left) => {
                self.game.set_cursor(x, y)?;
                self.opening = true;
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.opening = false;
                self.game.set_cursor(x, y)?;
                self.game.reveal()?;
            }
            MouseEventKind::Down(MouseButton::Middle) => {
                self.game.set_cursor(x, y)?;
                self.game.clear()?;
            }
            MouseEventKind::Down(MouseButton::Right) => {
                self.game.set_cursor(x, y)?;
                self.game.flag()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Maps a terminal position to board coordinates.
    fn cell_under(&self, column: u16, row: u16) -> Option<(usize, usize)> {
        let area = self.board_area;
        if !area.contains(Position::new(column, row)) {
            return None;
        }
        let x = usize::from((column - area.x) / CELL_WIDTH);
        let y = usize::from(row - area.y);
        tile_area(area, x, y)?;
        let board = self.game.board();
        (x < board.width() && y < board.height()).then_some((x, y))
    }

    fn quit(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botsweeper::Board;
    use ratatui::{Terminal, backend::TestBackend};

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn app_with(config: Config) -> App {
        let mut app = App::new(Game::new(config).unwrap());
        app.board_area = Rect::new(0, 0, 40, 10);
        app
    }

    fn is_open(app: &App, x: usize, y: usize) -> bool {
        app.game.board().cell(x, y).unwrap().is_open()
    }

    fn is_flagged(app: &App, x: usize, y: usize) -> bool {
        app.game.board().cell(x, y).unwrap().is_flagged()
    }

    #[test]
    fn faces_follow_cell_state() {
        let mut board = Board::with_mines(3, 1, &[(0, 0)]).unwrap();
        let face = |board: &Board, x, reveal_all, pressed| {
            TileFace::of(board.cell(x, 0).unwrap(), reveal_all, pressed)
        };

        assert_eq!(face(&board, 0, false, false), TileFace::Closed);
        assert_eq!(face(&board, 0, false, true), TileFace::Pressed);
        assert_eq!(face(&board, 0, true, false), TileFace::Bot);
        assert_eq!(face(&board, 1, true, false), TileFace::Open(1));

        board.flag(2, 0).unwrap();
        assert_eq!(face(&board, 2, true, false), TileFace::Flagged);

        board.open(1, 0).unwrap();
        assert_eq!(face(&board, 1, false, false), TileFace::Open(1));
        assert_eq!(TileFace::Open(1).to_string(), "1");
        assert_eq!(TileFace::Open(0).to_string(), " ");
    }

    #[test]
    fn args_map_to_config() {
        let args = Args::parse_from(["botsweeper", "9", "9", "10", "--no-chord"]);
        let config = args.config();
        assert_eq!(config.width, 9);
        assert_eq!(config.mines, 10);
        assert!(config.rules.flood_reveal);
        assert!(!config.rules.chord_clear);
    }

    #[test]
    fn mouse_positions_map_to_cells() {
        let mut app = App::new(Game::new(Config::new(4, 2, 0)).unwrap());
        app.board_area = Rect::new(2, 1, 40, 10);

        assert_eq!(app.cell_under(2, 1), Some((0, 0)));
        assert_eq!(app.cell_under(4, 1), Some((0, 0)));
        assert_eq!(app.cell_under(5, 2), Some((1, 1)));
        assert_eq!(app.cell_under(13, 2), Some((3, 1)));
        assert_eq!(app.cell_under(14, 2), None);
        assert_eq!(app.cell_under(5, 3), None);
        assert_eq!(app.cell_under(0, 0), None);
    }

    #[test]
    fn keys_drive_the_game() {
        let mut app = App::new(Game::new(Config::new(3, 3, 0)).unwrap());
        let press = |app: &mut App, code| {
            app.on_key_event(KeyEvent::new(code, KeyModifiers::NONE))
                .unwrap()
        };

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.game.cursor(), (1, 1));

        press(&mut app, KeyCode::Char('f'));
        assert!(app.game.board().cell(1, 1).unwrap().is_flagged());
        press(&mut app, KeyCode::Char(' '));
        assert!(!app.game.board().cell(1, 1).unwrap().is_open());

        press(&mut app, KeyCode::Char('c'));
        assert!(app.game.cheat());

        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.game.board().width(), 9);

        press(&mut app, KeyCode::Char('q'));
        assert!(!app.running);
    }

    #[test]
    fn clicks_land_on_drawn_cell_in_narrow_terminal() {
        // expert needs 90 columns, only 26 cells fit in 80
        let mut app = App::new(Game::new(Config::expert()).unwrap());
        app.game.set_cursor(25, 0).unwrap();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        let buffer = terminal.backend().buffer();

        for column in 75..78 {
            assert_eq!(buffer[Position::new(column, 0)].bg, Color::Yellow);
            assert_eq!(app.cell_under(column, 0), Some((25, 0)));
        }
        for column in 78..80 {
            assert_eq!(buffer[Position::new(column, 0)].bg, Color::Reset);
            assert_eq!(app.cell_under(column, 0), None);
        }
        for x in 0..26u16 {
            assert_eq!(app.cell_under(x * 3 + 1, 5), Some((usize::from(x), 5)));
        }
    }

    #[test]
    fn mouse_moves_flags_and_reveals() {
        let mut app = app_with(Config::new(4, 2, 0));

        app.on_mouse_event(mouse(MouseEventKind::Moved, 4, 1)).unwrap();
        assert_eq!(app.game.cursor(), (1, 1));
        assert!(!app.show_cursor);

        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Right), 9, 0))
            .unwrap();
        assert_eq!(app.game.cursor(), (3, 0));
        assert!(is_flagged(&app, 3, 0));
        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Right), 9, 0))
            .unwrap();
        assert!(!is_flagged(&app, 3, 0));

        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 1, 0))
            .unwrap();
        assert!(app.opening);
        assert_eq!(app.game.cursor(), (0, 0));
        assert!(!is_open(&app, 0, 0));

        app.on_mouse_event(mouse(MouseEventKind::Up(MouseButton::Left), 1, 0))
            .unwrap();
        assert!(!app.opening);
        assert!(app.game.board().cells().iter().all(|cell| cell.is_open()));

        press_key(&mut app, KeyCode::Left, KeyModifiers::NONE);
        assert!(app.show_cursor);
    }

    #[test]
    fn middle_button_chords() {
        let rules = Rules {
            flood_reveal: false,
            chord_clear: true,
        };
        let mut app = app_with(Config::new(3, 1, 0).with_rules(rules));

        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 1, 0))
            .unwrap();
        app.on_mouse_event(mouse(MouseEventKind::Up(MouseButton::Left), 1, 0))
            .unwrap();
        assert!(is_open(&app, 0, 0));
        assert!(!is_open(&app, 1, 0));

        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Middle), 1, 0))
            .unwrap();
        assert!(is_open(&app, 1, 0));
        assert!(!is_open(&app, 2, 0));
    }

    #[test]
    fn mouse_is_ignored_while_dead() {
        let mut app = app_with(Config::new(2, 1, 2));
        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 1, 0))
            .unwrap();
        app.on_mouse_event(mouse(MouseEventKind::Up(MouseButton::Left), 1, 0))
            .unwrap();
        assert!(app.game.is_dead());

        app.on_mouse_event(mouse(MouseEventKind::Moved, 4, 0)).unwrap();
        assert_eq!(app.game.cursor(), (0, 0));
        assert!(app.show_cursor);

        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Right), 4, 0))
            .unwrap();
        assert!(!is_flagged(&app, 1, 0));

        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 4, 0))
            .unwrap();
        assert!(!app.opening);
        app.on_mouse_event(mouse(MouseEventKind::Up(MouseButton::Left), 4, 0))
            .unwrap();
        app.on_mouse_event(mouse(MouseEventKind::Down(MouseButton::Middle), 4, 0))
            .unwrap();
        assert!(!is_open(&app, 1, 0));
    }

    fn press_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        app.on_key_event(KeyEvent::new(code, modifiers)).unwrap();
    }

    #[test]
    fn keys_work_with_caps_lock() {
        let mut app = app_with(Config::new(3, 3, 0));
        app.running = true;

        press_key(&mut app, KeyCode::Char('F'), KeyModifiers::SHIFT);
        assert!(is_flagged(&app, 0, 0));
        press_key(&mut app, KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert!(!is_open(&app, 1, 1));
        press_key(&mut app, KeyCode::Char('C'), KeyModifiers::SHIFT);
        assert!(app.game.cheat());
        press_key(&mut app, KeyCode::Char('R'), KeyModifiers::SHIFT);
        assert!(!is_flagged(&app, 0, 0));
        assert!(app.running);

        press_key(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(!app.running);
        assert!(app.game.cheat());

        app.running = true;
        press_key(&mut app, KeyCode::Char('Q'), KeyModifiers::SHIFT);
        assert!(!app.running);
    }
}
