//! Game state machine: menu, settings, play, pause, end screens.
//!
//! The app owns all game state and issues draw calls through the renderer
//! facade; it never touches the window or GPU directly. The runtime feeds
//! it translated input actions and per-frame delta time, and reads back
//! settings it must apply to the window (vsync, fullscreen, resolution).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use wyrm_render::Renderer;
use wyrm_render::coords::{Cell, Color};

use crate::config::{self, PREVIEW_TICK, Settings, TICK, Theme};
use crate::input::{Action, Source};
use crate::snake::{Snake, SnakeState};

const MENU_ANIM_RATE: f32 = 2.5;
const SHAKE_DURATION: f32 = 0.6;
const SHAKE_AMPLITUDE: f32 = 0.2;
const CHROMA_SPIKE_DURATION: f32 = 0.5;
const MAX_CHROMA_SPIKE: f32 = 0.15;

/// Dark backing ring drawn under the themed playfield border.
const BACKING_BORDER: Color = Color::new(0.08, 0.08, 0.08, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Menu,
    Settings,
    Playing,
    Paused,
    GameOver,
    Win,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Menu => "MENU",
            State::Settings => "SETTINGS",
            State::Playing => "PLAYING",
            State::Paused => "PAUSED",
            State::GameOver => "GAMEOVER",
            State::Win => "WIN",
        }
    }
}

/// Whether the app wants to keep running after handling an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AppFlow {
    Continue,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Continue,
    Start,
    Settings,
    Quit,
}

impl MenuItem {
    fn label(self) -> &'static str {
        match self {
            MenuItem::Continue => "Continue",
            MenuItem::Start => "Start Game",
            MenuItem::Settings => "Settings",
            MenuItem::Quit => "Quit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseItem {
    Resume,
    SaveQuit,
    Quit,
}

impl PauseItem {
    fn label(self) -> &'static str {
        match self {
            PauseItem::Resume => "Resume",
            PauseItem::SaveQuit => "Save & Quit",
            PauseItem::Quit => "Quit",
        }
    }
}

const PAUSE_ITEMS: [PauseItem; 3] = [PauseItem::Resume, PauseItem::SaveQuit, PauseItem::Quit];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsItem {
    Vsync,
    Bloom,
    Kawase,
    Shake,
    BloomStrength,
    BloomRadius,
    Exposure,
    ChromaEnabled,
    ChromaAmount,
    ChromaBias,
    Theme,
    Fullscreen,
    Resolution,
    Back,
}

const SETTINGS_ITEMS: [SettingsItem; 14] = [
    SettingsItem::Vsync,
    SettingsItem::Bloom,
    SettingsItem::Kawase,
    SettingsItem::Shake,
    SettingsItem::BloomStrength,
    SettingsItem::BloomRadius,
    SettingsItem::Exposure,
    SettingsItem::ChromaEnabled,
    SettingsItem::ChromaAmount,
    SettingsItem::ChromaBias,
    SettingsItem::Theme,
    SettingsItem::Fullscreen,
    SettingsItem::Resolution,
    SettingsItem::Back,
];

/// On-disk save: the snake snapshot plus the score it represents.
#[derive(Debug, Serialize, Deserialize)]
struct SaveData {
    snake: SnakeState,
    score: u32,
}

pub struct App {
    pub settings: Settings,
    state: State,
    snake: Snake,
    preview: Snake,

    /// Simulation accumulator; only advances while playing.
    acc: f32,
    preview_acc: f32,
    menu_anim: f32,
    shake_timer: f32,
    chroma_timer: f32,

    debug_mode: bool,
    /// Most recent action and where it came from, for the debug overlay.
    last_input: Option<(Action, Source)>,

    menu_items: Vec<MenuItem>,
    menu_index: usize,
    pause_index: usize,
    settings_index: usize,
    has_save: bool,

    save_path: PathBuf,
    settings_path: PathBuf,
    rng: SmallRng,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let has_save = Path::new(config::SAVE_PATH).exists();
        let mut app = Self {
            settings,
            state: State::Menu,
            snake: Snake::new(config::GRID_W, config::GRID_H),
            preview: Snake::new(config::GRID_W, config::GRID_H),
            acc: 0.0,
            preview_acc: 0.0,
            menu_anim: 0.0,
            shake_timer: 0.0,
            chroma_timer: 0.0,
            debug_mode: false,
            last_input: None,
            menu_items: Vec::new(),
            menu_index: 0,
            pause_index: 0,
            settings_index: 0,
            has_save,
            save_path: PathBuf::from(config::SAVE_PATH),
            settings_path: PathBuf::from(config::SETTINGS_PATH),
            rng: SmallRng::from_entropy(),
        };
        app.rebuild_menu();
        app
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Arguments for [`Renderer::present`], straight from settings.
    pub fn present_params(&self) -> (bool, f32, f32) {
        (
            self.settings.bloom,
            self.settings.bloom_strength,
            self.settings.bloom_radius,
        )
    }

    pub fn persist_settings(&self) {
        if let Err(err) = self.settings.save(&self.settings_path) {
            log::warn!("could not save settings: {err:#}");
        }
    }

    // ── input ─────────────────────────────────────────────────────────────

    pub fn handle_action(&mut self, action: Action, source: Source) -> AppFlow {
        self.last_input = Some((action, source));
        if action == Action::ToggleDebug {
            self.debug_mode = !self.debug_mode;
            return AppFlow::Continue;
        }
        match self.state {
            State::Menu => self.menu_action(action),
            State::Settings => {
                self.settings_action(action);
                AppFlow::Continue
            }
            State::Playing => {
                self.playing_action(action);
                AppFlow::Continue
            }
            State::Paused => {
                self.paused_action(action);
                AppFlow::Continue
            }
            State::GameOver | State::Win => {
                self.end_screen_action(action);
                AppFlow::Continue
            }
        }
    }

    fn menu_action(&mut self, action: Action) -> AppFlow {
        let n = self.menu_items.len();
        match action {
            Action::Up => self.menu_index = (self.menu_index + n - 1) % n,
            Action::Down => self.menu_index = (self.menu_index + 1) % n,
            Action::Confirm => match self.menu_items[self.menu_index] {
                MenuItem::Continue => {
                    if self.load_game() {
                        self.enter_playing();
                    }
                }
                MenuItem::Start => {
                    self.snake.reset();
                    self.enter_playing();
                }
                MenuItem::Settings => self.state = State::Settings,
                MenuItem::Quit => return AppFlow::Exit,
            },
            _ => {}
        }
        AppFlow::Continue
    }

    fn settings_action(&mut self, action: Action) {
        let n = SETTINGS_ITEMS.len();
        match action {
            Action::Up => self.settings_index = (self.settings_index + n - 1) % n,
            Action::Down => self.settings_index = (self.settings_index + 1) % n,
            Action::Pause => {
                self.persist_settings();
                self.state = State::Menu;
            }
            Action::Left | Action::Right | Action::Confirm => {
                let before = self.settings.clone();
                self.edit_setting(SETTINGS_ITEMS[self.settings_index], action);
                if self.settings != before {
                    self.persist_settings();
                }
            }
            _ => {}
        }
    }

    fn edit_setting(&mut self, item: SettingsItem, action: Action) {
        use SettingsItem as I;
        let confirm = action == Action::Confirm;
        let step_dir = match action {
            Action::Left => -1,
            Action::Right => 1,
            _ => 0,
        };
        match item {
            I::Vsync if confirm => self.settings.vsync = !self.settings.vsync,
            I::Bloom if confirm => self.settings.bloom = !self.settings.bloom,
            I::Kawase if confirm => self.settings.use_kawase = !self.settings.use_kawase,
            I::Shake if confirm => self.settings.shake_on_death = !self.settings.shake_on_death,
            I::ChromaEnabled if confirm => {
                self.settings.chroma_enabled = !self.settings.chroma_enabled;
            }
            I::Fullscreen if confirm => self.settings.fullscreen = !self.settings.fullscreen,
            I::BloomStrength | I::BloomRadius | I::Exposure | I::ChromaAmount | I::ChromaBias => {
                self.edit_slider(item, action);
            }
            I::Theme if step_dir != 0 => {
                self.settings.color_theme =
                    config::cycle_theme(&self.settings.color_theme, step_dir).to_owned();
            }
            I::Resolution if step_dir != 0 => {
                self.settings.resolution =
                    config::cycle_resolution(self.settings.resolution, step_dir);
            }
            I::Back if confirm => self.state = State::Menu,
            _ => {}
        }
    }

    /// Left/Right nudge a slider by its step within its range; Enter resets
    /// it to the shipped default.
    fn edit_slider(&mut self, item: SettingsItem, action: Action) {
        use SettingsItem as I;
        let defaults = Settings::default();
        let (value, step, min, max, default) = match item {
            I::BloomStrength => (
                &mut self.settings.bloom_strength,
                0.1,
                0.0,
                3.0,
                defaults.bloom_strength,
            ),
            I::BloomRadius => (
                &mut self.settings.bloom_radius,
                0.5,
                0.5,
                8.0,
                defaults.bloom_radius,
            ),
            I::Exposure => (&mut self.settings.exposure, 0.1, 0.1, 4.0, defaults.exposure),
            I::ChromaAmount => (
                &mut self.settings.chroma_amount,
                0.005,
                0.0,
                0.15,
                defaults.chroma_amount,
            ),
            I::ChromaBias => (
                &mut self.settings.chroma_bias,
                0.1,
                0.0,
                3.0,
                defaults.chroma_bias,
            ),
            _ => return,
        };
        match action {
            Action::Left => *value = (*value - step).max(min),
            Action::Right => *value = (*value + step).min(max),
            Action::Confirm => *value = default,
            _ => {}
        }
    }

    fn playing_action(&mut self, action: Action) {
        match action {
            Action::Up => self.snake.change_dir((0, -1)),
            Action::Down => self.snake.change_dir((0, 1)),
            Action::Left => self.snake.change_dir((-1, 0)),
            Action::Right => self.snake.change_dir((1, 0)),
            Action::Pause => {
                self.state = State::Paused;
                self.pause_index = 0;
            }
            _ => {}
        }
    }

    fn paused_action(&mut self, action: Action) {
        let n = PAUSE_ITEMS.len();
        match action {
            Action::Up => self.pause_index = (self.pause_index + n - 1) % n,
            Action::Down => self.pause_index = (self.pause_index + 1) % n,
            Action::Confirm => match PAUSE_ITEMS[self.pause_index] {
                PauseItem::Resume => self.state = State::Playing,
                PauseItem::SaveQuit => {
                    self.save_game();
                    self.snake.reset();
                    self.state = State::Menu;
                }
                PauseItem::Quit => {
                    self.snake.reset();
                    self.state = State::Menu;
                }
            },
            Action::Pause => self.state = State::Playing,
            _ => {}
        }
    }

    fn end_screen_action(&mut self, action: Action) {
        match action {
            Action::Retry | Action::Confirm => {
                self.snake.reset();
                self.enter_playing();
            }
            Action::MenuQuit | Action::Pause => {
                self.snake.reset();
                self.state = State::Menu;
            }
            _ => {}
        }
    }

    fn enter_playing(&mut self) {
        self.state = State::Playing;
        self.acc = 0.0;
    }

    // ── simulation ────────────────────────────────────────────────────────

    pub fn update(&mut self, dt: f32) {
        self.menu_anim += dt * MENU_ANIM_RATE;
        if self.chroma_timer > 0.0 {
            self.chroma_timer -= dt;
        }
        if self.shake_timer > 0.0 {
            self.shake_timer = (self.shake_timer - dt).max(0.0);
        }
        match self.state {
            State::Menu | State::Settings => {
                self.preview_acc += dt;
                if self.preview_acc >= PREVIEW_TICK {
                    self.preview_acc -= PREVIEW_TICK;
                    self.step_preview();
                }
            }
            State::Playing => {
                self.acc += dt;
                if self.acc >= TICK {
                    self.acc -= TICK;
                    self.step_game();
                }
            }
            _ => {}
        }
    }

    fn step_game(&mut self) {
        let result = self.snake.step();
        if result.died {
            self.state = State::GameOver;
            self.shake_timer = if self.settings.shake_on_death {
                SHAKE_DURATION
            } else {
                0.0
            };
            self.chroma_timer = CHROMA_SPIKE_DURATION;
            let score = self.snake.score();
            if score > self.settings.high_score {
                self.settings.high_score = score;
                self.persist_settings();
            }
        } else if result.won {
            self.state = State::Win;
        }
    }

    /// One step of the menu-background snake: greedy chase with a small
    /// random turn chance, restarting itself on death or victory.
    fn step_preview(&mut self) {
        if let Some(dir) = preview_dir(
            self.preview.head(),
            self.preview.apple,
            self.preview.direction(),
        ) {
            self.preview.change_dir(dir);
        }
        if self.rng.gen_bool(0.08) {
            if self.rng.gen_bool(0.5) {
                let sign = if self.rng.gen_bool(0.5) { -1 } else { 1 };
                self.preview.change_dir((sign, 0));
            } else {
                let sign = if self.rng.gen_bool(0.5) { -1 } else { 1 };
                self.preview.change_dir((0, sign));
            }
        }
        let result = self.preview.step();
        if result.died || result.won {
            self.preview.reset();
        }
    }

    // ── persistence ───────────────────────────────────────────────────────

    fn write_save(&self) -> Result<()> {
        let data = SaveData {
            snake: self.snake.snapshot(),
            score: self.snake.score(),
        };
        let text = serde_json::to_string(&data).context("failed to serialize save data")?;
        fs::write(&self.save_path, text)
            .with_context(|| format!("failed to write save file {}", self.save_path.display()))
    }

    fn save_game(&mut self) {
        match self.write_save() {
            Ok(()) => {
                self.has_save = true;
                self.rebuild_menu();
            }
            Err(err) => log::warn!("could not save game: {err:#}"),
        }
    }

    fn read_save(&self) -> Result<SaveData> {
        let text = fs::read_to_string(&self.save_path)
            .with_context(|| format!("failed to read save file {}", self.save_path.display()))?;
        serde_json::from_str(&text).context("save file is corrupt")
    }

    fn load_game(&mut self) -> bool {
        let restored = self
            .read_save()
            .and_then(|data| self.snake.restore(data.snake));
        match restored {
            Ok(()) => true,
            Err(err) => {
                log::warn!("could not restore saved game: {err:#}");
                false
            }
        }
    }

    fn rebuild_menu(&mut self) {
        self.menu_items.clear();
        if self.has_save {
            self.menu_items.push(MenuItem::Continue);
        }
        self.menu_items
            .extend([MenuItem::Start, MenuItem::Settings, MenuItem::Quit]);
        self.menu_index = self.menu_index.min(self.menu_items.len() - 1);
    }

    // ── effects ───────────────────────────────────────────────────────────

    /// Shake amplitude for the current frame; nonzero only on the game-over
    /// screen while the timer runs down.
    fn current_shake(&self) -> f32 {
        if self.state == State::GameOver && self.shake_timer > 0.0 {
            SHAKE_AMPLITUDE * (self.shake_timer / SHAKE_DURATION)
        } else {
            0.0
        }
    }

    /// Chromatic aberration amount, spiking to [`MAX_CHROMA_SPIKE`] on death
    /// and easing back to the configured value.
    fn current_chroma(&self) -> f32 {
        let base = self.settings.chroma_amount;
        if self.chroma_timer > 0.0 {
            let t = (self.chroma_timer / CHROMA_SPIKE_DURATION).max(0.0);
            base + (MAX_CHROMA_SPIKE - base) * t
        } else {
            base
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Issues every draw for the current state and pushes the post-process
    /// tunables to the renderer. The caller runs the bloom pass and presents.
    pub fn draw_frame(&mut self, renderer: &mut Renderer, screen: (u32, u32), fps: f32) {
        let theme = self.settings.theme();
        match self.state {
            State::Menu => {
                self.draw_preview_scene(renderer, theme);
                self.draw_menu(renderer, screen, theme);
            }
            State::Settings => {
                self.draw_preview_scene(renderer, theme);
                self.draw_settings(renderer, screen, theme);
            }
            State::Paused => {
                self.draw_gameplay(renderer, screen, theme, fps);
                self.draw_pause(renderer, screen);
            }
            State::Playing | State::GameOver | State::Win => {
                self.draw_gameplay(renderer, screen, theme, fps);
            }
        }
        if self.debug_mode {
            self.draw_debug(renderer, screen);
        }
        self.sync_renderer(renderer);
    }

    fn draw_preview_scene(&self, renderer: &mut Renderer, theme: &Theme) {
        renderer.draw_border(2, BACKING_BORDER);
        renderer.draw_border(1, theme.border);
        renderer.draw_snake(self.preview.positions(), theme.snake, 0.0);
        renderer.draw_apple(self.preview.apple, theme.apple, 0.0);
        renderer.draw_vignette(5.0);
    }

    fn draw_menu(&self, renderer: &mut Renderer, screen: (u32, u32), theme: &Theme) {
        let (w, h) = (screen.0 as f32, screen.1 as f32);
        let v_off = (h - 800.0) / 2.0;
        draw_centered(renderer, "Wyrm", v_off, 82, theme.title, w);
        let high_score = format!("HIGH SCORE: {}", self.settings.high_score);
        draw_centered(renderer, &high_score, v_off + 100.0, 36, gray(180), w);

        let base_y = 340.0;
        for (i, item) in self.menu_items.iter().enumerate() {
            let selected = i == self.menu_index;
            let label = item.label();
            // Centering and the highlight rect use the unpulsed width so the
            // layout holds still while the selected label breathes.
            let tw = renderer.text_width(label, 24) as f32;
            let y = base_y + i as f32 * 60.0;
            let mut size = 24;
            if selected {
                let pulse = (0.5 + 0.5 * self.menu_anim.sin()) * 4.0;
                size = (24.0 + pulse) as u32;
                renderer.draw_rect(
                    ((w - tw) / 2.0 - 22.0, y - 6.0),
                    (tw + 50.0, 44.0),
                    theme.menu_highlight_rect,
                    12.0,
                );
            }
            let color = if selected {
                theme.menu_text_selected
            } else {
                theme.menu_text
            };
            renderer.draw_text(label, ((w - tw) / 2.0, y), size, color);
        }
    }

    fn draw_settings(&self, renderer: &mut Renderer, screen: (u32, u32), theme: &Theme) {
        let (w, h) = (screen.0 as f32, screen.1 as f32);
        let v_off = (h - 800.0) / 2.0;
        draw_centered(renderer, "Settings", v_off, 72, Color::white(), w);

        let base_y = 260.0;
        for (idx, item) in SETTINGS_ITEMS.iter().enumerate() {
            let selected = idx == self.settings_index;
            let line = self.settings_line(*item);
            let tw = renderer.text_width(&line, 20) as f32;
            let y = base_y + idx as f32 * 50.0;
            if selected {
                renderer.draw_rect(
                    ((w - tw) / 2.0 - 20.0, y - 8.0),
                    (tw + 40.0, 40.0),
                    theme.menu_highlight_rect,
                    12.0,
                );
            }
            let color = if selected {
                theme.menu_text_selected
            } else {
                theme.menu_text
            };
            renderer.draw_text(&line, ((w - tw) / 2.0, y), 20, color);
        }
    }

    fn settings_line(&self, item: SettingsItem) -> String {
        use SettingsItem as I;
        let s = &self.settings;
        match item {
            I::Vsync => format!("V-Sync: {}", on_off(s.vsync)),
            I::Bloom => format!("Bloom: {}", on_off(s.bloom)),
            I::Kawase => format!("Kawase Bloom: {}", on_off(s.use_kawase)),
            I::Shake => format!("Shake on Death: {}", on_off(s.shake_on_death)),
            I::BloomStrength => format!("Bloom Strength: {}", fmt_float(s.bloom_strength)),
            I::BloomRadius => format!("Bloom Radius: {}", fmt_float(s.bloom_radius)),
            I::Exposure => format!("Exposure: {}", fmt_float(s.exposure)),
            I::ChromaEnabled => format!("Chromatic Aberr.: {}", on_off(s.chroma_enabled)),
            I::ChromaAmount => format!("Chroma Amount: {}", fmt_float(s.chroma_amount)),
            I::ChromaBias => format!("Chroma Falloff: {}", fmt_float(s.chroma_bias)),
            I::Theme => format!("Color Theme: {}", s.color_theme),
            I::Fullscreen => format!("Fullscreen: {}", on_off(s.fullscreen)),
            I::Resolution => format!("Resolution: {}x{}", s.resolution.0, s.resolution.1),
            I::Back => "Back".to_owned(),
        }
    }

    fn draw_gameplay(&self, renderer: &mut Renderer, screen: (u32, u32), theme: &Theme, fps: f32) {
        let w = screen.0 as f32;
        renderer.draw_border(2, BACKING_BORDER);
        renderer.draw_border(1, theme.border);

        let shake = self.current_shake();
        renderer.draw_snake(self.snake.positions(), theme.snake, shake);
        renderer.draw_apple(self.snake.apple, theme.apple, shake);

        let score_text = format!("SCORE: {}", self.snake.score());
        let tw = renderer.text_width(&score_text, 32) as f32;
        renderer.draw_text(&score_text, (w - tw - 20.0, 20.0), 32, Color::white());
        let fps_text = format!("FPS: {}", fps as u32);
        renderer.draw_text(&fps_text, (20.0, 20.0), 32, Color::white());

        match self.state {
            State::GameOver => {
                renderer.draw_tint(Color::new(1.0, 0.0, 0.0, 0.25));
                draw_centered(renderer, "GAME OVER", 240.0, 72, Color::white(), w);
                draw_centered(renderer, "R = Retry | M = Menu", 330.0, 28, Color::white(), w);
            }
            State::Win => {
                renderer.draw_tint(Color::new(0.0, 0.5, 0.0, 0.25));
                draw_centered(renderer, "YOU WIN!", 240.0, 72, Color::white(), w);
                draw_centered(renderer, "R = Restart | M = Menu", 330.0, 28, Color::white(), w);
            }
            _ => {}
        }
    }

    fn draw_pause(&self, renderer: &mut Renderer, screen: (u32, u32)) {
        let (w, h) = (screen.0 as f32, screen.1 as f32);
        renderer.draw_rect((0.0, 0.0), (w, h), Color::new(0.0, 0.0, 0.0, 0.5), 0.0);

        let v_off = (h - 400.0) / 2.0;
        draw_centered(renderer, "PAUSED", v_off, 72, Color::white(), w);
        let base_y = v_off + 150.0;
        for (i, item) in PAUSE_ITEMS.iter().enumerate() {
            let y = base_y + i as f32 * 60.0;
            if i == self.pause_index {
                let line = format!("> {} <", item.label());
                draw_centered(renderer, &line, y, 32, Color::white(), w);
            } else {
                draw_centered(renderer, item.label(), y, 32, gray(150), w);
            }
        }
    }

    fn draw_debug(&self, renderer: &mut Renderer, screen: (u32, u32)) {
        let y = screen.1 as f32 - 40.0;
        let mode = format!("MODE: {}", self.state.name());
        renderer.draw_text(&mode, (20.0, y - 50.0), 20, Color::white());
        let source = self.last_input.map_or("None", |(_, s)| s.label());
        renderer.draw_text(&format!("SOURCE: {source}"), (20.0, y - 25.0), 20, Color::white());
        let action = self.last_input.map_or("None", |(a, _)| a.label());
        renderer.draw_text(
            &format!("LAST ACTION: {action}"),
            (20.0, y),
            20,
            Color::white(),
        );
    }

    fn sync_renderer(&self, renderer: &mut Renderer) {
        renderer.set_dirt(config::DIRT_PATH);
        renderer.use_kawase = self.settings.use_kawase;
        renderer.exposure = self.settings.exposure;
        renderer.chroma_enabled = self.settings.chroma_enabled;
        renderer.chroma_amount = self.current_chroma();
        renderer.chroma_bias = self.settings.chroma_bias;
    }
}

/// Greedy preview direction: run down the longer apple axis, switching to
/// the other axis instead of reversing onto the neck. `None` when the head
/// already shares a column and row with the apple.
fn preview_dir(head: Cell, apple: Cell, current: (i32, i32)) -> Option<(i32, i32)> {
    let dx = apple.x - head.x;
    let dy = apple.y - head.y;

    let mut dir = (0, 0);
    if dx.abs() > dy.abs() {
        dir = (if dx > 0 { 1 } else { -1 }, 0);
    } else if dy.abs() > 0 {
        dir = (0, if dy > 0 { 1 } else { -1 });
    }
    if dir == (-current.0, -current.1) {
        dir = if dx.abs() > dy.abs() {
            (0, if dy > 0 { 1 } else { -1 })
        } else {
            (if dx > 0 { 1 } else { -1 }, 0)
        };
    }
    (dir != (0, 0)).then_some(dir)
}

fn draw_centered(renderer: &mut Renderer, text: &str, y: f32, size: u32, color: Color, screen_w: f32) {
    let tw = renderer.text_width(text, size) as f32;
    renderer.draw_text(text, ((screen_w - tw) / 2.0, y), size, color);
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

/// Two-decimal display with trailing zeros trimmed, one decimal minimum:
/// 0.9, 2.0, 0.02.
fn fmt_float(v: f32) -> String {
    let mut s = format!("{v:.2}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s
}

fn gray(v: u8) -> Color {
    let c = (v as f32 + 0.5) / 255.0;
    Color::new(c, c, c, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let mut app = App::new(Settings::default());
        // Keep tests independent of files in the working directory.
        app.has_save = false;
        app.rebuild_menu();
        app.save_path = std::env::temp_dir().join(format!(
            "wyrm-save-{}-{:p}.json",
            std::process::id(),
            &app as *const _
        ));
        app.settings_path = std::env::temp_dir().join(format!(
            "wyrm-settings-{}-{:p}.json",
            std::process::id(),
            &app as *const _
        ));
        app
    }

    fn cleanup(app: &App) {
        let _ = fs::remove_file(&app.save_path);
        let _ = fs::remove_file(&app.settings_path);
    }

    fn select_settings_item(app: &mut App, item: SettingsItem) {
        app.settings_index = SETTINGS_ITEMS
            .iter()
            .position(|i| *i == item)
            .expect("item is in the settings list");
    }

    // ── formatting ────────────────────────────────────────────────────────

    #[test]
    fn fmt_float_trims_but_keeps_one_decimal() {
        assert_eq!(fmt_float(0.9), "0.9");
        assert_eq!(fmt_float(2.0), "2.0");
        assert_eq!(fmt_float(1.0), "1.0");
        assert_eq!(fmt_float(0.02), "0.02");
        assert_eq!(fmt_float(0.15), "0.15");
    }

    #[test]
    fn gray_survives_byte_round_trip() {
        assert_eq!(gray(180).to_bytes(), [180, 180, 180]);
        assert_eq!(gray(150).to_bytes(), [150, 150, 150]);
    }

    // ── menu ──────────────────────────────────────────────────────────────

    #[test]
    fn menu_wraps_and_quit_exits() {
        let mut app = test_app();
        assert_eq!(app.menu_items.len(), 3);
        assert_eq!(app.handle_action(Action::Up, Source::Keyboard), AppFlow::Continue);
        assert_eq!(app.menu_index, 2);
        assert_eq!(app.handle_action(Action::Down, Source::Keyboard), AppFlow::Continue);
        assert_eq!(app.menu_index, 0);
        app.menu_index = 2;
        assert_eq!(app.handle_action(Action::Confirm, Source::Keyboard), AppFlow::Exit);
    }

    #[test]
    fn start_game_resets_and_enters_playing() {
        let mut app = test_app();
        app.acc = 3.0;
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert_eq!(app.state(), State::Playing);
        assert_eq!(app.acc, 0.0);
        assert_eq!(app.snake.positions().len(), 1);
    }

    #[test]
    fn continue_without_a_save_stays_in_the_menu() {
        let mut app = test_app();
        app.has_save = true;
        app.rebuild_menu();
        assert_eq!(app.menu_items[0], MenuItem::Continue);
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert_eq!(app.state(), State::Menu);
        cleanup(&app);
    }

    // ── settings ──────────────────────────────────────────────────────────

    #[test]
    fn sliders_step_and_clamp() {
        let mut app = test_app();
        app.state = State::Settings;
        select_settings_item(&mut app, SettingsItem::BloomStrength);
        for _ in 0..40 {
            let _ = app.handle_action(Action::Right, Source::Keyboard);
        }
        assert_eq!(app.settings.bloom_strength, 3.0);
        for _ in 0..40 {
            let _ = app.handle_action(Action::Left, Source::Keyboard);
        }
        assert_eq!(app.settings.bloom_strength, 0.0);
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert_eq!(app.settings.bloom_strength, 0.9);
        cleanup(&app);
    }

    #[test]
    fn radius_and_exposure_respect_their_minimums() {
        let mut app = test_app();
        app.state = State::Settings;
        select_settings_item(&mut app, SettingsItem::BloomRadius);
        for _ in 0..20 {
            let _ = app.handle_action(Action::Left, Source::Keyboard);
        }
        assert_eq!(app.settings.bloom_radius, 0.5);
        select_settings_item(&mut app, SettingsItem::Exposure);
        for _ in 0..20 {
            let _ = app.handle_action(Action::Left, Source::Keyboard);
        }
        assert!((app.settings.exposure - 0.1).abs() < 1e-6);
        cleanup(&app);
    }

    #[test]
    fn chroma_amount_uses_the_fine_step() {
        let mut app = test_app();
        app.state = State::Settings;
        select_settings_item(&mut app, SettingsItem::ChromaAmount);
        let _ = app.handle_action(Action::Right, Source::Keyboard);
        assert!((app.settings.chroma_amount - 0.025).abs() < 1e-6);
        for _ in 0..60 {
            let _ = app.handle_action(Action::Right, Source::Keyboard);
        }
        assert_eq!(app.settings.chroma_amount, 0.15);
        cleanup(&app);
    }

    #[test]
    fn theme_row_cycles_both_ways() {
        let mut app = test_app();
        app.state = State::Settings;
        select_settings_item(&mut app, SettingsItem::Theme);
        let _ = app.handle_action(Action::Right, Source::Keyboard);
        assert_eq!(app.settings.color_theme, "Cyberpunk");
        let _ = app.handle_action(Action::Left, Source::Keyboard);
        assert_eq!(app.settings.color_theme, "Classic Green");
        cleanup(&app);
    }

    #[test]
    fn toggles_flip_on_confirm_only() {
        let mut app = test_app();
        app.state = State::Settings;
        select_settings_item(&mut app, SettingsItem::Vsync);
        let _ = app.handle_action(Action::Left, Source::Keyboard);
        assert!(app.settings.vsync);
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert!(!app.settings.vsync);
        cleanup(&app);
    }

    #[test]
    fn escape_backs_out_of_settings() {
        let mut app = test_app();
        app.state = State::Settings;
        let _ = app.handle_action(Action::Pause, Source::Keyboard);
        assert_eq!(app.state(), State::Menu);
        cleanup(&app);
    }

    // ── pause ─────────────────────────────────────────────────────────────

    #[test]
    fn pause_toggles_from_playing() {
        let mut app = test_app();
        app.state = State::Playing;
        let _ = app.handle_action(Action::Pause, Source::Keyboard);
        assert_eq!(app.state(), State::Paused);
        assert_eq!(app.pause_index, 0);
        let _ = app.handle_action(Action::Pause, Source::Keyboard);
        assert_eq!(app.state(), State::Playing);
    }

    #[test]
    fn save_and_quit_writes_the_save_and_adds_continue() {
        let mut app = test_app();
        app.state = State::Paused;
        app.pause_index = 1;
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert_eq!(app.state(), State::Menu);
        assert!(app.has_save);
        assert_eq!(app.menu_items[0], MenuItem::Continue);
        assert!(app.save_path.exists());
        cleanup(&app);
    }

    #[test]
    fn saved_run_restores_through_continue() {
        let mut app = test_app();
        app.snake.apple = Cell::new(13, 12);
        app.snake.step();
        let expected: Vec<Cell> = app.snake.positions().to_vec();
        app.state = State::Paused;
        app.pause_index = 1;
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);

        // Fresh run would reset; Continue must bring the old one back.
        assert_eq!(app.snake.positions().len(), 1);
        app.menu_index = 0;
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert_eq!(app.state(), State::Playing);
        assert_eq!(app.snake.positions(), expected.as_slice());
        cleanup(&app);
    }

    // ── end screens ───────────────────────────────────────────────────────

    #[test]
    fn death_sets_effect_timers_and_persists_high_score() {
        let mut app = test_app();
        app.state = State::Playing;
        app.snake
            .restore(SnakeState {
                segments: vec![(22, 12), (21, 12), (20, 12)],
                direction: (1, 0),
                apple: (1, 1),
                pending_growth: 0,
            })
            .unwrap();
        app.acc = TICK;
        app.update(0.0);
        assert_eq!(app.state(), State::GameOver);
        assert_eq!(app.shake_timer, SHAKE_DURATION);
        assert_eq!(app.chroma_timer, CHROMA_SPIKE_DURATION);
        assert_eq!(app.settings.high_score, 2);
        assert!(app.settings_path.exists());
        cleanup(&app);
    }

    #[test]
    fn shake_is_suppressed_when_disabled() {
        let mut app = test_app();
        app.settings.shake_on_death = false;
        app.state = State::Playing;
        app.snake
            .restore(SnakeState {
                segments: vec![(22, 12)],
                direction: (1, 0),
                apple: (1, 1),
                pending_growth: 0,
            })
            .unwrap();
        app.acc = TICK;
        app.update(0.0);
        assert_eq!(app.state(), State::GameOver);
        assert_eq!(app.shake_timer, 0.0);
        cleanup(&app);
    }

    #[test]
    fn retry_restarts_from_game_over() {
        let mut app = test_app();
        app.state = State::GameOver;
        let _ = app.handle_action(Action::Retry, Source::Keyboard);
        assert_eq!(app.state(), State::Playing);
        assert_eq!(app.snake.positions().len(), 1);
    }

    #[test]
    fn menu_quit_leaves_the_end_screen() {
        let mut app = test_app();
        app.state = State::Win;
        let _ = app.handle_action(Action::MenuQuit, Source::Keyboard);
        assert_eq!(app.state(), State::Menu);
    }

    // ── effects ───────────────────────────────────────────────────────────

    #[test]
    fn shake_decays_with_the_timer() {
        let mut app = test_app();
        app.state = State::GameOver;
        app.shake_timer = SHAKE_DURATION;
        assert_eq!(app.current_shake(), SHAKE_AMPLITUDE);
        app.shake_timer = SHAKE_DURATION / 2.0;
        assert!((app.current_shake() - SHAKE_AMPLITUDE / 2.0).abs() < 1e-6);
        app.shake_timer = 0.0;
        assert_eq!(app.current_shake(), 0.0);
        app.state = State::Win;
        app.shake_timer = SHAKE_DURATION;
        assert_eq!(app.current_shake(), 0.0, "only the game-over screen shakes");
    }

    #[test]
    fn chroma_spike_interpolates_back_to_the_setting() {
        let mut app = test_app();
        app.chroma_timer = CHROMA_SPIKE_DURATION;
        assert!((app.current_chroma() - MAX_CHROMA_SPIKE).abs() < 1e-6);
        app.chroma_timer = CHROMA_SPIKE_DURATION / 2.0;
        let expected = 0.02 + (MAX_CHROMA_SPIKE - 0.02) * 0.5;
        assert!((app.current_chroma() - expected).abs() < 1e-6);
        app.chroma_timer = 0.0;
        assert_eq!(app.current_chroma(), app.settings.chroma_amount);
    }

    // ── simulation pacing ─────────────────────────────────────────────────

    #[test]
    fn the_sim_steps_only_on_full_ticks() {
        let mut app = test_app();
        let _ = app.handle_action(Action::Confirm, Source::Keyboard);
        assert_eq!(app.state(), State::Playing);
        let head = app.snake.head();
        app.snake.apple = Cell::new(1, 1);
        app.update(TICK / 2.0);
        assert_eq!(app.snake.head(), head);
        app.update(TICK / 2.0);
        assert_eq!(app.snake.head(), head.offset(1, 0));
    }

    #[test]
    fn winning_step_enters_the_win_state() {
        let mut app = test_app();
        app.state = State::Playing;
        // Interior minus one cell, head adjacent to the last free cell.
        let mut path = Vec::new();
        for y in 1..23 {
            if y % 2 == 1 {
                for x in 1..23 {
                    path.push((x, y));
                }
            } else {
                for x in (1..23).rev() {
                    path.push((x, y));
                }
            }
        }
        let apple = path.pop().unwrap();
        let head = *path.last().unwrap();
        let direction = (apple.0 - head.0, apple.1 - head.1);
        app.snake
            .restore(SnakeState {
                segments: path.into_iter().rev().collect(),
                direction,
                apple,
                pending_growth: 0,
            })
            .unwrap();
        app.acc = TICK;
        app.update(0.0);
        assert_eq!(app.state(), State::Win);
    }

    // ── preview ai ────────────────────────────────────────────────────────

    #[test]
    fn preview_chases_the_longer_axis() {
        let dir = preview_dir(Cell::new(10, 10), Cell::new(15, 12), (0, 1));
        assert_eq!(dir, Some((1, 0)));
        let dir = preview_dir(Cell::new(10, 10), Cell::new(11, 4), (1, 0));
        assert_eq!(dir, Some((0, -1)));
    }

    #[test]
    fn preview_swaps_axis_instead_of_reversing() {
        // The apple sits straight behind the head; the greedy pick would be
        // a reversal, so the chase flips to the vertical axis.
        let dir = preview_dir(Cell::new(10, 10), Cell::new(5, 10), (1, 0));
        assert_eq!(dir, Some((0, -1)));
    }

    #[test]
    fn preview_ties_prefer_the_vertical_axis() {
        let dir = preview_dir(Cell::new(10, 10), Cell::new(13, 13), (1, 0));
        assert_eq!(dir, Some((0, 1)));
    }

    // ── debug overlay ─────────────────────────────────────────────────────

    #[test]
    fn input_is_retained_with_its_source_for_the_overlay() {
        let mut app = test_app();
        assert_eq!(app.last_input, None);
        let _ = app.handle_action(Action::Down, Source::Keyboard);
        assert_eq!(app.last_input, Some((Action::Down, Source::Keyboard)));
    }

    #[test]
    fn toggle_debug_flips_the_overlay_and_is_itself_retained() {
        let mut app = test_app();
        assert!(!app.debug_mode);
        let _ = app.handle_action(Action::ToggleDebug, Source::Keyboard);
        assert!(app.debug_mode);
        assert_eq!(app.last_input, Some((Action::ToggleDebug, Source::Keyboard)));
    }
}
