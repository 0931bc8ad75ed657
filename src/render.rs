use crate::particle::Particle;
use crate::random::Rgb;
use crate::universe::{ModalTarget, StatusText, Universe};
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::f32::consts::TAU;
use std::io::{self, Write};
use std::time::Duration;

const BG: Color = Color::Rgb { r: 8, g: 8, b: 18 };
const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

// animation constants, in container pixels and seconds
const FLOAT_PERIOD: f32 = 3.0;
const FLOAT_AMP_X: f32 = 2.0;
const FLOAT_AMP_Y: f32 = 4.0;
const GRAVITY_ACCEL: f32 = 140.0;
const EXPLODE_SECS: f32 = 1.0;
const EXPLODE_RADIUS: f32 = 9.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: BG,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    /// A buffer that matches no real frame, so the next present repaints all.
    pub(crate) fn stale(w: u16, h: u16) -> Self {
        let mut b = Self::new(w, h);
        for c in &mut b.cells {
            c.ch = '\0';
        }
        b
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    #[cfg(test)]
    pub(crate) fn get(&self, x: u16, y: u16) -> Option<Cell> {
        (x < self.w && y < self.h).then(|| self.cells[self.idx(x, y)])
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell {
            ch: ' ',
            fg: Color::White,
            bg,
        });
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }
    fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }
}

/* -----------------------------
   Screen layout
------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rect {
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) w: u16,
    pub(crate) h: u16,
}

impl Rect {
    pub(crate) fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col < self.x + self.w && row >= self.y && row < self.y + self.h
    }
}

/// Row 0 is the status bar, the last row the key hints, everything between
/// is the particle container.
pub(crate) fn container_rect(cols: u16, rows: u16) -> Rect {
    Rect {
        x: 0,
        y: 1,
        w: cols,
        h: rows.saturating_sub(2),
    }
}

/// Container size in braille sub-pixels (2×4 per cell).
pub(crate) fn container_pixels(cols: u16, rows: u16) -> (f32, f32) {
    let r = container_rect(cols, rows);
    (r.w as f32 * 2.0, r.h as f32 * 4.0)
}

pub(crate) fn modal_rect(cols: u16, rows: u16) -> Rect {
    let w = 50u16.min(cols.saturating_sub(4));
    let h = 7u16.min(rows.saturating_sub(2));
    Rect {
        x: (cols - w) / 2,
        y: (rows - h) / 2,
        w,
        h,
    }
}

pub(crate) fn modal_target(cols: u16, rows: u16, col: u16, row: u16) -> ModalTarget {
    if modal_rect(cols, rows).contains(col, row) {
        ModalTarget::Content
    } else {
        ModalTarget::Backdrop
    }
}

/* -----------------------------
   Particle animation
------------------------------ */

fn secs(d: Duration) -> f32 {
    d.as_secs_f32()
}

/// Idle drift; the per-particle delay keeps them out of phase. `clock` is
/// the speed-scaled float clock, so a speed change never moves the phase.
pub(crate) fn float_offset(p: &Particle, clock: Duration) -> (f32, f32) {
    let t = (secs(clock) - p.animation_delay).max(0.0);
    let phase = t / FLOAT_PERIOD * TAU;
    (phase.cos() * FLOAT_AMP_X, phase.sin() * FLOAT_AMP_Y)
}

/// Distance fallen since gravity was switched on, stopping at the floor.
pub(crate) fn fall_distance(p: &Particle, now: Duration, floor: f32) -> f32 {
    let Some(since) = p.gravity_since else {
        return 0.0;
    };
    let t = secs(now.saturating_sub(since));
    let d = 0.5 * GRAVITY_ACCEL * t * t;
    d.min((floor - p.pos.y).max(0.0))
}

/// 0.0 at ignition, 1.0 when the burst has faded out.
pub(crate) fn explosion_progress(p: &Particle, now: Duration) -> Option<f32> {
    let since = p.exploding_since?;
    Some((secs(now.saturating_sub(since)) / EXPLODE_SECS).clamp(0.0, 1.0))
}

pub(crate) fn shake_offset(now: Duration, shaking: bool) -> i32 {
    if !shaking {
        return 0;
    }
    let s = (secs(now) * 70.0).sin();
    if s > 0.33 {
        1
    } else if s < -0.33 {
        -1
    } else {
        0
    }
}

fn draw_particle(canvas: &mut PixelCanvas, p: &Particle, u: &Universe, floor: f32) {
    let now = u.now();
    let Rgb { r, g, b } = p.color;

    let (dx, dy) = if p.has_gravity() {
        (0.0, fall_distance(p, now, floor))
    } else {
        float_offset(p, u.float_clock())
    };
    let cx = p.pos.x + dx;
    let cy = p.pos.y + dy;

    match explosion_progress(p, now) {
        None => {
            // 2×2 core plus a faint halo
            for (ox, oy, a) in [
                (0, 0, 255u8),
                (1, 0, 255),
                (0, 1, 255),
                (1, 1, 255),
                (-1, 0, 70),
                (2, 1, 70),
                (0, -1, 70),
                (1, 2, 70),
            ] {
                canvas.blend_over(cx as i32 + ox, cy as i32 + oy, Pixel { r, g, b, a });
            }
        }
        Some(t) => {
            let radius = 1.0 + t * EXPLODE_RADIUS;
            let a = ((1.0 - t) * 255.0) as u8;
            let spokes = 12;
            for k in 0..spokes {
                let ang = k as f32 / spokes as f32 * TAU;
                let x = cx + ang.cos() * radius;
                let y = cy + ang.sin() * radius;
                canvas.blend_over(x as i32, y as i32, Pixel { r, g, b, a });
            }
            if t < 0.3 {
                canvas.blend_over(cx as i32, cy as i32, Pixel { r: 255, g: 255, b: 255, a });
            }
        }
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

/// Writes the canvas into `area` of the cell buffer, shifted by `shift` columns.
fn canvas_to_cells(
    canvas: &PixelCanvas,
    out: &mut CellBuffer,
    area: Rect,
    shift: i32,
    enable_color: bool,
) {
    for cy in 0..area.h as u32 {
        for cx in 0..area.w as u32 {
            let mut mask: u8 = 0;
            let (mut sr, mut sg, mut sb, mut ink) = (0u32, 0u32, 0u32, 0u32);

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = cx * 2 + dx;
                    let y = cy * 4 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    if p.a >= 32 {
                        mask |= braille_bit(dx, dy);
                        sr += p.r as u32;
                        sg += p.g as u32;
                        sb += p.b as u32;
                        ink += 1;
                    }
                }
            }
            if mask == 0 {
                continue;
            }

            let ch = char::from_u32(0x2800 + mask as u32).unwrap_or(' ');
            let fg = if enable_color {
                Color::Rgb {
                    r: (sr / ink) as u8,
                    g: (sg / ink) as u8,
                    b: (sb / ink) as u8,
                }
            } else {
                Color::White
            };

            let col = area.x as i32 + cx as i32 + shift;
            if col < 0 {
                continue;
            }
            out.set(col as u16, area.y + cy as u16, Cell { ch, fg, bg: BG });
        }
    }
}

/* -----------------------------
   Text UI
------------------------------ */

/// Returns the column after the last character written.
pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) -> u16 {
    let mut xx = x;
    for ch in s.chars() {
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
        xx += 1;
    }
    xx
}

fn tone_color(s: &StatusText) -> Color {
    let Rgb { r, g, b } = s.tone.rgb();
    Color::Rgb { r, g, b }
}

fn draw_status_bar(buf: &mut CellBuffer, u: &Universe) {
    let dim = Color::Grey;
    let st = u.status();

    let mut x = draw_text(buf, 1, 0, "Particle Universe", Color::White, BG);
    x = draw_text(buf, x, 0, "  Particles: ", dim, BG);
    x = draw_text(buf, x, 0, &st.particles.text, tone_color(&st.particles), BG);
    x = draw_text(buf, x, 0, "  Gravity: ", dim, BG);
    x = draw_text(buf, x, 0, &st.gravity.text, tone_color(&st.gravity), BG);
    x = draw_text(buf, x, 0, "  Count: ", dim, BG);
    x = draw_text(buf, x, 0, &st.count.to_string(), Color::White, BG);
    x = draw_text(buf, x, 0, "  Speed: ", dim, BG);
    x = draw_text(buf, x, 0, u.speed().label(), Color::White, BG);

    if u.is_loading() {
        let frame = (u.now().as_millis() / 80) as usize % SPINNER.len();
        let s = format!("  {} generating", SPINNER[frame]);
        draw_text(buf, x, 0, &s, Color::Cyan, BG);
    } else if u.explosion_pending() {
        draw_text(buf, x, 0, "  * exploding", Color::Yellow, BG);
    }

    let hints = "e explode | g gravity | r reset | s shake | c clear | n new | +/- count | a speed | q quit";
    draw_text(buf, 1, buf.h.saturating_sub(1), hints, dim, BG);
}

fn draw_box(buf: &mut CellBuffer, r: Rect) {
    let fg = Color::White;
    let bg = Color::Rgb { r: 24, g: 24, b: 40 };
    if r.w < 2 || r.h < 2 {
        return;
    }
    let (x1, y1) = (r.x + r.w - 1, r.y + r.h - 1);
    for y in r.y..=y1 {
        for x in r.x..=x1 {
            let ch = match (x == r.x, x == x1, y == r.y, y == y1) {
                (true, _, true, _) => '┌',
                (_, true, true, _) => '┐',
                (true, _, _, true) => '└',
                (_, true, _, true) => '┘',
                (_, _, true, _) | (_, _, _, true) => '─',
                (true, _, _, _) | (_, true, _, _) => '│',
                _ => ' ',
            };
            buf.set(x, y, Cell { ch, fg, bg });
        }
    }
}

fn draw_modal(buf: &mut CellBuffer, u: &Universe) {
    let modal = u.modal();
    if !modal.visible {
        return;
    }

    // dim the backdrop
    for c in &mut buf.cells {
        if c.ch != ' ' {
            c.fg = Color::DarkGrey;
        }
    }

    let r = modal_rect(buf.w, buf.h);
    draw_box(buf, r);
    let bg = Color::Rgb { r: 24, g: 24, b: 40 };
    let inner = r.w.saturating_sub(4) as usize;
    let clip = |s: &str| s.chars().take(inner).collect::<String>();
    draw_text(buf, r.x + 2, r.y + 1, &clip(&modal.title), Color::Cyan, bg);
    draw_text(buf, r.x + 2, r.y + 3, &clip(&modal.message), Color::White, bg);
    let hint = clip("click outside or Enter to close");
    let hint_row = r.y + r.h.saturating_sub(2);
    draw_text(buf, r.x + 2, hint_row, &hint, Color::DarkGrey, bg);
}

/* -----------------------------
   Terminal
------------------------------ */

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let (pw, ph) = container_pixels(cols, rows);
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::stale(cols, rows),
            cur: CellBuffer::new(cols, rows),
            canvas: PixelCanvas::new(pw as u32, ph as u32),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::stale(c, r);
        self.cur = CellBuffer::new(c, r);
        let (pw, ph) = container_pixels(c, r);
        self.canvas = PixelCanvas::new(pw as u32, ph as u32);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/// Paints one frame of the universe into `buf`, using `canvas` as scratch.
pub(crate) fn compose(
    buf: &mut CellBuffer,
    canvas: &mut PixelCanvas,
    u: &Universe,
    enable_color: bool,
) {
    buf.clear(BG);
    canvas.clear();

    let floor = canvas.h as f32 - 3.0;
    for p in u.particles() {
        draw_particle(canvas, p, u, floor);
    }

    let area = container_rect(buf.w, buf.h);
    let shift = shake_offset(u.now(), u.container().shaking);
    canvas_to_cells(canvas, buf, area, shift, enable_color);

    draw_status_bar(buf, u);
    draw_modal(buf, u);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::particle::ParticleId;
    use crate::random::{Generator, Point};

    fn particle(delay_zero: bool) -> Particle {
        let mut gen = Generator::new(8);
        let mut p = Particle::spawn(ParticleId(0), Point { x: 40.0, y: 30.0 }, &mut gen);
        if delay_zero {
            p.animation_delay = 0.0;
        }
        p
    }

    #[test]
    fn modal_hit_test_splits_box_and_backdrop() {
        let r = modal_rect(80, 24);
        assert_eq!(modal_target(80, 24, r.x, r.y), ModalTarget::Content);
        assert_eq!(
            modal_target(80, 24, r.x + r.w - 1, r.y + r.h - 1),
            ModalTarget::Content
        );
        assert_eq!(modal_target(80, 24, 0, 0), ModalTarget::Backdrop);
        assert_eq!(modal_target(80, 24, r.x + r.w, r.y), ModalTarget::Backdrop);
    }

    #[test]
    fn modal_fits_tiny_terminal() {
        let r = modal_rect(10, 5);
        assert!(r.x + r.w <= 10);
        assert!(r.y + r.h <= 5);
    }

    #[test]
    fn container_leaves_room_for_bars() {
        assert_eq!(container_rect(80, 24), Rect { x: 0, y: 1, w: 80, h: 22 });
        assert_eq!(container_pixels(80, 24), (160.0, 88.0));
        assert_eq!(container_pixels(80, 1), (160.0, 0.0));
    }

    #[test]
    fn float_offset_is_bounded() {
        let p = particle(false);
        for ms in (0..6000).step_by(37) {
            let (dx, dy) = float_offset(&p, Duration::from_millis(ms));
            assert!(dx.abs() <= FLOAT_AMP_X + 1e-3);
            assert!(dy.abs() <= FLOAT_AMP_Y + 1e-3);
        }
    }

    #[test]
    fn fall_stops_at_floor() {
        let mut p = particle(true);
        assert_eq!(fall_distance(&p, Duration::from_secs(3), 80.0), 0.0);
        p.set_gravity(true, Duration::from_secs(1));
        assert_eq!(fall_distance(&p, Duration::from_secs(1), 80.0), 0.0);
        let early = fall_distance(&p, Duration::from_millis(1200), 80.0);
        assert!(early > 0.0 && early < 50.0);
        assert_eq!(fall_distance(&p, Duration::from_secs(10), 80.0), 50.0);
    }

    #[test]
    fn explosion_progress_runs_zero_to_one() {
        let mut p = particle(true);
        assert_eq!(explosion_progress(&p, Duration::from_secs(1)), None);
        p.exploding_since = Some(Duration::from_secs(1));
        assert_eq!(explosion_progress(&p, Duration::from_secs(1)), Some(0.0));
        assert_eq!(explosion_progress(&p, Duration::from_millis(1500)), Some(0.5));
        assert_eq!(explosion_progress(&p, Duration::from_secs(5)), Some(1.0));
    }

    #[test]
    fn shake_only_when_shaking() {
        for ms in (0..500).step_by(7) {
            assert_eq!(shake_offset(Duration::from_millis(ms), false), 0);
            assert!(shake_offset(Duration::from_millis(ms), true).abs() <= 1);
        }
    }

    #[test]
    fn compose_draws_particles_status_and_modal() {
        let (cols, rows) = (80u16, 24u16);
        let (pw, ph) = container_pixels(cols, rows);
        let mut u = Universe::new(&Settings::default(), 4, pw, ph);
        u.generate(3);
        u.advance(Duration::from_millis(1200));

        let mut buf = CellBuffer::new(cols, rows);
        let mut canvas = PixelCanvas::new(pw as u32, ph as u32);
        compose(&mut buf, &mut canvas, &u, true);

        let braille = buf
            .cells
            .iter()
            .filter(|c| ('\u{2801}'..='\u{28FF}').contains(&c.ch))
            .count();
        assert!(braille >= 1);
        let top: String = (0..cols).filter_map(|x| buf.get(x, 0)).map(|c| c.ch).collect();
        assert!(top.contains("Particles: 3"), "{top}");
        assert!(top.contains("Gravity: OFF"), "{top}");

        u.notify("Hello", "world");
        compose(&mut buf, &mut canvas, &u, true);
        let r = modal_rect(cols, rows);
        let title: String = (r.x + 2..r.x + 7)
            .filter_map(|x| buf.get(x, r.y + 1))
            .map(|c| c.ch)
            .collect();
        assert_eq!(title, "Hello");
    }
}
