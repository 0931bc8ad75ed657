use crate::config::{Args, Settings};
use crate::input::{collect_input_nonblocking, map_event_to_action, Action, COUNT_STEP};
use crate::render::{compose, container_pixels, modal_target, Terminal};
use crate::universe::Universe;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

pub(crate) struct App {
    settings: Settings,
    universe: Universe,
    term: Terminal,
    should_quit: bool,
}

impl App {
    fn init(settings: Settings) -> Result<Self> {
        let seed = settings.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, count = settings.particle_count, "starting");

        let term = Terminal::begin()?;
        let (w, h) = container_pixels(term.cols, term.rows);
        let mut universe = Universe::new(&settings, seed, w, h);
        universe.start();

        Ok(Self {
            settings,
            universe,
            term,
            should_quit: false,
        })
    }

    fn run(&mut self) -> Result<()> {
        let fps = self.settings.fps_cap;
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
        let mut last_frame = Instant::now();

        while !self.should_quit {
            let frame_start = Instant::now();
            if self.term.resize_if_needed()? {
                let (w, h) = container_pixels(self.term.cols, self.term.rows);
                self.universe.resize(w, h);
                tracing::debug!(cols = self.term.cols, rows = self.term.rows, "resized");
            }

            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(action) = map_event_to_action(self.universe.modal().visible, ev) {
                    self.apply(action);
                }
            }

            let now = Instant::now();
            self.universe.advance(now.saturating_duration_since(last_frame));
            last_frame = now;

            compose(
                &mut self.term.cur,
                &mut self.term.canvas,
                &self.universe,
                self.settings.enable_color,
            );
            self.term.present()?;

            spin_sleep(frame_dt, frame_start);
        }
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        tracing::debug!(?action, "input");
        let u = &mut self.universe;
        match action {
            Action::Generate => {
                u.generate(u.particle_count());
            }
            Action::Clear => u.clear(),
            Action::Reset => {
                u.reset();
            }
            Action::Explode => {
                u.explode();
            }
            Action::ToggleGravity => u.toggle_gravity(),
            Action::Shake => u.shake(),
            Action::CountUp => u.adjust_particle_count(COUNT_STEP),
            Action::CountDown => u.adjust_particle_count(-COUNT_STEP),
            Action::CycleSpeed => u.cycle_speed(),
            Action::CloseModal => u.close_modal(),
            Action::ModalClick { col, row } => {
                let target = modal_target(self.term.cols, self.term.rows, col, row);
                u.click_modal(target);
            }
            Action::Quit => self.should_quit = true,
        }
    }
}

fn init_logging(path: &std::path::Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("could not install tracing subscriber: {e}"))
}

pub(crate) fn run() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let settings = Settings::resolve(&args)?;

    let mut app = App::init(settings)?;
    let res = app.run();
    // restore the terminal even when the loop failed
    let restored = app.term.end();
    tracing::info!("bye");
    first_error(res, restored)
}

/// The loop error wins; a failed restore is only logged behind it.
fn first_error(run: Result<()>, restore: Result<()>) -> Result<()> {
    match (run, restore) {
        (Err(e), Err(restore_err)) => {
            tracing::error!(%restore_err, "terminal restore failed after loop error");
            Err(e)
        }
        (run, restore) => run.and(restore),
    }
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, started: Instant) {
    let end = started + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        if end - t > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
