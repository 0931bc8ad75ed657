use crate::config::{AnimationSpeed, Settings, Timings, MAX_PARTICLES};
use crate::particle::{Particle, ParticleId, Registry};
use crate::random::{Generator, Rgb};
use crate::scheduler::{Scheduler, TaskGroup, TaskHandle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tone {
    Neutral,
    Positive,
    Alert,
}

impl Tone {
    pub(crate) fn rgb(self) -> Rgb {
        match self {
            Tone::Neutral => Rgb::new(0x45, 0xb7, 0xd1),
            Tone::Positive => Rgb::new(0x4e, 0xcd, 0xc4),
            Tone::Alert => Rgb::new(0xe7, 0x4c, 0x3c),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StatusText {
    pub(crate) text: String,
    pub(crate) tone: Tone,
}

impl StatusText {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StatusBoard {
    pub(crate) particles: StatusText,
    pub(crate) gravity: StatusText,
    pub(crate) count: u32,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Modal {
    pub(crate) visible: bool,
    pub(crate) title: String,
    pub(crate) message: String,
}

/// Where a click on the modal overlay landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ModalTarget {
    Backdrop,
    Content,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Container {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) shaking: bool,
}

#[derive(Clone, Debug)]
enum Task {
    FinishLoading { count: u32 },
    Spawn { index: u32, total: u32, width: f32, height: f32 },
    FinishGeneration,
    Ignite { id: ParticleId },
    Remove { id: ParticleId },
    Sweep { ids: Vec<ParticleId> },
    EndShake,
}

/// Everything the toy knows, in one place. Every user action and every
/// scheduled step goes through `&mut Universe`.
pub(crate) struct Universe {
    timings: Timings,
    gen: Generator,
    scheduler: Scheduler<Task>,
    registry: Registry,
    container: Container,
    status: StatusBoard,
    modal: Modal,
    particle_count: u32,
    gravity: bool,
    loading: bool,
    speed: AnimationSpeed,
    // float animation time, scaled by the speed in effect while it ran
    float_clock: Duration,
    next_id: u64,
    shake_task: Option<TaskHandle>,
}

impl Universe {
    pub(crate) fn new(settings: &Settings, seed: u64, width: f32, height: f32) -> Self {
        let particle_count = settings.particle_count.min(MAX_PARTICLES);
        Self {
            timings: settings.timings.clone(),
            gen: Generator::new(seed),
            scheduler: Scheduler::new(),
            registry: Registry::default(),
            container: Container {
                width,
                height,
                shaking: false,
            },
            status: StatusBoard {
                particles: StatusText::new("0", Tone::Neutral),
                gravity: StatusText::new("OFF", Tone::Alert),
                count: particle_count,
            },
            modal: Modal::default(),
            particle_count,
            gravity: false,
            loading: false,
            speed: settings.animation_speed,
            float_clock: Duration::ZERO,
            next_id: 0,
            shake_task: None,
        }
    }

    /* -----------------------------
       Read access
    ------------------------------ */

    pub(crate) fn now(&self) -> Duration {
        self.scheduler.now()
    }
    pub(crate) fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.registry.iter()
    }
    #[cfg(test)]
    pub(crate) fn particle_len(&self) -> usize {
        self.registry.len()
    }
    pub(crate) fn is_loading(&self) -> bool {
        self.loading
    }
    #[cfg(test)]
    pub(crate) fn gravity(&self) -> bool {
        self.gravity
    }
    pub(crate) fn particle_count(&self) -> u32 {
        self.particle_count
    }
    pub(crate) fn speed(&self) -> AnimationSpeed {
        self.speed
    }
    pub(crate) fn float_clock(&self) -> Duration {
        self.float_clock
    }
    pub(crate) fn status(&self) -> &StatusBoard {
        &self.status
    }
    pub(crate) fn modal(&self) -> &Modal {
        &self.modal
    }
    pub(crate) fn container(&self) -> &Container {
        &self.container
    }
    pub(crate) fn explosion_pending(&self) -> bool {
        self.scheduler.pending_in(TaskGroup::Explosion) > 0
    }

    /* -----------------------------
       Lifecycle
    ------------------------------ */

    pub(crate) fn start(&mut self) {
        self.notify("Welcome!", "Interactive Particle Universe is ready!");
        self.generate(self.particle_count);
    }

    /// Returns false when a loading window is already open.
    pub(crate) fn generate(&mut self, count: u32) -> bool {
        if self.loading {
            tracing::debug!(count, "generate rejected while loading");
            return false;
        }
        tracing::info!(count, "generating particles");
        self.scheduler.cancel_group(TaskGroup::Generation);
        self.loading = true;
        self.scheduler.schedule_in(
            self.timings.loading(),
            Some(TaskGroup::Generation),
            Task::FinishLoading { count },
        );
        true
    }

    pub(crate) fn clear(&mut self) {
        self.scheduler.cancel_group(TaskGroup::Explosion);
        let dropped = self.registry.clear();
        tracing::debug!(dropped, "particles cleared");
        self.status.particles = StatusText::new("0", Tone::Alert);
    }

    pub(crate) fn reset(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.notify("Reset", "Regenerating particle universe...");
        self.set_gravity(false);
        self.generate(self.particle_count)
    }

    pub(crate) fn set_particle_count(&mut self, count: u32) {
        let count = count.min(MAX_PARTICLES);
        self.particle_count = count;
        self.status.count = count;
        if !self.registry.is_empty() && !self.loading {
            self.generate(count);
        }
    }

    pub(crate) fn adjust_particle_count(&mut self, delta: i32) {
        let next = (self.particle_count as i64 + delta as i64).clamp(0, MAX_PARTICLES as i64);
        self.set_particle_count(next as u32);
    }

    pub(crate) fn resize(&mut self, width: f32, height: f32) {
        self.container.width = width;
        self.container.height = height;
    }

    /* -----------------------------
       Effects
    ------------------------------ */

    /// Returns false (after showing a notice) when there is nothing to blow up.
    pub(crate) fn explode(&mut self) -> bool {
        if self.loading || self.registry.is_empty() {
            self.notify("No Particles!", "Generate some particles first");
            return false;
        }
        let ids = self.registry.ids();
        let step = self.timings.explode_step();
        tracing::info!(particles = ids.len(), "explosion");
        for (i, id) in ids.iter().enumerate() {
            self.scheduler.schedule_in(
                step * i as u32,
                Some(TaskGroup::Explosion),
                Task::Ignite { id: *id },
            );
        }
        let window = step * ids.len() as u32 + self.timings.explode_linger();
        self.scheduler
            .schedule_in(window, Some(TaskGroup::Explosion), Task::Sweep { ids });
        self.notify("Explosion!", "Particles exploded with style!");
        true
    }

    pub(crate) fn toggle_gravity(&mut self) {
        let on = !self.gravity;
        self.set_gravity(on);
        tracing::info!(on, "gravity toggled");
        let message = if on {
            "Gravity activated! Watch particles fall!"
        } else {
            "Gravity disabled! Particles float freely!"
        };
        self.notify("Gravity Toggle", message);
    }

    pub(crate) fn shake(&mut self) {
        if let Some(h) = self.shake_task.take() {
            self.scheduler.cancel(h);
        }
        self.container.shaking = true;
        self.shake_task = Some(self.scheduler.schedule_in(
            self.timings.shake(),
            Some(TaskGroup::Shake),
            Task::EndShake,
        ));
        self.notify("Screen Shake", "The universe trembles!");
    }

    pub(crate) fn cycle_speed(&mut self) {
        self.speed = self.speed.next();
        let message = format!("{} motion", self.speed.label());
        self.notify("Animation Speed", &message);
    }

    fn set_gravity(&mut self, on: bool) {
        self.gravity = on;
        let now = self.now();
        for p in self.registry.iter_mut() {
            p.set_gravity(on, now);
        }
        self.status.gravity = if on {
            StatusText::new("ON", Tone::Positive)
        } else {
            StatusText::new("OFF", Tone::Alert)
        };
    }

    /* -----------------------------
       Notification modal
    ------------------------------ */

    pub(crate) fn notify(&mut self, title: &str, message: &str) {
        self.modal.title = title.to_string();
        self.modal.message = message.to_string();
        self.modal.visible = true;
    }

    pub(crate) fn close_modal(&mut self) {
        self.modal.visible = false;
    }

    pub(crate) fn click_modal(&mut self, target: ModalTarget) {
        if target == ModalTarget::Backdrop {
            self.close_modal();
        }
    }

    /* -----------------------------
       Clock
    ------------------------------ */

    pub(crate) fn advance(&mut self, dt: Duration) {
        self.float_clock += dt.mul_f32(self.speed.factor());
        let target = self.scheduler.now() + dt;
        while let Some((_, task)) = self.scheduler.pop_due(target) {
            self.run(task);
        }
        self.scheduler.settle(target);
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::FinishLoading { count } => {
                self.loading = false;
                self.clear();
                if count == 0 {
                    self.finish_generation();
                } else {
                    let (width, height) = (self.container.width, self.container.height);
                    self.run(Task::Spawn {
                        index: 0,
                        total: count,
                        width,
                        height,
                    });
                }
            }
            Task::Spawn {
                index,
                total,
                width,
                height,
            } => {
                let pos = self.gen.position(width, height);
                let id = ParticleId(self.next_id);
                self.next_id += 1;
                let p = Particle::spawn(id, pos, &mut self.gen);
                self.registry.attach(p);

                let next = if index + 1 < total {
                    Task::Spawn {
                        index: index + 1,
                        total,
                        width,
                        height,
                    }
                } else {
                    Task::FinishGeneration
                };
                self.scheduler.schedule_in(
                    self.timings.spawn_stagger(),
                    Some(TaskGroup::Generation),
                    next,
                );
            }
            Task::FinishGeneration => self.finish_generation(),
            Task::Ignite { id } => {
                let now = self.now();
                let Some(p) = self.registry.get_mut(id) else {
                    return;
                };
                if p.is_exploding() {
                    return;
                }
                p.exploding_since = Some(now);
                self.scheduler.schedule_in(
                    self.timings.explode_linger(),
                    Some(TaskGroup::Explosion),
                    Task::Remove { id },
                );
            }
            Task::Remove { id } => {
                self.registry.detach(id);
            }
            Task::Sweep { ids } => {
                for id in ids {
                    self.registry.detach(id);
                }
                let left = self.registry.len();
                let tone = if left == 0 { Tone::Alert } else { Tone::Positive };
                self.status.particles = StatusText::new(left.to_string(), tone);
            }
            Task::EndShake => {
                self.container.shaking = false;
                self.shake_task = None;
            }
        }
    }

    fn finish_generation(&mut self) {
        let n = self.registry.len();
        tracing::info!(particles = n, "generation complete");
        self.status.particles = StatusText::new(n.to_string(), Tone::Positive);
    }
}
