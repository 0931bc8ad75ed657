use crate::random::{Generator, Point, Rgb};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ParticleId(pub(crate) u64);

#[derive(Clone, Debug)]
pub(crate) struct Particle {
    pub(crate) id: ParticleId,
    pub(crate) pos: Point,
    pub(crate) color: Rgb,
    /// Seconds the float animation lags behind the universe clock.
    pub(crate) animation_delay: f32,
    pub(crate) exploding_since: Option<Duration>,
    pub(crate) gravity_since: Option<Duration>,
}

impl Particle {
    /// Builds a floating particle without attaching it anywhere. Gravity is
    /// only ever switched on later through `set_gravity`.
    pub(crate) fn spawn(id: ParticleId, pos: Point, gen: &mut Generator) -> Self {
        let color = gen.color();
        let animation_delay = gen.range(0.0, 2.0);
        Self {
            id,
            pos,
            color,
            animation_delay,
            exploding_since: None,
            gravity_since: None,
        }
    }

    pub(crate) fn is_exploding(&self) -> bool {
        self.exploding_since.is_some()
    }

    pub(crate) fn has_gravity(&self) -> bool {
        self.gravity_since.is_some()
    }

    pub(crate) fn set_gravity(&mut self, on: bool, now: Duration) {
        match (on, self.gravity_since) {
            (true, None) => self.gravity_since = Some(now),
            (false, Some(_)) => self.gravity_since = None,
            _ => {}
        }
    }
}

/// Live particles in insertion order. Being in the registry is what it means
/// to be attached to the container, so removal detaches.
#[derive(Default)]
pub(crate) struct Registry {
    particles: Vec<Particle>,
}

impl Registry {
    pub(crate) fn attach(&mut self, p: Particle) {
        self.particles.push(p);
    }

    pub(crate) fn detach(&mut self, id: ParticleId) -> Option<Particle> {
        let i = self.particles.iter().position(|p| p.id == id)?;
        Some(self.particles.remove(i))
    }

    pub(crate) fn clear(&mut self) -> usize {
        let n = self.particles.len();
        self.particles.clear();
        n
    }

    pub(crate) fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.iter_mut().find(|p| p.id == id)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: ParticleId) -> bool {
        self.particles.iter().any(|p| p.id == id)
    }

    pub(crate) fn ids(&self) -> Vec<ParticleId> {
        self.particles.iter().map(|p| p.id).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.particles.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(reg: &mut Registry, gen: &mut Generator, id: u64) -> ParticleId {
        let p = Particle::spawn(ParticleId(id), Point { x: 50.0, y: 40.0 }, gen);
        reg.attach(p);
        ParticleId(id)
    }

    #[test]
    fn spawn_sets_delay_and_keeps_position() {
        let mut gen = Generator::new(1);
        for i in 0..200 {
            let p = Particle::spawn(ParticleId(i), Point { x: 33.0, y: 44.0 }, &mut gen);
            assert!((0.0..=2.0).contains(&p.animation_delay));
            assert_eq!(p.pos, Point { x: 33.0, y: 44.0 });
            assert!(!p.is_exploding());
            assert!(!p.has_gravity());
        }
    }

    #[test]
    fn set_gravity_keeps_original_start() {
        let mut gen = Generator::new(1);
        let mut p = Particle::spawn(ParticleId(0), Point { x: 0.0, y: 0.0 }, &mut gen);
        p.set_gravity(true, Duration::from_millis(10));
        p.set_gravity(true, Duration::from_millis(90));
        assert_eq!(p.gravity_since, Some(Duration::from_millis(10)));
        p.set_gravity(false, Duration::from_millis(100));
        assert!(!p.has_gravity());
    }

    #[test]
    fn registry_keeps_insertion_order_and_detaches() {
        let mut gen = Generator::new(5);
        let mut reg = Registry::default();
        for id in 0..4 {
            make(&mut reg, &mut gen, id);
        }
        assert_eq!(
            reg.ids(),
            vec![ParticleId(0), ParticleId(1), ParticleId(2), ParticleId(3)]
        );
        assert!(reg.detach(ParticleId(1)).is_some());
        assert!(reg.detach(ParticleId(1)).is_none());
        assert!(!reg.contains(ParticleId(1)));
        assert_eq!(reg.ids(), vec![ParticleId(0), ParticleId(2), ParticleId(3)]);
        assert_eq!(reg.clear(), 3);
        assert!(reg.is_empty());
    }
}
