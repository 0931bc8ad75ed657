use rand::{rngs::StdRng, Rng, SeedableRng};

/// Distance kept between a fresh particle and the container edge, in pixels.
pub(crate) const EDGE_MARGIN: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Point {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

pub(crate) struct Generator {
    rng: StdRng,
}

impl Generator {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform in [min, max). Inverted bounds are not rejected; they yield
    /// values in (max, min].
    pub(crate) fn range(&mut self, min: f32, max: f32) -> f32 {
        let u: f32 = self.rng.gen();
        u * (max - min) + min
    }

    pub(crate) fn color(&mut self) -> Rgb {
        let mut channel = || self.range(100.0, 255.0).floor() as u8;
        Rgb {
            r: channel(),
            g: channel(),
            b: channel(),
        }
    }

    pub(crate) fn position(&mut self, w: f32, h: f32) -> Point {
        Point {
            x: self.range(EDGE_MARGIN, w - EDGE_MARGIN),
            y: self.range(EDGE_MARGIN, h - EDGE_MARGIN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_stays_inside_bounds() {
        let mut g = Generator::new(7);
        for _ in 0..1000 {
            let v = g.range(-3.0, 5.0);
            assert!((-3.0..=5.0).contains(&v), "{v}");
        }
    }

    #[test]
    fn inverted_range_is_silently_flipped() {
        let mut g = Generator::new(11);
        for _ in 0..1000 {
            let v = g.range(10.0, 2.0);
            assert!(v > 2.0 && v <= 10.0, "{v}");
        }
    }

    #[test]
    fn color_channels_are_bright() {
        let mut g = Generator::new(3);
        for _ in 0..500 {
            let c = g.color();
            for ch in [c.r, c.g, c.b] {
                assert!(ch >= 100, "{ch}");
            }
        }
    }

    #[test]
    fn position_respects_margin() {
        let mut g = Generator::new(99);
        for _ in 0..500 {
            let p = g.position(160.0, 96.0);
            assert!(p.x >= 20.0 && p.x <= 140.0);
            assert!(p.y >= 20.0 && p.y <= 76.0);
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Generator::new(42);
        let mut b = Generator::new(42);
        for _ in 0..16 {
            assert_eq!(a.color(), b.color());
        }
    }
}
