//! Road and background colors
//!
//! RGB triples on a 0-255 scale. Domain randomization redraws them from the
//! episode RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub type Rgb = [f32; 3];

/// Fixed colors for decoration
pub mod colors {
    use super::Rgb;

    pub const ROAD: Rgb = [102.0, 102.0, 102.0];
    pub const BACKGROUND: Rgb = [102.0, 204.0, 102.0];
    pub const GRASS: Rgb = [102.0, 230.0, 102.0];
    pub const BORDER_EVEN: Rgb = [255.0, 255.0, 255.0];
    pub const BORDER_ODD: Rgb = [255.0, 0.0, 0.0];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub road: Rgb,
    pub background: Rgb,
    pub grass: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            road: colors::ROAD,
            background: colors::BACKGROUND,
            grass: colors::GRASS,
        }
    }
}

impl Palette {
    /// Draw a random palette; grass is the background with one channel lifted
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut channel = || -> Rgb {
            [
                rng.random_range(0.0..210.0),
                rng.random_range(0.0..210.0),
                rng.random_range(0.0..210.0),
            ]
        };
        let road = channel();
        let background = channel();
        let mut grass = background;
        grass[rng.random_range(0..3)] += 20.0;
        Self {
            road,
            background,
            grass,
        }
    }

    /// Road tiles alternate between three slightly different shades
    pub fn tile_color(&self, index: usize) -> Rgb {
        let lift = 0.01 * (index % 3) as f32 * 255.0;
        self.road.map(|c| c + lift)
    }

    pub fn border_color(index: usize) -> Rgb {
        if index % 2 == 0 {
            colors::BORDER_EVEN
        } else {
            colors::BORDER_ODD
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_tile_shades_cycle() {
        let palette = Palette::default();
        assert_eq!(palette.tile_color(0), colors::ROAD);
        assert_eq!(palette.tile_color(3), colors::ROAD);
        assert!(palette.tile_color(2)[0] > palette.tile_color(1)[0]);
    }

    #[test]
    fn test_randomized_grass_lifts_one_channel() {
        let mut rng = Pcg32::seed_from_u64(7);
        let palette = Palette::randomized(&mut rng);
        let lifted: Vec<_> = (0..3)
            .filter(|&i| palette.grass[i] != palette.background[i])
            .collect();
        assert_eq!(lifted.len(), 1);
        assert!(palette.road.iter().all(|c| (0.0..210.0).contains(c)));
    }
}
