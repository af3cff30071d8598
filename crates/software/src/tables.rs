//! Lookup tables shared by the output stages, and the curve blend used to shape MIDI velocity and key tracking.
//!
//! The tables are generated at compile time from their defining formulas wherever those formulas have an exact
//! integer form. The logarithmic table has no such form and is spelled out.

/// Number of semitone steps in [`SEMI`].
pub const SEMI_LEN: usize = 128;

/// Output code for each semitone, spreading ten 1 V octaves over 4096 codes: `⌊n · 4096 / 120⌋`.
pub const SEMI: [u16; SEMI_LEN] = semitones();

/// An exponential time curve, `⌊1024 · (i / 256)^1.5⌋`, indexed by 8-bit time codes.
///
/// Used to turn slew, portamento and pulse-length settings into tick counts.
pub const EXP: [u16; 256] = exponential();

/// A squared curve, `⌊4096 · (i / 128)²⌋`, for the exponential end of [`blend`].
pub const EXP2: [u16; 128] = squared();

/// A logarithmic curve, `⌊(log10(0.1 + 0.9 · i / 128) + 1) · 4096⌋`, for the logarithmic end of [`blend`].
pub const LOG: [u16; 128] = [
    0, 120, 234, 340, 440, 535, 626, 711, 793, 872, 947, 1019,
    1088, 1154, 1219, 1281, 1340, 1398, 1454, 1509, 1561, 1613, 1663, 1711,
    1758, 1804, 1849, 1893, 1935, 1977, 2017, 2057, 2096, 2134, 2172, 2208,
    2244, 2279, 2313, 2347, 2380, 2413, 2445, 2476, 2507, 2537, 2567, 2596,
    2625, 2653, 2681, 2709, 2736, 2762, 2789, 2815, 2840, 2865, 2890, 2915,
    2939, 2962, 2986, 3009, 3032, 3055, 3077, 3099, 3121, 3142, 3163, 3184,
    3205, 3226, 3246, 3266, 3286, 3306, 3325, 3344, 3363, 3382, 3400, 3419,
    3437, 3455, 3473, 3491, 3508, 3525, 3543, 3559, 3576, 3593, 3610, 3626,
    3642, 3658, 3674, 3690, 3705, 3721, 3736, 3752, 3767, 3782, 3797, 3811,
    3826, 3840, 3855, 3869, 3883, 3897, 3911, 3925, 3939, 3952, 3966, 3979,
    3993, 4006, 4019, 4032, 4045, 4058, 4070, 4083,
];

/// Pitch bend offset, in output codes, for each of the 512 bend steps on either side of center; spans one octave.
pub const BEND: [u16; 512] = bend_steps();

const fn semitones() -> [u16; SEMI_LEN] {
    let mut table = [0; SEMI_LEN];
    let mut n = 0;
    while n < SEMI_LEN {
        table[n] = (n * 512 / 15) as u16;
        n += 1;
    }
    table
}

const fn exponential() -> [u16; 256] {
    let mut table = [0; 256];
    let mut root: u32 = 0;
    let mut i: u32 = 0;
    while i < 256 {
        // floor(sqrt(floor(v))) == floor(sqrt(v)), so integer division first is exact
        let v = i * i * i / 16;
        while (root + 1) * (root + 1) <= v {
            root += 1;
        }
        table[i as usize] = root as u16;
        i += 1;
    }
    table
}

const fn squared() -> [u16; 128] {
    let mut table = [0; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = (i * i / 4) as u16;
        i += 1;
    }
    table
}

const fn bend_steps() -> [u16; 512] {
    let mut table = [0; 512];
    let mut n = 0;
    while n < 512 {
        table[n] = (n * 4 / 5) as u16;
        n += 1;
    }
    table
}

/// Maps a 7-bit value onto a 12-bit output code along a curve chosen by `shape`.
///
/// `shape` runs from 0 (logarithmic) through 50 (linear) to 100 (exponential); values in between are weighted
/// averages of the neighboring curves, and anything above 100 is treated as 100.
pub fn blend(value: u8, shape: u8) -> u16 {
    let index = usize::from(value.min(127));
    let linear = u32::from(value.min(127)) << 5;

    match shape {
        0 => LOG[index],
        1..50 => {
            let mix = u32::from(shape);
            ((u32::from(LOG[index]) * (50 - mix) + linear * mix) / 50) as u16
        }
        50 => linear as u16,
        51..100 => {
            let mix = u32::from(shape - 50);
            ((linear * (50 - mix) + u32::from(EXP2[index]) * mix) / 50) as u16
        }
        _ => EXP2[index],
    }
}
