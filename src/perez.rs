//! Perez all-weather sky luminance distribution over a patch scheme.
//!
//! Used to spread each record's diffuse-horizontal irradiance across the
//! sky patches. Luminances are relative and normalised to sum to one.
//!
//! Reference: Perez, Seals & Michalsky (1993), Solar Energy 50(3), 235–245.

use crate::patches::PatchScheme;

const PI: f32 = std::f32::consts::PI;
const DEG2RAD: f32 = PI / 180.0;
const RAD2DEG: f32 = 180.0 / PI;
const MIN_SUN_ELEVATION_DEG: f32 = 3.0;
const MIN_DIFFUSE: f32 = 10.0;

// ── Perez model coefficients (8 clearness bins × 4 polynomial terms) ────────

const M_A1: [f32; 8] = [
    1.3525, -1.2219, -1.1000, -0.5484, -0.6000, -1.0156, -1.0000, -1.0500,
];
const M_A2: [f32; 8] = [
    -0.2576, -0.7730, -0.2515, -0.6654, -0.3566, -0.3670, 0.0211, 0.0289,
];
const M_A3: [f32; 8] = [
    -0.2690, 1.4148, 0.8952, -0.2672, -2.5000, 1.0078, 0.5025, 0.4260,
];
const M_A4: [f32; 8] = [
    -1.4366, 1.1016, 0.0156, 0.7117, 2.3250, 1.4051, -0.5119, 0.3590,
];

const M_B1: [f32; 8] = [
    -0.7670, -0.2054, 0.2782, 0.7234, 0.2937, 0.2875, -0.3000, -0.3250,
];
const M_B2: [f32; 8] = [
    0.0007, 0.0367, -0.1812, -0.6219, 0.0496, -0.5328, 0.1922, 0.1156,
];
const M_B3: [f32; 8] = [
    1.2734, -3.9128, -4.5000, -5.6812, -5.6812, -3.8500, 0.7023, 0.7781,
];
const M_B4: [f32; 8] = [
    -0.1233, 0.9156, 1.1766, 2.6297, 1.8415, 3.3750, -1.6317, 0.0025,
];

const M_C1: [f32; 8] = [
    2.8000, 6.9750, 24.7219, 33.3389, 21.0000, 14.0000, 19.0000, 31.0625,
];
const M_C2: [f32; 8] = [
    0.6004, 0.1774, -13.0812, -18.3000, -4.7656, -0.9999, -5.0000, -14.5000,
];
const M_C3: [f32; 8] = [
    1.2375, 6.4477, -37.7000, -62.2500, -21.5906, -7.1406, 1.2438, -46.1148,
];
const M_C4: [f32; 8] = [
    1.0000, -0.1239, 34.8438, 52.0781, 7.2492, 7.5469, -1.9094, 55.3750,
];

const M_D1: [f32; 8] = [
    1.8734, -1.5798, -5.0000, -3.5000, -3.5000, -3.4000, -4.0000, -7.2312,
];
const M_D2: [f32; 8] = [
    0.6297, -0.5081, 1.5218, 0.0016, -0.1554, -0.1078, 0.0250, 0.4050,
];
const M_D3: [f32; 8] = [
    0.9738, -1.7812, 3.9229, 1.1477, 1.4062, -1.0750, 0.3844, 13.3500,
];
const M_D4: [f32; 8] = [
    0.2809, 0.1080, -2.6204, 0.1062, 0.3988, 1.5702, 0.2656, 0.6234,
];

const M_E1: [f32; 8] = [
    0.0356, 0.2624, -0.0156, 0.4659, 0.0032, -0.0672, 1.0468, 1.5000,
];
const M_E2: [f32; 8] = [
    -0.1246, 0.0672, 0.1597, -0.3296, 0.0766, 0.4016, -0.3788, -0.6426,
];
const M_E3: [f32; 8] = [
    -0.5718, -0.2190, 0.4199, -0.0876, -0.0656, 0.3017, -2.4517, 1.8564,
];
const M_E4: [f32; 8] = [
    0.9938, -0.4285, -0.5562, -0.0329, -0.1294, -0.4844, 1.4656, 0.5636,
];

/// Clearness bin index (0–7) for a Perez sky clearness value.
fn clearness_bin(clearness: f32) -> usize {
    const UPPER: [f32; 7] = [1.065, 1.230, 1.500, 1.950, 2.800, 4.500, 6.200];
    UPPER.iter().position(|&u| clearness < u).unwrap_or(7)
}

/// Extra-terrestrial normal irradiance for a day of the year (W/m²).
fn extraterrestrial_irradiance(day_of_year: u32) -> f32 {
    let day_angle = day_of_year as f32 * 2.0 * PI / 365.0;
    1367.0
        * (1.00011
            + 0.034221 * day_angle.cos()
            + 0.00128 * day_angle.sin()
            + 0.000719 * (2.0 * day_angle).cos()
            + 0.000077 * (2.0 * day_angle).sin())
}

/// Relative air mass (Kasten & Young 1989), capped at 40.
fn air_mass(altitude_rad: f32) -> f32 {
    let m = if altitude_rad >= 10.0 * DEG2RAD {
        1.0 / altitude_rad.sin()
    } else if altitude_rad > 0.0 {
        let alt_deg = altitude_rad * RAD2DEG;
        1.0 / (altitude_rad.sin() + 0.50572 * (alt_deg + 6.07995_f32).powf(-1.6364))
    } else {
        40.0
    };
    m.min(40.0)
}

/// Relative luminance of every patch in `scheme`, summing to one.
///
/// Low sun, weak diffuse or a parameter set producing negative luminance
/// all fall back to a uniform sky.
pub fn relative_luminance(
    scheme: &PatchScheme,
    sun_altitude_deg: f32,
    sun_azimuth_deg: f32,
    diffuse_horizontal: f32,
    direct_normal: f32,
    day_of_year: u32,
) -> Vec<f32> {
    let n = scheme.len();
    let uniform = vec![1.0 / n as f32; n];
    if sun_altitude_deg < MIN_SUN_ELEVATION_DEG || diffuse_horizontal < MIN_DIFFUSE {
        return uniform;
    }

    let zen = (90.0 - sun_altitude_deg) * DEG2RAD;
    let azimuth = sun_azimuth_deg * DEG2RAD;
    let altitude = sun_altitude_deg * DEG2RAD;

    // Sky clearness and brightness
    let idh = diffuse_horizontal.max(1.0);
    let zen3 = 1.041 * zen.powi(3);
    let clearness = ((idh + direct_normal) / idh + zen3) / (1.0 + zen3);
    let brightness = air_mass(altitude) * diffuse_horizontal / extraterrestrial_irradiance(day_of_year);
    let bin = clearness_bin(clearness);

    let m_a = M_A1[bin] + M_A2[bin] * zen + brightness * (M_A3[bin] + M_A4[bin] * zen);
    let m_b = M_B1[bin] + M_B2[bin] * zen + brightness * (M_B3[bin] + M_B4[bin] * zen);
    let m_e = M_E1[bin] + M_E2[bin] * zen + brightness * (M_E3[bin] + M_E4[bin] * zen);
    let (m_c, m_d) = if bin > 0 {
        (
            M_C1[bin] + M_C2[bin] * zen + brightness * (M_C3[bin] + M_C4[bin] * zen),
            M_D1[bin] + M_D2[bin] * zen + brightness * (M_D3[bin] + M_D4[bin] * zen),
        )
    } else {
        // Bin 0 uses the Robinson variant for c and d
        (
            (brightness * (M_C1[0] + M_C2[0] * zen)).powf(M_C3[0]).exp() - 1.0,
            -(brightness * (M_D1[0] + M_D2[0] * zen)).exp() + M_D3[0] + brightness * M_D4[0],
        )
    };

    let (sin_alt, cos_alt) = altitude.sin_cos();
    let luminance: Vec<f32> = scheme
        .altitudes()
        .iter()
        .zip(scheme.azimuths())
        .map(|(&p_alt, &p_azi)| {
            let p_alt = p_alt * DEG2RAD;
            let cos_sky_sun =
                p_alt.sin() * sin_alt + cos_alt * p_alt.cos() * (p_azi * DEG2RAD - azimuth).cos();
            // zenith cap centre sits at cos(zen) = 1
            let cos_p_zen = p_alt.sin().max(0.01);
            let gradation = 1.0 + m_a * (m_b / cos_p_zen).exp();
            let gamma = cos_sky_sun.clamp(-1.0, 1.0).acos();
            let indicatrix = 1.0 + m_c * (m_d * gamma).exp() + m_e * cos_sky_sun * cos_sky_sun;
            gradation * indicatrix
        })
        .collect();

    let sum: f32 = luminance.iter().sum();
    if !sum.is_finite() || sum <= 0.0 || luminance.iter().any(|&v| v < 0.0) {
        return uniform;
    }
    luminance.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patches::{patch_scheme, SkyDensity};
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_low_sun() {
        let scheme = patch_scheme(SkyDensity::Tregenza);
        let lv = relative_luminance(scheme, 1.0, 180.0, 50.0, 10.0, 180);
        assert_eq!(lv.len(), 145);
        assert_relative_eq!(lv[0], lv[144]);
    }

    #[test]
    fn test_normalised() {
        for density in [SkyDensity::Tregenza, SkyDensity::Reinhart] {
            let lv = relative_luminance(patch_scheme(density), 60.0, 180.0, 200.0, 400.0, 180);
            let sum: f32 = lv.iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
            assert!(lv.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_circumsolar_brightening() {
        let scheme = patch_scheme(SkyDensity::Tregenza);
        let sun_azimuth = 180.0;
        let lv = relative_luminance(scheme, 42.0, sun_azimuth, 150.0, 700.0, 200);
        // patch nearest the sun vs the one opposite it in the same row
        let row_start = 60;
        let toward = row_start + 12; // 24 patches per row, 15° each → 180°
        let away = row_start;
        assert!(lv[toward] > lv[away]);
    }

    #[test]
    fn test_clearness_bins() {
        assert_eq!(clearness_bin(1.0), 0);
        assert_eq!(clearness_bin(1.3), 2);
        assert_eq!(clearness_bin(7.0), 7);
    }
}
