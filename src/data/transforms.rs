//! Spectrum preprocessing transforms.
//!
//! The standard pipeline is
//! `SetRangeMz → RemovePrecursorPeak → FilterIntensity → ScaleIntensity`,
//! built from [`PreprocessConfig`] by [`preprocessing_pipeline`].

use super::model::Spectrum;
use crate::config::PreprocessConfig;
use crate::mass::{mz_from_mass, neutral_mass};

pub trait SpectrumTransform: Send + Sync {
    fn apply(&self, spectrum: &mut Spectrum);

    fn name(&self) -> &'static str;
}

/// Keep peaks with `min_mz <= mz <= max_mz`.
#[derive(Debug, Clone)]
pub struct SetRangeMz {
    pub min_mz: f64,
    pub max_mz: f64,
}

impl SpectrumTransform for SetRangeMz {
    fn apply(&self, spectrum: &mut Spectrum) {
        retain_peaks(spectrum, |mz, _| mz >= self.min_mz && mz <= self.max_mz);
    }

    fn name(&self) -> &'static str {
        "set_range_mz"
    }
}

/// Drop peaks within `tolerance` Da of the precursor at every charge up to
/// the precursor charge.
#[derive(Debug, Clone)]
pub struct RemovePrecursorPeak {
    pub tolerance: f64,
}

impl SpectrumTransform for RemovePrecursorPeak {
    fn apply(&self, spectrum: &mut Spectrum) {
        let charge = spectrum.precursor_charge.max(1);
        let mass = neutral_mass(spectrum.precursor_mz, charge);
        let precursor_mzs: Vec<f64> = (1..=charge).map(|z| mz_from_mass(mass, z)).collect();
        retain_peaks(spectrum, |mz, _| {
            precursor_mzs
                .iter()
                .all(|p| (mz - p).abs() > self.tolerance)
        });
    }

    fn name(&self) -> &'static str {
        "remove_precursor_peak"
    }
}

/// Keep the `max_peaks` most intense peaks, then drop peaks below
/// `min_intensity` relative to the base peak. Peaks stay sorted by m/z.
#[derive(Debug, Clone)]
pub struct FilterIntensity {
    pub min_intensity: f64,
    pub max_peaks: usize,
}

impl SpectrumTransform for FilterIntensity {
    fn apply(&self, spectrum: &mut Spectrum) {
        let mut order: Vec<usize> = (0..spectrum.n_peaks()).collect();
        order.sort_by(|&a, &b| spectrum.intensity[b].total_cmp(&spectrum.intensity[a]));
        order.truncate(self.max_peaks);

        let base = order
            .first()
            .map(|&i| spectrum.intensity[i])
            .unwrap_or(0.0);
        let floor = self.min_intensity * base;
        order.retain(|&i| spectrum.intensity[i] >= floor);
        order.sort_by(|&a, &b| spectrum.mz[a].total_cmp(&spectrum.mz[b]));

        spectrum.mz = order.iter().map(|&i| spectrum.mz[i]).collect();
        spectrum.intensity = order.iter().map(|&i| spectrum.intensity[i]).collect();
    }

    fn name(&self) -> &'static str {
        "filter_intensity"
    }
}

/// Square-root intensity scaling followed by unit L2 normalization.
#[derive(Debug, Clone, Default)]
pub struct ScaleIntensity;

impl SpectrumTransform for ScaleIntensity {
    fn apply(&self, spectrum: &mut Spectrum) {
        for v in spectrum.intensity.iter_mut() {
            *v = v.max(0.0).sqrt();
        }
        let norm = spectrum.intensity.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in spectrum.intensity.iter_mut() {
                *v /= norm;
            }
        }
    }

    fn name(&self) -> &'static str {
        "scale_intensity"
    }
}

/// Apply transforms in order. A spectrum left without peaks gets the
/// placeholder peak `(0.0, 1.0)`.
pub struct Compose {
    transforms: Vec<Box<dyn SpectrumTransform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn SpectrumTransform>>) -> Self {
        Compose { transforms }
    }

    pub fn apply(&self, spectrum: &mut Spectrum) {
        for t in &self.transforms {
            t.apply(spectrum);
        }
        if spectrum.mz.is_empty() {
            spectrum.mz.push(0.0);
            spectrum.intensity.push(1.0);
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

pub fn preprocessing_pipeline(cfg: &PreprocessConfig) -> Compose {
    Compose::new(vec![
        Box::new(SetRangeMz {
            min_mz: cfg.min_mz,
            max_mz: cfg.max_mz,
        }),
        Box::new(RemovePrecursorPeak {
            tolerance: cfg.remove_precursor_tol,
        }),
        Box::new(FilterIntensity {
            min_intensity: cfg.min_intensity,
            max_peaks: cfg.n_peaks,
        }),
        Box::new(ScaleIntensity),
    ])
}

fn retain_peaks<F>(spectrum: &mut Spectrum, mut keep: F)
where
    F: FnMut(f64, f64) -> bool,
{
    let (mz, intensity): (Vec<f64>, Vec<f64>) = spectrum
        .mz
        .iter()
        .zip(&spectrum.intensity)
        .filter(|&(&m, &i)| keep(m, i))
        .map(|(&m, &i)| (m, i))
        .unzip();
    spectrum.mz = mz;
    spectrum.intensity = intensity;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(peaks: &[(f64, f64)]) -> Spectrum {
        Spectrum::new(
            peaks.iter().map(|p| p.0).collect(),
            peaks.iter().map(|p| p.1).collect(),
            500.0,
            2,
        )
    }

    #[test]
    fn range_is_inclusive() {
        let mut sp = spectrum(&[(49.9, 1.0), (50.0, 2.0), (2500.0, 3.0), (2500.1, 4.0)]);
        SetRangeMz { min_mz: 50.0, max_mz: 2500.0 }.apply(&mut sp);
        assert_eq!(sp.mz, vec![50.0, 2500.0]);
        assert_eq!(sp.intensity, vec![2.0, 3.0]);
    }

    #[test]
    fn removes_precursor_at_each_charge() {
        // Precursor 500.0 at 2+ is ~998.99 at 1+.
        let singly = mz_from_mass(neutral_mass(500.0, 2), 1);
        let mut sp = spectrum(&[(300.0, 1.0), (500.5, 1.0), (singly + 1.0, 1.0), (700.0, 1.0)]);
        RemovePrecursorPeak { tolerance: 2.0 }.apply(&mut sp);
        assert_eq!(sp.mz, vec![300.0, 700.0]);
    }

    #[test]
    fn keeps_most_intense_then_applies_floor() {
        let mut sp = spectrum(&[(100.0, 5.0), (200.0, 100.0), (300.0, 0.5), (400.0, 50.0)]);
        FilterIntensity { min_intensity: 0.01, max_peaks: 3 }.apply(&mut sp);
        assert_eq!(sp.mz, vec![100.0, 200.0, 400.0]);

        let mut sp = spectrum(&[(100.0, 5.0), (200.0, 100.0), (300.0, 0.5)]);
        FilterIntensity { min_intensity: 0.1, max_peaks: 10 }.apply(&mut sp);
        assert_eq!(sp.mz, vec![200.0]);
    }

    #[test]
    fn scaling_gives_unit_norm() {
        let mut sp = spectrum(&[(100.0, 4.0), (200.0, 9.0)]);
        ScaleIntensity.apply(&mut sp);
        let norm: f64 = sp.intensity.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!((sp.intensity[0] / sp.intensity[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn emptied_spectrum_gets_placeholder_peak() {
        let cfg = PreprocessConfig::default();
        let mut sp = spectrum(&[(10.0, 1.0), (20.0, 2.0)]);
        let pipeline = preprocessing_pipeline(&cfg);
        pipeline.apply(&mut sp);
        assert_eq!(sp.mz, vec![0.0]);
        assert_eq!(sp.intensity, vec![1.0]);
        assert_eq!(
            pipeline.names(),
            vec!["set_range_mz", "remove_precursor_peak", "filter_intensity", "scale_intensity"]
        );
    }
}
