//! Amino-acid alphabet: residue tokens, their masses, and peptide tokenization.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{NovoError, Result};
use crate::mass::{mz_from_mass, H2O};

/// Monoisotopic residue masses used by NovoBench datasets.
const NOVOBENCH_RESIDUES: &[(&str, f64)] = &[
    ("G", 57.021464),
    ("A", 71.037114),
    ("S", 87.032028),
    ("P", 97.052764),
    ("V", 99.068414),
    ("T", 101.047670),
    ("C(+57.02)", 160.030649),
    ("L", 113.084064),
    ("I", 113.084064),
    ("N", 114.042927),
    ("D", 115.026943),
    ("Q", 128.058578),
    ("K", 128.094963),
    ("E", 129.042593),
    ("M", 131.040485),
    ("H", 137.058912),
    ("F", 147.068414),
    ("R", 156.101111),
    ("Y", 163.063329),
    ("W", 186.079313),
    ("M(+15.99)", 147.035400),
    ("N(+.98)", 115.026943),
    ("Q(+.98)", 129.042594),
];

/// PTM tokens tracked by the benchmark metrics unless configured otherwise.
pub const DEFAULT_PTMS: &[&str] = &["M(+15.99)", "N(+.98)", "Q(+.98)"];

/// Token → residue mass table.
///
/// Tokenization is greedy longest-match, so `M(+15.99)` wins over `M` when both
/// are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ResidueSet {
    masses: BTreeMap<String, f64>,
    /// Tokens ordered longest first.
    by_length: Vec<String>,
}

impl From<BTreeMap<String, f64>> for ResidueSet {
    fn from(masses: BTreeMap<String, f64>) -> Self {
        ResidueSet::new(masses)
    }
}

impl From<ResidueSet> for BTreeMap<String, f64> {
    fn from(set: ResidueSet) -> Self {
        set.masses
    }
}

impl Default for ResidueSet {
    fn default() -> Self {
        ResidueSet::novobench_default()
    }
}

impl ResidueSet {
    pub fn new(masses: BTreeMap<String, f64>) -> Self {
        let mut by_length: Vec<String> = masses.keys().cloned().collect();
        by_length.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        ResidueSet { masses, by_length }
    }

    pub fn novobench_default() -> Self {
        ResidueSet::new(
            NOVOBENCH_RESIDUES
                .iter()
                .map(|&(aa, mass)| (aa.to_string(), mass))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.masses.contains_key(token)
    }

    pub fn mass_of(&self, token: &str) -> Option<f64> {
        self.masses.get(token).copied()
    }

    /// Mass of a token, 0.0 when it is not in the alphabet.
    pub fn mass_or_zero(&self, token: &str) -> f64 {
        self.mass_of(token).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.masses.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Split a peptide string into residue tokens.
    pub fn tokenize(&self, peptide: &str) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        let mut rest = peptide;
        while !rest.is_empty() {
            let token = self
                .by_length
                .iter()
                .find(|t| rest.starts_with(t.as_str()))
                .ok_or_else(|| NovoError::UnknownResidue {
                    peptide: peptide.to_string(),
                    offset: peptide.len() - rest.len(),
                })?;
            tokens.push(token.clone());
            rest = &rest[token.len()..];
        }
        Ok(tokens)
    }

    /// Neutral peptide mass: residue masses plus water.
    pub fn peptide_mass<S: AsRef<str>>(&self, tokens: &[S]) -> f64 {
        tokens
            .iter()
            .map(|t| self.mass_or_zero(t.as_ref()))
            .sum::<f64>()
            + H2O
    }

    pub fn peptide_mz<S: AsRef<str>>(&self, tokens: &[S], charge: u32) -> f64 {
        mz_from_mass(self.peptide_mass(tokens), charge)
    }

    /// Fixed and variable modifications implied by the alphabet.
    ///
    /// A residue whose only tokens carry one modification is fixed; a residue
    /// present both with and without modifications has variable ones.
    pub fn modifications(&self) -> Modifications {
        let mut by_site: BTreeMap<String, BTreeSet<Option<String>>> = BTreeMap::new();
        for token in self.masses.keys() {
            match split_modification(token) {
                Some((site, delta)) => {
                    by_site.entry(site).or_default().insert(Some(delta));
                }
                None => {
                    by_site.entry(token.clone()).or_default().insert(None);
                }
            }
        }

        let mut mods = Modifications::default();
        for (site, deltas) in by_site {
            let site = if site.is_empty() { None } else { Some(site) };
            if deltas.len() > 1 {
                for delta in deltas.into_iter().flatten() {
                    mods.variable.push(Modification { site: site.clone(), delta });
                }
            } else if let Some(Some(delta)) = deltas.into_iter().next() {
                mods.fixed.push(Modification { site, delta });
            }
        }
        mods
    }
}

/// A residue modification, e.g. `+15.99` on `M`. `site == None` means N-term.
#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub site: Option<String>,
    pub delta: String,
}

impl Modification {
    pub fn delta_mass(&self) -> Option<f64> {
        self.delta.parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifications {
    pub fixed: Vec<Modification>,
    pub variable: Vec<Modification>,
}

/// Split `C(+57.02)`, `M+15.995` or `+42.011` into (residue, signed delta).
fn split_modification(token: &str) -> Option<(String, String)> {
    let (site, rest) = match token.chars().next()? {
        c if c.is_ascii_uppercase() => (c.to_string(), &token[1..]),
        _ => (String::new(), token),
    };
    let rest = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(rest);
    let numeric = rest.strip_prefix(['+', '-']).unwrap_or(rest);
    if numeric.is_empty() || numeric.parse::<f64>().is_err() {
        return None;
    }
    Some((site, rest.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_with_longest_match() {
        let residues = ResidueSet::default();
        let tokens = residues.tokenize("PEPM(+15.99)N(+.98)K").unwrap();
        assert_eq!(tokens, vec!["P", "E", "P", "M(+15.99)", "N(+.98)", "K"]);
    }

    #[test]
    fn unknown_character_is_reported() {
        let residues = ResidueSet::default();
        let err = residues.tokenize("PEPXK").unwrap_err();
        match err {
            NovoError::UnknownResidue { peptide, offset } => {
                assert_eq!(peptide, "PEPXK");
                assert_eq!(offset, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_peptide_has_no_tokens() {
        assert!(ResidueSet::default().tokenize("").unwrap().is_empty());
    }

    #[test]
    fn peptide_mass_includes_water() {
        let residues = ResidueSet::default();
        let tokens = residues.tokenize("GA").unwrap();
        let expected = 57.021464 + 71.037114 + H2O;
        assert!((residues.peptide_mass(&tokens) - expected).abs() < 1e-9);
    }

    #[test]
    fn default_alphabet_modifications() {
        let mods = ResidueSet::default().modifications();
        assert_eq!(
            mods.fixed,
            vec![Modification { site: Some("C".into()), delta: "+57.02".into() }]
        );
        let variable: Vec<_> = mods
            .variable
            .iter()
            .map(|m| (m.site.clone().unwrap(), m.delta.clone()))
            .collect();
        assert_eq!(
            variable,
            vec![
                ("M".to_string(), "+15.99".to_string()),
                ("N".to_string(), "+.98".to_string()),
                ("Q".to_string(), "+.98".to_string()),
            ]
        );
    }

    #[test]
    fn casanovo_style_tokens_and_nterm() {
        let masses: BTreeMap<String, f64> = [
            ("M", 131.040485),
            ("M+15.995", 147.035400),
            ("+42.011", 42.010565),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let mods = ResidueSet::new(masses).modifications();
        assert_eq!(mods.fixed.len(), 1);
        assert_eq!(mods.fixed[0].site, None);
        assert_eq!(mods.fixed[0].delta, "+42.011");
        assert_eq!(mods.variable[0].site.as_deref(), Some("M"));
        assert_eq!(mods.variable[0].delta_mass(), Some(15.995));
    }

    #[test]
    fn serde_round_trips_as_plain_map() {
        let residues = ResidueSet::default();
        let json = serde_json::to_string(&residues).unwrap();
        assert!(json.starts_with('{'));
        let back: ResidueSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, residues);
        assert!(back.tokenize("M(+15.99)").unwrap().len() == 1);
    }
}
