//! Genomes and the GA operators acting on them: template sampling with
//! rotational dedup, two-point crossover, and usage-aware mutation.

use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use stigmergy_core::Material;

use crate::EvolveError;
use crate::microrule::{FACE_SLOTS, Microrule, NEIGHBOURHOOD, PatternSlot, contains_equivalent};
use crate::templates::template_library;

/// Attempts before a sampling loop concedes the rule space is exhausted for
/// the current genome.
pub const MAX_SAMPLE_ATTEMPTS: usize = 10_000;

/// Chance a genome undergoes two-point crossover instead of cloning parent A.
pub const CROSSOVER_PROBABILITY: f32 = 0.2;

/// Replacement probability during mutation for rules that fired in the
/// evaluating rollout.
pub const REPLACE_USED_PROBABILITY: f32 = 0.01;

/// Replacement probability for rules that never fired.
pub const REPLACE_UNUSED_PROBABILITY: f32 = 0.9;

/// Std-dev of the Gaussian perturbation applied to activation windows.
pub const RANGE_SIGMA: f32 = 0.05;

/// An ordered list of rotationally distinct microrules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    rules: Vec<Microrule>,
}

impl Genome {
    /// Samples `rule_count` rotationally distinct rules from the template
    /// library.
    pub fn random(rule_count: usize, rng: &mut SmallRng) -> Result<Self, EvolveError> {
        let mut rules = Vec::with_capacity(rule_count);
        for _ in 0..rule_count {
            let rule = sample_distinct_rule(&rules, rng)?;
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    #[must_use]
    pub fn from_rules(rules: Vec<Microrule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[Microrule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Records which rules fired during a rollout.
    pub fn apply_usage(&mut self, fired: &[bool]) {
        for (rule, &fired) in self.rules.iter_mut().zip(fired) {
            if fired {
                rule.used = true;
            }
        }
    }

    pub fn clear_usage(&mut self) {
        for rule in &mut self.rules {
            rule.used = false;
        }
    }

    /// Two-point crossover: with probability [`CROSSOVER_PROBABILITY`], rules
    /// inside a random half-open index interval `[a, b)` come from `other`,
    /// the rest (the upper cut point included) from `self`; otherwise a
    /// plain clone of `self`.
    #[must_use]
    pub fn crossover(&self, other: &Genome, rng: &mut SmallRng) -> Genome {
        if self.rules.len() != other.rules.len()
            || self.rules.len() < 2
            || rng.random::<f32>() >= CROSSOVER_PROBABILITY
        {
            return self.clone();
        }
        let mut a = rng.random_range(0..self.rules.len());
        let mut b = rng.random_range(0..self.rules.len());
        while b == a {
            b = rng.random_range(0..self.rules.len());
        }
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        let rules = (0..self.rules.len())
            .map(|i| {
                if (a..b).contains(&i) {
                    other.rules[i].clone()
                } else {
                    self.rules[i].clone()
                }
            })
            .collect();
        Genome { rules }
    }

    /// Produces a mutated offspring. Rules that fired keep their slot with
    /// probability 0.99; unused rules are almost always resampled. Activation
    /// windows are always perturbed around the parent rule's window, and
    /// usage flags reset.
    pub fn mutate(&self, rng: &mut SmallRng) -> Result<Genome, EvolveError> {
        let mut rules: Vec<Microrule> = Vec::with_capacity(self.rules.len());
        for parent in &self.rules {
            let replace_probability = if parent.used {
                REPLACE_USED_PROBABILITY
            } else {
                REPLACE_UNUSED_PROBABILITY
            };
            let mut child = if rng.random::<f32>() < replace_probability {
                sample_distinct_rule(&rules, rng)?
            } else {
                parent.clone()
            };
            // The window drifts around the parent's window whether or not the
            // pattern was replaced. The clamps are deliberately asymmetric:
            // the lower bound stays positive, the upper stays above 0.5.
            child.range_min = (gaussian(rng, 2.0 * parent.range_min, RANGE_SIGMA) * 0.5).max(0.001);
            child.range_max = 0.5 + gaussian(rng, parent.range_max - 0.5, RANGE_SIGMA);
            child.used = false;
            rules.push(child);
        }
        Ok(Genome { rules })
    }
}

/// Draws one microrule from a random template, rejecting rotational
/// duplicates of rules already in `existing`.
pub fn sample_distinct_rule(
    existing: &[Microrule],
    rng: &mut SmallRng,
) -> Result<Microrule, EvolveError> {
    for _ in 0..MAX_SAMPLE_ATTEMPTS {
        let candidate = sample_rule(rng);
        if !contains_equivalent(existing, &candidate) {
            return Ok(candidate);
        }
    }
    Err(EvolveError::RuleSpaceExhausted { attempts: MAX_SAMPLE_ATTEMPTS })
}

/// One unconstrained template draw: each slot binds with the template's
/// per-slot probability, and one face slot is always bound so no rule fires
/// in completely open space.
fn sample_rule(rng: &mut SmallRng) -> Microrule {
    let library = template_library();
    let mask = &library[rng.random_range(0..library.len())];
    let mut pattern = [PatternSlot::Any; NEIGHBOURHOOD];
    for (slot, &probability) in pattern.iter_mut().zip(mask) {
        if rng.random::<f32>() < probability {
            *slot = PatternSlot::Is(random_material(rng));
        }
    }
    let forced_face = FACE_SLOTS[rng.random_range(0..FACE_SLOTS.len())];
    pattern[forced_face] = PatternSlot::Is(random_material(rng));
    Microrule {
        pattern,
        deposit: random_material(rng),
        used: false,
        range_min: (rng.random::<f32>() * 0.5).max(0.001),
        range_max: 0.5 + rng.random::<f32>(),
    }
}

fn random_material(rng: &mut SmallRng) -> Material {
    if rng.random::<f32>() < 0.5 { Material::Cement } else { Material::Queen }
}

/// Box-Muller Gaussian draw.
pub fn gaussian(rng: &mut SmallRng, mean: f32, std_dev: f32) -> f32 {
    let u1: f32 = rng.random::<f32>().max(f32::EPSILON);
    let u2: f32 = rng.random();
    let mag = (-2.0 * u1.ln()).sqrt();
    mean + std_dev * mag * (2.0 * std::f32::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> SmallRng {
        SmallRng::seed_from_u64(seed)
    }

    #[test]
    fn random_genome_has_requested_rule_count() {
        let genome = Genome::random(20, &mut rng(1)).unwrap();
        assert_eq!(genome.len(), 20);
    }

    #[test]
    fn random_genome_rules_are_rotationally_distinct() {
        let genome = Genome::random(16, &mut rng(2)).unwrap();
        for (i, rule) in genome.rules().iter().enumerate() {
            for other in &genome.rules()[i + 1..] {
                assert!(!rule.equivalent(other));
            }
        }
    }

    #[test]
    fn sampled_rules_always_bind_a_face_slot() {
        let mut r = rng(3);
        for _ in 0..100 {
            let rule = sample_rule(&mut r);
            assert!(FACE_SLOTS.iter().any(|&slot| rule.pattern[slot] != PatternSlot::Any));
            assert!(rule.range_min >= 0.001);
            assert!(rule.range_max >= 0.5);
        }
    }

    #[test]
    fn crossover_preserves_length_and_order_sources() {
        let mut r = rng(4);
        let a = Genome::random(12, &mut r).unwrap();
        let b = Genome::random(12, &mut r).unwrap();
        for _ in 0..50 {
            let child = a.crossover(&b, &mut r);
            assert_eq!(child.len(), 12);
            for (i, rule) in child.rules().iter().enumerate() {
                assert!(rule == &a.rules()[i] || rule == &b.rules()[i]);
            }
        }
    }

    #[test]
    fn crossover_sometimes_takes_an_interval_from_the_other_parent() {
        let mut r = rng(5);
        let a = Genome::random(12, &mut r).unwrap();
        let b = Genome::random(12, &mut r).unwrap();
        let mut mixed = false;
        for _ in 0..200 {
            let child = a.crossover(&b, &mut r);
            if child.rules().iter().zip(b.rules()).any(|(c, p)| c == p)
                && child.rules().iter().zip(a.rules()).any(|(c, p)| c == p)
            {
                mixed = true;
                break;
            }
        }
        assert!(mixed, "no crossover observed in 200 draws at p = 0.2");
    }

    #[test]
    fn crossover_interval_excludes_the_upper_cut_point() {
        // With two rules the cut points are always 0 and 1, so every mixed
        // child must be exactly [other[0], self[1]]: the upper cut point
        // stays with the first parent.
        let mut r = rng(10);
        let a = Genome::random(2, &mut r).unwrap();
        let b = Genome::random(2, &mut r).unwrap();
        let mut mixed = 0;
        for _ in 0..300 {
            let child = a.crossover(&b, &mut r);
            if child == a {
                continue;
            }
            mixed += 1;
            assert_eq!(child.rules()[0], b.rules()[0]);
            assert_eq!(child.rules()[1], a.rules()[1]);
        }
        assert!(mixed > 0, "no crossover observed in 300 draws at p = 0.2");
    }

    #[test]
    fn mutation_protects_used_rules() {
        let mut r = rng(6);
        let mut genome = Genome::random(10, &mut r).unwrap();
        genome.apply_usage(&vec![true; 10]);
        let mut kept = 0;
        let trials = 50;
        for _ in 0..trials {
            let child = genome.mutate(&mut r).unwrap();
            kept += child
                .rules()
                .iter()
                .zip(genome.rules())
                .filter(|(c, p)| c.pattern == p.pattern)
                .count();
        }
        // At 1% replacement, nearly every pattern survives.
        assert!(kept as f32 > 0.95 * (trials * 10) as f32);
    }

    #[test]
    fn mutation_replaces_most_unused_rules() {
        let mut r = rng(7);
        let genome = Genome::random(10, &mut r).unwrap();
        let mut kept = 0;
        let trials = 50;
        for _ in 0..trials {
            let child = genome.mutate(&mut r).unwrap();
            kept += child
                .rules()
                .iter()
                .zip(genome.rules())
                .filter(|(c, p)| c.pattern == p.pattern)
                .count();
        }
        // At 90% replacement, only about one in ten patterns survives.
        assert!((kept as f32) < 0.25 * (trials * 10) as f32);
    }

    #[test]
    fn mutation_resets_usage_and_keeps_windows_valid() {
        let mut r = rng(8);
        let mut genome = Genome::random(8, &mut r).unwrap();
        genome.apply_usage(&vec![true; 8]);
        let child = genome.mutate(&mut r).unwrap();
        for rule in child.rules() {
            assert!(!rule.used);
            assert!(rule.range_min >= 0.001);
        }
    }

    #[test]
    fn gaussian_is_centred_on_the_mean() {
        let mut r = rng(9);
        let samples = 20_000;
        let sum: f32 = (0..samples).map(|_| gaussian(&mut r, 1.5, 0.05)).sum();
        let mean = sum / samples as f32;
        assert!((mean - 1.5).abs() < 0.01, "sample mean {mean}");
    }
}
