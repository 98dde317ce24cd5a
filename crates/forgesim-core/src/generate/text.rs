//! Template-driven text for commit messages, PR titles, and issue titles.
//!
//! Templates come from the seed profile and use `{key}` placeholders
//! resolved against the seed's fragment pools. Unknown keys stay verbatim
//! so a typo in a seed file is visible in the output instead of silently
//! eaten.

use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::Rng;

use crate::seed::TextTemplates;

/// Relative weights of commit message categories when the seed declares
/// templates for them.
const COMMIT_CATEGORIES: [(&str, f64); 4] = [
    ("feature", 0.45),
    ("bugfix", 0.30),
    ("refactor", 0.15),
    ("chore", 0.10),
];

pub struct TextEngine<'a> {
    templates: &'a TextTemplates,
}

impl<'a> TextEngine<'a> {
    pub fn new(templates: &'a TextTemplates) -> Self {
        TextEngine { templates }
    }

    /// Pick a weighted commit category, then a template within it.
    pub fn commit_message(&self, rng: &mut StdRng) -> String {
        let available: Vec<(&str, f64)> = COMMIT_CATEGORIES
            .iter()
            .filter(|(cat, _)| {
                self.templates
                    .commit_messages
                    .get(*cat)
                    .is_some_and(|t| !t.is_empty())
            })
            .copied()
            .collect();

        let template = if available.is_empty() {
            None
        } else {
            let total: f64 = available.iter().map(|(_, w)| w).sum();
            let mut roll = rng.random::<f64>() * total;
            let mut picked = available[available.len() - 1].0;
            for (cat, weight) in &available {
                if roll < *weight {
                    picked = cat;
                    break;
                }
                roll -= weight;
            }
            self.templates.commit_messages[picked].choose(rng)
        };

        match template {
            Some(t) => self.render(t, rng),
            None => "Update project files".to_string(),
        }
    }

    pub fn pr_title(&self, rng: &mut StdRng) -> String {
        match self.templates.pr_titles.choose(rng) {
            Some(t) => self.render(t, rng),
            None => "Assorted changes".to_string(),
        }
    }

    pub fn issue_title(&self, rng: &mut StdRng) -> String {
        match self.templates.issue_titles.choose(rng) {
            Some(t) => self.render(t, rng),
            None => "Unexpected behavior".to_string(),
        }
    }

    /// Substitute each `{key}` with a random fragment from the matching
    /// pool. Keys without a pool are left as-is.
    fn render(&self, template: &str, rng: &mut StdRng) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let key = &after[..close];
                    match self.templates.fragments.get(key).and_then(|pool| pool.choose(rng)) {
                        Some(fragment) => out.push_str(fragment),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::SeedProfile;
    use rand::SeedableRng;

    #[test]
    fn test_render_substitutes_known_fragments() {
        let seed = SeedProfile::demo();
        let engine = TextEngine::new(&seed.templates);
        let mut rng = StdRng::seed_from_u64(1);
        let msg = engine.render("Add {component} support", &mut rng);
        assert!(!msg.contains('{'), "unresolved placeholder in {msg:?}");
        assert!(msg.starts_with("Add "));
        assert!(msg.ends_with(" support"));
    }

    #[test]
    fn test_render_keeps_unknown_keys_verbatim() {
        let seed = SeedProfile::demo();
        let engine = TextEngine::new(&seed.templates);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            engine.render("Fix {nonsense} here", &mut rng),
            "Fix {nonsense} here"
        );
    }

    #[test]
    fn test_empty_templates_fall_back() {
        let templates = TextTemplates::default();
        let engine = TextEngine::new(&templates);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(engine.commit_message(&mut rng), "Update project files");
        assert_eq!(engine.pr_title(&mut rng), "Assorted changes");
        assert_eq!(engine.issue_title(&mut rng), "Unexpected behavior");
    }

    #[test]
    fn test_commit_message_is_deterministic_per_seed() {
        let seed = SeedProfile::demo();
        let engine = TextEngine::new(&seed.templates);
        let a: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(9);
            (0..5).map(|_| engine.commit_message(&mut rng)).collect()
        };
        let b: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(9);
            (0..5).map(|_| engine.commit_message(&mut rng)).collect()
        };
        assert_eq!(a, b);
    }
}
