//! Seed profile: the declarative organizational description that
//! parameterizes generation.
//!
//! A [`SeedProfile`] is immutable once loaded and replaced wholesale on a
//! seed swap. It carries:
//! - developers with behavioral parameters (commit rate, change size,
//!   activity multiplier, AI acceptance baseline),
//! - repositories with owning teams,
//! - named text templates with placeholder fragments,
//! - named correlation coefficients that bias joint distributions.
//!
//! Validation enforces the two structural invariants: every developer's
//! org path resolves against the declared org chart, and every
//! repository's owning teams are a subset of the declared teams.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SeedError;

/// Seniority tier of a developer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
        }
    }
}

/// Geographic region, used to center working-hours timestamp bias.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Eu,
    Apac,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Apac => "apac",
        }
    }

    /// Approximate center of the local business day, expressed in UTC hours.
    pub fn business_hour_utc(&self) -> f64 {
        match self {
            Region::Us => 18.0,  // ~13:00 US-central
            Region::Eu => 10.0,  // ~11:00 CET
            Region::Apac => 4.0, // ~12:00 SGT
        }
    }
}

/// Repository maturity tier. Younger repositories see slightly higher
/// post-merge defect rates in the generated quality outcomes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MaturityTier {
    Incubating,
    Active,
    Mature,
}

/// Organizational placement of a developer: org / division / team.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OrgPath {
    pub org: String,
    pub division: String,
    pub team: String,
}

/// Behavioral parameters driving a developer's event generation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BehaviorProfile {
    /// Expected commits per week before velocity scaling.
    pub commits_per_week: f64,
    /// Mean change size in lines; feeds the log-normal magnitude draw.
    pub avg_change_size: f64,
    /// Proportion of work landing in newly created files, 0.0..=1.0.
    pub new_file_ratio: f64,
    /// Per-developer scaling on top of the velocity tier, ~0.5..2.0.
    pub activity_multiplier: f64,
}

/// A simulated developer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeveloperProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub org_path: OrgPath,
    pub seniority: Seniority,
    pub region: Region,
    /// Baseline AI suggestion acceptance rate, 0.0..=1.0. Drives the
    /// attribution split of generated code-change events.
    pub acceptance_rate: f64,
    pub behavior: BehaviorProfile,
}

/// A simulated repository.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RepositoryProfile {
    pub name: String,
    pub primary_language: String,
    pub age_days: u32,
    pub maturity: MaturityTier,
    /// Owning teams; commit placement is weighted toward these.
    pub teams: Vec<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// One org in the declared organizational chart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OrgUnit {
    pub name: String,
    pub divisions: Vec<DivisionUnit>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DivisionUnit {
    pub name: String,
    pub teams: Vec<String>,
}

/// Named text templates plus the fragment lists their placeholders draw
/// from. Template strings use `{key}` placeholders resolved against
/// `fragments`; unknown keys are left verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TextTemplates {
    /// Commit message templates keyed by category (feature, bugfix, ...).
    #[serde(default)]
    pub commit_messages: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub pr_titles: Vec<String>,
    #[serde(default)]
    pub issue_titles: Vec<String>,
    /// Placeholder fragment pools, e.g. "component" -> ["parser", ...].
    #[serde(default)]
    pub fragments: BTreeMap<String, Vec<String>>,
}

/// The full seed profile. Read-only input to the generation engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeedProfile {
    pub developers: Vec<DeveloperProfile>,
    pub repositories: Vec<RepositoryProfile>,
    pub org_chart: Vec<OrgUnit>,
    #[serde(default)]
    pub templates: TextTemplates,
    /// Named correlation coefficients biasing joint distributions, e.g.
    /// "seniority_acceptance" or "ai_revert".
    #[serde(default)]
    pub correlations: BTreeMap<String, f64>,
}

impl SeedProfile {
    /// Validate the structural invariants of the profile. Called once at
    /// load time; the generator assumes a validated profile but re-checks
    /// team resolution defensively.
    pub fn validate(&self) -> Result<(), SeedError> {
        if self.developers.is_empty() {
            return Err(SeedError::NoDevelopers);
        }
        if self.repositories.is_empty() {
            return Err(SeedError::NoRepositories);
        }

        let declared = self.declared_teams();

        let mut ids = BTreeSet::new();
        let mut emails = BTreeSet::new();
        for dev in &self.developers {
            if !ids.insert(dev.id.as_str()) {
                return Err(SeedError::DuplicateDeveloperId(dev.id.clone()));
            }
            if !emails.insert(dev.email.as_str()) {
                return Err(SeedError::DuplicateEmail(dev.email.clone()));
            }
            if !(0.0..=1.0).contains(&dev.acceptance_rate) {
                return Err(SeedError::AcceptanceRateOutOfRange {
                    id: dev.id.clone(),
                    value: dev.acceptance_rate,
                });
            }
            validate_behavior(dev)?;
            if !self.org_path_resolves(&dev.org_path) {
                return Err(SeedError::UnresolvedOrgPath {
                    id: dev.id.clone(),
                    org: dev.org_path.org.clone(),
                    division: dev.org_path.division.clone(),
                    team: dev.org_path.team.clone(),
                });
            }
        }

        for repo in &self.repositories {
            for team in &repo.teams {
                if !declared.contains(team.as_str()) {
                    return Err(SeedError::UndeclaredRepositoryTeam {
                        repo: repo.name.clone(),
                        team: team.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// All teams declared anywhere in the org chart.
    pub fn declared_teams(&self) -> BTreeSet<&str> {
        self.org_chart
            .iter()
            .flat_map(|org| &org.divisions)
            .flat_map(|div| &div.teams)
            .map(String::as_str)
            .collect()
    }

    /// All division names declared in the org chart.
    pub fn declared_divisions(&self) -> BTreeSet<&str> {
        self.org_chart
            .iter()
            .flat_map(|org| &org.divisions)
            .map(|div| div.name.as_str())
            .collect()
    }

    fn org_path_resolves(&self, path: &OrgPath) -> bool {
        self.org_chart.iter().any(|org| {
            org.name == path.org
                && org.divisions.iter().any(|div| {
                    div.name == path.division && div.teams.iter().any(|t| *t == path.team)
                })
        })
    }

    /// Look up a named correlation coefficient, falling back to `default`
    /// when the seed does not declare it.
    pub fn correlation(&self, name: &str, default: f64) -> f64 {
        self.correlations.get(name).copied().unwrap_or(default)
    }

    /// Repositories owned by the given team.
    pub fn repositories_for_team<'a>(&'a self, team: &str) -> Vec<&'a RepositoryProfile> {
        self.repositories
            .iter()
            .filter(|repo| repo.teams.iter().any(|t| t == team))
            .collect()
    }

    /// A small valid in-code profile for tests and as the server fallback
    /// when no seed file is supplied.
    pub fn demo() -> Self {
        let org_chart = vec![OrgUnit {
            name: "acme".to_string(),
            divisions: vec![DivisionUnit {
                name: "platform".to_string(),
                teams: vec!["core".to_string(), "data".to_string()],
            }],
        }];

        let developers = vec![
            DeveloperProfile {
                id: "user_0001".to_string(),
                email: "mika.tanaka@acme.dev".to_string(),
                name: "Mika Tanaka".to_string(),
                org_path: OrgPath {
                    org: "acme".to_string(),
                    division: "platform".to_string(),
                    team: "core".to_string(),
                },
                seniority: Seniority::Senior,
                region: Region::Apac,
                acceptance_rate: 0.72,
                behavior: BehaviorProfile {
                    commits_per_week: 18.0,
                    avg_change_size: 140.0,
                    new_file_ratio: 0.12,
                    activity_multiplier: 1.1,
                },
            },
            DeveloperProfile {
                id: "user_0002".to_string(),
                email: "lena.berg@acme.dev".to_string(),
                name: "Lena Berg".to_string(),
                org_path: OrgPath {
                    org: "acme".to_string(),
                    division: "platform".to_string(),
                    team: "core".to_string(),
                },
                seniority: Seniority::Mid,
                region: Region::Eu,
                acceptance_rate: 0.61,
                behavior: BehaviorProfile {
                    commits_per_week: 12.0,
                    avg_change_size: 90.0,
                    new_file_ratio: 0.2,
                    activity_multiplier: 1.0,
                },
            },
            DeveloperProfile {
                id: "user_0003".to_string(),
                email: "sam.okafor@acme.dev".to_string(),
                name: "Sam Okafor".to_string(),
                org_path: OrgPath {
                    org: "acme".to_string(),
                    division: "platform".to_string(),
                    team: "data".to_string(),
                },
                seniority: Seniority::Junior,
                region: Region::Us,
                acceptance_rate: 0.83,
                behavior: BehaviorProfile {
                    commits_per_week: 9.0,
                    avg_change_size: 60.0,
                    new_file_ratio: 0.35,
                    activity_multiplier: 0.9,
                },
            },
        ];

        let repositories = vec![
            RepositoryProfile {
                name: "acme/gateway".to_string(),
                primary_language: "go".to_string(),
                age_days: 1460,
                maturity: MaturityTier::Mature,
                teams: vec!["core".to_string()],
                default_branch: "main".to_string(),
            },
            RepositoryProfile {
                name: "acme/warehouse".to_string(),
                primary_language: "python".to_string(),
                age_days: 420,
                maturity: MaturityTier::Active,
                teams: vec!["data".to_string()],
                default_branch: "main".to_string(),
            },
            RepositoryProfile {
                name: "acme/sdk".to_string(),
                primary_language: "rust".to_string(),
                age_days: 90,
                maturity: MaturityTier::Incubating,
                teams: vec!["core".to_string(), "data".to_string()],
                default_branch: "main".to_string(),
            },
        ];

        let mut commit_messages = BTreeMap::new();
        commit_messages.insert(
            "feature".to_string(),
            vec![
                "Add {component} support to {module}".to_string(),
                "Implement {component} handling".to_string(),
            ],
        );
        commit_messages.insert(
            "bugfix".to_string(),
            vec![
                "Fix {component} edge case in {module}".to_string(),
                "Handle empty input in {component}".to_string(),
            ],
        );
        commit_messages.insert(
            "refactor".to_string(),
            vec!["Refactor {module} for clarity".to_string()],
        );
        commit_messages.insert(
            "chore".to_string(),
            vec!["Bump {component} dependencies".to_string()],
        );

        let mut fragments = BTreeMap::new();
        fragments.insert(
            "component".to_string(),
            vec![
                "pagination".to_string(),
                "retry".to_string(),
                "cache".to_string(),
                "auth".to_string(),
            ],
        );
        fragments.insert(
            "module".to_string(),
            vec![
                "ingest".to_string(),
                "scheduler".to_string(),
                "api layer".to_string(),
            ],
        );

        let templates = TextTemplates {
            commit_messages,
            pr_titles: vec![
                "{component}: {module} improvements".to_string(),
                "Rework {component} in {module}".to_string(),
            ],
            issue_titles: vec![
                "{component} fails under load".to_string(),
                "Incorrect results from {module}".to_string(),
            ],
            fragments,
        };

        let mut correlations = BTreeMap::new();
        correlations.insert("seniority_acceptance".to_string(), 0.1);
        correlations.insert("ai_revert".to_string(), 0.05);
        correlations.insert("hotfix_base".to_string(), 0.08);

        SeedProfile {
            developers,
            repositories,
            org_chart,
            templates,
            correlations,
        }
    }
}

fn validate_behavior(dev: &DeveloperProfile) -> Result<(), SeedError> {
    let checks: [(&'static str, f64); 4] = [
        ("commits_per_week", dev.behavior.commits_per_week),
        ("avg_change_size", dev.behavior.avg_change_size),
        ("new_file_ratio", dev.behavior.new_file_ratio),
        ("activity_multiplier", dev.behavior.activity_multiplier),
    ];
    for (field, value) in checks {
        if !value.is_finite() || value < 0.0 {
            return Err(SeedError::InvalidBehavior {
                id: dev.id.clone(),
                field,
            });
        }
    }
    Ok(())
}

/// Derive `target` developers from the seed's roster by cloning seed
/// developers round-robin with suffixed identities and jittered behavior
/// parameters. Lets a small seed file stand in for a large organization.
///
/// Draws from `rng` in a fixed order, so replication is deterministic
/// under the generation seed. `target <= roster size` truncates instead.
pub fn replicate_developers(
    seed: &SeedProfile,
    target: usize,
    rng: &mut StdRng,
) -> Vec<DeveloperProfile> {
    if target <= seed.developers.len() {
        return seed.developers[..target].to_vec();
    }

    let mut roster = seed.developers.clone();
    let base = seed.developers.len();
    for i in base..target {
        let template = &seed.developers[i % base];
        let mut clone = template.clone();
        let serial = i + 1;
        clone.id = format!("{}_r{:04}", template.id, serial);
        clone.name = format!("{} ({})", template.name, serial);
        clone.email = match template.email.split_once('@') {
            Some((local, domain)) => format!("{}+r{:04}@{}", local, serial, domain),
            None => format!("{}+r{:04}", template.email, serial),
        };
        // Jitter rates so clones are not statistical carbon copies.
        let jitter = |rng: &mut StdRng| 0.8 + rng.random::<f64>() * 0.4;
        clone.behavior.commits_per_week *= jitter(rng);
        clone.behavior.avg_change_size *= jitter(rng);
        clone.behavior.activity_multiplier =
            (clone.behavior.activity_multiplier * jitter(rng)).clamp(0.1, 3.0);
        clone.acceptance_rate = (clone.acceptance_rate + (rng.random::<f64>() - 0.5) * 0.1)
            .clamp(0.0, 1.0);
        roster.push(clone);
    }
    roster
}
