//! Static scene catalog and selection-expression parsing.
mod selector;


use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SelectionError;

pub use selector::{SelectionMode, parse_selection};

/// Identifier of the designated login probe.
pub const LOGIN_TEST: &str = "auth-login";

/// A named user journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scene {
    Homepage,
    Quotation,
}

impl Scene {
    pub const ALL: [Scene; 2] = [Scene::Homepage, Scene::Quotation];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Scene::Homepage => "homepage",
            Scene::Quotation => "quotation",
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scene {
    type Err = SelectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Scene::ALL
            .into_iter()
            .find(|scene| scene.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SelectionError::UnknownScene {
                scene: wanted.to_owned(),
                available: Scene::ALL
                    .iter()
                    .map(|scene| scene.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDescriptor {
    pub identifier: String,
    pub display_name: String,
    /// 1-based number used by selection expressions.
    pub ordinal: u32,
}

impl TestDescriptor {
    fn new(ordinal: u32, identifier: &str, display_name: &str) -> Self {
        Self {
            identifier: identifier.to_owned(),
            display_name: display_name.to_owned(),
            ordinal,
        }
    }

    /// Prefix of the per-test custom metrics (`auth-me` -> `auth_me`).
    #[must_use]
    pub fn metric_prefix(&self) -> String {
        self.identifier.replace('-', "_")
    }

    #[must_use]
    pub fn is_login(&self) -> bool {
        self.identifier == LOGIN_TEST
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    scenes: Vec<(Scene, Vec<TestDescriptor>)>,
}

impl Catalog {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            scenes: vec![
                (
                    Scene::Homepage,
                    vec![
                        TestDescriptor::new(1, LOGIN_TEST, "Auth Login"),
                        TestDescriptor::new(2, "auth-me", "Auth Me"),
                        TestDescriptor::new(3, "auth-features", "Auth Features"),
                        TestDescriptor::new(4, "master-categories", "Master Categories"),
                    ],
                ),
                (
                    Scene::Quotation,
                    vec![
                        TestDescriptor::new(1, "list-quotations-mywork", "List Quotations (My Work)"),
                        TestDescriptor::new(2, "list-quotations-myteam", "List Quotations (My Team)"),
                        TestDescriptor::new(3, "get-quotation-detail", "Get Quotation Detail"),
                        TestDescriptor::new(4, "create-quotation", "Create Quotation"),
                        TestDescriptor::new(5, "submit-quotation", "Submit Quotation"),
                    ],
                ),
            ],
        }
    }

    #[must_use]
    pub fn scenes(&self) -> Vec<Scene> {
        self.scenes.iter().map(|(scene, _)| *scene).collect()
    }

    #[must_use]
    pub fn tests(&self, scene: Scene) -> &[TestDescriptor] {
        self.scenes
            .iter()
            .find(|(candidate, _)| *candidate == scene)
            .map_or(&[], |(_, tests)| tests.as_slice())
    }

    /// Finds a single test by identifier. Accepts the bare identifier as
    /// well as numbered file-style names such as `02-auth-me.js`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTest` when nothing in the scene matches.
    pub fn find_test(&self, scene: Scene, name: &str) -> Result<TestDescriptor, SelectionError> {
        let wanted = normalize_test_name(name);
        self.tests(scene)
            .iter()
            .find(|test| test.identifier.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| SelectionError::UnknownTest {
                scene: scene.as_str().to_owned(),
                test: name.to_owned(),
            })
    }
}

fn normalize_test_name(name: &str) -> &str {
    let trimmed = name.trim();
    let trimmed = trimmed.strip_suffix(".js").unwrap_or(trimmed);
    match trimmed.split_once('-') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|ch| ch.is_ascii_digit()) => {
            rest
        }
        Some(_) | None => trimmed,
    }
}
