//! Maven Workspace Model
//!
//! Tracks project units and the model problems of their descriptors.
//! Analysis happens when a unit is refreshed (on discovery, save, or a
//! change on disk); lookups then return the cached result.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tokio::sync::RwLock;

use super::{ProjectUnit, SemanticModel};
use crate::core::problem::SemanticProblem;

const SUPPORTED_MODEL_VERSION: &str = "4.0.0";

static ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-.]+$").ok());

/// In-memory registry of tracked Maven projects
#[derive(Debug, Default)]
pub struct MavenWorkspace {
    units: RwLock<HashMap<String, Vec<SemanticProblem>>>,
}

impl MavenWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `owner` (if not yet tracked) and re-analyze its descriptor text.
    /// Returns the number of problems found.
    pub async fn refresh(&self, owner: &str, text: &str) -> usize {
        let problems = analyze(text);
        let count = problems.len();
        self.units.write().await.insert(owner.to_string(), problems);
        log::debug!("Refreshed project '{}': {} model problem(s)", owner, count);
        count
    }

    /// Stop tracking `owner`; returns whether it was tracked
    pub async fn forget(&self, owner: &str) -> bool {
        self.units.write().await.remove(owner).is_some()
    }

    pub async fn is_tracked(&self, owner: &str) -> bool {
        self.units.read().await.contains_key(owner)
    }

    pub async fn tracked(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.units.read().await.keys().cloned().collect();
        owners.sort();
        owners
    }
}

#[tower_lsp::async_trait]
impl SemanticModel for MavenWorkspace {
    async fn find_unit(&self, owner: &str) -> Option<ProjectUnit> {
        self.units
            .read()
            .await
            .contains_key(owner)
            .then(|| ProjectUnit::new(owner))
    }

    async fn problems_of(&self, unit: &ProjectUnit) -> Vec<SemanticProblem> {
        self.units
            .read()
            .await
            .get(unit.owner())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Clone)]
struct Dependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    kind: Option<String>,
    classifier: Option<String>,
}

impl Dependency {
    fn management_key(&self) -> String {
        let mut key = format!(
            "{}:{}:{}",
            self.group_id.as_deref().unwrap_or_default(),
            self.artifact_id.as_deref().unwrap_or_default(),
            present(&self.kind).unwrap_or("jar"),
        );
        if let Some(classifier) = present(&self.classifier) {
            key.push(':');
            key.push_str(classifier);
        }
        key
    }
}

/// Descriptor fields collected while walking the document
#[derive(Debug, Default)]
struct Descriptor {
    root: Option<String>,
    model_version: Option<String>,
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    parent_group_id: Option<String>,
    parent_version: Option<String>,
    dependencies: Vec<Dependency>,
    managed: HashSet<String>,
}

/// Element-path driven collector
#[derive(Debug, Default)]
struct DescriptorBuilder {
    path: Vec<String>,
    text: String,
    current: Dependency,
    descriptor: Descriptor,
}

impl DescriptorBuilder {
    fn open(&mut self, name: String) {
        if self.path.is_empty() && self.descriptor.root.is_none() {
            self.descriptor.root = Some(name.clone());
        }
        self.path.push(name);
        self.text.clear();
        if self.in_dependency() == Some(self.path.len()) {
            self.current = Dependency::default();
        }
    }

    fn close(&mut self) {
        let value = Some(self.text.trim().to_string());
        let path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["project", "modelVersion"] => self.descriptor.model_version = value,
            ["project", "groupId"] => self.descriptor.group_id = value,
            ["project", "artifactId"] => self.descriptor.artifact_id = value,
            ["project", "version"] => self.descriptor.version = value,
            ["project", "parent", "groupId"] => self.descriptor.parent_group_id = value,
            ["project", "parent", "version"] => self.descriptor.parent_version = value,
            ["project", "dependencies", "dependency"] => {
                self.descriptor.dependencies.push(self.current.clone());
            }
            ["project", "dependencyManagement", "dependencies", "dependency"] => {
                self.descriptor.managed.insert(self.current.management_key());
            }
            [.., "dependency", field] if self.in_dependency() == Some(path.len() - 1) => match *field {
                "groupId" => self.current.group_id = value,
                "artifactId" => self.current.artifact_id = value,
                "version" => self.current.version = value,
                "type" => self.current.kind = value,
                "classifier" => self.current.classifier = value,
                _ => {}
            },
            _ => {}
        }
        self.path.pop();
        self.text.clear();
    }

    /// Length of the enclosing dependency path, if inside one
    fn in_dependency(&self) -> Option<usize> {
        let path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["project", "dependencies", "dependency", ..] => Some(3),
            ["project", "dependencyManagement", "dependencies", "dependency", ..] => Some(4),
            _ => None,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn collect(text: &str) -> Result<Descriptor, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    let mut builder = DescriptorBuilder::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => builder.open(local_name(e.local_name().as_ref())),
            Event::Empty(e) => {
                builder.open(local_name(e.local_name().as_ref()));
                builder.close();
            }
            Event::Text(e) => builder.text.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::End(_) => builder.close(),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(builder.descriptor)
}

fn check_id(field: &str, value: &str, problems: &mut Vec<SemanticProblem>) {
    if value.contains("${") {
        return;
    }
    if let Some(pattern) = ID_PATTERN.as_ref() {
        if !pattern.is_match(value) {
            problems.push(SemanticProblem::new(format!(
                "'{}' with value '{}' does not match a valid id pattern.",
                field, value
            )));
        }
    }
}

/// Model problems of a descriptor, in a stable order
pub fn analyze(text: &str) -> Vec<SemanticProblem> {
    let descriptor = match collect(text) {
        Ok(descriptor) => descriptor,
        Err(e) => return vec![SemanticProblem::new(format!("Non-parseable POM: {}", e))],
    };

    let mut problems = Vec::new();

    match descriptor.root.as_deref() {
        Some("project") => {}
        Some(other) => {
            problems.push(SemanticProblem::new(format!(
                "Expected root element 'project' but found '{}'.",
                other
            )));
            return problems;
        }
        None => return problems,
    }

    match present(&descriptor.model_version) {
        None => problems.push(SemanticProblem::new("'modelVersion' is missing.")),
        Some(SUPPORTED_MODEL_VERSION) => {}
        Some(other) => problems.push(SemanticProblem::new(format!(
            "'modelVersion' must be one of [{}] but is '{}'.",
            SUPPORTED_MODEL_VERSION, other
        ))),
    }

    match present(&descriptor.group_id) {
        Some(group_id) => check_id("groupId", group_id, &mut problems),
        None if present(&descriptor.parent_group_id).is_none() => {
            problems.push(SemanticProblem::new("'groupId' is missing."));
        }
        None => {}
    }

    match present(&descriptor.artifact_id) {
        Some(artifact_id) => check_id("artifactId", artifact_id, &mut problems),
        None => problems.push(SemanticProblem::new("'artifactId' is missing.")),
    }

    if present(&descriptor.version).is_none() && present(&descriptor.parent_version).is_none() {
        problems.push(SemanticProblem::new("'version' is missing."));
    }

    let mut seen: HashSet<String> = HashSet::new();
    for dependency in &descriptor.dependencies {
        let key = dependency.management_key();

        if present(&dependency.group_id).is_none() {
            problems.push(SemanticProblem::new(format!(
                "'dependencies.dependency.groupId' for {} is missing.",
                key
            )));
        }
        if present(&dependency.artifact_id).is_none() {
            problems.push(SemanticProblem::new(format!(
                "'dependencies.dependency.artifactId' for {} is missing.",
                key
            )));
        }
        if present(&dependency.version).is_none() && !descriptor.managed.contains(&key) {
            problems.push(SemanticProblem::new(format!(
                "'dependencies.dependency.version' for {} is missing.",
                key
            )));
        }

        if !seen.insert(key.clone()) {
            problems.push(SemanticProblem::new(format!(
                "'dependencies.dependency.(groupId:artifactId:type:classifier)' must be unique: {} -> duplicate declaration of version {}",
                key,
                present(&dependency.version).unwrap_or("(?)")
            )));
        }
    }

    problems
}
