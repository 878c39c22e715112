//! Build definition consumed by the runner

use crate::StepType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use wharf_errors::{ConfigError, Error};

/// A fully parsed and variable-substituted build definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// Named group of steps that run in parallel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Smallest unit of work, executed in its own workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(flatten)]
    pub step_type: StepType,
}

/// Options for a single build invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Run only the stage with this exact name. Empty runs all stages.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stage_filter: String,
}

impl BuildOptions {
    /// Options that only run the named stage
    #[must_use]
    pub fn with_stage_filter(stage: impl Into<String>) -> Self {
        Self {
            stage_filter: stage.into(),
        }
    }
}

impl Stage {
    /// Create a stage from a name and its steps
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

impl Step {
    /// Create a step from a name and its type
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            name: name.into(),
            step_type,
        }
    }
}

impl Definition {
    /// Load an already-resolved definition from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid definition.
    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(&e, path))?;
        Self::from_yaml(&contents)
    }

    /// Parse a definition from YAML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if the text is not a valid definition.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        serde_yml::from_str(contents).map_err(|e| {
            ConfigError::ParseError {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Stages selected by the options, in declaration order
    #[must_use]
    pub fn filtered_stages(&self, options: &BuildOptions) -> Vec<&Stage> {
        self.stages
            .iter()
            .filter(|stage| options.stage_filter.is_empty() || stage.name == options.stage_filter)
            .collect()
    }

    /// Check structural invariants that must hold before anything runs
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateStep` if two steps in one stage share a name.
    pub fn validate(&self) -> Result<(), Error> {
        for stage in &self.stages {
            let mut seen = HashSet::new();
            for step in &stage.steps {
                if !seen.insert(step.name.as_str()) {
                    return Err(ConfigError::DuplicateStep {
                        stage: stage.name.clone(),
                        step: step.name.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r"
stages:
  - name: build
    steps:
      - name: compile
        container:
          image: rust:1
          cmds:
            - cargo build
      - name: image
        docker:
          file: Dockerfile
          tag: latest
  - name: deploy
    steps:
      - name: apply
        kubectl:
          file: deploy/app.yml
          cluster: prod
";

    #[test]
    fn parses_stages_in_order() {
        let definition = Definition::from_yaml(DEFINITION).unwrap();
        assert_eq!(definition.stages.len(), 2);
        assert_eq!(definition.stages[0].name, "build");
        assert_eq!(definition.stages[0].steps[0].step_type.type_name(), "container");
        assert_eq!(definition.stages[0].steps[1].step_type.type_name(), "docker");
        assert_eq!(definition.stages[1].steps[0].step_type.type_name(), "kubectl");
    }

    #[test]
    fn stage_filter_matches_exact_name() {
        let definition = Definition::from_yaml(DEFINITION).unwrap();
        let all = definition.filtered_stages(&BuildOptions::default());
        assert_eq!(all.len(), 2);

        let only_deploy = definition.filtered_stages(&BuildOptions::with_stage_filter("deploy"));
        assert_eq!(only_deploy.len(), 1);
        assert_eq!(only_deploy[0].name, "deploy");

        let none = definition.filtered_stages(&BuildOptions::with_stage_filter("dep"));
        assert!(none.is_empty());
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let step = Step::new(
            "same",
            StepType::Container(crate::ContainerStep {
                image: "alpine".into(),
                ..crate::ContainerStep::default()
            }),
        );
        let definition = Definition {
            stages: vec![Stage::new("build", vec![step.clone(), step])],
        };
        let err = definition.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::DuplicateStep { .. })
        ));
    }
}
