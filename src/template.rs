//! Query templates
//!
//! A template is an ordered list of options, each a generator plus an ordered
//! list of tests. Templates are validated once when built and are shared
//! read-only between every instance created from them.
//!
//! Template files are TOML or JSON:
//!
//! ```toml
//! name = "FindCover"
//! run_mode = { top_n = 3 }
//!
//! [[options]]
//! generator = { type = "OnCircle", circle_radius = { param = "Radius", default = 600.0 } }
//!
//! [[options.tests]]
//! type = "Trace"
//! filter = { equals = false }
//!
//! [[options.tests]]
//! type = "Distance"
//! scoring = "inverse_linear"
//! ```

use crate::context::ContextRegistry;
use crate::error::{ApiError, QueryError};
use crate::generator::{Generator, GeneratorConfig};
use crate::params::NamedValues;
use crate::test::{validate_settings, QueryTest, TestConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Which items of a finished query are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    SingleResult,
    #[default]
    AllMatching,
    TopN(usize),
}

impl RunMode {
    pub fn limit(self) -> Option<usize> {
        match self {
            RunMode::SingleResult => Some(1),
            RunMode::AllMatching => None,
            RunMode::TopN(n) => Some(n),
        }
    }
}

/// One generation strategy and the tests that score its items.
#[derive(Clone)]
pub struct QueryOption {
    pub generator: Arc<dyn Generator>,
    pub tests: Vec<Arc<dyn QueryTest>>,
}

impl QueryOption {
    pub fn new(generator: impl Generator + 'static) -> Self {
        Self {
            generator: Arc::new(generator),
            tests: Vec::new(),
        }
    }

    pub fn with_test(mut self, test: impl QueryTest + 'static) -> Self {
        self.tests.push(Arc::new(test));
        self
    }

    fn validate(&self, index: usize) -> Result<(), QueryError> {
        let item_type = self.generator.item_type();
        if item_type.is_abstract() {
            return Err(QueryError::InvalidTemplate(format!(
                "option {} generates abstract {:?} items",
                index, item_type
            )));
        }
        for test in &self.tests {
            if !item_type.is_a(test.item_type()) {
                return Err(QueryError::ItemTypeMismatch {
                    test: test.describe_title(),
                    expected: test.item_type(),
                    actual: item_type,
                });
            }
            validate_settings(test.as_ref())?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for QueryOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOption")
            .field("generator", &self.generator.describe_title())
            .field(
                "tests",
                &self.tests.iter().map(|t| t.describe_title()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Validated, immutable query definition.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    name: String,
    options: Vec<QueryOption>,
    run_mode: RunMode,
    defaults: NamedValues,
}

impl QueryTemplate {
    /// Validates and builds a template.
    ///
    /// Fails with `InvalidTemplate` when there are no options or a test's
    /// filter does not fit its value kind, and with `ItemTypeMismatch` when
    /// a test cannot read the items its option generates.
    pub fn new(name: impl Into<String>, options: Vec<QueryOption>) -> Result<Self, QueryError> {
        let name = name.into();
        if options.is_empty() {
            return Err(QueryError::InvalidTemplate(format!(
                "template '{}' has no options",
                name
            )));
        }
        for (index, option) in options.iter().enumerate() {
            option.validate(index)?;
        }
        let mut declared = Vec::new();
        for option in &options {
            option.generator.collect_params(&mut declared);
            for test in &option.tests {
                test.collect_params(&mut declared);
            }
        }
        let defaults = NamedValues::from_declared(declared)?;
        Ok(Self {
            name,
            options,
            run_mode: RunMode::default(),
            defaults,
        })
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[QueryOption] {
        &self.options
    }

    pub fn option(&self, index: usize) -> Option<&QueryOption> {
        self.options.get(index)
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Every named parameter with its default.
    pub fn named_params(&self) -> &NamedValues {
        &self.defaults
    }

    /// Checks that every context the template names is registered, and that
    /// generators do not depend on per-item contexts.
    pub fn validate_contexts(&self, registry: &ContextRegistry) -> Result<(), QueryError> {
        for option in &self.options {
            let item_type = option.generator.item_type();
            for key in option.generator.contexts() {
                let context = registry
                    .get(key)
                    .ok_or_else(|| QueryError::UnknownContext(key.to_string()))?;
                if context.is_per_item(item_type) {
                    return Err(QueryError::InvalidTemplate(format!(
                        "generator '{}' cannot use per-item context {}",
                        option.generator.describe_title(),
                        key
                    )));
                }
            }
            for test in &option.tests {
                if let Some(key) = test.contexts().into_iter().find(|k| !registry.contains(k)) {
                    return Err(QueryError::UnknownContext(key.to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Serialized option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDescription {
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub tests: Vec<TestConfig>,
}

/// Serialized template, as read from TOML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDescription {
    pub name: String,
    #[serde(default)]
    pub run_mode: RunMode,
    #[serde(default)]
    pub options: Vec<OptionDescription>,
}

impl TemplateDescription {
    pub fn from_toml_str(text: &str) -> Result<Self, ApiError> {
        toml::from_str(text).map_err(|e| ApiError::TemplateParse(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self, ApiError> {
        serde_json::from_str(text).map_err(|e| ApiError::TemplateParse(e.to_string()))
    }

    /// Reads a `.json` file as JSON and anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    pub fn build(self) -> Result<QueryTemplate, QueryError> {
        let options = self
            .options
            .into_iter()
            .map(|option| QueryOption {
                generator: option.generator.build(),
                tests: option.tests.into_iter().map(TestConfig::build).collect(),
            })
            .collect();
        Ok(QueryTemplate::new(self.name, options)?.with_run_mode(self.run_mode))
    }
}

/// Loads and validates a template file in one step.
pub fn load_template(path: &Path) -> Result<QueryTemplate, ApiError> {
    Ok(TemplateDescription::load(path)?.build()?)
}
