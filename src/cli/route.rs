//! CLI route: single route table and run context.

use crate::cli::output::{
    format_params_table, format_result_json, format_result_text, format_template_summary,
    RunSummary,
};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, EqsConfig};
use crate::context::{ContextRegistry, FixedPointsContext, Querier};
use crate::error::{ApiError, QueryError};
use crate::instance::QueryResult;
use crate::manager::QueryManager;
use crate::params::{NamedValue, NamedValues, ParamValue, QueryParams};
use crate::template::load_template;
use crate::types::{Transform, Vector};
use crate::world::scene::Scene;
use crate::world::WorldServices;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: EqsConfig,
}

impl RunContext {
    /// Loads configuration from `config_path` when given, else from the workspace layers.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.ensure_valid()?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn from_config(workspace_root: PathBuf, config: EqsConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &EqsConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run {
                template,
                scene,
                querier,
                at,
                params,
                budget_us,
                format,
            } => self.handle_run(RunRequest {
                template,
                scene,
                querier: querier.as_deref(),
                at: at.as_deref(),
                params,
                budget_us: *budget_us,
                format,
            }),
            Commands::Validate { template } => {
                let template = load_template(&self.resolve(template))?;
                Ok(format_template_summary(&template))
            }
            Commands::Params { template } => {
                let template = load_template(&self.resolve(template))?;
                Ok(format_params_table(template.named_params()))
            }
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn handle_run(&self, request: RunRequest<'_>) -> Result<String, ApiError> {
        let template = Arc::new(load_template(&self.resolve(request.template))?);
        let scene = Arc::new(Scene::load(&self.resolve(request.scene))?);
        let querier = resolve_querier(&scene, request.querier, request.at)?;
        let params = parse_overrides(template.named_params(), request.params)?;

        let mut manager = QueryManager::from_config(
            WorldServices::from_shared(scene.clone()),
            scene_contexts(&scene),
            &self.config,
        );
        let budget = Duration::from_micros(
            request
                .budget_us
                .unwrap_or(self.config.manager.tick_budget_us)
                .max(1),
        );

        let started = Instant::now();
        let slot: Arc<Mutex<Option<QueryResult>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let id = manager.submit_with_callback(&template, querier, &params, move |_, result| {
            *sink.lock() = Some(result.clone());
        })?;
        let mut ticks = 0usize;
        while manager.is_active(id) {
            manager.tick(budget);
            ticks += 1;
        }
        let result = slot
            .lock()
            .take()
            .ok_or(ApiError::Query(QueryError::UnknownQuery(id)))?;
        let summary = RunSummary {
            ticks,
            budget,
            elapsed: started.elapsed(),
        };
        info!(
            query = %id,
            ticks,
            items = result.len(),
            "CLI query complete"
        );

        if request.format == "json" {
            let snapshot = manager.debugger().last();
            format_result_json(&result, &summary, snapshot)
        } else {
            Ok(format_result_text(&result, &summary))
        }
    }
}

struct RunRequest<'a> {
    template: &'a Path,
    scene: &'a Path,
    querier: Option<&'a str>,
    at: Option<&'a [f32]>,
    params: &'a [String],
    budget_us: Option<u64>,
    format: &'a str,
}

/// Every named point set in the scene becomes a fixed-location context.
fn scene_contexts(scene: &Scene) -> ContextRegistry {
    let mut registry = ContextRegistry::new();
    for (name, points) in scene.point_sets() {
        debug!(context = %name, points = points.len(), "Registering scene point set");
        registry.register(name.clone(), Arc::new(FixedPointsContext::new(points.clone())));
    }
    registry
}

fn resolve_querier(
    scene: &Scene,
    name: Option<&str>,
    at: Option<&[f32]>,
) -> Result<Querier, ApiError> {
    if let Some(name) = name {
        let handle = scene.entity_by_name(name).ok_or_else(|| {
            ApiError::SceneParse(format!("No entity named '{}' in scene", name))
        })?;
        return Ok(Querier::Entity(handle));
    }
    match at {
        Some([x, y, z]) => Ok(Querier::Static(Transform::at(Vector::new(*x, *y, *z)))),
        Some(other) => Err(ApiError::Query(QueryError::InvalidParam(format!(
            "--at expects 3 components, got {}",
            other.len()
        )))),
        None => Ok(Querier::Static(Transform::default())),
    }
}

/// Parses `NAME=VALUE` overrides using the kind each name was declared with.
fn parse_overrides(declared: &NamedValues, raw: &[String]) -> Result<QueryParams, QueryError> {
    let mut params = QueryParams::new();
    for pair in raw {
        let (name, text) = pair
            .split_once('=')
            .ok_or_else(|| QueryError::InvalidParam(format!("expected NAME=VALUE, got '{}'", pair)))?;
        let name = name.trim();
        let kind = declared
            .get(name)
            .map(|v| v.kind())
            .ok_or_else(|| QueryError::InvalidParam(format!("template has no parameter '{}'", name)))?;
        params.push(NamedValue::new(name, ParamValue::parse_as(kind, text)?));
    }
    Ok(params)
}
