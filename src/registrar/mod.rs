// Route registrar - turns the route-definition tree into an axum router
//
// Every file under src/routes contributes one HTTP path derived from its
// location, and one route per exported method. The registrar resolves
// duplicates, validates the table, wraps each handler in the guards its access
// tier requires and binds the SPA fallback last.

use axum::{
    handler::Handler,
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{any, MethodFilter, MethodRouter},
    Extension, Router,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;

use crate::fallback::spa_fallback;
use crate::middleware::{authenticate, enforce_guards, normalize_body, tag_route, GuardChain, GUILD_PARAM};
use crate::state::AppState;

/// Extension every route-definition file must carry.
pub const ROUTE_EXTENSION: &str = "rs";

/// Manifest file of a route directory; never a route itself.
pub const MANIFEST_FILE: &str = "mod.rs";

/// Who may reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    /// No credential required.
    Public,
    /// Any valid credential.
    Authenticated,
    /// Valid credential belonging to a member of the `:guild` in the path.
    Member,
    /// Member with admin privileges, elevated scope and a guild in good standing.
    Admin,
}

impl Access {
    pub fn requires_credential(self) -> bool {
        self != Access::Public
    }

    /// Guard chain run after credential verification, if any.
    pub fn chain(self) -> Option<GuardChain> {
        match self {
            Access::Member => Some(GuardChain::membership()),
            Access::Admin => Some(GuardChain::admin()),
            Access::Public | Access::Authenticated => None,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Access::Public => "public",
            Access::Authenticated => "authenticated",
            Access::Member => "member",
            Access::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// What a route factory produces: the access tier and the handler.
#[derive(Clone)]
pub struct RouteConfig {
    pub access: Access,
    pub handler: MethodRouter<AppState>,
}

impl RouteConfig {
    pub fn new<H, T>(access: Access, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self {
            access,
            handler: any(handler),
        }
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig").field("access", &self.access).finish_non_exhaustive()
    }
}

pub type RouteFactory = fn() -> RouteConfig;

/// One route-definition file: its path relative to the route root and the
/// method factories it exports.
#[derive(Clone, Copy)]
pub struct RouteFile {
    pub source: &'static str,
    pub methods: &'static [(&'static str, RouteFactory)],
}

/// A route declared in code rather than discovered from the tree.
#[derive(Clone, Copy)]
pub struct StaticRoute {
    pub method: &'static str,
    pub path: &'static str,
    pub factory: RouteFactory,
}

/// Where a route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Static,
    File(&'static str),
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSource::Static => f.write_str("<static>"),
            RouteSource::File(source) => f.write_str(source),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Route file {0} must be a .rs file and not a dotfile or mod.rs")]
    UnsupportedFile(String),

    #[error("Route file {file} has malformed segment '{segment}'")]
    MalformedSegment { file: String, segment: String },

    #[error("Route {file} exports unknown method '{method}'")]
    UnknownMethod { file: String, method: String },

    #[error("Static route {method} {path} is declared twice")]
    DuplicateStatic { method: Method, path: String },

    #[error("Routes {first} and {second} differ only in parameter names")]
    ConflictingParams { first: String, second: String },

    #[error("{access} route {method} {path} has no :guild parameter")]
    MissingGuildParam { access: Access, method: Method, path: String },
}

/// A route accepted into the table.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub path: String,
    pub source: RouteSource,
    pub config: RouteConfig,
}

/// A discovered route dropped because another route already owns its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRoute {
    pub method: Method,
    pub path: String,
    pub source: RouteSource,
    pub shadowed_by: RouteSource,
}

/// Resolved, validated set of routes ready to be bound.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub routes: Vec<RouteEntry>,
    pub skipped: Vec<SkippedRoute>,
}

/// Whether a tree-relative path names a route-definition file.
pub fn is_route_file(relative: &str) -> bool {
    let name = relative.rsplit(['/', '\\']).next().unwrap_or(relative);
    !name.starts_with('.')
        && name != MANIFEST_FILE
        && Path::new(name).extension().and_then(|e| e.to_str()) == Some(ROUTE_EXTENSION)
}

/// Walk `root` and return every route-definition file, relative to `root`
/// with `/` separators, in lexicographic order.
pub fn discover(root: &Path) -> std::io::Result<Vec<String>> {
    let mut found = Vec::new();
    walk(root, "", &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, prefix: &str, found: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        if entry.file_type()?.is_dir() {
            walk(&entry.path(), &relative, found)?;
        } else if is_route_file(&relative) {
            found.push(relative);
        }
    }
    Ok(())
}

/// Derive the HTTP path for a route file.
///
/// `guilds/[guild]/members/index.rs` becomes `/guilds/:guild/members`;
/// the root `index.rs` becomes `/`.
pub fn derive_path(relative: &str) -> Result<String, RouteError> {
    let normalized = relative.replace('\\', "/");
    if !is_route_file(&normalized) {
        return Err(RouteError::UnsupportedFile(relative.to_string()));
    }

    let stem = &normalized[..normalized.len() - ROUTE_EXTENSION.len() - 1];
    let mut segments = Vec::new();
    for segment in stem.split('/').filter(|s| !s.is_empty()) {
        segments.push(rewrite_segment(relative, segment)?);
    }

    if segments.last().map(String::as_str) == Some("index") {
        segments.pop();
    }

    Ok(format!("/{}", segments.join("/")))
}

fn rewrite_segment(file: &str, segment: &str) -> Result<String, RouteError> {
    if !segment.contains(['[', ']', ':', '*']) {
        return Ok(segment.to_string());
    }

    let name = segment
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .ok_or_else(|| RouteError::MalformedSegment {
            file: file.to_string(),
            segment: segment.to_string(),
        })?;

    Ok(format!(":{}", name))
}

/// Parse an exported method name (`get`, `post`, ...).
pub fn parse_method(file: &str, name: &str) -> Result<Method, RouteError> {
    let method = match name.to_ascii_lowercase().as_str() {
        "get" => Method::GET,
        "post" => Method::POST,
        "put" => Method::PUT,
        "patch" => Method::PATCH,
        "delete" => Method::DELETE,
        "head" => Method::HEAD,
        "options" => Method::OPTIONS,
        "trace" => Method::TRACE,
        _ => {
            return Err(RouteError::UnknownMethod {
                file: file.to_string(),
                method: name.to_string(),
            })
        }
    };
    Ok(method)
}

fn method_filter(method: &Method) -> MethodFilter {
    match *method {
        Method::POST => MethodFilter::POST,
        Method::PUT => MethodFilter::PUT,
        Method::PATCH => MethodFilter::PATCH,
        Method::DELETE => MethodFilter::DELETE,
        Method::HEAD => MethodFilter::HEAD,
        Method::OPTIONS => MethodFilter::OPTIONS,
        Method::TRACE => MethodFilter::TRACE,
        _ => MethodFilter::GET,
    }
}

/// Keep the first route for each (method, path) key and skip the rest.
///
/// `candidates` must list static routes before discovered ones, and discovered
/// routes in walk order, so statics always win.
pub fn resolve_duplicates(candidates: Vec<RouteEntry>) -> (Vec<RouteEntry>, Vec<SkippedRoute>) {
    let mut owners: HashMap<(Method, String), RouteSource> = HashMap::new();
    let mut kept = Vec::new();
    let mut skipped = Vec::new();

    for entry in candidates {
        let key = (entry.method.clone(), entry.path.clone());
        match owners.get(&key) {
            Some(owner) => skipped.push(SkippedRoute {
                method: entry.method,
                path: entry.path,
                source: entry.source,
                shadowed_by: *owner,
            }),
            None => {
                owners.insert(key, entry.source);
                kept.push(entry);
            }
        }
    }

    (kept, skipped)
}

/// Path with parameter names erased, e.g. `/api/guilds/:` for `/api/guilds/:guild`.
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn has_param(path: &str, name: &str) -> bool {
    path.split('/').any(|segment| segment.strip_prefix(':') == Some(name))
}

impl RouteTable {
    /// Resolve static routes and route files into a validated table.
    pub fn build(files: &[RouteFile], statics: &[StaticRoute]) -> Result<Self, RouteError> {
        let mut candidates = Vec::new();

        for route in statics {
            let method = parse_method(route.path, route.method)?;
            let duplicate = candidates
                .iter()
                .any(|e: &RouteEntry| e.method == method && e.path == route.path);
            if duplicate {
                return Err(RouteError::DuplicateStatic {
                    method,
                    path: route.path.to_string(),
                });
            }
            candidates.push(RouteEntry {
                method,
                path: route.path.to_string(),
                source: RouteSource::Static,
                config: (route.factory)(),
            });
        }

        let mut files: Vec<&RouteFile> = files.iter().collect();
        files.sort_by_key(|f| f.source);

        for file in files {
            let path = derive_path(file.source)?;
            for (name, factory) in file.methods {
                candidates.push(RouteEntry {
                    method: parse_method(file.source, name)?,
                    path: path.clone(),
                    source: RouteSource::File(file.source),
                    config: factory(),
                });
            }
        }

        let (routes, skipped) = resolve_duplicates(candidates);
        for skip in &skipped {
            tracing::warn!(
                "Skipping duplicate route {} {} from {} (already bound by {})",
                skip.method, skip.path, skip.source, skip.shadowed_by
            );
        }

        let table = Self { routes, skipped };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), RouteError> {
        let mut shapes: HashMap<String, &str> = HashMap::new();
        for route in &self.routes {
            let shape = path_shape(&route.path);
            if let Some(first) = shapes.get(&shape) {
                if *first != route.path {
                    return Err(RouteError::ConflictingParams {
                        first: first.to_string(),
                        second: route.path.clone(),
                    });
                }
            } else {
                shapes.insert(shape, &route.path);
            }

            if route.config.access.chain().is_some() && !has_param(&route.path, GUILD_PARAM) {
                return Err(RouteError::MissingGuildParam {
                    access: route.config.access,
                    method: route.method.clone(),
                    path: route.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Look up the route bound for a method and path.
    pub fn find(&self, method: &Method, path: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|r| &r.method == method && r.path == path)
    }
}

/// Wrap a handler in the layers its access tier requires.
///
/// Body normalization sits innermost, so nothing is buffered for a caller the
/// guards turn away.
fn guarded(config: &RouteConfig, state: &AppState) -> MethodRouter {
    let trimmed = config
        .handler
        .clone()
        .layer(from_fn_with_state(state.clone(), normalize_body));

    let handler: MethodRouter<AppState> = match (config.access.requires_credential(), config.access.chain()) {
        (_, Some(chain)) => trimmed.layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.clone(), authenticate))
                .layer(Extension(Arc::new(chain)))
                .layer(from_fn_with_state(state.clone(), enforce_guards)),
        ),
        (true, None) => trimmed.layer(from_fn_with_state(state.clone(), authenticate)),
        (false, None) => trimmed,
    };

    handler.with_state(state.clone())
}

/// Bind every route in the table, then the global route hooks and the SPA
/// fallback.
pub fn bind(table: &RouteTable, state: &AppState) -> Router<AppState> {
    let mut by_path: BTreeMap<&str, MethodRouter<AppState>> = BTreeMap::new();

    for route in &table.routes {
        tracing::debug!(
            "Binding {} {} ({}) from {}",
            route.method, route.path, route.config.access, route.source
        );
        let endpoint = by_path.remove(route.path.as_str()).unwrap_or_else(MethodRouter::new);
        by_path.insert(
            &route.path,
            endpoint.on_service(method_filter(&route.method), guarded(&route.config, state)),
        );
    }

    let mut router = Router::new();
    if by_path.is_empty() {
        return router.fallback(spa_fallback);
    }

    for (path, endpoint) in by_path {
        router = router.route(path, endpoint);
    }

    router.route_layer(from_fn(tag_route))
        .fallback(spa_fallback)
}
